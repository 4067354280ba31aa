//! Rolling last-digit frequency statistics over tick streams.
//!
//! Each symbol gets a bounded window of recent ticks plus an
//! incrementally maintained per-digit count, so eviction and snapshotting
//! never rescan the window.

pub mod engine;
pub mod history;

pub use engine::TickStatsEngine;
pub use history::{DigitStats, SymbolHistory, DIGITS};
