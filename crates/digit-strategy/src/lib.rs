//! Pure trade decision rules and staking policies.
//!
//! `evaluate` is a side-effect-free function over a statistics snapshot,
//! the strategy configuration, and the current position state. It issues
//! no network calls and can be tested in isolation.

pub mod config;
pub mod evaluate;
pub mod position;
pub mod staking;

pub use config::{EntryRule, StrategyConfig};
pub use evaluate::{evaluate, Decision, SkipReason};
pub use position::PositionState;
pub use staking::{next_stake, round2, StakingPolicy};
