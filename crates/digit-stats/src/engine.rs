//! Multi-symbol statistics engine.
//!
//! Histories are created lazily per symbol and persist, bounded, for the
//! life of the session. Ticks are consumed strictly in arrival order;
//! the upstream delivers a subscription in order, so no epoch reordering
//! is attempted.

use crate::history::{DigitStats, SymbolHistory};
use dashmap::DashMap;
use digit_core::TickSample;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// Default window capacity when none is configured.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1000;

type HistoryEntry = Arc<RwLock<SymbolHistory>>;

/// Per-symbol rolling statistics over a tick stream.
pub struct TickStatsEngine {
    capacity: usize,
    symbols: DashMap<String, HistoryEntry>,
}

impl TickStatsEngine {
    /// Create an engine with the given per-symbol window capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            symbols: DashMap::new(),
        }
    }

    fn get_or_create(&self, symbol: &str) -> HistoryEntry {
        self.symbols
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(SymbolHistory::new(self.capacity))))
            .clone()
    }

    /// Consume one tick into its symbol's window.
    pub fn on_tick(&self, sample: TickSample) {
        let entry = self.get_or_create(&sample.symbol);
        let mut history = entry.write();
        let evicted = history.push(sample);
        trace!(
            len = history.len(),
            evicted = evicted.is_some(),
            "Tick absorbed"
        );
    }

    /// Snapshot the digit distribution for a symbol.
    pub fn stats(&self, symbol: &str) -> Option<DigitStats> {
        self.symbols.get(symbol).map(|entry| entry.read().stats())
    }

    /// Number of samples held for a symbol.
    pub fn window_len(&self, symbol: &str) -> usize {
        self.symbols
            .get(symbol)
            .map(|entry| entry.read().len())
            .unwrap_or(0)
    }
}

impl Default for TickStatsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
