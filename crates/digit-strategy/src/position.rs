//! Position state for an active strategy run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mutable state of one strategy run.
///
/// Exists only while a run is active; a run holds at most one open
/// contract at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    /// Stake used for the current or next attempt.
    pub current_stake: Decimal,
    /// Losses since the last win.
    pub consecutive_losses: u32,
    /// Signed running profit across the run.
    pub cumulative_profit: Decimal,
    /// The open contract, when one exists.
    pub open_contract: Option<u64>,
    /// Set when the run reached a terminal condition.
    pub halted: bool,
}

impl PositionState {
    pub fn new(initial_stake: Decimal) -> Self {
        Self {
            current_stake: initial_stake,
            consecutive_losses: 0,
            cumulative_profit: Decimal::ZERO,
            open_contract: None,
            halted: false,
        }
    }

    pub fn has_open_contract(&self) -> bool {
        self.open_contract.is_some()
    }

    /// Fold a settled contract's signed profit into the run.
    pub fn record_settlement(&mut self, profit: Decimal) {
        self.cumulative_profit += profit;
        if profit.is_sign_negative() && !profit.is_zero() {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        self.open_contract = None;
    }
}
