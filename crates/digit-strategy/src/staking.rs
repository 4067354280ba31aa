//! Staking policies.
//!
//! The dashboard origin carried two distinct martingale formulas across
//! its strategies; they are preserved here as named policies rather than
//! unified, since they produce different escalation curves.

use crate::config::StrategyConfig;
use crate::position::PositionState;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How the stake escalates after the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingPolicy {
    /// `stake = round2(prev × (1 + multiplier))`.
    #[default]
    Compound,
    /// `stake = round2(prev × multiplier)`.
    Scaled,
}

/// Round a money amount to two decimal places, away from zero on ties.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the stake for the next attempt.
///
/// Below the trigger the base stake applies; at or past it the previous
/// stake escalates by the configured policy. A win resets the loss count
/// and with it the stake.
pub fn next_stake(config: &StrategyConfig, position: &PositionState) -> Decimal {
    if position.consecutive_losses < config.martingale_trigger {
        return config.initial_stake;
    }
    let previous = if position.current_stake.is_zero() {
        config.initial_stake
    } else {
        position.current_stake
    };
    let escalated = match config.staking {
        StakingPolicy::Compound => previous * (Decimal::ONE + config.martingale_multiplier),
        StakingPolicy::Scaled => previous * config.martingale_multiplier,
    };
    round2(escalated)
}
