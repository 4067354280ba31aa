//! Strategy configuration.

use crate::staking::StakingPolicy;
use digit_core::ContractType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Entry rule families.
///
/// Both generalize the same shape: given a digit distribution, decide
/// whether current conditions justify opening a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRule {
    /// Enter only while each watched digit's frequency sits at or below
    /// the entry threshold.
    ExtremesBelowThreshold { digits: [u8; 2] },
    /// Enter on every evaluation; staking carries the risk management.
    AlwaysEnter,
}

/// Full strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Underlying symbol to trade.
    pub symbol: String,
    /// Contract type to open.
    pub contract_type: ContractType,
    /// Digit barrier / prediction, for types that take one.
    #[serde(default)]
    pub prediction: Option<u8>,
    /// Stake for the first attempt and after every win.
    pub initial_stake: Decimal,
    /// Account currency for proposals.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Contract duration in ticks.
    #[serde(default = "default_duration_ticks")]
    pub duration_ticks: u32,
    /// Entry rule.
    pub rule: EntryRule,
    /// Staking policy applied after losses.
    #[serde(default)]
    pub staking: StakingPolicy,
    /// Martingale multiplier.
    pub martingale_multiplier: Decimal,
    /// Consecutive losses before the multiplier applies.
    #[serde(default = "default_martingale_trigger")]
    pub martingale_trigger: u32,
    /// Consecutive-loss ceiling; reaching it stops the run.
    pub max_martingale_level: u32,
    /// Halt once cumulative profit reaches this.
    pub target_profit: Decimal,
    /// Halt once cumulative loss reaches this (positive number).
    pub stop_loss: Decimal,
    /// Frequency threshold (%) for the extremes rule.
    #[serde(default = "default_entry_threshold_pct")]
    pub entry_threshold_pct: f64,
    /// Minimum window size before the extremes rule may fire.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_duration_ticks() -> u32 {
    1
}

fn default_martingale_trigger() -> u32 {
    1
}

fn default_entry_threshold_pct() -> f64 {
    8.0
}

fn default_min_samples() -> usize {
    50
}
