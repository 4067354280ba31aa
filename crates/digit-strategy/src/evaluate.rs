//! The decision function.

use crate::config::{EntryRule, StrategyConfig};
use crate::position::PositionState;
use crate::staking::next_stake;
use digit_core::ContractType;
use digit_stats::DigitStats;
use rust_decimal::Decimal;
use tracing::trace;

/// Why an evaluation declined to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window has fewer samples than the rule requires.
    InsufficientSamples,
    /// A watched digit's frequency exceeds the entry threshold.
    ThresholdNotMet,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Open a contract with these parameters.
    Enter {
        contract_type: ContractType,
        prediction: Option<u8>,
        stake: Decimal,
    },
    /// Conditions not met; wait for the next tick.
    Skip(SkipReason),
    /// The consecutive-loss ceiling is reached; the run must stop
    /// rather than escalate further.
    LevelsExhausted,
}

impl Decision {
    pub fn is_enter(&self) -> bool {
        matches!(self, Self::Enter { .. })
    }
}

/// Map statistics, configuration, and position state to a decision.
///
/// Pure: no side effects, no network calls. The level cap is checked
/// before any rule so no stake beyond the configured ceiling can ever be
/// produced.
pub fn evaluate(
    stats: Option<&DigitStats>,
    config: &StrategyConfig,
    position: &PositionState,
) -> Decision {
    if config.max_martingale_level > 0
        && position.consecutive_losses >= config.max_martingale_level
    {
        return Decision::LevelsExhausted;
    }

    match &config.rule {
        EntryRule::ExtremesBelowThreshold { digits } => {
            let Some(stats) = stats else {
                return Decision::Skip(SkipReason::InsufficientSamples);
            };
            if stats.len() < config.min_samples {
                return Decision::Skip(SkipReason::InsufficientSamples);
            }
            for digit in digits {
                let pct = stats.percentage(*digit);
                if pct > config.entry_threshold_pct {
                    trace!(digit, pct, "Watched digit above threshold");
                    return Decision::Skip(SkipReason::ThresholdNotMet);
                }
            }
            Decision::Enter {
                contract_type: config.contract_type,
                prediction: config.prediction,
                stake: next_stake(config, position),
            }
        }
        EntryRule::AlwaysEnter => Decision::Enter {
            contract_type: config.contract_type,
            prediction: config.prediction,
            stake: next_stake(config, position),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::StakingPolicy;
    use rust_decimal_macros::dec;

    fn threshold_config() -> StrategyConfig {
        StrategyConfig {
            symbol: "R_100".to_string(),
            contract_type: ContractType::DigitOver,
            prediction: Some(1),
            initial_stake: dec!(1),
            currency: "USD".to_string(),
            duration_ticks: 1,
            rule: EntryRule::ExtremesBelowThreshold { digits: [0, 1] },
            staking: StakingPolicy::Compound,
            martingale_multiplier: dec!(1.5),
            martingale_trigger: 1,
            max_martingale_level: 5,
            target_profit: dec!(10),
            stop_loss: dec!(20),
            entry_threshold_pct: 8.0,
            min_samples: 50,
        }
    }

    #[test]
    fn test_enters_when_extremes_below_threshold() {
        // Digit 0 at 5%, digit 1 at 7% of a 100-sample window.
        let stats = DigitStats::from_counts([5, 7, 14, 10, 10, 10, 10, 10, 12, 12]);
        let position = PositionState::new(dec!(1));

        let decision = evaluate(Some(&stats), &threshold_config(), &position);
        assert_eq!(
            decision,
            Decision::Enter {
                contract_type: ContractType::DigitOver,
                prediction: Some(1),
                stake: dec!(1),
            }
        );
    }

    #[test]
    fn test_skips_when_watched_digit_above_threshold() {
        // Digit 0 at 9% breaches the 8% threshold.
        let stats = DigitStats::from_counts([9, 7, 12, 10, 10, 10, 10, 10, 11, 11]);
        let position = PositionState::new(dec!(1));

        let decision = evaluate(Some(&stats), &threshold_config(), &position);
        assert_eq!(decision, Decision::Skip(SkipReason::ThresholdNotMet));
    }

    #[test]
    fn test_skips_on_short_window() {
        let stats = DigitStats::from_counts([1, 0, 0, 1, 0, 0, 2, 0, 0, 0]);
        let position = PositionState::new(dec!(1));

        let decision = evaluate(Some(&stats), &threshold_config(), &position);
        assert_eq!(decision, Decision::Skip(SkipReason::InsufficientSamples));
    }

    #[test]
    fn test_skips_without_stats() {
        let position = PositionState::new(dec!(1));
        let decision = evaluate(None, &threshold_config(), &position);
        assert_eq!(decision, Decision::Skip(SkipReason::InsufficientSamples));
    }

    #[test]
    fn test_always_enter_ignores_stats() {
        let config = StrategyConfig {
            rule: EntryRule::AlwaysEnter,
            ..threshold_config()
        };
        let position = PositionState::new(dec!(1));
        assert!(evaluate(None, &config, &position).is_enter());
    }

    #[test]
    fn test_level_cap_stops_escalation() {
        let config = StrategyConfig {
            rule: EntryRule::AlwaysEnter,
            max_martingale_level: 3,
            ..threshold_config()
        };
        let mut position = PositionState::new(dec!(1));
        position.consecutive_losses = 2;
        assert!(evaluate(None, &config, &position).is_enter());

        // After exactly the configured ceiling of consecutive losses the
        // evaluator must refuse to escalate.
        position.consecutive_losses = 3;
        assert_eq!(
            evaluate(None, &config, &position),
            Decision::LevelsExhausted
        );
    }

    #[test]
    fn test_martingale_stake_flows_into_decision() {
        let config = StrategyConfig {
            rule: EntryRule::AlwaysEnter,
            ..threshold_config()
        };
        let mut position = PositionState::new(dec!(1));
        position.consecutive_losses = 1;
        position.current_stake = dec!(1);

        match evaluate(None, &config, &position) {
            Decision::Enter { stake, .. } => assert_eq!(stake, dec!(2.5)),
            other => panic!("expected enter, got {other:?}"),
        }
    }
}
