//! Tick samples and last-digit derivation.
//!
//! Uses `rust_decimal` for exact quote arithmetic. The last digit of a
//! quote is defined after scaling by the symbol's pip size, so a quote of
//! 1234.56 with pip size 2 has last digit 6.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Derive the last decimal digit of a quote.
///
/// Scales the quote by `10^pip_size`, truncates, and takes the result
/// modulo 10. Exact decimal arithmetic avoids the float rounding that
/// would otherwise misclassify quotes like 95.49999....
pub fn last_digit(quote: Decimal, pip_size: u32) -> u8 {
    let scale = Decimal::from(10u64.pow(pip_size.min(9)));
    let scaled = (quote.abs() * scale).trunc();
    let digit = scaled % Decimal::from(10);
    digit.to_u32().unwrap_or(0) as u8
}

/// A single timestamped price update for a traded symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSample {
    /// Symbol the tick belongs to (e.g. "R_100").
    pub symbol: String,
    /// Quote price.
    pub quote: Decimal,
    /// Number of decimal places the symbol is quoted in.
    pub pip_size: u32,
    /// Server epoch (seconds).
    pub epoch: i64,
    /// Last digit of the quote after pip scaling.
    pub last_digit: u8,
}

impl TickSample {
    /// Build a sample from wire fields, deriving the last digit.
    pub fn new(symbol: impl Into<String>, quote: Decimal, pip_size: u32, epoch: i64) -> Self {
        Self {
            symbol: symbol.into(),
            quote,
            pip_size,
            epoch,
            last_digit: last_digit(quote, pip_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_last_digit_basic() {
        assert_eq!(last_digit(dec!(1234.56), 2), 6);
        assert_eq!(last_digit(dec!(1234.50), 2), 0);
        assert_eq!(last_digit(dec!(8.7654), 4), 4);
    }

    #[test]
    fn test_last_digit_integer_quote() {
        // Pip size 2 on an integer quote: trailing zeros count.
        assert_eq!(last_digit(dec!(100), 2), 0);
        assert_eq!(last_digit(dec!(100.1), 2), 0);
    }

    #[test]
    fn test_last_digit_exact_boundary() {
        // 95.49999 truncates to 9549 at pip size 2, digit 9.
        assert_eq!(last_digit(dec!(95.49999), 2), 9);
    }

    #[test]
    fn test_tick_sample_derives_digit() {
        let tick = TickSample::new("R_100", dec!(1691.37), 2, 1_700_000_000);
        assert_eq!(tick.last_digit, 7);
        assert_eq!(tick.symbol, "R_100");
    }
}
