//! Contract and balance domain types.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Digit contract types offered by the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "DIGITOVER")]
    DigitOver,
    #[serde(rename = "DIGITUNDER")]
    DigitUnder,
    #[serde(rename = "DIGITMATCH")]
    DigitMatch,
    #[serde(rename = "DIGITDIFF")]
    DigitDiff,
    #[serde(rename = "DIGITEVEN")]
    DigitEven,
    #[serde(rename = "DIGITODD")]
    DigitOdd,
}

impl ContractType {
    /// Wire name of the contract type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigitOver => "DIGITOVER",
            Self::DigitUnder => "DIGITUNDER",
            Self::DigitMatch => "DIGITMATCH",
            Self::DigitDiff => "DIGITDIFF",
            Self::DigitEven => "DIGITEVEN",
            Self::DigitOdd => "DIGITODD",
        }
    }

    /// Whether this contract type takes a digit barrier.
    pub fn takes_barrier(&self) -> bool {
        !matches!(self, Self::DigitEven | Self::DigitOdd)
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIGITOVER" => Ok(Self::DigitOver),
            "DIGITUNDER" => Ok(Self::DigitUnder),
            "DIGITMATCH" => Ok(Self::DigitMatch),
            "DIGITDIFF" => Ok(Self::DigitDiff),
            "DIGITEVEN" => Ok(Self::DigitEven),
            "DIGITODD" => Ok(Self::DigitOdd),
            other => Err(CoreError::InvalidContractType(other.to_string())),
        }
    }
}

/// Settlement status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Open,
    Won,
    Lost,
    Sold,
    Cancelled,
}

/// An open or settled contract.
///
/// Created on buy acknowledgment and finalized when the brokerage marks
/// it sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Brokerage contract id.
    pub contract_id: u64,
    /// Contract type, when reported.
    pub contract_type: Option<ContractType>,
    /// Price paid to enter.
    pub buy_price: Decimal,
    /// Underlying symbol.
    pub symbol: String,
    /// Digit barrier / prediction, when applicable.
    pub barrier: Option<u8>,
    /// Settlement status.
    pub status: ContractStatus,
    /// Signed profit; negative on loss. Zero until settled.
    pub profit: Decimal,
    /// Spot at entry.
    pub entry_spot: Option<Decimal>,
    /// Spot at exit.
    pub exit_spot: Option<Decimal>,
    /// Whether the brokerage has marked the contract sold.
    pub is_sold: bool,
}

impl Contract {
    /// Whether the contract settled with a loss.
    pub fn is_loss(&self) -> bool {
        self.is_sold && self.profit.is_sign_negative() && !self.profit.is_zero()
    }
}

/// Account balance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Current balance amount.
    pub amount: Decimal,
    /// Account currency (e.g. "USD").
    pub currency: String,
}
