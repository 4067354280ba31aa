//! Core domain types for the digit trading bot.
//!
//! This crate provides fundamental types used throughout the system:
//! - `TickSample`: a single price update with its derived last digit
//! - `Contract`, `ContractType`, `ContractStatus`: binary-option contracts
//! - `Balance`: account balance snapshot

pub mod contract;
pub mod error;
pub mod tick;

pub use contract::{Balance, Contract, ContractStatus, ContractType};
pub use error::{CoreError, Result};
pub use tick::{last_digit, TickSample};
