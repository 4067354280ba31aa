//! Client event fan-out.
//!
//! External collaborators (persistence, UI shells) observe the core
//! through a broadcast channel of typed events; the core never blocks on
//! a consumer.

use digit_core::{Balance, Contract, TickSample};

/// An event emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A price tick arrived.
    Tick(TickSample),
    /// The account balance changed.
    Balance(Balance),
    /// An open contract was updated.
    Contract(Contract),
    /// A correlated call resolved (successfully or not).
    OperationFinished {
        /// Correlation id of the call.
        req_id: u64,
        /// Wire name of the operation, or "error" for faulted calls
        /// without a recognizable payload.
        op: String,
    },
}
