//! Trading error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] digit_ws::WsError),

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("Decision issued while a position is in flight")]
    NotIdle,

    #[error("Push stream closed")]
    StreamClosed,
}

pub type TradeResult<T> = Result<T, TradeError>;
