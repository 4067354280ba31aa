//! WebSocket error types.
//!
//! The taxonomy separates faults by scope: transport and authorization
//! faults alter connection-level state, everything else fails only the
//! call or subscription that produced it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Authorization rejected ({code}): {message}")]
    Auth { code: String, message: String },

    #[error("Call timed out")]
    Timeout,

    #[error("Call cancelled by disconnect")]
    Cancelled,

    #[error("Not connected")]
    NotConnected,

    #[error("Malformed frame: {0}")]
    Protocol(String),

    #[error("No inbound traffic within keep-alive window")]
    KeepAliveTimeout,

    #[error("Reconnect attempts exhausted after {0} tries")]
    ReconnectFailed(u32),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Whether a retry of the same operation could plausibly succeed.
    ///
    /// API and authorization rejections are deterministic; everything
    /// connection- or timing-scoped is worth one more attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Api { .. } | Self::Auth { .. } | Self::Protocol(_))
    }
}

pub type WsResult<T> = Result<T, WsError>;
