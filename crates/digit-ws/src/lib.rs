//! WebSocket client for the brokerage streaming API.
//!
//! Provides a single-connection client with:
//! - Correlated request/response multiplexing with per-call timeouts
//! - Ref-counted subscription registry with resubscribe-after-reconnect
//! - Automatic reconnection with exponential backoff and re-authorization
//! - Keep-alive pings and silence detection
//! - Typed client event fan-out for external collaborators

pub mod client;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod message;
pub mod pending;
pub mod subscription;
pub mod token;

pub use client::{ApiClient, ClientConfig, SessionState};
pub use error::{WsError, WsResult};
pub use event::ClientEvent;
pub use heartbeat::HeartbeatMonitor;
pub use message::{
    decode_frame, ApiFault, AuthorizeInfo, BalanceInfo, BuyInfo, ContractInfo, InboundFrame,
    Payload, ProposalInfo, ProposalParams, SubscriptionInfo, TickQuote, WsRequest,
};
pub use pending::{PendingCall, PendingCalls};
pub use subscription::{DetachOutcome, PushEvent, SubscriptionKey, SubscriptionRegistry};
pub use token::{MemoryTokenStore, TokenStore};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
