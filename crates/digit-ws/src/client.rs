//! Streaming API client.
//!
//! Owns the single WebSocket connection and multiplexes correlated calls
//! and long-lived subscriptions over it. The session task is the only
//! writer on the socket and the only router of inbound frames; callers
//! interact through the outbound channel and the pending-call table.
//!
//! Reconnection runs a supervisor loop: exponential backoff between
//! attempts, re-authorization with the stored token before the session is
//! declared ready, then restoration of every active subscription.

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{WsError, WsResult};
use crate::event::ClientEvent;
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{decode_frame, AuthorizeInfo, InboundFrame, Payload, WsRequest};
use crate::pending::PendingCalls;
use crate::subscription::{DetachOutcome, PushEvent, SubscriptionKey, SubscriptionRegistry};
use crate::token::TokenStore;

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsSource = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Backoff growth factor between reconnection attempts.
const BACKOFF_GROWTH: f64 = 1.5;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Application id appended to the endpoint query.
    pub app_id: u32,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Keep-alive ping interval.
    pub ping_interval_ms: u64,
    /// Timeout applied to every one-shot call.
    pub call_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            app_id: 0,
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 2000,
            reconnect_max_delay_ms: 30000,
            ping_interval_ms: 30000,
            call_timeout_ms: 10000,
        }
    }
}

impl ClientConfig {
    /// Full endpoint including the application id.
    pub fn endpoint(&self) -> String {
        if self.app_id == 0 {
            self.url.clone()
        } else {
            format!("{}?app_id={}", self.url, self.app_id)
        }
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Authorizing,
    Ready,
    Closing,
}

/// Streaming API client instance.
///
/// Constructed by the caller and shared by reference; owns its own
/// correlation, subscription, and session state.
pub struct ApiClient {
    config: ClientConfig,
    state: Arc<RwLock<SessionState>>,
    pending: Arc<PendingCalls>,
    registry: Arc<SubscriptionRegistry>,
    heartbeat: Arc<HeartbeatMonitor>,
    token_store: Arc<dyn TokenStore>,
    outbound_tx: mpsc::Sender<Value>,
    /// Consumed only by the session loop.
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<Value>>>,
    events_tx: broadcast::Sender<ClientEvent>,
    reconnect_count: Arc<RwLock<u32>>,
    shutdown: CancellationToken,
}

impl ApiClient {
    /// Create a new client with an injected token store.
    pub fn new(config: ClientConfig, token_store: Arc<dyn TokenStore>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(128);
        let (events_tx, _) = broadcast::channel(256);
        let heartbeat = HeartbeatMonitor::new(Duration::from_millis(config.ping_interval_ms));
        Self {
            config,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            pending: Arc::new(PendingCalls::new()),
            registry: Arc::new(SubscriptionRegistry::new()),
            heartbeat: Arc::new(heartbeat),
            token_store,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            events_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether the session is ready for calls.
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Subscribe to the client event stream.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// Keys currently subscribed, for diagnostics.
    pub fn active_subscriptions(&self) -> Vec<SubscriptionKey> {
        self.registry.active_keys()
    }

    /// Number of calls awaiting completion.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Request a graceful shutdown of the session loop.
    pub fn shutdown(&self) {
        info!("Client shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Force a disconnect: stop the session loop and complete every
    /// outstanding call with a cancellation fault. Safe from any state.
    pub fn disconnect(&self) {
        *self.state.write() = SessionState::Closing;
        self.shutdown.cancel();
        self.pending.cancel_all();
    }

    // ========================================================================
    // Supervisor
    // ========================================================================

    /// Connect and run until shutdown, reconnecting on faults.
    ///
    /// Returns `Err(WsError::Auth ..)` when the stored token is rejected
    /// (no retry loop on a bad token) and `Err(WsError::ReconnectFailed ..)`
    /// when the attempt ceiling is exhausted.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                *self.state.write() = SessionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = SessionState::Connecting;

            let session_result = self.run_session().await;

            // No call survives a session boundary unresolved.
            self.pending.cancel_all();
            *self.state.write() = SessionState::Disconnected;

            match session_result {
                Ok(()) => info!("Session closed"),
                Err(WsError::Auth { code, message }) => {
                    error!(%code, %message, "Authorization rejected, giving up");
                    return Err(WsError::Auth { code, message });
                }
                Err(e) => error!(?e, "Session fault"),
            }

            if self.is_shutdown() {
                return Ok(());
            }

            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Reconnect attempts exhausted");
                return Err(WsError::ReconnectFailed(attempt));
            }

            let delay = self.backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = SessionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms as f64;
        let cap = self.config.reconnect_max_delay_ms as f64;
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = (base * BACKOFF_GROWTH.powi(exponent as i32)).min(cap);
        Duration::from_millis(delay as u64 + subsec_jitter())
    }

    // ========================================================================
    // Session
    // ========================================================================

    async fn run_session(&self) -> WsResult<()> {
        let endpoint = self.config.endpoint();
        info!(url = %endpoint, "Connecting");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&endpoint, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = SessionState::Open;
        info!("WebSocket open");

        // Re-authorize before declaring the session ready; a rejection
        // here is fatal for the token.
        if let Some(token) = self.token_store.get() {
            *self.state.write() = SessionState::Authorizing;
            self.authorize_inline(&mut write, &mut read, &token).await?;
        }

        *self.state.write() = SessionState::Ready;
        *self.reconnect_count.write() = 0;
        self.heartbeat.reset();
        info!("Session ready");

        self.resubscribe_active(&mut write).await?;

        let mut keepalive_timer = tokio::time::interval(self.heartbeat.check_period());
        keepalive_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown signal received in session loop");
                    *self.state.write() = SessionState::Closing;
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_inbound();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(command) = outbound {
                        let text = serde_json::to_string(&command)?;
                        write.send(Message::Text(text)).await?;
                    }
                }

                _ = keepalive_timer.tick() => {
                    if self.heartbeat.is_stalled() {
                        error!("No inbound traffic within keep-alive window");
                        return Err(WsError::KeepAliveTimeout);
                    }
                    if self.heartbeat.should_ping() {
                        let text = serde_json::to_string(&WsRequest::ping())?;
                        write.send(Message::Text(text)).await?;
                        debug!("Sent keep-alive ping");
                    }
                }
            }
        }
    }

    /// Authorize on the raw socket before the session loop starts.
    ///
    /// Frames for other ids arriving meanwhile are routed normally so an
    /// early tick is not lost.
    async fn authorize_inline(
        &self,
        write: &mut WsSink,
        read: &mut WsSource,
        token: &str,
    ) -> WsResult<()> {
        let req_id = self.pending.next_id();
        let command = WsRequest::attach_req_id(WsRequest::authorize(token), req_id);
        write
            .send(Message::Text(serde_json::to_string(&command)?))
            .await?;
        debug!(req_id, "Authorization sent");

        let deadline = Duration::from_millis(self.config.call_timeout_ms);
        let wait = async {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                        Ok(frame) if frame.req_id == Some(req_id) => {
                            if let Some(fault) = frame.error {
                                return Err(WsError::Auth {
                                    code: fault.code,
                                    message: fault.message,
                                });
                            }
                            info!("Authorized");
                            return Ok(());
                        }
                        Ok(frame) => self.dispatch_frame(frame),
                        Err(e) => warn!(?e, "Dropping malformed frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Close during authorization".to_string()));
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(WsError::ConnectionClosed {
                            code: 1006,
                            reason: "Stream ended during authorization".to_string(),
                        })
                    }
                    _ => {}
                }
            }
        };

        tokio::time::timeout(deadline, wait)
            .await
            .map_err(|_| WsError::Timeout)?
    }

    /// Re-issue the upstream subscribe for every key still referenced.
    ///
    /// Local handlers survive the reconnect; only the network side is
    /// replayed. Confirmations update each key's upstream stream id
    /// through the normal routing path.
    async fn resubscribe_active(&self, write: &mut WsSink) -> WsResult<()> {
        let keys = self.registry.active_keys();
        if keys.is_empty() {
            return Ok(());
        }
        info!(count = keys.len(), "Restoring subscriptions");
        for key in keys {
            let (req_id, _rx) = self.pending.register(Some(key.clone()));
            let command = WsRequest::attach_req_id(key.subscribe_command(), req_id);
            write
                .send(Message::Text(serde_json::to_string(&command)?))
                .await?;
            debug!(%key, req_id, "Resubscribe sent");
        }
        Ok(())
    }

    // ========================================================================
    // Inbound routing
    // ========================================================================

    fn handle_text(&self, text: &str) {
        match decode_frame(text) {
            Ok(frame) => self.dispatch_frame(frame),
            // Protocol fault: log and drop, the connection stays up.
            Err(e) => warn!(?e, "Dropping malformed frame"),
        }
    }

    fn dispatch_frame(&self, frame: InboundFrame) {
        self.heartbeat.record_inbound();

        // Correlated completion. Frames bearing an id no longer in the
        // table fall through silently; subscription pushes echo the id of
        // a subscribe call that already completed.
        if let Some(req_id) = frame.req_id {
            if let Some(call) = self.pending.take(req_id) {
                let op = frame
                    .payload
                    .as_ref()
                    .map(Payload::msg_type)
                    .unwrap_or("error")
                    .to_string();

                if let Some(fault) = frame.error.as_ref() {
                    debug!(req_id, code = %fault.code, "Call failed with API fault");
                    call.finish(Err(WsError::Api {
                        code: fault.code.clone(),
                        message: fault.message.clone(),
                    }));
                } else {
                    if let (Some(key), Some(sub)) =
                        (call.subscription.as_ref(), frame.subscription.as_ref())
                    {
                        self.registry.set_upstream_id(key, sub.id.clone());
                    }
                    call.finish(Ok(frame.clone()));
                }
                let _ = self.events_tx.send(ClientEvent::OperationFinished { req_id, op });
                if frame.error.is_some() {
                    return;
                }
                // The first confirmation of a subscription carries data;
                // fall through so it reaches handlers too.
            } else {
                trace!(req_id, "Frame for unknown correlation id");
            }
        }

        if let Some(fault) = frame.error.as_ref() {
            warn!(code = %fault.code, message = %fault.message, "Unmatched API error frame");
            return;
        }

        // Push routing by payload kind.
        match frame.payload {
            Some(Payload::Tick { tick }) => {
                let sample = tick.to_sample();
                let key = SubscriptionKey::Ticks(sample.symbol.clone());
                self.registry.dispatch(&key, PushEvent::Tick(sample.clone()));
                let _ = self.events_tx.send(ClientEvent::Tick(sample));
            }
            Some(Payload::ProposalOpenContract {
                proposal_open_contract,
            }) => {
                let contract = proposal_open_contract.to_contract();
                let key = SubscriptionKey::Contract(contract.contract_id);
                self.registry
                    .dispatch(&key, PushEvent::Contract(contract.clone()));
                let _ = self.events_tx.send(ClientEvent::Contract(contract));
            }
            Some(Payload::Balance { balance }) => {
                let update = balance.to_balance();
                self.registry
                    .dispatch(&SubscriptionKey::Balance, PushEvent::Balance(update.clone()));
                let _ = self.events_tx.send(ClientEvent::Balance(update));
            }
            Some(Payload::Ping { .. }) => {
                trace!("Keep-alive pong received");
            }
            Some(_) => {}
            None => debug!("Frame with unrecognized payload dropped"),
        }
    }

    // ========================================================================
    // Calls and subscriptions
    // ========================================================================

    /// Issue a correlated one-shot call with the configured timeout.
    ///
    /// Resolves with the decoded response frame, an API fault, a timeout,
    /// or a cancellation if the connection drops first. Calls issued
    /// while disconnected queue and flush into the next session.
    pub async fn call(&self, command: Value) -> WsResult<InboundFrame> {
        self.call_with_timeout(command, Duration::from_millis(self.config.call_timeout_ms))
            .await
    }

    /// Issue a correlated one-shot call with an explicit timeout.
    pub async fn call_with_timeout(
        &self,
        command: Value,
        timeout: Duration,
    ) -> WsResult<InboundFrame> {
        self.call_inner(command, None, timeout).await
    }

    async fn call_with_key(
        &self,
        command: Value,
        subscription: Option<SubscriptionKey>,
    ) -> WsResult<InboundFrame> {
        self.call_inner(
            command,
            subscription,
            Duration::from_millis(self.config.call_timeout_ms),
        )
        .await
    }

    async fn call_inner(
        &self,
        command: Value,
        subscription: Option<SubscriptionKey>,
        timeout: Duration,
    ) -> WsResult<InboundFrame> {
        let (req_id, rx) = self.pending.register(subscription);
        let command = WsRequest::attach_req_id(command, req_id);

        if self.outbound_tx.send(command).await.is_err() {
            self.pending.remove(req_id);
            return Err(WsError::NotConnected);
        }
        trace!(req_id, "Call queued");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WsError::Cancelled),
            Err(_) => {
                // Drop the entry so a late frame is ignored without error.
                self.pending.remove(req_id);
                Err(WsError::Timeout)
            }
        }
    }

    /// Authorize with a bearer token and store it for re-authorization
    /// after reconnects.
    pub async fn authorize(&self, token: &str) -> WsResult<AuthorizeInfo> {
        match self.call(WsRequest::authorize(token)).await {
            Ok(frame) => match frame.payload {
                Some(Payload::Authorize { authorize }) => {
                    self.token_store.set(token);
                    info!(loginid = ?authorize.loginid, "Authorized");
                    Ok(authorize)
                }
                _ => Err(WsError::Protocol(
                    "authorize response without payload".to_string(),
                )),
            },
            Err(WsError::Api { code, message }) => Err(WsError::Auth { code, message }),
            Err(e) => Err(e),
        }
    }

    /// Subscribe to a channel.
    ///
    /// The first local subscriber issues the upstream subscribe and waits
    /// for its confirmation; later subscribers attach immediately. All
    /// receivers see every pushed event.
    pub async fn subscribe(&self, key: SubscriptionKey) -> WsResult<broadcast::Receiver<PushEvent>> {
        let (first, rx) = self.registry.attach(&key);
        if !first {
            return Ok(rx);
        }
        match self
            .call_with_key(key.subscribe_command(), Some(key.clone()))
            .await
        {
            Ok(_confirmation) => Ok(rx),
            Err(e) => {
                warn!(%key, ?e, "Subscribe failed, releasing reference");
                self.registry.detach(&key);
                Err(e)
            }
        }
    }

    /// Release one local reference; the last reference forgets the
    /// upstream stream. Safe to call while disconnected.
    pub async fn unsubscribe(&self, key: &SubscriptionKey) -> WsResult<()> {
        match self.registry.detach(key) {
            DetachOutcome::Last(Some(stream_id)) => {
                if self.is_ready() {
                    if let Err(e) = self.call(WsRequest::forget(&stream_id)).await {
                        debug!(%key, ?e, "Forget failed (best effort)");
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Drop every subscription and issue one bulk forget. Safe from any
    /// state; a no-op on the network side when disconnected.
    pub async fn unsubscribe_all(&self) -> WsResult<()> {
        self.registry.clear();
        if self.is_ready() {
            if let Err(e) = self.call(WsRequest::forget_all()).await {
                debug!(?e, "Bulk forget failed (best effort)");
            }
        }
        Ok(())
    }
}

/// Sub-second jitter for backoff delays.
fn subsec_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 500) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    fn test_client(config: ClientConfig) -> ApiClient {
        ApiClient::new(config, Arc::new(MemoryTokenStore::new()))
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.reconnect_base_delay_ms, 2000);
        assert_eq!(config.reconnect_max_delay_ms, 30000);
    }

    #[test]
    fn test_endpoint_with_app_id() {
        let config = ClientConfig {
            url: "wss://stream.example.com/v3".to_string(),
            app_id: 1089,
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "wss://stream.example.com/v3?app_id=1089");
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let client = test_client(ClientConfig {
            reconnect_base_delay_ms: 2000,
            reconnect_max_delay_ms: 30000,
            ..Default::default()
        });

        let first = client.backoff_delay(1).as_millis() as u64;
        let third = client.backoff_delay(3).as_millis() as u64;
        let late = client.backoff_delay(30).as_millis() as u64;

        // base, base * 1.5^2, capped (each plus sub-second jitter).
        assert!((2000..2500).contains(&first));
        assert!((4500..5000).contains(&third));
        assert!((30000..30500).contains(&late));
    }

    #[tokio::test]
    async fn test_tick_frame_routes_to_subscribers() {
        let client = test_client(ClientConfig::default());
        let key = SubscriptionKey::Ticks("R_100".to_string());
        let (_, mut rx) = client.registry.attach(&key);

        let frame = decode_frame(
            r#"{"msg_type": "tick", "tick": {"symbol": "R_100", "quote": 100.5, "epoch": 1, "pip_size": 2}}"#,
        )
        .unwrap();
        client.dispatch_frame(frame);

        match rx.recv().await.unwrap() {
            PushEvent::Tick(sample) => assert_eq!(sample.last_digit, 0),
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscription_confirmation_records_upstream_id() {
        let client = test_client(ClientConfig::default());
        let key = SubscriptionKey::Ticks("R_100".to_string());
        client.registry.attach(&key);

        let (req_id, _rx) = client.pending.register(Some(key.clone()));
        let frame = decode_frame(&format!(
            r#"{{"msg_type": "tick", "req_id": {req_id},
                "subscription": {{"id": "stream-1"}},
                "tick": {{"symbol": "R_100", "quote": 1.2, "epoch": 1, "pip_size": 2}}}}"#
        ))
        .unwrap();
        client.dispatch_frame(frame);

        match client.registry.detach(&key) {
            DetachOutcome::Last(Some(id)) => assert_eq!(id, "stream-1"),
            other => panic!("expected stored upstream id, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_correlation_id_is_ignored() {
        let client = test_client(ClientConfig::default());
        let frame = decode_frame(
            r#"{"msg_type": "ping", "ping": "pong", "req_id": 4242}"#,
        )
        .unwrap();
        // Must not panic or disturb state.
        client.dispatch_frame(frame);
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_api_fault_fails_only_that_call() {
        let client = test_client(ClientConfig::default());
        let (req_id, rx) = client.pending.register(None);
        let (other_id, other_rx) = client.pending.register(None);

        let frame = decode_frame(&format!(
            r#"{{"msg_type": "buy", "req_id": {req_id},
                "error": {{"code": "InvalidPrice", "message": "stale quote"}}}}"#
        ))
        .unwrap();
        client.dispatch_frame(frame);

        match rx.await.unwrap() {
            Err(WsError::Api { code, .. }) => assert_eq!(code, "InvalidPrice"),
            other => panic!("expected API fault, got {other:?}"),
        }
        // The sibling call is untouched.
        assert!(client.pending.take(other_id).is_some());
        drop(other_rx);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_outstanding_calls() {
        let client = test_client(ClientConfig::default());
        let (_a, rx_a) = client.pending.register(None);
        let (_b, rx_b) = client.pending.register(None);
        let (_c, rx_c) = client.pending.register(None);

        client.disconnect();

        for rx in [rx_a, rx_b, rx_c] {
            match rx.await.unwrap() {
                Err(WsError::Cancelled) => {}
                other => panic!("expected cancellation, got {other:?}"),
            }
        }
        assert_eq!(client.state(), SessionState::Closing);
    }
}
