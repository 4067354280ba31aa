//! Mock brokerage server for integration tests.
//!
//! Speaks a minimal subset of the wire protocol:
//! - `authorize`: acknowledged unless the token is "bad-token"
//! - `ticks`: confirmed with a subscription id, then pushed periodically
//! - `balance`, `proposal_open_contract`: confirmed with a subscription id
//! - `proposal`, `buy`, `ping`, `forget`, `forget_all`: acknowledged
//! - anything else: recorded but never answered
//!
//! Connections can be force-closed with `kick_all` to exercise the
//! reconnect path.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// A mock brokerage WebSocket server.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    kick_tx: broadcast::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockWsServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let counter = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (kick_tx, _) = broadcast::channel::<()>(4);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let counter_clone = counter.clone();
        let kick_tx_clone = kick_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let counter = counter_clone.clone();
                        let kick_rx = kick_tx_clone.subscribe();
                        tokio::spawn(handle_connection(
                            stream, messages, connections, counter, kick_rx,
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            kick_tx,
            messages,
            connections,
        }
    }

    /// The server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// All text messages received, in arrival order.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Messages containing a given command field, e.g. `"ticks"`.
    pub async fn received_with_field(&self, field: &str) -> Vec<String> {
        let needle = format!("\"{field}\"");
        self.received_messages()
            .await
            .into_iter()
            .filter(|m| m.contains(&needle))
            .collect()
    }

    /// Force-close every active connection.
    pub fn kick_all(&self) {
        let _ = self.kick_tx.send(());
    }

    /// Shut the server down.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    counter: Arc<AtomicU64>,
    mut kick_rx: broadcast::Receiver<()>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {e}");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut tick_timer = tokio::time::interval(Duration::from_millis(50));
    let mut ticking = false;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        {
                            let mut msgs = messages.lock().await;
                            msgs.push_back(text.clone());
                        }
                        if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                            if parsed.get("ticks").is_some() {
                                ticking = true;
                            }
                            for response in respond(&parsed, &counter) {
                                let _ = write.send(Message::Text(response.to_string())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Err(_)) => break,
                    None => break,
                    _ => {}
                }
            }
            _ = tick_timer.tick(), if ticking => {
                let push = json!({
                    "msg_type": "tick",
                    "tick": {
                        "symbol": "R_100",
                        "quote": 1691.37,
                        "epoch": 1_700_000_000 + counter.fetch_add(1, Ordering::Relaxed) as i64,
                        "pip_size": 2
                    }
                });
                if write.send(Message::Text(push.to_string())).await.is_err() {
                    break;
                }
            }
            _ = kick_rx.recv() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Build the responses for one inbound command.
fn respond(parsed: &Value, counter: &AtomicU64) -> Vec<Value> {
    let req_id = parsed.get("req_id").cloned().unwrap_or(Value::Null);
    let next = || counter.fetch_add(1, Ordering::Relaxed);

    if let Some(token) = parsed.get("authorize").and_then(Value::as_str) {
        if token == "bad-token" {
            return vec![json!({
                "msg_type": "authorize",
                "req_id": req_id,
                "error": {"code": "InvalidToken", "message": "The token is invalid."}
            })];
        }
        return vec![json!({
            "msg_type": "authorize",
            "req_id": req_id,
            "authorize": {"loginid": "CR123456", "currency": "USD", "balance": 1000.0}
        })];
    }

    if let Some(symbol) = parsed.get("ticks").and_then(Value::as_str) {
        return vec![json!({
            "msg_type": "tick",
            "req_id": req_id,
            "subscription": {"id": format!("sub-{}", next())},
            "tick": {"symbol": symbol, "quote": 1691.37, "epoch": 1_700_000_000i64, "pip_size": 2}
        })];
    }

    if parsed.get("balance").is_some() {
        return vec![json!({
            "msg_type": "balance",
            "req_id": req_id,
            "subscription": {"id": format!("sub-{}", next())},
            "balance": {"balance": 1000.0, "currency": "USD", "loginid": "CR123456"}
        })];
    }

    if parsed.get("proposal").is_some() {
        return vec![json!({
            "msg_type": "proposal",
            "req_id": req_id,
            "proposal": {"id": format!("prop-{}", next()), "ask_price": 1.0, "payout": 1.95}
        })];
    }

    if parsed.get("buy").is_some() {
        return vec![json!({
            "msg_type": "buy",
            "req_id": req_id,
            "buy": {"contract_id": 100_000 + next(), "buy_price": 1.0}
        })];
    }

    if let Some(contract_id) = parsed
        .get("contract_id")
        .and_then(Value::as_u64)
        .filter(|_| parsed.get("proposal_open_contract").is_some())
    {
        return vec![json!({
            "msg_type": "proposal_open_contract",
            "req_id": req_id,
            "subscription": {"id": format!("sub-{}", next())},
            "proposal_open_contract": {"contract_id": contract_id, "status": "open", "is_sold": 0}
        })];
    }

    if parsed.get("ping").is_some() {
        return vec![json!({"msg_type": "ping", "req_id": req_id, "ping": "pong"})];
    }

    if parsed.get("forget").is_some() {
        return vec![json!({"msg_type": "forget", "req_id": req_id, "forget": 1})];
    }

    if parsed.get("forget_all").is_some() {
        return vec![json!({"msg_type": "forget_all", "req_id": req_id, "forget_all": []})];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
