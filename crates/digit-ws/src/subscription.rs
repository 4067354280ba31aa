//! Subscription registry for long-lived channels.
//!
//! Tracks ref-counted subscriptions keyed by channel kind plus
//! discriminator. Only the 0→1 transition issues the upstream subscribe
//! and only the →0 transition issues the upstream forget; local handlers
//! share one broadcast channel per key and survive reconnects.

use digit_core::{Balance, Contract, TickSample};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::message::WsRequest;

/// Capacity of each per-key broadcast channel. Slow consumers lag and
/// miss pushes rather than back-pressuring the read loop.
const PUSH_CHANNEL_CAPACITY: usize = 256;

/// Identity of a long-lived channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Price ticks for a symbol.
    Ticks(String),
    /// Updates for one open contract.
    Contract(u64),
    /// Account balance updates.
    Balance,
}

impl SubscriptionKey {
    /// Build the upstream subscribe command for this key.
    pub fn subscribe_command(&self) -> Value {
        match self {
            Self::Ticks(symbol) => WsRequest::ticks(symbol),
            Self::Contract(id) => WsRequest::open_contract(*id),
            Self::Balance => WsRequest::balance(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticks(symbol) => write!(f, "ticks:{symbol}"),
            Self::Contract(id) => write!(f, "contract:{id}"),
            Self::Balance => write!(f, "balance"),
        }
    }
}

/// An event pushed on a subscribed channel.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Tick(TickSample),
    Contract(Contract),
    Balance(Balance),
}

/// Outcome of releasing one local reference.
#[derive(Debug, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The key was not subscribed.
    NotSubscribed,
    /// Other local handlers remain; no upstream traffic needed.
    Remaining(usize),
    /// Last reference released; carries the upstream stream id to forget,
    /// when one was ever confirmed.
    Last(Option<String>),
}

struct SubEntry {
    refs: usize,
    upstream_id: Option<String>,
    last_seen: Option<Instant>,
    tx: broadcast::Sender<PushEvent>,
}

/// Ref-counted registry of active subscriptions.
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<SubscriptionKey, SubEntry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Add a local handler for a key.
    ///
    /// Returns whether this was the first reference (caller must then
    /// issue the upstream subscribe) and a receiver of pushed events.
    pub fn attach(&self, key: &SubscriptionKey) -> (bool, broadcast::Receiver<PushEvent>) {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.refs += 1;
                trace!(%key, refs = entry.refs, "Subscription reference added");
                (false, entry.tx.subscribe())
            }
            None => {
                let (tx, rx) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
                entries.insert(
                    key.clone(),
                    SubEntry {
                        refs: 1,
                        upstream_id: None,
                        last_seen: None,
                        tx,
                    },
                );
                debug!(%key, "Subscription created");
                (true, rx)
            }
        }
    }

    /// Release one local reference for a key.
    pub fn detach(&self, key: &SubscriptionKey) -> DetachOutcome {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return DetachOutcome::NotSubscribed;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            let entry = entries.remove(key).expect("entry present");
            debug!(%key, "Subscription destroyed");
            DetachOutcome::Last(entry.upstream_id)
        } else {
            trace!(%key, refs = entry.refs, "Subscription reference released");
            DetachOutcome::Remaining(entry.refs)
        }
    }

    /// Record the upstream stream id from a subscribe confirmation.
    pub fn set_upstream_id(&self, key: &SubscriptionKey, id: String) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.upstream_id = Some(id);
        }
    }

    /// Fan a pushed event out to every local handler of a key.
    ///
    /// Returns the number of receivers reached; zero when the key is not
    /// subscribed (stale push after a forget).
    pub fn dispatch(&self, key: &SubscriptionKey, event: PushEvent) -> usize {
        match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.last_seen = Some(Instant::now());
                entry.tx.send(event).unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Time since the last pushed event for a key, when one has arrived.
    pub fn last_seen(&self, key: &SubscriptionKey) -> Option<Duration> {
        self.entries
            .lock()
            .get(key)
            .and_then(|entry| entry.last_seen)
            .map(|at| at.elapsed())
    }

    /// Keys with a positive reference count, for resubscription.
    pub fn active_keys(&self) -> Vec<SubscriptionKey> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Current reference count for a key.
    pub fn refs(&self, key: &SubscriptionKey) -> usize {
        self.entries.lock().get(key).map(|e| e.refs).unwrap_or(0)
    }

    /// Drop every subscription. Handlers see their channel close.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        if count > 0 {
            debug!(count, "All subscriptions cleared");
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick_event() -> PushEvent {
        PushEvent::Tick(TickSample::new("R_100", dec!(1691.37), 2, 1_700_000_000))
    }

    #[test]
    fn test_first_attach_only_once() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::Ticks("R_100".to_string());

        let (first_a, _rx_a) = registry.attach(&key);
        let (first_b, _rx_b) = registry.attach(&key);

        assert!(first_a, "first attach must trigger the upstream subscribe");
        assert!(!first_b, "second attach must not re-subscribe upstream");
        assert_eq!(registry.refs(&key), 2);
    }

    #[tokio::test]
    async fn test_all_handlers_receive_every_push() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::Ticks("R_100".to_string());

        let (_, mut rx_a) = registry.attach(&key);
        let (_, mut rx_b) = registry.attach(&key);

        assert_eq!(registry.dispatch(&key, tick_event()), 2);

        assert!(matches!(rx_a.recv().await.unwrap(), PushEvent::Tick(_)));
        assert!(matches!(rx_b.recv().await.unwrap(), PushEvent::Tick(_)));
    }

    #[tokio::test]
    async fn test_detach_once_leaves_other_handler_active() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::Ticks("R_100".to_string());

        let (_, _rx_a) = registry.attach(&key);
        let (_, mut rx_b) = registry.attach(&key);

        assert_eq!(registry.detach(&key), DetachOutcome::Remaining(1));
        assert_eq!(registry.dispatch(&key, tick_event()), 1);
        assert!(rx_b.recv().await.is_ok());
    }

    #[test]
    fn test_last_detach_returns_upstream_id() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::Contract(123_456);

        registry.attach(&key);
        registry.set_upstream_id(&key, "stream-9".to_string());

        match registry.detach(&key) {
            DetachOutcome::Last(Some(id)) => assert_eq!(id, "stream-9"),
            other => panic!("expected last-with-id, got {other:?}"),
        }
        assert_eq!(registry.refs(&key), 0);
    }

    #[test]
    fn test_detach_unknown_key() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.detach(&SubscriptionKey::Balance),
            DetachOutcome::NotSubscribed
        );
    }

    #[test]
    fn test_dispatch_unsubscribed_key_reaches_nobody() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.dispatch(&SubscriptionKey::Balance, tick_event()), 0);
    }

    #[test]
    fn test_last_seen_updates_on_dispatch() {
        let registry = SubscriptionRegistry::new();
        let key = SubscriptionKey::Balance;
        let (_, _rx) = registry.attach(&key);

        assert!(registry.last_seen(&key).is_none());
        registry.dispatch(&key, tick_event());
        assert!(registry.last_seen(&key).is_some());
    }

    #[test]
    fn test_clear_empties_registry() {
        let registry = SubscriptionRegistry::new();
        registry.attach(&SubscriptionKey::Ticks("R_50".to_string()));
        registry.attach(&SubscriptionKey::Balance);
        registry.clear();
        assert!(registry.active_keys().is_empty());
    }
}
