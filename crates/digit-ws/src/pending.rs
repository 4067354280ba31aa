//! Pending-call table for request/response correlation.
//!
//! Correlation ids are monotonic for the lifetime of the client. An entry
//! lives until its matching response arrives, its timeout fires, or the
//! connection drops, whichever comes first. Frames for ids no longer in
//! the table are ignored by the caller.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{WsError, WsResult};
use crate::message::InboundFrame;
use crate::subscription::SubscriptionKey;

/// A registered call awaiting its response.
pub struct PendingCall {
    tx: oneshot::Sender<WsResult<InboundFrame>>,
    /// Set when the call is a subscription request; carries the local key
    /// so the confirmation can record the upstream stream id.
    pub subscription: Option<SubscriptionKey>,
}

impl PendingCall {
    /// Complete the call. A dropped receiver is not an error; the caller
    /// may have timed out or never held the receiver (resubscribes).
    pub fn finish(self, result: WsResult<InboundFrame>) {
        let _ = self.tx.send(result);
    }
}

/// Correlation-id allocator and pending-call table.
pub struct PendingCalls {
    next_id: AtomicU64,
    table: Mutex<HashMap<u64, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh correlation id without registering an entry.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a call and return its id and completion receiver.
    pub fn register(
        &self,
        subscription: Option<SubscriptionKey>,
    ) -> (u64, oneshot::Receiver<WsResult<InboundFrame>>) {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.table.lock().insert(id, PendingCall { tx, subscription });
        trace!(req_id = id, "Registered pending call");
        (id, rx)
    }

    /// Take the entry for a correlation id, if still pending.
    pub fn take(&self, id: u64) -> Option<PendingCall> {
        self.table.lock().remove(&id)
    }

    /// Drop an entry without completing it (timeout path).
    pub fn remove(&self, id: u64) -> bool {
        self.table.lock().remove(&id).is_some()
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Complete every outstanding call with a cancellation fault.
    ///
    /// Called at forced disconnect and at the end of every session so no
    /// call is left unresolved.
    pub fn cancel_all(&self) {
        let drained: Vec<PendingCall> = {
            let mut table = self.table.lock();
            table.drain().map(|(_, call)| call).collect()
        };
        for call in drained {
            call.finish(Err(WsError::Cancelled));
        }
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
