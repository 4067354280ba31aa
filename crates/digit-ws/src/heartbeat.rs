//! Keep-alive monitoring for the WebSocket session.
//!
//! Sends an application-level ping when the line has been quiet for one
//! interval, and declares the connection stalled when no inbound traffic
//! arrives for more than three intervals.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Multiple of the ping interval after which silence forces a reconnect.
const STALL_INTERVALS: u32 = 3;

/// Tracks inbound activity against the configured ping interval.
pub struct HeartbeatMonitor {
    interval: Duration,
    last_inbound: RwLock<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_inbound: RwLock::new(Instant::now()),
        }
    }

    /// Reset activity tracking (called when a session opens).
    pub fn reset(&self) {
        *self.last_inbound.write() = Instant::now();
    }

    /// Record that any inbound traffic arrived.
    pub fn record_inbound(&self) {
        *self.last_inbound.write() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle(&self) -> Duration {
        self.last_inbound.read().elapsed()
    }

    /// Whether a ping should be sent now.
    pub fn should_ping(&self) -> bool {
        self.idle() >= self.interval
    }

    /// Whether the connection must be considered dead.
    pub fn is_stalled(&self) -> bool {
        self.idle() > self.interval * STALL_INTERVALS
    }

    /// How often the session loop should run the keep-alive check.
    pub fn check_period(&self) -> Duration {
        (self.interval / 2).max(Duration::from_millis(100))
    }
}
