//! Integration tests for digit-ws.
//!
//! These tests verify client behavior against a live (mock) server:
//! - Connection lifecycle and readiness
//! - Call correlation, timeouts, and cancellation
//! - Subscription sharing and restoration after reconnects

pub mod common;
