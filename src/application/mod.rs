//! Application layer containing the settlement orchestration.
//!
//! `PaymentEngine` is the primary entry point. It serializes all mutation of
//! a session behind a per-session `tokio` mutex so ledger sequence ordering
//! and the session totals stay consistent under concurrent callers.

pub mod engine;
pub mod locks;
