//! spreadwatch library
//!
//! Polling dealer-quote monitor: source adapters fetch and normalize quotes,
//! a pure metric layer classifies spread/liquidity, the cache keeps the
//! latest record per source, and observers get update and threshold-crossing
//! events. A read-only status reporter serves external consumers.

pub mod cache;
pub mod config;
pub mod metrics;
pub mod notifier;
pub mod scheduler;
pub mod sources;
pub mod status;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;
