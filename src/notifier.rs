//! Event Notifier - in-process pub/sub for cache updates
//!
//! Observers are registered before the scheduler starts and invoked
//! synchronously in registration order. A failing or panicking observer is
//! logged and must never prevent the remaining observers from running, nor
//! propagate into the scheduler.

use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::types::{CacheEntry, DerivedMetrics};

/// Subscriber interface for monitor events. Both hooks default to no-ops so
/// observers implement only what they care about.
pub trait MonitorObserver: Send + Sync {
    /// A new record was applied to the cache
    fn on_price_updated(&self, _entry: &CacheEntry) -> Result<()> {
        Ok(())
    }

    /// `liquidity_level` or `signal` changed between consecutive records of
    /// the same source
    fn on_threshold_crossed(
        &self,
        _source: &str,
        _previous: &DerivedMetrics,
        _current: &DerivedMetrics,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct EventNotifier {
    observers: Vec<Arc<dyn MonitorObserver>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn MonitorObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn price_updated(&self, entry: &CacheEntry) {
        for observer in &self.observers {
            Self::isolate("price_updated", || observer.on_price_updated(entry));
        }
    }

    pub fn threshold_crossed(
        &self,
        source: &str,
        previous: &DerivedMetrics,
        current: &DerivedMetrics,
    ) {
        tracing::info!(
            source = %source,
            from_level = %previous.liquidity_level,
            to_level = %current.liquidity_level,
            from_signal = %previous.signal,
            to_signal = %current.signal,
            "🚨 Threshold crossing detected"
        );
        for observer in &self.observers {
            Self::isolate("threshold_crossed", || {
                observer.on_threshold_crossed(source, previous, current)
            });
        }
    }

    /// Run one observer call, capturing both errors and panics so the
    /// remaining observers still run.
    fn isolate(event: &str, call: impl FnOnce() -> Result<()>) {
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(event = %event, error = %e, "Observer returned error");
            }
            Err(_) => {
                tracing::warn!(event = %event, "Observer panicked");
            }
        }
    }
}

/// True when either classified metric changed between two derivations
pub fn classification_changed(previous: &DerivedMetrics, current: &DerivedMetrics) -> bool {
    previous.liquidity_level != current.liquidity_level || previous.signal != current.signal
}
