//! Poll Scheduler - periodic concurrent fan-out over source adapters
//!
//! One scheduler owns one poll task. Each tick fetches every registered
//! adapter concurrently, joins on all of them, then derives metrics and
//! upserts successes into the cache. Partial failures never abort a tick;
//! the most recent failure lands in `SchedulerState.last_error` and per-source
//! consecutive failure counters. A tick cannot overlap with itself: the next
//! interval fire is awaited only after the previous fan-out joined.

use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::{PriceCache, UpsertOutcome};
use crate::metrics::{self, ThresholdBook};
use crate::notifier::{classification_changed, EventNotifier};
use crate::sources::SourceAdapter;
use crate::types::{CacheEntry, PriceRecord, SchedulerState};

/// Shared innards, cloned into the poll task
struct Inner {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<PriceCache>,
    notifier: Arc<EventNotifier>,
    thresholds: ThresholdBook,
    state: RwLock<SchedulerState>,
    running: AtomicBool,
}

pub struct PollScheduler {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    /// An empty adapter list is allowed; the scheduler then ticks over
    /// nothing and snapshots stay empty.
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cache: Arc<PriceCache>,
        notifier: Arc<EventNotifier>,
        thresholds: ThresholdBook,
    ) -> Self {
        if adapters.is_empty() {
            tracing::warn!("No source adapters registered; ticks will be empty");
        }
        Self {
            inner: Arc::new(Inner {
                adapters,
                cache,
                notifier,
                thresholds,
                state: RwLock::new(SchedulerState::default()),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> SchedulerState {
        self.inner.state.read().await.clone()
    }

    /// Begin polling. Idempotent: a second call while running is a warned
    /// no-op. An initial scan runs immediately, then one per interval.
    pub async fn start(&self, interval: Duration) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("⚠️ Monitoring already active");
            return;
        }

        {
            let mut state = self.inner.state.write().await;
            state.running = true;
            state.interval_ms = interval.as_millis() as u64;
        }

        tracing::info!(
            interval_secs = interval.as_secs(),
            sources = self.inner.adapters.len(),
            "🔄 Starting continuous quote monitoring"
        );

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately: initial scan on start
                ticker.tick().await;
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                inner.run_tick().await;
            }
        });

        *self.task.lock().await = Some(handle);
    }

    /// Stop polling and cancel the pending timer. In-flight fetches are not
    /// forcibly failed; a tick that raced `stop()` re-checks `running` before
    /// touching the cache and discards its results.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }

        self.inner.state.write().await.running = false;
        tracing::info!("⏹️ Quote monitoring stopped");
    }

    /// One full scan cycle, also used directly by tests. Does nothing when
    /// the scheduler is stopped.
    pub async fn run_tick(&self) {
        self.inner.run_tick().await;
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.task.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Inner {
    /// Concurrent fetch per adapter, join all, then derive + upsert + notify
    /// per success.
    async fn run_tick(&self) {
        let fetches = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let source = adapter.source().to_string();
                let result = adapter.fetch().await;
                (source, result)
            }
        });
        let results = join_all(fetches).await;

        // Results from a tick that raced stop() are dropped, not cached
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let mut last_error: Option<String> = None;
        let mut network_errors = 0u64;
        let mut parse_errors = 0u64;
        let mut succeeded: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        for (source, result) in results {
            match result {
                Ok(record) => {
                    self.apply(record).await;
                    succeeded.push(source);
                }
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Fetch failed");
                    if e.is_parse() {
                        parse_errors += 1;
                    } else {
                        network_errors += 1;
                    }
                    last_error = Some(e.to_string());
                    failed.push(source);
                }
            }
        }

        let mut state = self.state.write().await;
        state.tick_count += 1;
        state.last_tick_at = Some(chrono::Utc::now().timestamp_millis());
        state.network_errors += network_errors;
        state.parse_errors += parse_errors;
        if last_error.is_some() {
            state.last_error = last_error;
        }
        for source in succeeded {
            state.source_failures.remove(&source);
        }
        for source in failed {
            *state.source_failures.entry(source).or_insert(0) += 1;
        }
    }

    async fn apply(&self, record: PriceRecord) {
        let thresholds = self.thresholds.for_source(&record.source);
        let metrics = metrics::derive(&record, thresholds);
        let entry = CacheEntry { record, metrics };

        tracing::debug!(
            source = %entry.record.source,
            bid = entry.record.bid,
            ask = entry.record.ask,
            spread = entry.metrics.spread,
            level = %entry.metrics.liquidity_level,
            signal = %entry.metrics.signal,
            "💰 Quote updated"
        );

        match self.cache.upsert(entry.clone()).await {
            UpsertOutcome::Applied { previous } => {
                self.notifier.price_updated(&entry);
                if let Some(prev) = previous {
                    if classification_changed(&prev.metrics, &entry.metrics) {
                        self.notifier.threshold_crossed(
                            &entry.record.source,
                            &prev.metrics,
                            &entry.metrics,
                        );
                    }
                }
            }
            UpsertOutcome::Stale => {}
        }
    }
}
