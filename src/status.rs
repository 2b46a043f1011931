//! Status Reporter - read-only snapshot of the monitor's current view
//!
//! Composes the cache contents with the scheduler state for an external HTTP
//! layer (or log consumer) to serialize. Failing sources keep their
//! last-known-good entry; staleness is surfaced as a flag computed from the
//! record's age, nothing is ever removed here.

use serde::Serialize;
use std::sync::Arc;

use crate::cache::PriceCache;
use crate::scheduler::PollScheduler;
use crate::types::{LiquidityLevel, QuoteSignal, SchedulerState};

/// One cache entry flattened for external consumers
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub source: String,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub spread: f64,
    pub spread_percent: f64,
    pub liquidity_level: LiquidityLevel,
    pub signal: QuoteSignal,
    pub crossed: bool,
    pub captured_at: i64,
    /// Record age exceeded the configured staleness threshold
    pub stale: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub entries: Vec<StatusEntry>,
    pub scheduler: SchedulerState,
    pub out_of_order_drops: u64,
}

pub struct StatusReporter {
    cache: Arc<PriceCache>,
    scheduler: Arc<PollScheduler>,
    stale_after_ms: i64,
}

impl StatusReporter {
    pub fn new(cache: Arc<PriceCache>, scheduler: Arc<PollScheduler>, stale_after_ms: i64) -> Self {
        Self {
            cache,
            scheduler,
            stale_after_ms,
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let scheduler = self.scheduler.state().await;
        let now = chrono::Utc::now().timestamp_millis();

        let entries = self
            .cache
            .all()
            .await
            .into_iter()
            .map(|entry| {
                let consecutive_failures = scheduler
                    .source_failures
                    .get(&entry.record.source)
                    .copied()
                    .unwrap_or(0);
                StatusEntry {
                    stale: now - entry.record.captured_at > self.stale_after_ms,
                    consecutive_failures,
                    source: entry.record.source,
                    bid: entry.record.bid,
                    ask: entry.record.ask,
                    mid: entry.record.mid,
                    spread: entry.metrics.spread,
                    spread_percent: entry.metrics.spread_percent,
                    liquidity_level: entry.metrics.liquidity_level,
                    signal: entry.metrics.signal,
                    crossed: entry.metrics.crossed,
                    captured_at: entry.record.captured_at,
                }
            })
            .collect();

        StatusSnapshot {
            entries,
            scheduler,
            out_of_order_drops: self.cache.out_of_order_drops(),
        }
    }
}
