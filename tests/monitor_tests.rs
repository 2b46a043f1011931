//! End-to-end tests for the poll scheduler, cache and notifier

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spreadwatch::cache::PriceCache;
use spreadwatch::metrics::{derive, ThresholdBook, Thresholds};
use spreadwatch::notifier::{EventNotifier, MonitorObserver};
use spreadwatch::scheduler::PollScheduler;
use spreadwatch::sources::{FetchError, SourceAdapter};
use spreadwatch::status::StatusReporter;
use spreadwatch::types::{CacheEntry, DerivedMetrics, PriceRecord};

// Interval long enough that only the initial scan fires during a test;
// later ticks are driven manually through run_tick.
const PARKED: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
enum StubOutcome {
    Quote { bid: f64, ask: f64, at: i64 },
    Fail(&'static str),
}

/// Scripted adapter: pops one outcome per fetch and repeats the last one
/// once the script is exhausted.
struct StubAdapter {
    source: String,
    script: Mutex<VecDeque<StubOutcome>>,
}

impl StubAdapter {
    fn new(source: &str, script: Vec<StubOutcome>) -> Arc<Self> {
        assert!(!script.is_empty());
        Arc::new(Self {
            source: source.to_string(),
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        };
        match outcome {
            StubOutcome::Quote { bid, ask, at } => {
                Ok(PriceRecord::new(self.source.clone(), bid, ask, at))
            }
            StubOutcome::Fail(reason) => Err(FetchError::parse(&self.source, reason)),
        }
    }
}

#[derive(Default)]
struct CountingObserver {
    updates: AtomicUsize,
    crossings: AtomicUsize,
}

impl MonitorObserver for CountingObserver {
    fn on_price_updated(&self, _entry: &CacheEntry) -> anyhow::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_threshold_crossed(
        &self,
        _source: &str,
        _previous: &DerivedMetrics,
        _current: &DerivedMetrics,
    ) -> anyhow::Result<()> {
        self.crossings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn build_scheduler(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    observer: Option<Arc<CountingObserver>>,
) -> (Arc<PollScheduler>, Arc<PriceCache>) {
    let cache = Arc::new(PriceCache::new());
    let mut notifier = EventNotifier::new();
    if let Some(observer) = observer {
        notifier.register(observer);
    }
    let scheduler = Arc::new(PollScheduler::new(
        adapters,
        Arc::clone(&cache),
        Arc::new(notifier),
        ThresholdBook::new(Thresholds::default(), Default::default()),
    ));
    (scheduler, cache)
}

fn quote(bid: f64, ask: f64, at: i64) -> StubOutcome {
    StubOutcome::Quote { bid, ask, at }
}

#[tokio::test]
async fn partial_failures_do_not_abort_the_tick() {
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        StubAdapter::new("SJC", vec![quote(79_000_000.0, 79_020_000.0, 1)]),
        StubAdapter::new("PNJ", vec![quote(78_900_000.0, 78_950_000.0, 1)]),
        StubAdapter::new("BROKEN", vec![StubOutcome::Fail("empty body")]),
    ];
    let (scheduler, cache) = build_scheduler(adapters, None);

    scheduler.start(PARKED).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.len().await, 2);
    assert!(cache.get("SJC").await.is_some());
    assert!(cache.get("PNJ").await.is_some());
    assert!(cache.get("BROKEN").await.is_none());

    let state = scheduler.state().await;
    assert_eq!(state.tick_count, 1);
    assert!(state.last_error.as_deref().unwrap().contains("BROKEN"));
    assert_eq!(state.source_failures.get("BROKEN"), Some(&1));
    assert_eq!(state.parse_errors, 1);
    assert_eq!(state.network_errors, 0);

    scheduler.stop().await;
}

#[tokio::test]
async fn consecutive_failures_accumulate_and_reset() {
    let adapter: Arc<dyn SourceAdapter> = StubAdapter::new(
        "SJC",
        vec![
            StubOutcome::Fail("down"),
            StubOutcome::Fail("still down"),
            quote(79_000_000.0, 79_020_000.0, 10),
        ],
    );
    let (scheduler, cache) = build_scheduler(vec![adapter], None);

    scheduler.start(PARKED).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.run_tick().await;

    let state = scheduler.state().await;
    assert_eq!(state.source_failures.get("SJC"), Some(&2));
    assert!(cache.is_empty().await);

    scheduler.run_tick().await;
    let state = scheduler.state().await;
    assert_eq!(state.source_failures.get("SJC"), None);
    assert_eq!(cache.len().await, 1);
    // last_error keeps the most recent failure even after recovery
    assert!(state.last_error.is_some());

    scheduler.stop().await;
}

#[tokio::test]
async fn stop_discards_pending_tick_results() {
    let adapter: Arc<dyn SourceAdapter> = StubAdapter::new(
        "SJC",
        vec![
            quote(79_000_000.0, 79_020_000.0, 1),
            quote(80_000_000.0, 80_020_000.0, 2),
        ],
    );
    let (scheduler, cache) = build_scheduler(vec![adapter], None);

    scheduler.start(PARKED).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cache.len().await, 1);

    scheduler.stop().await;
    assert!(!scheduler.is_running());

    // Tick that completes after stop(): fetch runs, results are dropped
    scheduler.run_tick().await;

    let entry = cache.get("SJC").await.unwrap();
    assert_eq!(entry.record.captured_at, 1);
    assert_eq!(scheduler.state().await.tick_count, 1);
}

#[tokio::test]
async fn zero_adapters_start_produces_empty_snapshots() {
    let (scheduler, cache) = build_scheduler(Vec::new(), None);
    let reporter = Arc::new(StatusReporter::new(
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        120_000,
    ));

    scheduler.start(PARKED).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = reporter.snapshot().await;
    assert!(snapshot.entries.is_empty());
    assert!(snapshot.scheduler.running);
    assert!(snapshot.scheduler.tick_count >= 1);
    assert!(snapshot.scheduler.last_error.is_none());

    scheduler.stop().await;
}

#[tokio::test]
async fn classification_change_emits_exactly_one_crossing() {
    // Tick 1: tight spread (high), tick 2 onward: wide spread (low)
    let adapter: Arc<dyn SourceAdapter> = StubAdapter::new(
        "SJC",
        vec![
            quote(79_000_000.0, 79_020_000.0, 1),
            quote(79_000_000.0, 79_120_000.0, 2),
        ],
    );
    let observer = Arc::new(CountingObserver::default());
    let (scheduler, _cache) = build_scheduler(vec![adapter], Some(observer.clone()));

    scheduler.start(PARKED).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(observer.crossings.load(Ordering::SeqCst), 0);

    scheduler.run_tick().await;
    assert_eq!(observer.crossings.load(Ordering::SeqCst), 1);

    // Same classification again: update fires, crossing does not
    scheduler.run_tick().await;
    assert_eq!(observer.crossings.load(Ordering::SeqCst), 1);
    assert_eq!(observer.updates.load(Ordering::SeqCst), 3);

    scheduler.stop().await;
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let adapter: Arc<dyn SourceAdapter> =
        StubAdapter::new("SJC", vec![quote(79_000_000.0, 79_020_000.0, 1)]);
    let (scheduler, _cache) = build_scheduler(vec![adapter], None);

    scheduler.start(PARKED).await;
    scheduler.start(Duration::from_secs(1)).await;

    let state = scheduler.state().await;
    assert!(state.running);
    assert_eq!(state.interval_ms, PARKED.as_millis() as u64);

    scheduler.stop().await;
    assert!(!scheduler.state().await.running);
}

/// Adapter whose fetch takes a fixed (virtual) time, tracking how many
/// fetches ever ran concurrently.
struct SlowAdapter {
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowAdapter {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for SlowAdapter {
    fn source(&self) -> &str {
        "SLOW"
    }

    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PriceRecord::new(
            "SLOW",
            79_000_000.0,
            79_020_000.0,
            call as i64,
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn timer_fires_on_the_configured_interval() {
    let adapter: Arc<dyn SourceAdapter> =
        StubAdapter::new("SJC", vec![quote(79_000_000.0, 79_020_000.0, 1)]);
    let (scheduler, cache) = build_scheduler(vec![adapter], None);

    scheduler.start(Duration::from_secs(30)).await;
    // Paused clock: initial scan at t=0, then ticks at t=30/60/90
    tokio::time::sleep(Duration::from_secs(95)).await;

    assert_eq!(scheduler.state().await.tick_count, 4);
    assert_eq!(cache.len().await, 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_never_overlap_ticks() {
    // Each fetch takes 25s against a 10s interval; delayed ticks must queue
    // behind the running one, never stack on top of it
    let adapter = SlowAdapter::new(Duration::from_secs(25));
    let (scheduler, cache) =
        build_scheduler(vec![adapter.clone() as Arc<dyn SourceAdapter>], None);

    scheduler.start(Duration::from_secs(10)).await;
    tokio::time::sleep(Duration::from_secs(100)).await;
    scheduler.stop().await;

    assert_eq!(adapter.max_in_flight.load(Ordering::SeqCst), 1);
    // Fetches complete at t=25/50/75 under the paused clock
    assert!(adapter.calls.load(Ordering::SeqCst) >= 3);
    assert!(cache.get("SLOW").await.is_some());
}

#[tokio::test]
async fn status_snapshot_flags_stale_entries() {
    let (scheduler, cache) = build_scheduler(Vec::new(), None);
    let reporter = StatusReporter::new(Arc::clone(&cache), Arc::clone(&scheduler), 1_000);

    let record = PriceRecord::new("SJC", 79_000_000.0, 79_020_000.0, 1);
    let metrics = derive(&record, &Thresholds::default());
    cache.upsert(CacheEntry { record, metrics }).await;

    let snapshot = reporter.snapshot().await;
    assert_eq!(snapshot.entries.len(), 1);
    let entry = &snapshot.entries[0];
    // captured_at=1 is far older than the 1s staleness threshold
    assert!(entry.stale);
    assert_eq!(entry.source, "SJC");
    assert_eq!(entry.consecutive_failures, 0);
    assert_eq!(snapshot.out_of_order_drops, 0);
}
