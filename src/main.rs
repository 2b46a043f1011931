//! spreadwatch binary entry point
//!
//! Wires config, adapters, cache, notifier, scheduler and reporter together,
//! starts monitoring and runs until ctrl-c.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use spreadwatch::cache::PriceCache;
use spreadwatch::config::{AppConfig, GOLDAPI_TOKEN_ENV, PNJ_API_KEY_ENV};
use spreadwatch::notifier::{EventNotifier, MonitorObserver};
use spreadwatch::scheduler::PollScheduler;
use spreadwatch::sources::{GoldApiAdapter, PnjAdapter, SjcAdapter, SourceAdapter};
use spreadwatch::status::StatusReporter;
use spreadwatch::types::{CacheEntry, DerivedMetrics};

/// Default observer: logs every applied update and crossing
struct LogObserver;

impl MonitorObserver for LogObserver {
    fn on_price_updated(&self, entry: &CacheEntry) -> Result<()> {
        tracing::info!(
            source = %entry.record.source,
            bid = entry.record.bid,
            ask = entry.record.ask,
            spread = entry.metrics.spread,
            spread_percent = format!("{:.3}", entry.metrics.spread_percent),
            level = %entry.metrics.liquidity_level,
            signal = %entry.metrics.signal,
            "📊 Quote"
        );
        Ok(())
    }

    fn on_threshold_crossed(
        &self,
        source: &str,
        previous: &DerivedMetrics,
        current: &DerivedMetrics,
    ) -> Result<()> {
        tracing::info!(
            source = %source,
            level = %current.liquidity_level,
            signal = %current.signal,
            was_level = %previous.liquidity_level,
            was_signal = %previous.signal,
            "Classification changed"
        );
        Ok(())
    }
}

fn build_adapters(config: &AppConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    let sources = &config.sources;

    if sources.sjc_enabled {
        adapters.push(Arc::new(
            SjcAdapter::new(sources.sjc_url.clone()).context("Failed to build SJC adapter")?,
        ));
    }
    if sources.pnj_enabled {
        let api_key = std::env::var(PNJ_API_KEY_ENV)?;
        adapters.push(Arc::new(
            PnjAdapter::new(sources.pnj_url.clone(), api_key)
                .context("Failed to build PNJ adapter")?,
        ));
    }
    if sources.goldapi_enabled {
        let token = std::env::var(GOLDAPI_TOKEN_ENV)?;
        adapters.push(Arc::new(
            GoldApiAdapter::new(
                sources.goldapi_url.clone(),
                token,
                sources.goldapi_spread_fraction,
            )
            .context("Failed to build GoldAPI adapter")?,
        ));
    }

    Ok(adapters)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate_env()?;
    tracing::info!(config = %config.digest(), "✅ Configuration loaded");

    let adapters = build_adapters(&config)?;
    let cache = Arc::new(PriceCache::new());

    let mut notifier = EventNotifier::new();
    notifier.register(Arc::new(LogObserver));
    let notifier = Arc::new(notifier);

    let scheduler = Arc::new(PollScheduler::new(
        adapters,
        Arc::clone(&cache),
        notifier,
        config.threshold_book(),
    ));

    let reporter = Arc::new(StatusReporter::new(
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        config.monitor.stale_after_ms,
    ));

    scheduler
        .start(Duration::from_secs(config.monitor.interval_secs))
        .await;

    #[cfg(feature = "dashboard")]
    {
        let router = spreadwatch::dashboard::create_router(
            Arc::clone(&reporter),
            Arc::clone(&scheduler),
            Duration::from_secs(config.monitor.interval_secs),
        );
        let addr = config.dashboard.bind_addr.clone();
        tokio::spawn(async move {
            tracing::info!(addr = %addr, "🖥️ Dashboard API listening");
            match tokio::net::TcpListener::bind(&addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, router).await {
                        tracing::error!(error = %e, "Dashboard server exited");
                    }
                }
                Err(e) => tracing::error!(addr = %addr, error = %e, "Dashboard bind failed"),
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.stop().await;

    let snapshot = reporter.snapshot().await;
    tracing::info!(
        entries = snapshot.entries.len(),
        ticks = snapshot.scheduler.tick_count,
        "Final snapshot"
    );

    Ok(())
}
