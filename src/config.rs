//! Configuration management for spreadwatch
//!
//! Loads from TOML files + environment variables via .env. Feed credentials
//! (GoldAPI token, PNJ api key) come from the environment only and never
//! appear in the config digest.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

use crate::metrics::{ThresholdBook, Thresholds};

pub const GOLDAPI_TOKEN_ENV: &str = "GOLDAPI_TOKEN";
pub const PNJ_API_KEY_ENV: &str = "PNJ_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub sources: SourcesConfig,
    pub thresholds: Thresholds,
    /// Per-source threshold overrides, keyed by source identifier
    #[serde(default)]
    pub source_thresholds: HashMap<String, Thresholds>,
    #[cfg(feature = "dashboard")]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Poll interval in seconds
    pub interval_secs: u64,
    /// Entry age after which /status marks a source stale
    pub stale_after_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Enable the SJC dealer board feed
    pub sjc_enabled: bool,
    /// Enable the PNJ edge API feed
    pub pnj_enabled: bool,
    /// Enable the world gold (goldapi.io) feed
    pub goldapi_enabled: bool,
    /// Endpoint overrides, mainly for tests and mirrors
    pub sjc_url: Option<String>,
    pub pnj_url: Option<String>,
    pub goldapi_url: Option<String>,
    /// Synthetic spread fraction for spot-only GoldAPI payloads
    pub goldapi_spread_fraction: Option<f64>,
}

#[cfg(feature = "dashboard")]
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let builder = Config::builder()
            // Monitor defaults
            .set_default("monitor.interval_secs", 30)?
            .set_default("monitor.stale_after_ms", 120_000)?
            // Source defaults
            .set_default("sources.sjc_enabled", true)?
            .set_default("sources.pnj_enabled", true)?
            .set_default("sources.goldapi_enabled", false)?
            // Default thresholds (VND dealer market)
            .set_default("thresholds.high_liquidity_spread_max", 30_000.0)?
            .set_default("thresholds.low_liquidity_spread_min", 80_000.0)?
            .set_default("thresholds.favorable_spread_max", 25_000.0)?
            .set_default("thresholds.favorable_price_min", 75_000_000.0)?
            .set_default("thresholds.moderate_spread_max", 60_000.0)?;

        #[cfg(feature = "dashboard")]
        let builder = builder.set_default("dashboard.bind_addr", "127.0.0.1:8099")?;

        let config = builder
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SPREADWATCH_*)
            .add_source(Environment::with_prefix("SPREADWATCH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Thresholds with per-source overrides resolved. The world gold feed
    /// gets USD-scale defaults unless explicitly overridden.
    pub fn threshold_book(&self) -> ThresholdBook {
        let mut per_source = self.source_thresholds.clone();
        if self.sources.goldapi_enabled {
            per_source
                .entry(crate::sources::GOLDAPI_SOURCE.to_string())
                .or_insert_with(Thresholds::usd_gold);
        }
        ThresholdBook::new(self.thresholds.clone(), per_source)
    }

    /// Validate required environment variables for the enabled sources
    pub fn validate_env(&self) -> Result<()> {
        if self.sources.pnj_enabled && std::env::var(PNJ_API_KEY_ENV).is_err() {
            bail!(
                "PNJ feed enabled but {} is not set in the environment",
                PNJ_API_KEY_ENV
            );
        }
        if self.sources.goldapi_enabled && std::env::var(GOLDAPI_TOKEN_ENV).is_err() {
            bail!(
                "GoldAPI feed enabled but {} is not set in the environment",
                GOLDAPI_TOKEN_ENV
            );
        }
        Ok(())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "interval={}s sjc={} pnj={} goldapi={} stale_after={}ms",
            self.monitor.interval_secs,
            self.sources.sjc_enabled,
            self.sources.pnj_enabled,
            self.sources.goldapi_enabled,
            self.monitor.stale_after_ms
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
