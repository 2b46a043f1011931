//! Core types used throughout spreadwatch
//!
//! Defines the normalized quote record, derived metric classifications and
//! the scheduler's observable state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Normalized quote snapshot from one source at one point in time.
///
/// Immutable once created; a newer fetch for the same source supersedes the
/// record in the cache, it never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Source identifier (unique per adapter, e.g. "SJC")
    pub source: String,
    /// Timestamp of the successful fetch in milliseconds
    pub captured_at: i64,
    /// Price the dealer buys at (best bid)
    pub bid: f64,
    /// Price the dealer sells at (best ask)
    pub ask: f64,
    /// Mid price, (bid + ask) / 2
    pub mid: f64,
}

impl PriceRecord {
    pub fn new(source: impl Into<String>, bid: f64, ask: f64, captured_at: i64) -> Self {
        Self {
            source: source.into(),
            captured_at,
            bid,
            ask,
            mid: (bid + ask) / 2.0,
        }
    }
}

/// Spread-based liquidity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for LiquidityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityLevel::High => write!(f, "high"),
            LiquidityLevel::Medium => write!(f, "medium"),
            LiquidityLevel::Low => write!(f, "low"),
        }
    }
}

/// Bounded trading-conditions signal derived from spread and price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSignal {
    Favorable,
    Moderate,
    Caution,
}

impl fmt::Display for QuoteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSignal::Favorable => write!(f, "favorable"),
            QuoteSignal::Moderate => write!(f, "moderate"),
            QuoteSignal::Caution => write!(f, "caution"),
        }
    }
}

/// Deterministic secondary values computed from a [`PriceRecord`].
///
/// Recomputed on every cache upsert, never stored apart from its record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// ask - bid
    pub spread: f64,
    /// spread / mid * 100
    pub spread_percent: f64,
    pub liquidity_level: LiquidityLevel,
    pub signal: QuoteSignal,
    /// True when bid > ask (inverted quote). Flagged, never clamped.
    pub crossed: bool,
}

/// One cache slot: the latest record for a source plus its derived metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: PriceRecord,
    pub metrics: DerivedMetrics,
}

/// Observable scheduler state. Written only by the scheduler itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerState {
    pub running: bool,
    pub interval_ms: u64,
    /// Completion time of the most recent tick in milliseconds
    pub last_tick_at: Option<i64>,
    pub tick_count: u64,
    /// Most recent fetch/parse failure, kept across successful ticks of
    /// other sources
    pub last_error: Option<String>,
    /// Total transport-level failures across all sources
    pub network_errors: u64,
    /// Total payload-shape failures across all sources
    pub parse_errors: u64,
    /// Consecutive failures per source, reset on the next success.
    /// A failing source is exposed here, never auto-removed.
    pub source_failures: HashMap<String, u32>,
}
