//! Metric Calculator - derives spread and classification metrics
//!
//! Pure functions over a [`PriceRecord`]; deterministic so the derivation is
//! unit-testable in isolation. Thresholds are named configuration, per source
//! when needed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{DerivedMetrics, LiquidityLevel, PriceRecord, QuoteSignal};

/// Named classification thresholds, in the quote currency of the source.
///
/// Defaults match the Vietnamese gold dealer market (VND per tael).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Spread below this classifies as high liquidity
    pub high_liquidity_spread_max: f64,
    /// Spread at or above this classifies as low liquidity
    pub low_liquidity_spread_min: f64,
    /// Favorable signal requires spread at or below this...
    pub favorable_spread_max: f64,
    /// ...and mid price at or above this
    pub favorable_price_min: f64,
    /// Moderate signal requires spread at or below this
    pub moderate_spread_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_liquidity_spread_max: 30_000.0,
            low_liquidity_spread_min: 80_000.0,
            favorable_spread_max: 25_000.0,
            favorable_price_min: 75_000_000.0,
            moderate_spread_max: 60_000.0,
        }
    }
}

impl Thresholds {
    /// Thresholds scaled for world gold quotes in USD per ounce
    pub fn usd_gold() -> Self {
        Self {
            high_liquidity_spread_max: 2.0,
            low_liquidity_spread_min: 8.0,
            favorable_spread_max: 1.5,
            favorable_price_min: 2_000.0,
            moderate_spread_max: 5.0,
        }
    }
}

/// Resolves the thresholds to apply for a given source: a per-source override
/// when configured, the default set otherwise.
#[derive(Debug, Clone, Default)]
pub struct ThresholdBook {
    default: Thresholds,
    per_source: HashMap<String, Thresholds>,
}

impl ThresholdBook {
    pub fn new(default: Thresholds, per_source: HashMap<String, Thresholds>) -> Self {
        Self {
            default,
            per_source,
        }
    }

    pub fn for_source(&self, source: &str) -> &Thresholds {
        self.per_source.get(source).unwrap_or(&self.default)
    }
}

/// Derive secondary metrics from a record. Pure and side-effect free.
pub fn derive(record: &PriceRecord, thresholds: &Thresholds) -> DerivedMetrics {
    let spread = record.ask - record.bid;
    let spread_percent = if record.mid != 0.0 {
        spread / record.mid * 100.0
    } else {
        0.0
    };

    // Classification goes by quote width: an inverted quote is as wide as
    // its magnitude, not "tighter than zero"
    let width = spread.abs();

    DerivedMetrics {
        spread,
        spread_percent,
        liquidity_level: liquidity_level(width, thresholds),
        signal: signal(width, record.mid, thresholds),
        // Inverted quote violates bid <= ask; flag it, keep the raw values
        crossed: spread < 0.0,
    }
}

fn liquidity_level(spread: f64, t: &Thresholds) -> LiquidityLevel {
    if spread < t.high_liquidity_spread_max {
        LiquidityLevel::High
    } else if spread < t.low_liquidity_spread_min {
        LiquidityLevel::Medium
    } else {
        LiquidityLevel::Low
    }
}

fn signal(spread: f64, mid: f64, t: &Thresholds) -> QuoteSignal {
    if spread <= t.favorable_spread_max && mid >= t.favorable_price_min {
        QuoteSignal::Favorable
    } else if spread <= t.moderate_spread_max {
        QuoteSignal::Moderate
    } else {
        QuoteSignal::Caution
    }
}
