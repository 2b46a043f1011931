//! World gold adapter (goldapi.io XAU/USD)
//!
//! The endpoint authenticates via an `x-access-token` header and answers with
//! a single spot `price` plus 24h change fields. Quote sides are not part of
//! the payload, so bid/ask are reconstructed around the spot with a fixed,
//! configurable spread fraction.

use async_trait::async_trait;
use serde::Deserialize;

use super::{now_ms, FetchError, SourceAdapter};
use crate::types::PriceRecord;

pub const GOLDAPI_SOURCE: &str = "GOLDAPI";
const DEFAULT_URL: &str = "https://www.goldapi.io/api/XAU/USD";

/// Typical spot gold dealing spread, as a fraction of price
pub const DEFAULT_SPREAD_FRACTION: f64 = 0.002;

pub struct GoldApiAdapter {
    client: reqwest::Client,
    url: String,
    access_token: String,
    spread_fraction: f64,
}

#[derive(Debug, Deserialize)]
struct GoldApiResponse {
    price: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
}

impl GoldApiAdapter {
    pub fn new(
        url: Option<String>,
        access_token: String,
        spread_fraction: Option<f64>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: super::http_client()?,
            url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            access_token,
            spread_fraction: spread_fraction.unwrap_or(DEFAULT_SPREAD_FRACTION),
        })
    }
}

#[async_trait]
impl SourceAdapter for GoldApiAdapter {
    fn source(&self) -> &str {
        GOLDAPI_SOURCE
    }

    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("x-access-token", &self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                feed: GOLDAPI_SOURCE.to_string(),
                status,
            });
        }

        let payload: GoldApiResponse = response
            .json()
            .await
            .map_err(|e| FetchError::parse(GOLDAPI_SOURCE, e.to_string()))?;

        let (bid, ask) = normalize(&payload, self.spread_fraction)
            .ok_or_else(|| FetchError::parse(GOLDAPI_SOURCE, "missing price field"))?;

        Ok(PriceRecord::new(GOLDAPI_SOURCE, bid, ask, now_ms()))
    }
}

/// Prefer real quote sides when the payload carries them, otherwise center a
/// fixed-fraction spread on the spot price.
fn normalize(payload: &GoldApiResponse, spread_fraction: f64) -> Option<(f64, f64)> {
    if let (Some(bid), Some(ask)) = (payload.bid, payload.ask) {
        if bid > 0.0 && ask > 0.0 {
            return Some((bid, ask));
        }
    }

    let price = payload.price.filter(|p| *p > 0.0)?;
    let half_spread = price * spread_fraction / 2.0;
    Some((price - half_spread, price + half_spread))
}
