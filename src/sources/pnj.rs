//! PNJ gold dealer adapter
//!
//! PNJ's edge API wants a POST with an `apikey` header and a small request
//! body. The response carries the gold price in `items[0].xauPrice` with the
//! session change in `chgXau`; the sell side is the buy price plus that
//! change, which can legitimately come out below the buy side on a down move.
//! Such inverted quotes are kept as-is and flagged downstream.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{now_ms, FetchError, SourceAdapter};
use crate::types::PriceRecord;

pub const PNJ_SOURCE: &str = "PNJ";
const DEFAULT_URL: &str = "https://edge-api.pnj.io/ecom-frontend/v1/gia-vang";

pub struct PnjAdapter {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct PnjResponse {
    #[serde(default)]
    items: Vec<PnjItem>,
}

#[derive(Debug, Deserialize)]
struct PnjItem {
    #[serde(rename = "xauPrice")]
    xau_price: Option<f64>,
    #[serde(rename = "chgXau")]
    chg_xau: Option<f64>,
}

impl PnjAdapter {
    pub fn new(url: Option<String>, api_key: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: super::http_client()?,
            url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl SourceAdapter for PnjAdapter {
    fn source(&self) -> &str {
        PNJ_SOURCE
    }

    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let now = now_ms();
        let body = json!({
            "ts": now,
            "tsj": now,
            "items": [{ "curr": "VND" }],
        });

        let response = self
            .client
            .post(&self.url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                feed: PNJ_SOURCE.to_string(),
                status,
            });
        }

        let payload: PnjResponse = response
            .json()
            .await
            .map_err(|e| FetchError::parse(PNJ_SOURCE, e.to_string()))?;

        let (buy, sell) = normalize(&payload)
            .ok_or_else(|| FetchError::parse(PNJ_SOURCE, "missing or zero xauPrice"))?;

        Ok(PriceRecord::new(PNJ_SOURCE, buy, sell, now_ms()))
    }
}

fn normalize(payload: &PnjResponse) -> Option<(f64, f64)> {
    let item = payload.items.first()?;
    let buy = item.xau_price.unwrap_or(0.0);
    if buy == 0.0 {
        return None;
    }
    let sell = buy + item.chg_xau.unwrap_or(0.0);
    Some((buy, sell))
}
