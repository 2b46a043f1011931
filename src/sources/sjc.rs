//! SJC gold dealer adapter
//!
//! SJC publishes its quote board as an HTML table fragment; the buy and sell
//! prices sit in the second and third cells of the row naming the SJC bar.

use async_trait::async_trait;

use super::{now_ms, FetchError, SourceAdapter};
use crate::types::PriceRecord;

pub const SJC_SOURCE: &str = "SJC";
const DEFAULT_URL: &str = "https://sjc.com.vn/giavang/textContent.php";

pub struct SjcAdapter {
    client: reqwest::Client,
    url: String,
}

impl SjcAdapter {
    pub fn new(url: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: super::http_client()?,
            url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }
}

#[async_trait]
impl SourceAdapter for SjcAdapter {
    fn source(&self) -> &str {
        SJC_SOURCE
    }

    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                feed: SJC_SOURCE.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        let (buy, sell) = parse_quote_table(&body)
            .ok_or_else(|| FetchError::parse(SJC_SOURCE, "no usable SJC row in quote table"))?;

        Ok(PriceRecord::new(SJC_SOURCE, buy, sell, now_ms()))
    }
}

/// Extract (buy, sell) VND prices from the SJC quote table fragment.
/// Malformed markup yields `None`, which the adapter reports as a parse
/// failure rather than a panic.
fn parse_quote_table(body: &str) -> Option<(f64, f64)> {
    let line = body.lines().find(|line| line.contains("SJC"))?;

    let cells: Vec<String> = line
        .split("<td")
        .skip(1)
        .map(|fragment| {
            let inner = fragment
                .split_once('>')
                .map(|(_, rest)| rest)
                .unwrap_or(fragment);
            let inner = inner.split("</td>").next().unwrap_or(inner);
            digits_only(inner)
        })
        .collect();

    // Cell 0 names the product, cells 1 and 2 carry buy/sell
    if cells.len() < 3 {
        return None;
    }

    let buy: f64 = cells[1].parse().ok()?;
    let sell: f64 = cells[2].parse().ok()?;
    if buy == 0.0 || sell == 0.0 {
        return None;
    }

    Some((buy, sell))
}

fn digits_only(fragment: &str) -> String {
    let mut digits = String::new();
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && c.is_ascii_digit() => digits.push(c),
            _ => {}
        }
    }
    digits
}
