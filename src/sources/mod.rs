//! Source adapter implementations (SJC, PNJ, GoldAPI)

mod goldapi;
mod pnj;
mod sjc;

pub use goldapi::{GoldApiAdapter, GOLDAPI_SOURCE};
pub use pnj::{PnjAdapter, PNJ_SOURCE};
pub use sjc::{SjcAdapter, SJC_SOURCE};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::types::PriceRecord;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One fetch attempt's failure. Payload-shape problems are a distinct mode
/// from transport problems so the scheduler can account for them separately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    // Field is named `feed`, not `source`: thiserror reserves a `source`
    // field for the error cause chain.
    #[error("{feed}: endpoint returned HTTP {status}")]
    Status { feed: String, status: StatusCode },

    #[error("{feed}: unexpected payload: {reason}")]
    Parse { feed: String, reason: String },
}

impl FetchError {
    pub fn parse(feed: &str, reason: impl Into<String>) -> Self {
        FetchError::Parse {
            feed: feed.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse { .. })
    }
}

/// One external endpoint: fetches raw data and normalizes it into a
/// [`PriceRecord`]. No retries here; retrying happens on the next scheduled
/// tick.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source identifier, unique across registered adapters
    fn source(&self) -> &str;

    async fn fetch(&self) -> Result<PriceRecord, FetchError>;
}

/// Shared HTTP client with the fetch timeout applied
pub(crate) fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
