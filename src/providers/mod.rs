// src/providers/mod.rs
use async_trait::async_trait;
use serde_json::Number;
use std::time::Duration;

use crate::types::{DailyClose, FeedItem};

pub mod crypto;
pub mod feed;
pub mod forex;
pub mod yahoo;

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; metals-feed/", env!("CARGO_PKG_VERSION"), ")");

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} reported: {message}")]
    Upstream { provider: &'static str, message: String },
    #[error("malformed {provider} payload: {reason}")]
    Malformed { provider: &'static str, reason: String },
    #[error("feed: {0}")]
    Feed(#[from] rss::Error),
    #[error("no closing prices for {0}")]
    EmptyHistory(String),
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Daily closes for `symbol` over `range` (e.g. "5y"), oldest first.
    async fn daily_closes(&self, symbol: &str, range: &str) -> Result<Vec<DailyClose>, ProviderError>;
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Latest `base`-relative rates for `codes`, in request order. Codes the
    /// provider does not quote are left out.
    async fn latest_rates(&self, base: &str, codes: &[String]) -> Result<Vec<(String, Number)>, ProviderError>;
}

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    async fn spot_prices(&self, ids: &[String], vs_currency: &str) -> Result<Vec<(String, f64)>, ProviderError>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Channel items in feed order.
    async fn items(&self) -> Result<Vec<FeedItem>, ProviderError>;
}

/// Shared client for every provider in a run.
pub fn http_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build()
}

fn ensure_success(resp: &reqwest::Response, provider: &'static str) -> Result<(), ProviderError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ProviderError::Status { provider, status: status.as_u16() })
    }
}
