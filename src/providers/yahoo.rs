// src/providers/yahoo.rs
use serde::Deserialize;

use super::{PriceProvider, ProviderError};
use crate::types::DailyClose;

const PROVIDER: &str = "yahoo";

/// Yahoo Finance v8 chart endpoint.
pub struct YahooChart {
    pub http: reqwest::Client,
    pub base_url: String, // ".../v8/finance/chart"
    pub interval: String, // "1d"
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

impl YahooChart {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, interval: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into(), interval: interval.into() }
    }

    /// Sessions with a null or non-finite close are skipped.
    fn parse(body: &[u8], http_ok: bool, status: u16) -> Result<Vec<DailyClose>, ProviderError> {
        let env: ChartEnvelope = match serde_json::from_slice(body) {
            Ok(env) => env,
            Err(_) if !http_ok => return Err(ProviderError::Status { provider: PROVIDER, status }),
            Err(e) => return Err(ProviderError::Malformed { provider: PROVIDER, reason: e.to_string() }),
        };
        if let Some(err) = env.chart.error {
            return Err(ProviderError::Upstream {
                provider: PROVIDER,
                message: format!("{}: {}", err.code, err.description),
            });
        }
        if !http_ok {
            return Err(ProviderError::Status { provider: PROVIDER, status });
        }
        let result = env
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::Malformed { provider: PROVIDER, reason: "empty result".into() })?;
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();
        if closes.len() != result.timestamp.len() {
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                reason: format!("{} timestamps vs {} closes", result.timestamp.len(), closes.len()),
            });
        }

        Ok(result
            .timestamp
            .into_iter()
            .zip(closes)
            .filter_map(|(ts, close)| match close {
                Some(c) if c.is_finite() => Some(DailyClose { ts_ms: ts.saturating_mul(1000), close: c }),
                _ => None,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl PriceProvider for YahooChart {
    async fn daily_closes(&self, symbol: &str, range: &str) -> Result<Vec<DailyClose>, ProviderError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), symbol);
        let resp = self
            .http
            .get(&url)
            .query(&[("range", range), ("interval", self.interval.as_str())])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        let bars = Self::parse(&body, status.is_success(), status.as_u16())?;
        tracing::debug!(symbol, sessions = bars.len(), "chart history received");
        Ok(bars)
    }
}
