// src/providers/forex.rs
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use super::{ensure_success, ProviderError, RateProvider};

const PROVIDER: &str = "forex";

/// exchangerate.host style `latest` endpoint: `?base=USD&symbols=EUR,GBP`.
pub struct ExchangeRates {
    pub http: reqwest::Client,
    pub url: String,
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatesBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    rates: Option<Map<String, Value>>,
}

impl ExchangeRates {
    fn project(body: RatesBody, codes: &[String]) -> Result<Vec<(String, Number)>, ProviderError> {
        if body.success == Some(false) {
            let message = body.error.map(|e| e.to_string()).unwrap_or_else(|| "success=false".into());
            return Err(ProviderError::Upstream { provider: PROVIDER, message });
        }
        let rates = body
            .rates
            .ok_or_else(|| ProviderError::Malformed { provider: PROVIDER, reason: "missing `rates`".into() })?;

        let mut out = Vec::with_capacity(codes.len());
        for code in codes.iter().map(|c| c.trim().to_ascii_uppercase()) {
            match rates.get(&code) {
                Some(Value::Number(n)) => out.push((code, n.clone())),
                Some(other) => tracing::debug!(code = %code, value = %other, "non-numeric rate skipped"),
                None => tracing::debug!(code = %code, "rate not quoted"),
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl RateProvider for ExchangeRates {
    async fn latest_rates(&self, base: &str, codes: &[String]) -> Result<Vec<(String, Number)>, ProviderError> {
        let symbols = codes.iter().map(|c| c.trim().to_ascii_uppercase()).collect::<Vec<_>>().join(",");
        let mut query = vec![("base", base), ("symbols", symbols.as_str())];
        if let Some(key) = &self.access_key {
            query.push(("access_key", key.as_str()));
        }
        let resp = self.http.get(&self.url).query(&query).send().await?;
        ensure_success(&resp, PROVIDER)?;
        let body: RatesBody = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed { provider: PROVIDER, reason: e.to_string() })?;
        Self::project(body, codes)
    }
}
