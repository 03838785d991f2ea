// src/providers/crypto.rs
use std::collections::HashMap;

use super::{ensure_success, CryptoProvider, ProviderError};

const PROVIDER: &str = "coingecko";

/// CoinGecko `simple/price`: `{asset: {currency: price}}`.
pub struct CoinGecko {
    pub http: reqwest::Client,
    pub url: String,
}

type SimplePrice = HashMap<String, HashMap<String, f64>>;

fn project(body: &SimplePrice, ids: &[String], vs_currency: &str) -> Vec<(String, f64)> {
    ids.iter()
        .filter_map(|id| {
            let px = body.get(id).and_then(|quotes| quotes.get(vs_currency)).copied();
            if px.is_none() {
                tracing::debug!(asset = %id, vs_currency, "asset not quoted");
            }
            px.filter(|p| p.is_finite()).map(|p| (id.clone(), p))
        })
        .collect()
}

#[async_trait::async_trait]
impl CryptoProvider for CoinGecko {
    async fn spot_prices(&self, ids: &[String], vs_currency: &str) -> Result<Vec<(String, f64)>, ProviderError> {
        let joined = ids.join(",");
        let resp = self
            .http
            .get(&self.url)
            .query(&[("ids", joined.as_str()), ("vs_currencies", vs_currency)])
            .send()
            .await?;
        ensure_success(&resp, PROVIDER)?;
        let body: SimplePrice = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed { provider: PROVIDER, reason: e.to_string() })?;
        Ok(project(&body, ids, vs_currency))
    }
}
