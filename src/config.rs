// src/config.rs
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{HeadlineShape, Instrument, BASE_CURRENCY, RATES_KEY};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "d_out_dir")]     pub out_dir: PathBuf,
    /// Per-request timeout. Unset means wait indefinitely.
    #[serde(default)]                   pub timeout_ms: Option<u64>,
    #[serde(default)]                   pub prices: PricesConfig,
    #[serde(default)]                   pub forex: ForexConfig,
    #[serde(default)]                   pub crypto: CryptoConfig,
    #[serde(default)]                   pub news: NewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    #[serde(default = "d_chart_url")]   pub base_url: String,
    #[serde(default = "d_range")]       pub range: String,
    #[serde(default = "d_interval")]    pub interval: String,
    #[serde(default = "d_decimals")]    pub decimals: u32,
    #[serde(default = "d_instruments")] pub instruments: Vec<Instrument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForexConfig {
    #[serde(default = "d_true")]        pub enabled: bool,
    #[serde(default = "d_forex_url")]   pub url: String,
    /// Must be USD; kept so a config naming another base is rejected.
    #[serde(default = "d_base")]        pub base: String,
    #[serde(default = "d_currencies")]  pub currencies: Vec<String>,
    /// Sent as `access_key`; falls back to `FOREX_API_KEY` in the binary.
    #[serde(default)]                   pub access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "d_true")]        pub enabled: bool,
    #[serde(default = "d_crypto_url")]  pub url: String,
    #[serde(default = "d_assets")]      pub assets: Vec<String>,
    #[serde(default = "d_vs")]          pub vs_currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "d_feed_url")]    pub feed_url: String,
    /// Case-insensitive title filter; empty keeps every entry.
    #[serde(default = "d_keywords")]    pub keywords: Vec<String>,
    #[serde(default = "d_limit")]       pub limit: usize,
    #[serde(default)]                   pub shape: HeadlineShape,
}

fn d_out_dir() -> PathBuf { PathBuf::from("data") }
fn d_chart_url() -> String { "https://query1.finance.yahoo.com/v8/finance/chart".into() }
fn d_range() -> String { "5y".into() }
fn d_interval() -> String { "1d".into() }
fn d_decimals() -> u32 { 2 }
fn d_instruments() -> Vec<Instrument> {
    vec![Instrument::new("gold", "GC=F"), Instrument::new("silver", "SI=F")]
}
fn d_true() -> bool { true }
fn d_forex_url() -> String { "https://api.exchangerate.host/latest".into() }
fn d_base() -> String { "USD".into() }
fn d_currencies() -> Vec<String> {
    ["EUR", "GBP", "INR", "AUD", "CAD", "JPY"].iter().map(|c| c.to_string()).collect()
}
fn d_crypto_url() -> String { "https://api.coingecko.com/api/v3/simple/price".into() }
fn d_assets() -> Vec<String> { vec!["bitcoin".into(), "ethereum".into()] }
fn d_vs() -> String { "usd".into() }
fn d_feed_url() -> String { "https://www.investing.com/rss/news_25.rss".into() }
fn d_keywords() -> Vec<String> { vec!["gold".into(), "silver".into()] }
fn d_limit() -> usize { 10 }

#[inline]
pub fn ms(d: u64) -> Duration { Duration::from_millis(d) }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            out_dir: d_out_dir(),
            timeout_ms: None,
            prices: PricesConfig::default(),
            forex: ForexConfig::default(),
            crypto: CryptoConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            base_url: d_chart_url(),
            range: d_range(),
            interval: d_interval(),
            decimals: d_decimals(),
            instruments: d_instruments(),
        }
    }
}

impl Default for ForexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: d_forex_url(),
            base: d_base(),
            currencies: d_currencies(),
            access_key: None,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { enabled: true, url: d_crypto_url(), assets: d_assets(), vs_currency: d_vs() }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_url: d_feed_url(),
            keywords: d_keywords(),
            limit: d_limit(),
            shape: HeadlineShape::default(),
        }
    }
}

impl FetchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(ms)
    }

    /// Every top-level key of `metals.json` must be unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prices.instruments.is_empty() {
            return Err(ConfigError::Invalid("no instruments configured".into()));
        }
        if self.prices.decimals > 10 {
            return Err(ConfigError::Invalid(format!("decimals {} out of range", self.prices.decimals)));
        }
        let mut keys = HashSet::new();
        keys.insert(RATES_KEY);
        let crypto = if self.crypto.enabled { self.crypto.assets.as_slice() } else { &[] };
        let names = self.prices.instruments.iter().map(|i| i.name.as_str());
        for name in names.chain(crypto.iter().map(String::as_str)) {
            if name.is_empty() {
                return Err(ConfigError::Invalid("empty instrument or asset name".into()));
            }
            if !keys.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate output key {name:?}")));
            }
        }
        if !self.forex.base.trim().eq_ignore_ascii_case(BASE_CURRENCY) {
            return Err(ConfigError::Invalid(format!(
                "forex base {:?} unsupported; rates are quoted per {BASE_CURRENCY}",
                self.forex.base
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = FetchConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.out_dir, PathBuf::from("data"));
        assert_eq!(cfg.prices.range, "5y");
        assert_eq!(cfg.prices.instruments[0], Instrument::new("gold", "GC=F"));
        assert_eq!(cfg.prices.instruments[1], Instrument::new("silver", "SI=F"));
        assert_eq!(cfg.forex.base, "USD");
        assert_eq!(cfg.crypto.assets, vec!["bitcoin", "ethereum"]);
        assert_eq!(cfg.news.limit, 10);
        assert_eq!(cfg.news.shape, HeadlineShape::Summarized);
        assert!(cfg.timeout().is_none());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = FetchConfig::from_toml_str(
            r#"
            timeout_ms = 1500

            [[prices.instruments]]
            name = "platinum"
            symbol = "PL=F"

            [news]
            keywords = []
            shape = "titles"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(cfg.prices.instruments, vec![Instrument::new("platinum", "PL=F")]);
        assert_eq!(cfg.prices.interval, "1d");
        assert!(cfg.news.keywords.is_empty());
        assert_eq!(cfg.news.shape, HeadlineShape::Titles);
        assert_eq!(cfg.news.feed_url, d_feed_url());
    }

    #[test]
    fn rejects_non_usd_base() {
        let err = FetchConfig::from_toml_str(
            r#"
            [forex]
            base = "EUR"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");

        let cfg = FetchConfig::from_toml_str("[forex]\nbase = \"usd\"\n").unwrap();
        assert_eq!(cfg.forex.base, "usd");
    }

    #[test]
    fn rejects_colliding_keys() {
        let err = FetchConfig::from_toml_str(
            r#"
            [[prices.instruments]]
            name = "rates"
            symbol = "X"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut cfg = FetchConfig::default();
        cfg.prices.instruments.push(Instrument::new("bitcoin", "BTC-USD"));
        assert!(cfg.validate().is_err());
        cfg.crypto.enabled = false;
        assert!(cfg.validate().is_ok());
    }
}
