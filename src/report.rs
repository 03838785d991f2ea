// src/report.rs
//! Reads a written `metals.json` back: latest price per instrument in a
//! chosen currency, and how many units an amount buys.
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::{round_to, RATES_KEY};

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("unknown instrument {0:?}")]
    UnknownInstrument(String),
    #[error("no usable price for {0:?}")]
    NoPrice(String),
    #[error("amount must be a positive number")]
    InvalidAmount,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub rates: BTreeMap<String, f64>,
    /// Document order: instruments, then crypto assets.
    pub series: Vec<(String, Vec<f64>)>,
}

/// Top-level entries of a JSON object, in document order.
struct Entries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    out.push((key, value));
                }
                Ok(Entries(out))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub instrument: String,
    pub price: f64, // converted, 2 dp
    pub currency: String,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:>12.2} {}", self.instrument.to_uppercase(), self.price, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub instrument: String,
    pub units: f64,      // 4 dp
    pub unit_price: f64, // converted, 2 dp
    pub currency: String,
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You could buy {:.4} units of {} at current price ({:.2} {})",
            self.units,
            self.instrument.to_uppercase(),
            self.unit_price,
            self.currency
        )
    }
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read(path).map_err(|source| ReportError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    /// Non-numeric rates and non-array keys are ignored.
    pub fn from_json(raw: &[u8]) -> Result<Self, ReportError> {
        let Entries(top) = serde_json::from_slice(raw).map_err(|e| {
            if e.is_data() { ReportError::NotAnObject } else { ReportError::Parse(e) }
        })?;
        let mut snap = Snapshot::default();
        for (key, value) in top {
            if key == RATES_KEY {
                if let Value::Object(rates) = value {
                    snap.rates = numeric_entries(rates);
                }
                continue;
            }
            match value {
                Value::Array(items) => {
                    let prices: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
                    match snap.series.iter_mut().find(|(name, _)| *name == key) {
                        Some(slot) => slot.1 = prices,
                        None => snap.series.push((key, prices)),
                    }
                }
                other => tracing::debug!(key = %key, kind = kind(&other), "ignored"),
            }
        }
        Ok(snap)
    }

    /// Multiplier for `currency`; unknown currencies fall back to 1.
    pub fn rate(&self, currency: &str) -> f64 {
        self.rates.get(&currency.to_ascii_uppercase()).copied().unwrap_or(1.0)
    }

    fn latest_usd(&self, instrument: &str) -> Result<f64, ReportError> {
        let series = self
            .series
            .iter()
            .find(|(name, _)| name == instrument)
            .map(|(_, prices)| prices)
            .ok_or_else(|| ReportError::UnknownInstrument(instrument.to_string()))?;
        series.last().copied().ok_or_else(|| ReportError::NoPrice(instrument.to_string()))
    }

    pub fn latest_quotes(&self, currency: &str) -> Vec<Quote> {
        let rate = self.rate(currency);
        self.series
            .iter()
            .filter_map(|(name, prices)| {
                let last = prices.last()?;
                Some(Quote {
                    instrument: name.clone(),
                    price: round_to(last * rate, 2),
                    currency: currency.to_ascii_uppercase(),
                })
            })
            .collect()
    }

    pub fn units_for(&self, amount: f64, instrument: &str, currency: &str) -> Result<Holding, ReportError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ReportError::InvalidAmount);
        }
        let unit_price = self.latest_usd(instrument)? * self.rate(currency);
        if unit_price <= 0.0 {
            return Err(ReportError::NoPrice(instrument.to_string()));
        }
        Ok(Holding {
            instrument: instrument.to_string(),
            units: round_to(amount / unit_price, 4),
            unit_price: round_to(unit_price, 2),
            currency: currency.to_ascii_uppercase(),
        })
    }
}

fn numeric_entries(rates: Map<String, Value>) -> BTreeMap<String, f64> {
    rates
        .into_iter()
        .filter_map(|(code, v)| v.as_f64().map(|r| (code.to_ascii_uppercase(), r)))
        .collect()
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
