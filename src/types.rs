// src/types.rs
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Key the rate table is written under in `metals.json`.
pub const RATES_KEY: &str = "rates";

/// Every rate is quoted per one unit of this currency.
pub const BASE_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,   // e.g., "gold"
    pub symbol: String, // provider ticker, e.g., "GC=F"
}

impl Instrument {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, symbol: S) -> Self {
        Self { name: name.into(), symbol: symbol.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub ts_ms: i64, // session open, unix ms
    pub close: f64,
}

/// Round half away from zero at `decimals` places.
#[inline]
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub name: String,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn from_bars(name: impl Into<String>, bars: &[DailyClose], decimals: u32) -> Self {
        Self {
            name: name.into(),
            closes: bars.iter().map(|b| round_to(b.close, decimals)).collect(),
        }
    }
}

/// Closing prices per instrument, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceDataset {
    series: Vec<PriceSeries>,
}

impl PriceDataset {
    pub fn new(series: Vec<PriceSeries>) -> Self {
        Self { series }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn total_closes(&self) -> usize {
        self.series.iter().map(|s| s.closes.len()).sum()
    }
}

/// Units of each currency per one US dollar. `USD` is always present and
/// always serialized as the integer `1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    entries: Vec<(String, Number)>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge fetched rates in order. A fetched base entry is ignored and a
    /// repeated code replaces the earlier value in place.
    pub fn merge<I>(mut self, fetched: I) -> Self
    where
        I: IntoIterator<Item = (String, Number)>,
    {
        for (code, rate) in fetched {
            let code = code.to_ascii_uppercase();
            if code == BASE_CURRENCY {
                continue;
            }
            match self.entries.iter_mut().find(|(c, _)| *c == code) {
                Some(slot) => slot.1 = rate,
                None => self.entries.push((code, rate)),
            }
        }
        self
    }

    /// Number of codes including the base.
    pub fn len(&self) -> usize {
        self.entries.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Serialize for RateTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        map.serialize_entry(BASE_CURRENCY, &1u8)?;
        for (code, rate) in &self.entries {
            map.serialize_entry(code, rate)?;
        }
        map.end()
    }
}

/// USD spot price per crypto asset id, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CryptoPrices {
    pub quotes: Vec<(String, f64)>,
}

impl CryptoPrices {
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Contents of `metals.json`: `rates` first, then one array per instrument,
/// then a single-element array per crypto asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MetalsDocument {
    pub rates: RateTable,
    pub prices: PriceDataset,
    pub crypto: Option<CryptoPrices>,
}

impl MetalsDocument {
    pub fn assemble(rates: RateTable, prices: PriceDataset, crypto: Option<CryptoPrices>) -> Self {
        Self { rates, prices, crypto }
    }
}

impl Serialize for MetalsDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let crypto = self.crypto.as_ref().map(|c| c.quotes.as_slice()).unwrap_or(&[]);
        let mut map = serializer.serialize_map(Some(1 + self.prices.len() + crypto.len()))?;
        map.serialize_entry(RATES_KEY, &self.rates)?;
        for s in self.prices.iter() {
            map.serialize_entry(&s.name, &s.closes)?;
        }
        for (asset, price) in crypto {
            map.serialize_entry(asset, &[*price])?;
        }
        map.end()
    }
}

/// One `<item>` of an RSS channel, as the feed provided it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub link: String,
}

/// How each headline is rendered in `news.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlineShape {
    /// Plain title strings.
    Titles,
    /// `{title, link}` objects.
    Links,
    /// `{title, link, summary}` objects with an empty summary for the
    /// dashboard to fill in.
    #[default]
    Summarized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsDocument {
    pub shape: HeadlineShape,
    pub headlines: Vec<Headline>,
}

impl NewsDocument {
    pub fn empty(shape: HeadlineShape) -> Self {
        Self { shape, headlines: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.headlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headlines.is_empty()
    }
}

#[derive(Serialize)]
struct LinkView<'a> {
    title: &'a str,
    link: &'a str,
}

#[derive(Serialize)]
struct SummaryView<'a> {
    title: &'a str,
    link: &'a str,
    summary: &'a str,
}

impl Serialize for NewsDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.headlines.len()))?;
        for h in &self.headlines {
            match self.shape {
                HeadlineShape::Titles => seq.serialize_element(&h.title)?,
                HeadlineShape::Links => seq.serialize_element(&LinkView { title: &h.title, link: &h.link })?,
                HeadlineShape::Summarized => seq.serialize_element(&SummaryView {
                    title: &h.title,
                    link: &h.link,
                    summary: "",
                })?,
            }
        }
        seq.end()
    }
}
