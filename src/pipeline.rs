// src/pipeline.rs
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

use crate::config::FetchConfig;
use crate::headlines;
use crate::providers::crypto::CoinGecko;
use crate::providers::feed::RssFeed;
use crate::providers::forex::ExchangeRates;
use crate::providers::yahoo::YahooChart;
use crate::providers::{self, CryptoProvider, NewsSource, PriceProvider, ProviderError, RateProvider};
use crate::types::{
    CryptoPrices, DailyClose, Instrument, MetalsDocument, NewsDocument, PriceDataset, PriceSeries, RateTable,
    BASE_CURRENCY,
};
use crate::writer::{Sink, WriteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prices,
    Forex,
    Crypto,
    News,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run; files not yet written stay untouched.
    Abort,
    /// Warn and drop the stage's contribution.
    Degrade,
}

impl Stage {
    pub const fn policy(self) -> FailurePolicy {
        match self {
            Stage::Prices | Stage::Write => FailurePolicy::Abort,
            Stage::Forex | Stage::Crypto | Stage::News => FailurePolicy::Degrade,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Prices => "prices",
            Stage::Forex => "forex",
            Stage::Crypto => "crypto",
            Stage::News => "news",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("price history for {instrument}: {source}")]
    Prices { instrument: String, source: ProviderError },
    #[error("{stage} stage: {source}")]
    Stage { stage: Stage, source: ProviderError },
    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub instruments: usize,
    pub closes: usize,
    pub rates: usize,
    pub crypto_assets: usize,
    pub headlines: usize,
    /// Soft-fail stages that contributed nothing this run.
    pub degraded: Vec<Stage>,
}

pub struct Pipeline<S>
where
    S: Sink,
{
    pub cfg: FetchConfig,
    pub sink: S,
    pub prices: Arc<dyn PriceProvider>,
    pub rates: Arc<dyn RateProvider>,
    pub crypto: Arc<dyn CryptoProvider>,
    pub news: Arc<dyn NewsSource>,
}

impl<S> Pipeline<S>
where
    S: Sink,
{
    pub fn new(
        cfg: FetchConfig,
        sink: S,
        prices: Arc<dyn PriceProvider>,
        rates: Arc<dyn RateProvider>,
        crypto: Arc<dyn CryptoProvider>,
        news: Arc<dyn NewsSource>,
    ) -> Self {
        Self { cfg, sink, prices, rates, crypto, news }
    }

    /// HTTP providers sharing one client, endpoints taken from `cfg`.
    pub fn from_config(cfg: FetchConfig, sink: S) -> Result<Self, reqwest::Error> {
        let http = providers::http_client(cfg.timeout())?;
        let prices = Arc::new(YahooChart::new(http.clone(), cfg.prices.base_url.clone(), cfg.prices.interval.clone()));
        let rates = Arc::new(ExchangeRates {
            http: http.clone(),
            url: cfg.forex.url.clone(),
            access_key: cfg.forex.access_key.clone(),
        });
        let crypto = Arc::new(CoinGecko { http: http.clone(), url: cfg.crypto.url.clone() });
        let news = Arc::new(RssFeed { http, url: cfg.news.feed_url.clone() });
        Ok(Self::new(cfg, sink, prices, rates, crypto, news))
    }

    /// Fetch every stage, then write both documents. Nothing is written
    /// unless all hard-fail fetch stages succeed.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let (prices, rates, crypto, news) =
            tokio::join!(self.fetch_prices(), self.fetch_rates(), self.fetch_crypto(), self.fetch_news());

        let mut degraded = Vec::new();
        let prices = settle(Stage::Prices, prices, &mut degraded)?.unwrap_or_default();
        let rates = settle(Stage::Forex, rates, &mut degraded)?.unwrap_or_default();
        let crypto = settle(Stage::Crypto, crypto, &mut degraded)?.flatten();
        let news = settle(Stage::News, news, &mut degraded)?.unwrap_or_else(|| NewsDocument::empty(self.cfg.news.shape));

        let doc = MetalsDocument::assemble(rates, prices, crypto);
        settle(Stage::Write, self.sink.write_metals(&doc).await.map_err(PipelineError::from), &mut degraded)?;
        settle(Stage::Write, self.sink.write_news(&news).await.map_err(PipelineError::from), &mut degraded)?;

        Ok(RunSummary {
            instruments: doc.prices.len(),
            closes: doc.prices.total_closes(),
            rates: doc.rates.len(),
            crypto_assets: doc.crypto.as_ref().map_or(0, CryptoPrices::len),
            headlines: news.len(),
            degraded,
        })
    }

    /// Instruments are requested concurrently; the first failure in
    /// configuration order is reported.
    pub async fn fetch_prices(&self) -> Result<PriceDataset, PipelineError> {
        let futs = self.cfg.prices.instruments.iter().map(|inst| self.fetch_series(inst));
        let series = join_all(futs).await.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(PriceDataset::new(series))
    }

    async fn fetch_series(&self, inst: &Instrument) -> Result<PriceSeries, PipelineError> {
        let pc = &self.cfg.prices;
        let wrap = |source: ProviderError| PipelineError::Prices { instrument: inst.name.clone(), source };
        let bars = self.prices.daily_closes(&inst.symbol, &pc.range).await.map_err(&wrap)?;
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(wrap(ProviderError::EmptyHistory(inst.symbol.clone())));
        };
        tracing::info!(
            instrument = %inst.name,
            symbol = %inst.symbol,
            sessions = bars.len(),
            from = %session_date(first),
            to = %session_date(last),
            "price history"
        );
        Ok(PriceSeries::from_bars(&inst.name, &bars, pc.decimals))
    }

    pub async fn fetch_rates(&self) -> Result<RateTable, PipelineError> {
        let fx = &self.cfg.forex;
        let table = RateTable::new();
        if !fx.enabled || fx.currencies.is_empty() {
            return Ok(table);
        }
        let fetched = self
            .rates
            .latest_rates(BASE_CURRENCY, &fx.currencies)
            .await
            .map_err(|source| PipelineError::Stage { stage: Stage::Forex, source })?;
        tracing::info!(base = BASE_CURRENCY, quoted = fetched.len(), requested = fx.currencies.len(), "fx rates");
        Ok(table.merge(fetched))
    }

    /// `Ok(None)` when the crypto stage is switched off.
    pub async fn fetch_crypto(&self) -> Result<Option<CryptoPrices>, PipelineError> {
        let cc = &self.cfg.crypto;
        if !cc.enabled || cc.assets.is_empty() {
            return Ok(None);
        }
        let quotes = self
            .crypto
            .spot_prices(&cc.assets, &cc.vs_currency)
            .await
            .map_err(|source| PipelineError::Stage { stage: Stage::Crypto, source })?;
        tracing::info!(quoted = quotes.len(), requested = cc.assets.len(), "crypto spot");
        Ok(Some(CryptoPrices { quotes }))
    }

    pub async fn fetch_news(&self) -> Result<NewsDocument, PipelineError> {
        let nc = &self.cfg.news;
        let items = self
            .news
            .items()
            .await
            .map_err(|source| PipelineError::Stage { stage: Stage::News, source })?;
        let total = items.len();
        let headlines = headlines::select(items, &nc.keywords, nc.limit);
        tracing::info!(items = total, kept = headlines.len(), "headlines");
        Ok(NewsDocument { shape: nc.shape, headlines })
    }
}

fn session_date(bar: &DailyClose) -> String {
    Utc.timestamp_millis_opt(bar.ts_ms)
        .single()
        .map(|d| d.date_naive().to_string())
        .unwrap_or_default()
}

/// Apply the stage's failure policy to its result.
fn settle<T>(
    stage: Stage,
    res: Result<T, PipelineError>,
    degraded: &mut Vec<Stage>,
) -> Result<Option<T>, PipelineError> {
    match res {
        Ok(v) => {
            record(stage, "ok");
            Ok(Some(v))
        }
        Err(err) => match stage.policy() {
            FailurePolicy::Degrade => {
                tracing::warn!(stage = %stage, error = %err, "stage failed; continuing without it");
                record(stage, "degraded");
                degraded.push(stage);
                Ok(None)
            }
            FailurePolicy::Abort => {
                record(stage, "failed");
                Err(err)
            }
        },
    }
}

#[inline]
fn record(stage: Stage, outcome: &str) {
    #[cfg(feature = "metrics")]
    crate::metrics::record(stage.as_str(), outcome);
    #[cfg(not(feature = "metrics"))]
    let _ = (stage, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeedItem, HeadlineShape, Instrument};
    use crate::writer::to_pretty_json;
    use serde_json::{json, Number, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubPrices(HashMap<String, Vec<f64>>);

    #[async_trait::async_trait]
    impl PriceProvider for StubPrices {
        async fn daily_closes(&self, symbol: &str, _range: &str) -> Result<Vec<DailyClose>, ProviderError> {
            let closes = self.0.get(symbol).ok_or(ProviderError::Status { provider: "stub", status: 404 })?;
            Ok(closes
                .iter()
                .enumerate()
                .map(|(i, c)| DailyClose { ts_ms: 1_600_000_000_000 + i as i64 * 86_400_000, close: *c })
                .collect())
        }
    }

    struct StubRates(Option<Vec<(&'static str, f64)>>);

    #[async_trait::async_trait]
    impl RateProvider for StubRates {
        async fn latest_rates(&self, _base: &str, _codes: &[String]) -> Result<Vec<(String, Number)>, ProviderError> {
            let rates = self
                .0
                .as_ref()
                .ok_or(ProviderError::Malformed { provider: "stub", reason: "missing `rates`".into() })?;
            Ok(rates
                .iter()
                .filter_map(|(c, r)| Number::from_f64(*r).map(|n| (c.to_string(), n)))
                .collect())
        }
    }

    #[derive(Default)]
    struct StubCrypto {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl CryptoProvider for StubCrypto {
        async fn spot_prices(&self, ids: &[String], _vs: &str) -> Result<Vec<(String, f64)>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Status { provider: "stub", status: 429 });
            }
            Ok(ids.iter().map(|id| (id.clone(), 100.0)).collect())
        }
    }

    struct StubNews(Option<Vec<&'static str>>);

    #[async_trait::async_trait]
    impl NewsSource for StubNews {
        async fn items(&self) -> Result<Vec<FeedItem>, ProviderError> {
            let titles = self.0.as_ref().ok_or(ProviderError::Status { provider: "stub", status: 500 })?;
            Ok(titles
                .iter()
                .enumerate()
                .map(|(i, t)| FeedItem { title: Some(t.to_string()), link: Some(format!("https://n/{i}")) })
                .collect())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        metals: Mutex<Option<Vec<u8>>>,
        news: Mutex<Option<Vec<u8>>>,
    }

    impl MemorySink {
        fn metals_json(&self) -> Option<Value> {
            self.metals.lock().unwrap().as_ref().map(|b| serde_json::from_slice(b).unwrap())
        }
        fn news_json(&self) -> Option<Value> {
            self.news.lock().unwrap().as_ref().map(|b| serde_json::from_slice(b).unwrap())
        }
    }

    #[async_trait::async_trait]
    impl Sink for MemorySink {
        async fn write_metals(&self, doc: &MetalsDocument) -> Result<(), WriteError> {
            *self.metals.lock().unwrap() = Some(to_pretty_json(doc)?);
            Ok(())
        }
        async fn write_news(&self, doc: &NewsDocument) -> Result<(), WriteError> {
            *self.news.lock().unwrap() = Some(to_pretty_json(doc)?);
            Ok(())
        }
    }

    fn config() -> FetchConfig {
        let mut cfg = FetchConfig::default();
        cfg.prices.instruments = vec![Instrument::new("gold", "GC=F"), Instrument::new("silver", "SI=F")];
        cfg.forex.currencies = vec!["EUR".into(), "GBP".into()];
        cfg
    }

    fn closes() -> HashMap<String, Vec<f64>> {
        HashMap::from([
            ("GC=F".to_string(), vec![1800.001, 1800.005]),
            ("SI=F".to_string(), vec![24.136, 24.0]),
        ])
    }

    fn pipeline(
        cfg: FetchConfig,
        prices: HashMap<String, Vec<f64>>,
        rates: Option<Vec<(&'static str, f64)>>,
        news: Option<Vec<&'static str>>,
    ) -> (Pipeline<MemorySink>, Arc<StubCrypto>) {
        pipeline_with_crypto(cfg, prices, rates, news, StubCrypto::default())
    }

    fn pipeline_with_crypto(
        cfg: FetchConfig,
        prices: HashMap<String, Vec<f64>>,
        rates: Option<Vec<(&'static str, f64)>>,
        news: Option<Vec<&'static str>>,
        crypto: StubCrypto,
    ) -> (Pipeline<MemorySink>, Arc<StubCrypto>) {
        let crypto = Arc::new(crypto);
        let p = Pipeline::new(
            cfg,
            MemorySink::default(),
            Arc::new(StubPrices(prices)),
            Arc::new(StubRates(rates)),
            crypto.clone(),
            Arc::new(StubNews(news)),
        );
        (p, crypto)
    }

    #[test]
    fn policy_table() {
        assert_eq!(Stage::Prices.policy(), FailurePolicy::Abort);
        assert_eq!(Stage::Write.policy(), FailurePolicy::Abort);
        assert_eq!(Stage::Forex.policy(), FailurePolicy::Degrade);
        assert_eq!(Stage::Crypto.policy(), FailurePolicy::Degrade);
        assert_eq!(Stage::News.policy(), FailurePolicy::Degrade);
    }

    #[tokio::test]
    async fn full_run_merges_all_stages() {
        let (p, _) = pipeline(
            config(),
            closes(),
            Some(vec![("EUR", 0.92), ("GBP", 0.79)]),
            Some(vec!["Gold rallies", "Oil drops", "Silver steady"]),
        );
        let summary = p.run().await.unwrap();
        assert_eq!(summary.instruments, 2);
        assert_eq!(summary.closes, 4);
        assert_eq!(summary.rates, 3);
        assert_eq!(summary.crypto_assets, 2);
        assert_eq!(summary.headlines, 2);
        assert!(summary.degraded.is_empty());

        assert_eq!(
            p.sink.metals_json().unwrap(),
            json!({
                "rates": { "USD": 1, "EUR": 0.92, "GBP": 0.79 },
                "gold": [1800.0, 1800.01],
                "silver": [24.14, 24.0],
                "bitcoin": [100.0],
                "ethereum": [100.0]
            })
        );
        assert_eq!(
            p.sink.news_json().unwrap(),
            json!([
                { "title": "Gold rallies", "link": "https://n/0", "summary": "" },
                { "title": "Silver steady", "link": "https://n/2", "summary": "" }
            ])
        );
    }

    #[tokio::test]
    async fn forex_failure_keeps_usd_only() {
        let (p, _) = pipeline(config(), closes(), None, Some(vec![]));
        let summary = p.run().await.unwrap();
        assert_eq!(summary.degraded, vec![Stage::Forex]);
        let metals = p.sink.metals_json().unwrap();
        assert_eq!(metals["rates"], json!({ "USD": 1 }));
        assert!(p.sink.news_json().is_some());
    }

    #[tokio::test]
    async fn crypto_failure_omits_assets() {
        let failing = StubCrypto { fail: true, ..Default::default() };
        let (p, crypto) =
            pipeline_with_crypto(config(), closes(), Some(vec![("EUR", 0.92)]), Some(vec!["Gold rallies"]), failing);
        let summary = p.run().await.unwrap();
        assert_eq!(crypto.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.degraded, vec![Stage::Crypto]);
        assert_eq!(summary.crypto_assets, 0);

        let metals = p.sink.metals_json().unwrap();
        assert!(metals.get("bitcoin").is_none());
        assert!(metals.get("ethereum").is_none());
        assert_eq!(metals["gold"], json!([1800.0, 1800.01]));
        assert_eq!(metals["rates"], json!({ "USD": 1, "EUR": 0.92 }));
        assert_eq!(
            p.sink.news_json().unwrap(),
            json!([{ "title": "Gold rallies", "link": "https://n/0", "summary": "" }])
        );
    }

    #[tokio::test]
    async fn price_failure_writes_nothing() {
        let mut prices = closes();
        prices.remove("SI=F");
        let (p, _) = pipeline(config(), prices, Some(vec![]), Some(vec![]));
        let err = p.run().await.unwrap_err();
        assert!(matches!(&err, PipelineError::Prices { instrument, .. } if instrument == "silver"), "{err}");
        assert!(p.sink.metals_json().is_none());
        assert!(p.sink.news_json().is_none());
    }

    #[tokio::test]
    async fn empty_history_is_a_price_failure() {
        let mut prices = closes();
        prices.insert("GC=F".into(), vec![]);
        let (p, _) = pipeline(config(), prices, Some(vec![]), Some(vec![]));
        let err = p.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Prices { source: ProviderError::EmptyHistory(_), .. }));
    }

    #[tokio::test]
    async fn news_failure_writes_empty_list() {
        let (p, _) = pipeline(config(), closes(), Some(vec![]), None);
        let summary = p.run().await.unwrap();
        assert_eq!(summary.degraded, vec![Stage::News]);
        assert_eq!(p.sink.news_json().unwrap(), json!([]));
    }

    #[tokio::test]
    async fn disabled_crypto_is_not_requested() {
        let mut cfg = config();
        cfg.crypto.enabled = false;
        cfg.news.shape = HeadlineShape::Titles;
        let (p, crypto) = pipeline(cfg, closes(), Some(vec![]), Some(vec!["silver slips"]));
        p.run().await.unwrap();
        assert_eq!(crypto.calls.load(Ordering::SeqCst), 0);
        let metals = p.sink.metals_json().unwrap();
        assert!(metals.get("bitcoin").is_none());
        assert_eq!(p.sink.news_json().unwrap(), json!(["silver slips"]));
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_bytes() {
        let mk = || {
            pipeline(
                config(),
                closes(),
                Some(vec![("GBP", 0.79), ("EUR", 0.92)]),
                Some(vec!["Gold rallies", "Silver steady"]),
            )
            .0
        };
        let (a, b) = (mk(), mk());
        a.run().await.unwrap();
        b.run().await.unwrap();
        assert_eq!(*a.sink.metals.lock().unwrap(), *b.sink.metals.lock().unwrap());
        assert_eq!(*a.sink.news.lock().unwrap(), *b.sink.news.lock().unwrap());
    }
}
