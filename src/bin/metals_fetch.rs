// src/bin/metals_fetch.rs
use anyhow::Context;
use clap::Parser;
use metals_feed::{config::FetchConfig, pipeline::Pipeline, writer::JsonFileSink};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fetch metals history, FX rates, crypto spot and headlines into JSON files.
#[derive(Parser, Debug)]
#[command(name = "metals-fetch", version)]
struct Args {
    /// TOML config; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory (must exist).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Skip the crypto stage.
    #[arg(long)]
    no_crypto: bool,
    /// Keep every headline instead of keyword matches only.
    #[arg(long)]
    no_filter: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => FetchConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => FetchConfig::default(),
    };
    if let Some(dir) = args.out_dir {
        cfg.out_dir = dir;
    }
    if args.no_crypto {
        cfg.crypto.enabled = false;
    }
    if args.no_filter {
        cfg.news.keywords.clear();
    }
    if cfg.forex.access_key.is_none() {
        cfg.forex.access_key = std::env::var("FOREX_API_KEY").ok().filter(|k| !k.is_empty());
    }
    cfg.validate()?;

    let out_dir = cfg.out_dir.clone();
    let pipeline = Pipeline::from_config(cfg, JsonFileSink::new(&out_dir)).context("building http client")?;
    let summary = pipeline.run().await?;

    tracing::info!(
        instruments = summary.instruments,
        closes = summary.closes,
        rates = summary.rates,
        crypto = summary.crypto_assets,
        headlines = summary.headlines,
        degraded = ?summary.degraded,
        out_dir = %out_dir.display(),
        "metals & news fetched"
    );
    #[cfg(feature = "metrics")]
    tracing::debug!("\n{}", metals_feed::metrics::render());
    Ok(())
}
