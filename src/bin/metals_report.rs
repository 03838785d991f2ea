// src/bin/metals_report.rs
use anyhow::Context;
use clap::Parser;
use metals_feed::report::Snapshot;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Latest prices from a fetched metals.json, optionally with a purchase calculation.
#[derive(Parser, Debug)]
#[command(name = "metals-report", version)]
struct Args {
    #[arg(long, default_value = "data/metals.json")]
    file: PathBuf,
    #[arg(long, default_value = "USD")]
    currency: String,
    /// Amount to invest, in `--currency`.
    #[arg(long, requires = "metal")]
    invest: Option<f64>,
    /// Instrument to buy, e.g. "gold".
    #[arg(long, requires = "invest")]
    metal: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let snap = Snapshot::load(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

    for quote in snap.latest_quotes(&args.currency) {
        println!("{quote}");
    }
    if let (Some(amount), Some(metal)) = (args.invest, args.metal.as_deref()) {
        println!("{}", snap.units_for(amount, metal, &args.currency)?);
    }
    Ok(())
}
