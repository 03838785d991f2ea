// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

pub static STAGE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "metals_feed_stage_outcomes_total", "Stage results per run", &["stage", "outcome"] // ok|degraded|failed
    ).unwrap()
});

pub fn record(stage: &str, outcome: &str) {
    STAGE_OUTCOMES.with_label_values(&[stage, outcome]).inc();
}

/// Text exposition of everything registered so far.
pub fn render() -> String {
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
