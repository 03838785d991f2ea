// src/lib.rs
pub mod types;
pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod writer;
pub mod providers;
pub mod headlines;
pub mod pipeline;
pub mod report;
