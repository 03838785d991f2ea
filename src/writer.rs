// src/writer.rs
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::types::{MetalsDocument, NewsDocument};

pub const METALS_FILE: &str = "metals.json";
pub const NEWS_FILE: &str = "news.json";

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Replace the metals/rates document.
    async fn write_metals(&self, doc: &MetalsDocument) -> Result<(), WriteError>;
    /// Replace the headline list.
    async fn write_news(&self, doc: &NewsDocument) -> Result<(), WriteError>;
}

/// Two-space indented JSON, no trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WriteError> {
    Ok(serde_json::to_vec_pretty(value)?)
}

/// Writes `metals.json` and `news.json` into an existing directory.
pub struct JsonFileSink {
    pub out_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }

    pub fn metals_path(&self) -> PathBuf {
        self.out_dir.join(METALS_FILE)
    }

    pub fn news_path(&self) -> PathBuf {
        self.out_dir.join(NEWS_FILE)
    }

    async fn replace(path: &Path, bytes: Vec<u8>) -> Result<(), WriteError> {
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| WriteError::Io { path: path.to_path_buf(), source })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "written");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink for JsonFileSink {
    async fn write_metals(&self, doc: &MetalsDocument) -> Result<(), WriteError> {
        Self::replace(&self.metals_path(), to_pretty_json(doc)?).await
    }

    async fn write_news(&self, doc: &NewsDocument) -> Result<(), WriteError> {
        Self::replace(&self.news_path(), to_pretty_json(doc)?).await
    }
}
