// src/providers/feed.rs
use rss::Channel;

use super::{ensure_success, NewsSource, ProviderError};
use crate::types::FeedItem;

const PROVIDER: &str = "rss";

pub struct RssFeed {
    pub http: reqwest::Client,
    pub url: String,
}

pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedItem>, ProviderError> {
    let channel = Channel::read_from(xml)?;
    Ok(channel
        .items()
        .iter()
        .map(|item| FeedItem {
            title: item.title().map(|t| t.trim().to_string()),
            link: item.link().map(|l| l.trim().to_string()),
        })
        .collect())
}

#[async_trait::async_trait]
impl NewsSource for RssFeed {
    async fn items(&self) -> Result<Vec<FeedItem>, ProviderError> {
        let resp = self.http.get(&self.url).send().await?;
        ensure_success(&resp, PROVIDER)?;
        let body = resp.bytes().await?;
        let items = parse_feed(&body)?;
        tracing::debug!(url = %self.url, items = items.len(), "feed parsed");
        Ok(items)
    }
}
