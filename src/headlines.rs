// src/headlines.rs
use crate::types::{FeedItem, Headline};

/// Keep titled items whose title contains any keyword (case-insensitive),
/// in feed order, up to `limit`. No keywords keeps every titled item.
pub fn select(items: Vec<FeedItem>, keywords: &[String], limit: usize) -> Vec<Headline> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.filter(|t| !t.is_empty())?;
            Some(Headline { title, link: item.link.unwrap_or_default() })
        })
        .filter(|h| matches_any(&h.title, &needles))
        .take(limit)
        .collect()
}

fn matches_any(title: &str, needles: &[String]) -> bool {
    if needles.is_empty() {
        return true;
    }
    let haystack = title.to_lowercase();
    needles.iter().any(|n| haystack.contains(n.as_str()))
}
