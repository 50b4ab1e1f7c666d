// src/ingest/types.rs
use anyhow::Result;

/// Raw record as it arrives from a feed, before any cleanup.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub source: String,    // feed id, e.g. "google-news"
    pub title: String,     // as published, may contain HTML
    pub link: String,      // article URL, identity candidate
    pub summary: String,   // description/teaser, may contain HTML
    pub published_at: u64, // unix seconds, 0 when the feed omits it
}

/// Canonical item after cleanup. `key` is stable per link for one run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: u64,
    pub key: String,
}

/// Identity key for dedup: hex prefix of SHA-256 over the trimmed link.
pub fn item_key(link: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(link.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<FeedItem>>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_key_is_stable_and_trims() {
        let a = item_key("https://example.com/story-1");
        let b = item_key("  https://example.com/story-1  ");
        let c = item_key("https://example.com/story-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
