//! News headlines from RSS feeds
//!
//! Fetches each configured feed (the cached unit is the raw XML body) and
//! pulls headlines out of `<item>` blocks with a light-weight extraction;
//! the feeds used here are plain RSS 2.0 and a DOM pass would be overkill.
//! Headlines that look like clickbait or are too short to inform are dropped.

use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileCache, Memoized};

/// Validity window for a feed body. Headlines rotate on screen for a long
/// time, so the mirror refetches rarely.
const FEED_TTL: Duration = Duration::from_secs(60 * 60 * 60);

/// Headlines kept per feed
const DEFAULT_LIMIT: usize = 10;

/// Feeds shown when nothing is configured.
pub fn default_feeds() -> Vec<(String, String)> {
    vec![
        (
            "BBC News".to_string(),
            "https://feeds.bbci.co.uk/news/rss.xml".to_string(),
        ),
        (
            "WSJ World News".to_string(),
            "https://feeds.a.dj.com/rss/RSSWorldNews.xml".to_string(),
        ),
        (
            "Al Jazeera".to_string(),
            "https://www.aljazeera.com/xml/rss/all.xml".to_string(),
        ),
    ]
}

/// Errors that can occur when fetching a feed
#[derive(Debug, Error)]
pub enum NewsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// One headline from a feed
#[derive(Debug, Clone)]
pub struct NewsItem {
    /// Feed name the headline came from
    pub source: String,
    pub title: String,
    pub link: String,
}

/// Client for fetching news headlines
#[derive(Debug, Clone)]
pub struct NewsClient {
    http: Client,
    cache: Option<FileCache>,
}

impl NewsClient {
    pub fn new(cache: Option<FileCache>) -> Self {
        Self {
            http: Client::new(),
            cache,
        }
    }

    /// Fetches one feed and extracts up to `limit` informative headlines.
    pub async fn feed(
        &self,
        name: &str,
        url: &str,
        limit: usize,
    ) -> Result<Vec<NewsItem>, NewsError> {
        let body = self.fetch_body(url).await?;
        Ok(extract_headlines(&body, name, limit))
    }

    /// Fetches all configured feeds, skipping (and logging) the broken ones.
    pub async fn headlines(&self, feeds: &[(String, String)]) -> Vec<NewsItem> {
        let mut items = Vec::new();
        for (name, url) in feeds {
            match self.feed(name, url, DEFAULT_LIMIT).await {
                Ok(feed_items) => items.extend(feed_items),
                Err(e) => log::warn!("failed to fetch feed {name} ({url}): {e}"),
            }
        }
        items
    }

    /// Fetches the raw feed body (the cached operation, keyed on the URL).
    async fn fetch_body(&self, url: &str) -> Result<String, NewsError> {
        let op = Memoized::new(self.cache.clone(), "news.feed", FEED_TTL, |url: String| {
            let http = self.http.clone();
            async move {
                let body = http
                    .get(&url)
                    .timeout(Duration::from_secs(10))
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                Ok::<_, NewsError>(body)
            }
        });
        op.call(url.to_string()).await
    }
}

/// Extracts headlines from an RSS body.
pub fn extract_headlines(body: &str, source: &str, limit: usize) -> Vec<NewsItem> {
    let item_re = Regex::new(r"(?is)<item[\s>](.*?)</item>").expect("static regex");
    let title_re =
        Regex::new(r"(?is)<title>\s*(?:<!\[CDATA\[(.*?)\]\]>|(.*?))\s*</title>").expect("static regex");
    let link_re =
        Regex::new(r"(?is)<link>\s*(?:<!\[CDATA\[(.*?)\]\]>|(.*?))\s*</link>").expect("static regex");

    item_re
        .captures_iter(body)
        .filter_map(|item| {
            let inner = item.get(1)?.as_str();
            let title = first_capture(&title_re, inner)?;
            if !is_informative(&title) {
                return None;
            }
            Some(NewsItem {
                source: source.to_string(),
                title,
                link: first_capture(&link_re, inner).unwrap_or_default(),
            })
        })
        .take(limit)
        .collect()
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Filters out clickbait and contentless headlines.
pub fn is_informative(title: &str) -> bool {
    let clean = title.trim().to_lowercase();
    if clean.split_whitespace().count() < 4 {
        return false;
    }
    const CLICKBAIT_PATTERNS: &[&str] = &[
        r"\bwhat happened\b",
        r"\byou won'?t believe\b",
        r"\bcould change\b",
        r"\bshocking\b",
        r"\bamazing\b",
        r"\bthis is why\b",
        r"\bnumber \d+\b",
    ];
    !CLICKBAIT_PATTERNS
        .iter()
        .any(|p| Regex::new(p).expect("static regex").is_match(&clean))
}
