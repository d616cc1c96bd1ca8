//! HTTP fetch + RSS/Atom parsing for a single feed (§4.3 "Fetching").
//!
//! Client construction mirrors the teacher's `RedditMonitor::new` —
//! a `reqwest::Client` built once with a user agent and a fixed timeout.

use anyhow::Context;
use chrono::{DateTime, Utc};
use newsroom_core::ids::canonicalize_url;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};

use crate::feed_config::{FeedEntry, FeedPollerConfig};

/// An entry parsed out of a feed, prior to categorization/fingerprinting.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub canonical_url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub guid: String,
    pub media_url: Option<String>,
}

/// Conditional-GET caching headers carried on `PollState`.
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

pub enum FetchOutcome {
    /// `304 Not Modified` — a success with zero articles.
    NotModified,
    Entries {
        entries: Vec<ParsedEntry>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &FeedPollerConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()
            .expect("failed to build feed fetcher HTTP client");
        Self { client }
    }

    pub async fn fetch(
        &self,
        feed: &FeedEntry,
        cached: &ConditionalHeaders,
    ) -> anyhow::Result<FetchOutcome> {
        let mut request = self.client.get(&feed.url);
        if let Some(etag) = &cached.etag {
            request = request.header(IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = &cached.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified.clone());
        }

        let response = request.send().await.context(format!("fetching feed {}", feed.id))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        if !response.status().is_success() {
            anyhow::bail!("feed {} returned HTTP {}", feed.id, response.status());
        }

        let etag = response.headers().get(ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
        let last_modified =
            response.headers().get(LAST_MODIFIED).and_then(|v| v.to_str().ok()).map(str::to_string);

        let body = response.bytes().await.context("reading feed body")?;
        let entries = parse_feed_bytes(&body)?;

        Ok(FetchOutcome::Entries { entries, etag, last_modified })
    }
}

/// Parses RSS 2.0 or Atom into a flat entry list. Feed-level parse failures
/// bubble up; they are treated by the caller as a successful, empty fetch
/// per §4.3's "parse errors are swallowed at source" rule.
pub fn parse_feed_bytes(bytes: &[u8]) -> anyhow::Result<Vec<ParsedEntry>> {
    let feed = feed_rs::parser::parse(bytes).context("parsing feed body")?;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| t.content)?;
            let link = entry.links.first().map(|l| l.href.clone())?;
            let description = entry.summary.map(|s| s.content).unwrap_or_default();
            let published_at = entry.published.or(entry.updated).unwrap_or_else(Utc::now);
            let media_url = entry.media.first().and_then(|m| m.content.first()).and_then(|c| c.url.clone()).map(|u| u.to_string());

            Some(ParsedEntry {
                title,
                canonical_url: canonicalize_url(&link),
                description,
                published_at,
                guid: entry.id,
                media_url,
            })
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>Major earthquake hits California coast</title>
      <link>https://example.com/a?utm_source=rss</link>
      <description>A quake struck the coast.</description>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items_into_entries() {
        let entries = parse_feed_bytes(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Major earthquake hits California coast");
        assert_eq!(entries[0].canonical_url, "https://example.com/a");
    }

    #[test]
    fn malformed_feed_is_a_parse_error_not_a_panic() {
        let result = parse_feed_bytes(b"not a feed");
        assert!(result.is_err());
    }
}
