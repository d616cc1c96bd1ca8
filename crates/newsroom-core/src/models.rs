//! The Article/Story data model (§3). These are plain data types — the
//! document store treats them as opaque JSON documents (see
//! `newsroom-store::document_store::Document`), and every mutation goes
//! through the store's upsert-with-concurrency-check contract, never a
//! direct field assignment outside the owning component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single source's rendering of a news event. Immutable after insert
/// except for `processed` and `story_id`, which the Clustering Engine sets
/// once it attaches the article to a story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// `hash(source + canonical_url)`, stable across re-fetches of the same item.
    pub id: String,
    pub source: String,
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub category: String,
    pub category_confidence: f64,
    pub story_fingerprint: String,
    pub processed: bool,
    pub story_id: Option<String>,
}

impl Article {
    pub fn partition_key(&self) -> &str {
        &self.category
    }
}

/// The verification state of a story. Ordered as it is intended to be
/// traversed: `MONITORING -> DEVELOPING -> {VERIFIED, BREAKING}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoryStatus {
    Monitoring,
    Developing,
    Verified,
    Breaking,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => "MONITORING",
            Self::Developing => "DEVELOPING",
            Self::Verified => "VERIFIED",
            Self::Breaking => "BREAKING",
        }
    }
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A denormalized reference to one of a story's contributing articles,
/// in the order it was attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceArticleRef {
    pub article_id: String,
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// A generated summary and the source-count version it was generated at.
/// §3 invariant 5: valid only while `version == source_count`; stale once
/// the story gains another source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub text: String,
    pub version: usize,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub word_count: usize,
}

/// A cluster of articles believed to describe the same event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: String,
    pub category: String,
    pub title: String,
    pub primary_source: String,
    pub source_articles: Vec<SourceArticleRef>,
    pub source_count: usize,
    pub event_fingerprint: String,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_source_added_at: DateTime<Utc>,
    pub breaking_detected_at: Option<DateTime<Utc>>,
    pub update_significance: f64,
    pub summary: Option<Summary>,
    pub summary_attempts: u32,
    pub last_summary_error: Option<String>,
}

impl Story {
    /// Invariant 2: at most one `source_articles` entry per `source` id.
    pub fn has_source(&self, source: &str) -> bool {
        self.source_articles.iter().any(|s| s.source == source)
    }

    /// Invariant 1, checked defensively rather than trusted.
    pub fn source_count_matches(&self) -> bool {
        self.source_count == self.source_articles.len()
    }

    pub fn partition_key(&self) -> &str {
        &self.category
    }

    /// §3 invariant 4: a BREAKING story must have at least 3 sources and a
    /// recent `last_source_added_at`. Used by tests and by the status
    /// transitioner's own self-check after a transition.
    pub fn satisfies_breaking_invariant(&self, breaking_window: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.status != StoryStatus::Breaking {
            return true;
        }
        self.source_count >= 3 && (now - self.last_source_added_at) <= breaking_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article(id: &str, source: &str) -> SourceArticleRef {
        SourceArticleRef {
            article_id: id.to_string(),
            source: source.to_string(),
            title: "t".to_string(),
            url: "u".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn has_source_detects_duplicates() {
        let story = Story {
            id: "s1".into(),
            category: "world".into(),
            title: "t".into(),
            primary_source: "bbc".into(),
            source_articles: vec![sample_article("a1", "bbc")],
            source_count: 1,
            event_fingerprint: "abcd1234".into(),
            status: StoryStatus::Monitoring,
            created_at: Utc::now(),
            last_updated: Utc::now(),
            last_source_added_at: Utc::now(),
            breaking_detected_at: None,
            update_significance: 0.0,
            summary: None,
            summary_attempts: 0,
            last_summary_error: None,
        };
        assert!(story.has_source("bbc"));
        assert!(!story.has_source("reuters"));
        assert!(story.source_count_matches());
    }
}
