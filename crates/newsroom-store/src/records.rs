//! `Document` impls for the core domain types, plus the two store-only
//! record types named in §6 (`feed_poll_states`, `batch_tracking`) that
//! don't belong in `newsroom-core` because nothing outside the poller and
//! the summarizer's batch path ever touches them directly.

use chrono::{DateTime, Utc};
use newsroom_core::models::{Article, Story};
use serde::{Deserialize, Serialize};

use crate::document_store::Document;

impl Document for Article {
    fn doc_id(&self) -> String {
        self.id.clone()
    }

    fn partition(&self) -> String {
        self.category.clone()
    }
}

impl Document for Story {
    fn doc_id(&self) -> String {
        self.id.clone()
    }

    fn partition(&self) -> String {
        self.category.clone()
    }
}

/// Per-feed scheduling state, owned exclusively by the Feed Poller
/// coordinator (§5: "The poll-state store is written only by the Feed
/// Poller coordinator").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollState {
    pub feed_id: String,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub next_due_at: DateTime<Utc>,
    pub failure_count: u32,
    pub backoff_until: Option<DateTime<Utc>>,
    pub etag_header: Option<String>,
    pub last_modified_header: Option<String>,
}

impl Document for PollState {
    fn doc_id(&self) -> String {
        self.feed_id.clone()
    }

    fn partition(&self) -> String {
        self.feed_id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchJobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

/// The `{batch_id, status, submitted_at, story_ids[], cost_estimate}`
/// record described in §4.6's batch mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchTracking {
    pub batch_id: String,
    pub status: BatchJobStatus,
    pub submitted_at: DateTime<Utc>,
    pub story_ids: Vec<String>,
    pub cost_estimate: f64,
}

impl Document for BatchTracking {
    fn doc_id(&self) -> String {
        self.batch_id.clone()
    }

    fn partition(&self) -> String {
        self.batch_id.clone()
    }
}
