//! Static feed list and poller tunables (§4.3).

use serde::{Deserialize, Serialize};

/// One configured feed source: `{id, url, source_id, category_hint, poll_period_seconds}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub url: String,
    pub source_id: String,
    pub category_hint: Option<String>,
    pub poll_period_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPollerConfig {
    /// Global cycle period `C`, default 10 seconds.
    pub cycle_period_seconds: u64,
    /// Per-cycle batch size `B`, default 5.
    pub batch_size: usize,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    /// Cap on the exponential backoff window, default 5 minutes.
    pub max_backoff_seconds: i64,
    pub feeds: Vec<FeedEntry>,
}

impl Default for FeedPollerConfig {
    fn default() -> Self {
        Self {
            cycle_period_seconds: 10,
            batch_size: 5,
            user_agent: "NewsroomFeedPoller/1.0".to_string(),
            request_timeout_seconds: 10,
            max_backoff_seconds: 300,
            feeds: Vec::new(),
        }
    }
}
