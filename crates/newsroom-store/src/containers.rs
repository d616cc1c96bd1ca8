//! Container names from §6. Kept as constants rather than an enum so new
//! containers can be added by callers without touching this crate.

pub const RAW_ARTICLES: &str = "raw_articles";
pub const STORY_CLUSTERS: &str = "story_clusters";
pub const LEASES: &str = "leases";
pub const FEED_POLL_STATES: &str = "feed_poll_states";
pub const BATCH_TRACKING: &str = "batch_tracking";

/// Lease prefixes (consumer-group identities) used by the two in-process
/// change-feed consumers.
pub const LEASE_CLUSTERING: &str = "clustering-engine";
pub const LEASE_SUMMARIZER: &str = "summarizer";
