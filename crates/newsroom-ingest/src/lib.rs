//! Feed Poller (§4.3): fetches configured RSS/Atom feeds on a staggered
//! schedule, categorizes and fingerprints each new article, and inserts it
//! idempotently into the raw article store for the Clustering Engine to
//! pick up off the change feed.

pub mod feed_config;
pub mod fetcher;
pub mod poller;

pub use feed_config::{FeedEntry, FeedPollerConfig};
pub use fetcher::{ConditionalHeaders, FeedFetcher, FetchOutcome, ParsedEntry};
pub use poller::{FeedPoller, PollerStats};
