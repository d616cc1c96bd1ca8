//! Feed Poller (E): staggered scheduling coordinator over configured feeds
//! (§4.3). The stop-flag/interval-loop shape generalizes the teacher's
//! `ScheduledPipelineRunner`/`ScheduledPipelineHandle` pair, swapped for a
//! `tokio::sync::watch` channel so shutdown is cooperative rather than
//! polled through an `RwLock<bool>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use newsroom_core::categorizer::{self, CategoryTables};
use newsroom_core::clock::SharedClock;
use newsroom_core::fingerprint;
use newsroom_core::ids::article_id;
use newsroom_core::models::Article;
use newsroom_store::containers::{FEED_POLL_STATES, RAW_ARTICLES};
use newsroom_store::records::PollState;
use newsroom_store::DocumentStore;
use tokio::sync::watch;

use crate::feed_config::{FeedEntry, FeedPollerConfig};
use crate::fetcher::{ConditionalHeaders, FeedFetcher, FetchOutcome};

#[derive(Debug, Default)]
pub struct PollerStats {
    pub cycles_run: AtomicU64,
    pub feeds_polled: AtomicU64,
    pub articles_ingested: AtomicU64,
    pub duplicates_skipped: AtomicU64,
    pub network_failures: AtomicU64,
}

pub struct FeedPoller {
    poll_states: Arc<dyn DocumentStore<PollState>>,
    articles: Arc<dyn DocumentStore<Article>>,
    fetcher: FeedFetcher,
    config: FeedPollerConfig,
    clock: SharedClock,
    tables: CategoryTables,
    pub stats: Arc<PollerStats>,
}

impl FeedPoller {
    pub fn new(
        poll_states: Arc<dyn DocumentStore<PollState>>,
        articles: Arc<dyn DocumentStore<Article>>,
        config: FeedPollerConfig,
        clock: SharedClock,
        tables: CategoryTables,
    ) -> Self {
        let fetcher = FeedFetcher::new(&config);
        Self { poll_states, articles, fetcher, config, clock, tables, stats: Arc::new(PollerStats::default()) }
    }

    /// Runs one scheduling cycle: select up to `B` due feeds, commit their
    /// next-due timestamp, then fetch each independently.
    pub async fn run_cycle(&self) {
        self.stats.cycles_run.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();

        let due = match self.select_due_feeds(now).await {
            Ok(feeds) => feeds,
            Err(error) => {
                tracing::error!(%error, "failed selecting due feeds");
                return;
            }
        };

        let futures = due.into_iter().map(|(feed, state)| self.poll_one(feed, state));
        futures::future::join_all(futures).await;
    }

    async fn select_due_feeds(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<Vec<(FeedEntry, PollState)>> {
        let mut candidates = Vec::new();

        for feed in &self.config.feeds {
            let state = match self.poll_states.get(FEED_POLL_STATES, &feed.id, &feed.id).await? {
                Some(state) => state,
                None => PollState {
                    feed_id: feed.id.clone(),
                    last_poll_at: None,
                    next_due_at: now,
                    failure_count: 0,
                    backoff_until: None,
                    etag_header: None,
                    last_modified_header: None,
                },
            };

            let due = state.next_due_at <= now && state.backoff_until.map(|b| now >= b).unwrap_or(true);
            if due {
                candidates.push((feed.clone(), state));
            }
        }

        candidates.sort_by_key(|(_, state)| state.last_poll_at.unwrap_or(chrono::DateTime::<Utc>::MIN_UTC));
        candidates.truncate(self.config.batch_size);

        for (feed, state) in &candidates {
            let mut committed = state.clone();
            committed.next_due_at = now + ChronoDuration::seconds(feed.poll_period_seconds);
            self.poll_states.upsert(FEED_POLL_STATES, committed, None).await?;
        }

        Ok(candidates)
    }

    async fn poll_one(&self, feed: FeedEntry, state: PollState) {
        self.stats.feeds_polled.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let cached =
            ConditionalHeaders { etag: state.etag_header.clone(), last_modified: state.last_modified_header.clone() };

        let outcome = self.fetcher.fetch(&feed, &cached).await;

        let mut next_state = state.clone();
        next_state.last_poll_at = Some(now);

        match outcome {
            Ok(FetchOutcome::NotModified) => {
                next_state.failure_count = 0;
                tracing::debug!(feed = %feed.id, "feed not modified");
            }
            Ok(FetchOutcome::Entries { entries, etag, last_modified }) => {
                next_state.failure_count = 0;
                next_state.etag_header = etag;
                next_state.last_modified_header = last_modified;
                self.ingest_entries(&feed, entries).await;
            }
            Err(error) => {
                next_state.failure_count += 1;
                let backoff_secs = (30.0 * 2f64.powi(next_state.failure_count as i32))
                    .min(self.config.max_backoff_seconds as f64) as i64;
                next_state.backoff_until = Some(now + ChronoDuration::seconds(backoff_secs));
                self.stats.network_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(feed = %feed.id, %error, failure_count = next_state.failure_count, "feed fetch failed");
            }
        }

        if let Err(error) = self.poll_states.upsert(FEED_POLL_STATES, next_state, None).await {
            tracing::error!(feed = %feed.id, %error, "failed to persist poll state");
        }
    }

    async fn ingest_entries(&self, feed: &FeedEntry, entries: Vec<crate::fetcher::ParsedEntry>) {
        for entry in entries {
            let id = article_id(&feed.source_id, &entry.canonical_url);
            let result = categorizer::categorize(&self.tables, &entry.title, &entry.description, &entry.canonical_url, &feed.source_id);
            let fp = fingerprint::fingerprint(&entry.title);

            let article = Article {
                id,
                source: feed.source_id.clone(),
                source_name: feed.source_id.clone(),
                title: entry.title,
                description: entry.description,
                url: entry.canonical_url,
                published_at: entry.published_at,
                fetched_at: self.clock.now(),
                category: feed.category_hint.clone().unwrap_or(result.category),
                category_confidence: result.confidence,
                story_fingerprint: fp,
                processed: false,
                story_id: None,
            };

            match self.articles.insert_if_absent(RAW_ARTICLES, article).await {
                Ok(Some(_)) => {
                    self.stats.articles_ingested.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    self.stats.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    tracing::error!(feed = %feed.id, %error, "failed to insert article");
                }
            }
        }
    }

    /// Spawns the interval loop; stops cooperatively when `shutdown` flips to `true`.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.cycle_period_seconds));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("feed poller shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_core::clock::FixedClock;
    use newsroom_store::memory::InMemoryStore;

    fn poller_with_feeds(feeds: Vec<FeedEntry>) -> FeedPoller {
        let poll_states: Arc<dyn DocumentStore<PollState>> = Arc::new(InMemoryStore::new());
        let articles: Arc<dyn DocumentStore<Article>> = Arc::new(InMemoryStore::new());
        let config = FeedPollerConfig { feeds, ..Default::default() };
        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        FeedPoller::new(poll_states, articles, config, clock, CategoryTables::seed())
    }

    #[tokio::test]
    async fn select_due_feeds_respects_batch_size() {
        let feeds: Vec<FeedEntry> = (0..10)
            .map(|i| FeedEntry {
                id: format!("f{i}"),
                url: format!("https://example.com/{i}.xml"),
                source_id: "example".to_string(),
                category_hint: None,
                poll_period_seconds: 60,
            })
            .collect();
        let poller = poller_with_feeds(feeds);
        let now = poller.clock.now();
        let due = poller.select_due_feeds(now).await.unwrap();
        assert_eq!(due.len(), poller.config.batch_size);
    }
}
