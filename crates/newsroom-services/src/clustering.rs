//! Clustering Engine (F) — the hardest subsystem (§4.4): consumes the
//! article change feed and attaches each article to exactly one story.
//!
//! The retry-with-jittered-backoff-then-dead-letter shape mirrors the
//! teacher's `JobQueueService::execute_job` (exponential backoff, then a
//! terminal dead-letter state after repeated failure) and the change-feed
//! pull/checkpoint loop follows the same "poll, process, ack" shape as
//! `ScheduledPipelineRunner`'s interval tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use newsroom_core::clock::SharedClock;
use newsroom_core::error::Result;
use newsroom_core::fingerprint::{fingerprint, similarity};
use newsroom_core::ids::new_story_id;
use newsroom_core::models::{Article, SourceArticleRef, Story, StoryStatus};
use newsroom_store::containers::{LEASE_CLUSTERING, RAW_ARTICLES, STORY_CLUSTERS};
use newsroom_store::{ChangeFeedConsumer, Document, DocumentStore};
use rand::Rng;
use tokio::sync::watch;

use crate::status::{apply_status_transition, update_significance, StatusConfig, StatusTransitionObserver};

/// Anything the clustering engine needs out of the article store: point
/// reads/writes plus the change feed it consumes from.
pub trait ArticleStore: DocumentStore<Article> + ChangeFeedConsumer<Article> {}
impl<T: DocumentStore<Article> + ChangeFeedConsumer<Article>> ArticleStore for T {}

#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Candidate lookback window, default 72 hours.
    pub candidate_window: ChronoDuration,
    /// Attach threshold for fuzzy matching, default 0.30.
    pub attach_threshold: f64,
    pub candidate_limit: usize,
    pub max_attach_retries: u32,
    pub retry_backoff_min_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub max_batch_items: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            candidate_window: ChronoDuration::hours(72),
            attach_threshold: 0.30,
            candidate_limit: 100,
            max_attach_retries: 3,
            retry_backoff_min_ms: 10,
            retry_backoff_max_ms: 100,
            max_batch_items: 50,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClusteringStats {
    pub articles_attached: AtomicU64,
    pub stories_created: AtomicU64,
    pub duplicate_sources_rejected: AtomicU64,
    pub dead_lettered: AtomicU64,
}

pub struct ClusteringEngine {
    articles: Arc<dyn ArticleStore>,
    stories: Arc<dyn DocumentStore<Story>>,
    config: ClusteringConfig,
    status_config: StatusConfig,
    clock: SharedClock,
    observer: Arc<dyn StatusTransitionObserver>,
    pub stats: Arc<ClusteringStats>,
}

impl ClusteringEngine {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        stories: Arc<dyn DocumentStore<Story>>,
        config: ClusteringConfig,
        status_config: StatusConfig,
        clock: SharedClock,
        observer: Arc<dyn StatusTransitionObserver>,
    ) -> Self {
        Self { articles, stories, config, status_config, clock, observer, stats: Arc::new(ClusteringStats::default()) }
    }

    /// Pulls one batch off the article change feed, processes every entry,
    /// then checkpoints. A crash between processing and checkpoint simply
    /// causes redelivery; `process_article`'s skip guard makes that safe.
    pub async fn run_cycle(&self) -> Result<()> {
        let Some(batch) = self
            .articles
            .next_batch(RAW_ARTICLES, LEASE_CLUSTERING, self.config.max_batch_items)
            .await?
        else {
            return Ok(());
        };

        for entry in &batch.entries {
            self.process_article(&entry.doc).await;
        }

        self.articles.checkpoint(RAW_ARTICLES, LEASE_CLUSTERING, &batch).await
    }

    async fn process_article(&self, article: &Article) {
        let now = self.clock.now();

        if article.processed {
            if let Some(story_id) = &article.story_id {
                match self.stories.get(STORY_CLUSTERS, story_id, &article.category).await {
                    Ok(Some(story)) if story.source_articles.iter().any(|s| s.article_id == article.id) => {
                        return;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::error!(article = %article.id, %error, "skip-guard lookup failed");
                        return;
                    }
                }
            }
        }

        let candidates = match self.candidate_stories(article, now).await {
            Ok(c) => c,
            Err(error) => {
                tracing::error!(article = %article.id, %error, "failed fetching candidate stories");
                return;
            }
        };

        let article_fingerprint = fingerprint(&article.title);
        let exact_match = candidates.iter().find(|s| s.event_fingerprint == article_fingerprint).cloned();

        let matched = exact_match.or_else(|| {
            candidates
                .iter()
                .map(|s| (s, similarity(&article.title, &s.title)))
                .filter(|(_, sim)| *sim > self.config.attach_threshold)
                .max_by(|(sa, a), (sb, b)| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal).then_with(|| sa.last_updated.cmp(&sb.last_updated))
                })
                .map(|(s, _)| s.clone())
        });

        match matched {
            Some(story) => self.attach(article, story, now).await,
            None => self.create_story(article, now).await,
        }
    }

    async fn candidate_stories(&self, article: &Article, now: DateTime<Utc>) -> Result<Vec<Story>> {
        let cutoff = now - self.config.candidate_window;
        let mut stories = self
            .stories
            .query(STORY_CLUSTERS, Some(article.category.as_str()), &|s: &Story| s.last_updated >= cutoff)
            .await?;
        // The store's ORDER BY is known-defective (§9); sort in application code.
        stories.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        stories.truncate(self.config.candidate_limit);
        Ok(stories)
    }

    async fn attach(&self, article: &Article, story: Story, now: DateTime<Utc>) {
        if story.has_source(&article.source) {
            tracing::debug!(article = %article.id, story = %story.id, "duplicate source, rejecting attach");
            self.stats.duplicate_sources_rejected.fetch_add(1, Ordering::Relaxed);
            self.mark_processed(article, &story.id).await;
            return;
        }

        let mut current = story;
        for attempt in 0..self.config.max_attach_retries {
            if current.has_source(&article.source) {
                self.stats.duplicate_sources_rejected.fetch_add(1, Ordering::Relaxed);
                self.mark_processed(article, &current.id).await;
                return;
            }

            let mut updated = current.clone();
            updated.source_articles.push(SourceArticleRef {
                article_id: article.id.clone(),
                source: article.source.clone(),
                title: article.title.clone(),
                url: article.url.clone(),
                published_at: article.published_at,
            });
            updated.source_count += 1;
            updated.last_source_added_at = now;

            let sigma = update_significance(&current, &article.title, now);
            updated.update_significance = sigma;
            if sigma > 0.5 {
                updated.last_updated = now;
            }

            apply_status_transition(&mut updated, &self.status_config, now, self.observer.as_ref());

            let (_, etag) = match self.stories.get_with_etag(STORY_CLUSTERS, &current.id, &current.category).await {
                Ok(Some(pair)) => pair,
                Ok(None) => {
                    tracing::error!(story = %current.id, "story vanished mid-attach");
                    return;
                }
                Err(error) => {
                    tracing::error!(story = %current.id, %error, "failed re-reading story for etag");
                    return;
                }
            };

            match self.stories.upsert(STORY_CLUSTERS, updated.clone(), Some(&etag)).await {
                Ok(_) => {
                    self.stats.articles_attached.fetch_add(1, Ordering::Relaxed);
                    self.mark_processed(article, &updated.id).await;
                    return;
                }
                Err(_) => {
                    let backoff = jittered_backoff_ms(self.config.retry_backoff_min_ms, self.config.retry_backoff_max_ms);
                    tracing::warn!(story = %current.id, attempt, backoff, "optimistic concurrency conflict, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;

                    current = match self.stories.get(STORY_CLUSTERS, &current.id, &current.category).await {
                        Ok(Some(fresh)) => fresh,
                        _ => {
                            tracing::error!(story = %current.id, "story vanished during retry");
                            return;
                        }
                    };
                }
            }
        }

        self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
        tracing::error!(article = %article.id, story = %current.id, "attach dead-lettered after retries; awaiting redelivery");
    }

    async fn create_story(&self, article: &Article, now: DateTime<Utc>) {
        let story = Story {
            id: new_story_id(now),
            category: article.category.clone(),
            title: article.title.clone(),
            primary_source: article.source.clone(),
            source_articles: vec![SourceArticleRef {
                article_id: article.id.clone(),
                source: article.source.clone(),
                title: article.title.clone(),
                url: article.url.clone(),
                published_at: article.published_at,
            }],
            source_count: 1,
            event_fingerprint: fingerprint(&article.title),
            status: StoryStatus::Monitoring,
            created_at: now,
            last_updated: now,
            last_source_added_at: now,
            breaking_detected_at: None,
            update_significance: 0.0,
            summary: None,
            summary_attempts: 0,
            last_summary_error: None,
        };

        let story_id = story.id.clone();
        match self.stories.upsert(STORY_CLUSTERS, story, None).await {
            Ok(_) => {
                self.stats.stories_created.fetch_add(1, Ordering::Relaxed);
                self.mark_processed(article, &story_id).await;
            }
            Err(error) => {
                tracing::error!(article = %article.id, %error, "failed creating new story");
            }
        }
    }

    async fn mark_processed(&self, article: &Article, story_id: &str) {
        let mut updated = article.clone();
        updated.processed = true;
        updated.story_id = Some(story_id.to_string());
        if let Err(error) = self.articles.upsert(RAW_ARTICLES, updated, None).await {
            tracing::error!(article = %article.id, %error, "failed marking article processed");
        }
    }

    pub fn start(self: Arc<Self>, cycle_period: std::time::Duration, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cycle_period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(error) = self.run_cycle().await {
                            tracing::error!(%error, "clustering cycle failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("clustering engine shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

fn jittered_backoff_ms(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_core::clock::FixedClock;
    use newsroom_store::memory::InMemoryStore;

    use crate::status::NoopObserver;

    fn sample_article(id: &str, source: &str, title: &str) -> Article {
        Article {
            id: id.to_string(),
            source: source.to_string(),
            source_name: source.to_string(),
            title: title.to_string(),
            description: "d".to_string(),
            url: format!("https://example.com/{id}"),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            category: "world".to_string(),
            category_confidence: 0.9,
            story_fingerprint: fingerprint(title),
            processed: false,
            story_id: None,
        }
    }

    fn engine() -> (ClusteringEngine, Arc<InMemoryStore<Article>>, Arc<InMemoryStore<Story>>) {
        let articles = Arc::new(InMemoryStore::<Article>::new());
        let stories = Arc::new(InMemoryStore::<Story>::new());
        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        let engine = ClusteringEngine::new(
            articles.clone(),
            stories.clone(),
            ClusteringConfig::default(),
            StatusConfig::default(),
            clock,
            Arc::new(NoopObserver),
        );
        (engine, articles, stories)
    }

    #[tokio::test]
    async fn first_article_creates_a_monitoring_story() {
        let (engine, articles, stories) = engine();
        let article = sample_article("a1", "bbc", "Major earthquake hits California coast");
        articles.upsert(RAW_ARTICLES, article.clone(), None).await.unwrap();

        engine.run_cycle().await.unwrap();

        let all = stories.query(STORY_CLUSTERS, None, &|_: &Story| true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_count, 1);
        assert_eq!(all[0].status, StoryStatus::Monitoring);
    }

    #[tokio::test]
    async fn paraphrase_attaches_to_existing_story() {
        let (engine, articles, stories) = engine();
        articles
            .upsert(RAW_ARTICLES, sample_article("a1", "bbc", "Major earthquake hits California coast"), None)
            .await
            .unwrap();
        engine.run_cycle().await.unwrap();

        articles
            .upsert(RAW_ARTICLES, sample_article("a2", "reuters", "Magnitude 7.2 earthquake strikes California"), None)
            .await
            .unwrap();
        engine.run_cycle().await.unwrap();

        let all = stories.query(STORY_CLUSTERS, None, &|_: &Story| true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_count, 2);
        assert_eq!(all[0].status, StoryStatus::Developing);
    }

    #[tokio::test]
    async fn duplicate_source_does_not_grow_story() {
        let (engine, articles, stories) = engine();
        articles
            .upsert(RAW_ARTICLES, sample_article("a1", "bbc", "Major earthquake hits California coast"), None)
            .await
            .unwrap();
        engine.run_cycle().await.unwrap();

        articles
            .upsert(RAW_ARTICLES, sample_article("a4", "bbc", "Major earthquake hits California coast"), None)
            .await
            .unwrap();
        engine.run_cycle().await.unwrap();

        let all = stories.query(STORY_CLUSTERS, None, &|_: &Story| true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_count, 1);

        let a4 = articles.get(RAW_ARTICLES, "a4", "world").await.unwrap().unwrap();
        assert!(a4.processed);
    }

    #[tokio::test]
    async fn redelivery_of_an_attached_article_is_idempotent() {
        let (engine, articles, stories) = engine();
        articles
            .upsert(RAW_ARTICLES, sample_article("a1", "bbc", "Major earthquake hits California coast"), None)
            .await
            .unwrap();
        engine.run_cycle().await.unwrap();

        let story_before = stories.query(STORY_CLUSTERS, None, &|_: &Story| true).await.unwrap().remove(0);

        // Simulate redelivery: article already marked processed, feed it again directly.
        let processed = articles.get(RAW_ARTICLES, "a1", "world").await.unwrap().unwrap();
        engine.process_article(&processed).await;

        let story_after = stories.get(STORY_CLUSTERS, &story_before.id, &story_before.category).await.unwrap().unwrap();
        assert_eq!(story_after.source_count, story_before.source_count);
    }
}
