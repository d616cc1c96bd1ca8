//! Summarizer (H, §4.6): attaches/refreshes `Story::summary` under a cost
//! cap. The bounded-queue-plus-worker-pool-plus-per-item-mutex shape follows
//! `job_queue.rs`'s `JobQueueService`; the sweep-with-progress shape for the
//! backfill path follows `backfill_orchestrator.rs`'s running-guard +
//! batched-loop; the cost-ceiling gate follows `circuit_breaker.rs`'s
//! open/closed metrics-callback shape, with `BudgetExceeded` standing in
//! for `CircuitOpen`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::{DashMap, DashSet};
use newsroom_core::clock::SharedClock;
use newsroom_core::error::{NewsroomError, Result};
use newsroom_core::models::{Story, Summary};
use newsroom_store::containers::{LEASE_SUMMARIZER, STORY_CLUSTERS};
use newsroom_store::{ChangeFeedConsumer, DocumentStore};
use prometheus::{CounterVec, Gauge, Opts, Registry};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Semaphore};

use crate::llm::{LlmProvider, SummarizeRequest};

pub trait StoryStore: DocumentStore<Story> + ChangeFeedConsumer<Story> {}
impl<T: DocumentStore<Story> + ChangeFeedConsumer<Story>> StoryStore for T {}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub call_timeout: StdDuration,
    pub max_retries: u32,
    pub model: String,
    pub backfill_window: ChronoDuration,
    pub backfill_sweep_interval: StdDuration,
    pub cost_ceiling_per_hour: f64,
    pub batch_queue_depth_threshold: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1000,
            call_timeout: StdDuration::from_secs(30),
            max_retries: 2,
            model: "gpt-4o-mini".to_string(),
            backfill_window: ChronoDuration::hours(4),
            backfill_sweep_interval: StdDuration::from_secs(600),
            cost_ceiling_per_hour: 5.0,
            batch_queue_depth_threshold: 200,
        }
    }
}

fn needs_summary(story: &Story) -> bool {
    if story.source_count == 0 || story.status == newsroom_core::models::StoryStatus::Monitoring {
        return false;
    }
    match &story.summary {
        None => true,
        Some(summary) => summary.version < story.source_count,
    }
}

/// Process-local rolling-hour spend tracker (§5: a distributed counter is
/// acceptable under horizontal scale, not required for correctness).
pub struct CostMeter {
    ceiling_per_hour: f64,
    window_start: StdMutex<DateTime<Utc>>,
    spent: StdMutex<f64>,
}

impl CostMeter {
    pub fn new(ceiling_per_hour: f64, now: DateTime<Utc>) -> Self {
        Self { ceiling_per_hour, window_start: StdMutex::new(now), spent: StdMutex::new(0.0) }
    }

    fn roll_window_if_expired(&self, now: DateTime<Utc>) {
        let mut start = self.window_start.lock().expect("cost meter lock poisoned");
        if now - *start >= ChronoDuration::hours(1) {
            *start = now;
            *self.spent.lock().expect("cost meter lock poisoned") = 0.0;
        }
    }

    pub fn record(&self, cost: f64, now: DateTime<Utc>) {
        self.roll_window_if_expired(now);
        *self.spent.lock().expect("cost meter lock poisoned") += cost;
    }

    pub fn over_budget(&self, now: DateTime<Utc>) -> bool {
        self.roll_window_if_expired(now);
        *self.spent.lock().expect("cost meter lock poisoned") >= self.ceiling_per_hour
    }
}

pub struct SummarizerMetrics {
    generated_total: CounterVec,
    failed_total: CounterVec,
    budget_exceeded_total: prometheus::Counter,
    queue_depth: Gauge,
}

impl SummarizerMetrics {
    pub fn new(registry: &Registry) -> std::result::Result<Self, prometheus::Error> {
        let generated_total = CounterVec::new(
            Opts::new("summarizer_generated_total", "Total summaries generated")
                .namespace("newsroom")
                .subsystem("summarizer"),
            &["outcome"],
        )?;
        let failed_total = CounterVec::new(
            Opts::new("summarizer_failed_total", "Total summary generation failures")
                .namespace("newsroom")
                .subsystem("summarizer"),
            &["reason"],
        )?;
        let budget_exceeded_total = prometheus::Counter::with_opts(
            Opts::new("summarizer_budget_exceeded_total", "Times the cost ceiling paused the dispatcher")
                .namespace("newsroom")
                .subsystem("summarizer"),
        )?;
        let queue_depth = Gauge::with_opts(
            Opts::new("summarizer_queue_depth", "Stories currently queued for summarization")
                .namespace("newsroom")
                .subsystem("summarizer"),
        )?;

        registry.register(Box::new(generated_total.clone()))?;
        registry.register(Box::new(failed_total.clone()))?;
        registry.register(Box::new(budget_exceeded_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self { generated_total, failed_total, budget_exceeded_total, queue_depth })
    }

    fn record_generated(&self) {
        self.generated_total.with_label_values(&["success"]).inc();
    }

    fn record_failed(&self, reason: &str) {
        self.failed_total.with_label_values(&[reason]).inc();
    }

    fn record_budget_exceeded(&self) {
        self.budget_exceeded_total.inc();
    }
}

#[derive(Debug, Default)]
pub struct SummarizerStats {
    pub enqueued: AtomicU64,
    pub generated: AtomicU64,
    pub skipped_stale: AtomicU64,
    pub skipped_over_budget: AtomicU64,
    pub failed: AtomicU64,
}

pub struct Summarizer {
    stories: Arc<dyn StoryStore>,
    llm: Arc<dyn LlmProvider>,
    config: SummarizerConfig,
    clock: SharedClock,
    cost_meter: Arc<CostMeter>,
    metrics: Arc<SummarizerMetrics>,
    queued: Arc<DashSet<String>>,
    /// Per-story-id mutex map: `generate_for_story` holds its story's lock
    /// for the whole call, so a story re-enqueued mid-generation blocks
    /// until the in-flight generation finishes instead of racing it.
    in_flight: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
    tx: mpsc::Sender<String>,
    rx: Arc<AsyncMutex<mpsc::Receiver<String>>>,
    call_semaphore: Arc<Semaphore>,
    pub stats: Arc<SummarizerStats>,
}

impl Summarizer {
    pub fn new(
        stories: Arc<dyn StoryStore>,
        llm: Arc<dyn LlmProvider>,
        config: SummarizerConfig,
        clock: SharedClock,
        metrics: Arc<SummarizerMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let now = clock.now();
        let cost_meter = Arc::new(CostMeter::new(config.cost_ceiling_per_hour, now));
        let call_semaphore = Arc::new(Semaphore::new(config.worker_count));
        Self {
            stories,
            llm,
            config,
            clock,
            cost_meter,
            metrics,
            queued: Arc::new(DashSet::new()),
            in_flight: Arc::new(DashMap::new()),
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            call_semaphore,
            stats: Arc::new(SummarizerStats::default()),
        }
    }

    /// Coalescing enqueue: a story already queued is a no-op, since the
    /// worker re-reads current story state at generation time anyway.
    pub fn enqueue(&self, story_id: String) {
        if self.queued.insert(story_id.clone()) {
            self.metrics.queue_depth.set(self.queued.len() as f64);
            self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            if self.tx.try_send(story_id.clone()).is_err() {
                tracing::warn!(story = %story_id, "summarizer queue full, dropping enqueue");
                self.queued.remove(&story_id);
            }
        }
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let story_id = {
                let mut rx = self.rx.lock().await;
                match rx.recv().await {
                    Some(id) => id,
                    None => return,
                }
            };
            self.queued.remove(&story_id);
            self.metrics.queue_depth.set(self.queued.len() as f64);
            self.generate_for_story(&story_id).await;
        }
    }

    async fn generate_for_story(&self, story_id: &str) {
        let lock = self.in_flight.entry(story_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();
        let _guard = lock.lock().await;

        let now = self.clock.now();
        if self.cost_meter.over_budget(now) {
            self.stats.skipped_over_budget.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_budget_exceeded();
            tracing::warn!(story = %story_id, "summarizer cost ceiling reached, deferring to next window");
            return;
        }

        let story = match self.stories.query(STORY_CLUSTERS, None, &|s: &Story| s.id == story_id).await {
            Ok(mut matches) if !matches.is_empty() => matches.remove(0),
            Ok(_) => return,
            Err(error) => {
                tracing::error!(story = %story_id, %error, "failed re-reading story before generation");
                return;
            }
        };

        if !needs_summary(&story) {
            self.stats.skipped_stale.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let permit = match self.call_semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };

        let version_at_generation = story.source_count;
        let category = story.category.clone();
        let prompt = build_prompt(&story);
        let result = self.call_with_retry(story_id, &prompt).await;
        drop(permit);

        match result {
            Ok(response) => {
                self.cost_meter.record(response.cost_estimate, self.clock.now());
                self.commit_summary(&category, story_id, version_at_generation, response).await;
            }
            Err(error) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_failed(error.error_code());
                self.record_failure(&category, story_id, &error).await;
            }
        }
    }

    async fn call_with_retry(&self, story_id: &str, prompt: &str) -> Result<crate::llm::SummarizeResponse> {
        let mut attempt = 0;
        loop {
            let request = SummarizeRequest {
                story_id: story_id.to_string(),
                prompt: prompt.to_string(),
                model: self.config.model.clone(),
                timeout: self.config.call_timeout,
            };
            match self.llm.summarize(request).await {
                Ok(response) => return Ok(response),
                Err(error @ NewsroomError::ContentPolicyRefusal { .. }) => return Err(error),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff_ms = 200u64 * 2u64.pow(attempt);
                    tracing::warn!(story = %story_id, attempt, %error, "LLM call failed, retrying");
                    tokio::time::sleep(StdDuration::from_millis(backoff_ms)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn commit_summary(&self, category: &str, story_id: &str, version: usize, response: crate::llm::SummarizeResponse) {
        for _ in 0..3 {
            let (story, etag) = match self.stories.get_with_etag(STORY_CLUSTERS, story_id, category).await {
                Ok(Some(pair)) => pair,
                Ok(None) => return,
                Err(error) => {
                    tracing::error!(story = %story_id, %error, "failed re-reading story before summary commit");
                    return;
                }
            };

            let mut updated = story;
            updated.summary = Some(Summary {
                text: response.text.clone(),
                version,
                generated_at: self.clock.now(),
                model: self.config.model.clone(),
                word_count: response.text.split_whitespace().count(),
            });

            match self.stories.upsert(STORY_CLUSTERS, updated, Some(&etag)).await {
                Ok(_) => {
                    self.stats.generated.fetch_add(1, Ordering::Relaxed);
                    self.metrics.record_generated();
                    return;
                }
                Err(NewsroomError::PreconditionFailed { .. }) => continue,
                Err(error) => {
                    tracing::error!(story = %story_id, %error, "failed committing summary");
                    return;
                }
            }
        }
        tracing::error!(story = %story_id, "summary commit dropped after repeated optimistic-concurrency conflicts");
    }

    async fn record_failure(&self, category: &str, story_id: &str, error: &NewsroomError) {
        if let Ok(Some(mut story)) = self.stories.get(STORY_CLUSTERS, story_id, category).await {
            story.summary_attempts += 1;
            story.last_summary_error = Some(error.to_string());
            if let Err(error) = self.stories.upsert(STORY_CLUSTERS, story, None).await {
                tracing::error!(story = %story_id, %error, "failed recording summary failure");
            }
        }
    }

    /// Enqueues every story still matching the summary condition whose
    /// `last_updated` falls inside the backfill window.
    pub async fn run_backfill_sweep(&self) {
        let now = self.clock.now();
        let cutoff = now - self.config.backfill_window;
        let candidates = match self
            .stories
            .query(STORY_CLUSTERS, None, &|s: &Story| s.last_updated >= cutoff && needs_summary(s))
            .await
        {
            Ok(c) => c,
            Err(error) => {
                tracing::error!(%error, "backfill sweep query failed");
                return;
            }
        };

        tracing::info!(count = candidates.len(), "backfill sweep enqueuing stories");
        for story in candidates {
            self.enqueue(story.id);
        }
    }

    /// Consumes the story change feed, enqueuing any upsert that still
    /// matches the summary condition.
    pub async fn run_change_feed_cycle(&self) -> Result<()> {
        let Some(batch) = self.stories.next_batch(STORY_CLUSTERS, LEASE_SUMMARIZER, 100).await? else {
            return Ok(());
        };

        for entry in &batch.entries {
            if needs_summary(&entry.doc) {
                self.enqueue(entry.doc.id.clone());
            }
        }

        self.stories.checkpoint(STORY_CLUSTERS, LEASE_SUMMARIZER, &batch).await
    }

    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        for _ in 0..self.config.worker_count {
            let worker = self.clone();
            handles.push(tokio::spawn(async move { worker.worker_loop().await }));
        }

        let change_feed_self = self.clone();
        let mut change_feed_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(2));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(error) = change_feed_self.run_change_feed_cycle().await {
                            tracing::error!(%error, "summarizer change-feed cycle failed");
                        }
                    }
                    _ = change_feed_shutdown.changed() => {
                        if *change_feed_shutdown.borrow() { break; }
                    }
                }
            }
        }));

        let backfill_self = self.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(backfill_self.config.backfill_sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        backfill_self.run_backfill_sweep().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() { break; }
                    }
                }
            }
        }));

        handles
    }
}

fn build_prompt(story: &Story) -> String {
    let mut sources = story.source_articles.clone();
    sources.sort_by_key(|s| s.published_at);
    let mut prompt = format!("Summarize the following news event titled \"{}\":\n\n", story.title);
    for source in &sources {
        prompt.push_str(&format!("- [{}] {}\n", source.source, source.title));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_core::clock::FixedClock;
    use newsroom_core::models::{SourceArticleRef, StoryStatus};
    use newsroom_store::memory::InMemoryStore;

    use crate::llm::MockLlmProvider;

    fn sample_story(source_count: usize, summary: Option<Summary>) -> Story {
        let now = Utc::now();
        Story {
            id: "s1".into(),
            category: "world".into(),
            title: "Major earthquake hits California coast".into(),
            primary_source: "bbc".into(),
            source_articles: (0..source_count)
                .map(|i| SourceArticleRef {
                    article_id: format!("a{i}"),
                    source: format!("src{i}"),
                    title: "t".into(),
                    url: "u".into(),
                    published_at: now,
                })
                .collect(),
            source_count,
            event_fingerprint: "abcd1234".into(),
            status: StoryStatus::Developing,
            created_at: now,
            last_updated: now,
            last_source_added_at: now,
            breaking_detected_at: None,
            update_significance: 0.0,
            summary,
            summary_attempts: 0,
            last_summary_error: None,
        }
    }

    fn build_summarizer(stories: Arc<InMemoryStore<Story>>) -> Arc<Summarizer> {
        let registry = Registry::new();
        let metrics = Arc::new(SummarizerMetrics::new(&registry).unwrap());
        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        Arc::new(Summarizer::new(stories, Arc::new(MockLlmProvider::default()), SummarizerConfig::default(), clock, metrics))
    }

    #[test]
    fn needs_summary_skips_monitoring_stories() {
        let mut story = sample_story(1, None);
        story.status = StoryStatus::Monitoring;
        assert!(!needs_summary(&story));
    }

    #[test]
    fn needs_summary_true_when_version_behind_source_count() {
        let story = sample_story(
            3,
            Some(Summary { text: "old".into(), version: 2, generated_at: Utc::now(), model: "m".into(), word_count: 1 }),
        );
        assert!(needs_summary(&story));
    }

    #[test]
    fn needs_summary_false_when_version_current() {
        let story = sample_story(
            2,
            Some(Summary { text: "old".into(), version: 2, generated_at: Utc::now(), model: "m".into(), word_count: 1 }),
        );
        assert!(!needs_summary(&story));
    }

    #[tokio::test]
    async fn generate_for_story_commits_a_summary() {
        let stories: Arc<InMemoryStore<Story>> = Arc::new(InMemoryStore::new());
        stories.upsert(STORY_CLUSTERS, sample_story(2, None), None).await.unwrap();
        let summarizer = build_summarizer(stories.clone());

        summarizer.generate_for_story("s1").await;

        let updated = stories.get(STORY_CLUSTERS, "s1", "world").await.unwrap().unwrap();
        assert!(updated.summary.is_some());
        assert_eq!(updated.summary.unwrap().version, 2);
    }

    #[tokio::test]
    async fn cost_ceiling_pauses_generation() {
        let stories: Arc<InMemoryStore<Story>> = Arc::new(InMemoryStore::new());
        stories.upsert(STORY_CLUSTERS, sample_story(2, None), None).await.unwrap();
        let mut config = SummarizerConfig::default();
        config.cost_ceiling_per_hour = 0.0;
        let registry = Registry::new();
        let metrics = Arc::new(SummarizerMetrics::new(&registry).unwrap());
        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        let summarizer = Arc::new(Summarizer::new(
            stories.clone(),
            Arc::new(MockLlmProvider::default()),
            config,
            clock,
            metrics,
        ));

        summarizer.generate_for_story("s1").await;

        let story = stories.get(STORY_CLUSTERS, "s1", "world").await.unwrap().unwrap();
        assert!(story.summary.is_none());
        assert_eq!(summarizer.stats.skipped_over_budget.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn concurrent_generation_for_the_same_story_does_not_double_commit() {
        let stories: Arc<InMemoryStore<Story>> = Arc::new(InMemoryStore::new());
        stories.upsert(STORY_CLUSTERS, sample_story(2, None), None).await.unwrap();
        let summarizer = build_summarizer(stories.clone());

        // Two workers dequeue the same story id at once. The per-story
        // mutex serializes them; by the time the second acquires it,
        // `needs_summary` is already false, so it skips rather than racing
        // the first generation's commit.
        let a = summarizer.clone();
        let b = summarizer.clone();
        tokio::join!(async move { a.generate_for_story("s1").await }, async move { b.generate_for_story("s1").await });

        let updated = stories.get(STORY_CLUSTERS, "s1", "world").await.unwrap().unwrap();
        assert!(updated.summary.is_some());
        assert_eq!(summarizer.stats.generated.load(Ordering::Relaxed), 1, "only one generation should commit");
    }
}
