//! Status Transitioner (G): update significance and the status-rule table
//! (§4.5). Runs inline after every attach and again on the 2-minute sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use newsroom_core::clock::SharedClock;
use newsroom_core::fingerprint::similarity;
use newsroom_core::models::{Story, StoryStatus};
use newsroom_store::containers::STORY_CLUSTERS;
use newsroom_store::DocumentStore;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub breaking_window: ChronoDuration,
    pub sweep_interval: std::time::Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { breaking_window: ChronoDuration::minutes(30), sweep_interval: std::time::Duration::from_secs(120) }
    }
}

/// Observer hook for status transitions, fired synchronously after a
/// transition is applied — the shape mirrors a metrics-recording callback
/// rather than a fallible operation, so observers must not block or fail.
pub trait StatusTransitionObserver: Send + Sync {
    fn on_transition(&self, story: &Story, old: StoryStatus, new: StoryStatus);
}

pub struct NoopObserver;
impl StatusTransitionObserver for NoopObserver {
    fn on_transition(&self, _story: &Story, _old: StoryStatus, _new: StoryStatus) {}
}

/// `σ(S, A) = 0.4·T + 0.4·I + 0.2·N` (§4.5).
pub fn update_significance(story: &Story, article_title: &str, now: DateTime<Utc>) -> f64 {
    let time_since_update = now - story.last_updated;
    let t = time_factor(time_since_update);

    let sim = similarity(&story.title, article_title);
    let i = if sim > 0.8 {
        0.2
    } else if sim < 0.5 {
        0.9
    } else {
        0.5
    };

    let n = if story.source_count == 1 {
        0.8
    } else if story.source_count < 5 {
        0.5
    } else {
        0.3
    };

    0.4 * t + 0.4 * i + 0.2 * n
}

fn time_factor(elapsed: ChronoDuration) -> f64 {
    let one_hour = ChronoDuration::hours(1);
    let six_hours = ChronoDuration::hours(6);
    if elapsed < one_hour {
        0.2
    } else if elapsed > six_hours {
        0.8
    } else {
        let span = (six_hours - one_hour).num_seconds() as f64;
        let progress = (elapsed - one_hour).num_seconds() as f64 / span;
        0.2 + progress * (0.8 - 0.2)
    }
}

/// Applies the status-rule table (§4.5) in place. Idempotent: re-applying
/// the same inputs is a no-op save for `breaking_detected_at` bookkeeping.
pub fn apply_status_transition(
    story: &mut Story,
    config: &StatusConfig,
    now: DateTime<Utc>,
    observer: &dyn StatusTransitionObserver,
) {
    let time_since_last_source = now - story.last_source_added_at;

    let new_status = match story.source_count {
        0 | 1 => StoryStatus::Monitoring,
        2 => StoryStatus::Developing,
        _ if time_since_last_source > config.breaking_window => StoryStatus::Verified,
        _ => StoryStatus::Breaking,
    };

    if new_status == story.status {
        return;
    }

    let old_status = story.status;
    story.status = new_status;

    if new_status == StoryStatus::Breaking {
        let already_set_within_window =
            story.breaking_detected_at.map(|t| now - t <= config.breaking_window).unwrap_or(false);
        if !already_set_within_window {
            story.breaking_detected_at = Some(now);
        }
    }

    observer.on_transition(story, old_status, new_status);
}

/// Periodic re-evaluation (§4.5's 2-minute sweep): a `BREAKING` story whose
/// `breaking_window` has elapsed with no new source needs to decay to
/// `VERIFIED` even without a new attach driving `apply_status_transition`
/// inline. Mirrors the interval-loop shape `ClusteringEngine::start` and
/// `FeedPoller::start` use for their own background cycles.
pub struct StatusSweeper {
    stories: Arc<dyn DocumentStore<Story>>,
    config: StatusConfig,
    clock: SharedClock,
    observer: Arc<dyn StatusTransitionObserver>,
}

impl StatusSweeper {
    pub fn new(
        stories: Arc<dyn DocumentStore<Story>>,
        config: StatusConfig,
        clock: SharedClock,
        observer: Arc<dyn StatusTransitionObserver>,
    ) -> Self {
        Self { stories, config, clock, observer }
    }

    /// Re-applies the status-rule table to every non-`MONITORING` story.
    /// `MONITORING` stories can't transition on elapsed time alone (the
    /// rule table only keys off `source_count`), so the sweep skips them.
    pub async fn run_cycle(&self) -> anyhow::Result<usize> {
        let now = self.clock.now();
        let candidates = self
            .stories
            .query(STORY_CLUSTERS, None, &|s: &Story| s.status != StoryStatus::Monitoring)
            .await?;

        let mut changed = 0;
        for mut story in candidates {
            let before = story.status;
            apply_status_transition(&mut story, &self.config, now, self.observer.as_ref());
            if story.status != before {
                self.stories.upsert(STORY_CLUSTERS, story, None).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.run_cycle().await {
                            Ok(changed) if changed > 0 => tracing::info!(changed, "status sweep applied transitions"),
                            Ok(_) => {}
                            Err(error) => tracing::error!(%error, "status sweep failed"),
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("status sweeper shutting down");
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
    use newsroom_core::models::SourceArticleRef;

    fn base_story(source_count: usize) -> Story {
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
            status: StoryStatus::Monitoring,
            created_at: now,
            last_updated: now,
            last_source_added_at: now,
            breaking_detected_at: None,
            update_significance: 0.0,
            summary: None,
            summary_attempts: 0,
            last_summary_error: None,
        }
    }

    #[test]
    fn two_sources_is_developing() {
        let mut story = base_story(2);
        apply_status_transition(&mut story, &StatusConfig::default(), Utc::now(), &NoopObserver);
        assert_eq!(story.status, StoryStatus::Developing);
    }

    #[test]
    fn three_sources_within_window_is_breaking() {
        let mut story = base_story(3);
        let now = Utc::now();
        apply_status_transition(&mut story, &StatusConfig::default(), now, &NoopObserver);
        assert_eq!(story.status, StoryStatus::Breaking);
        assert!(story.breaking_detected_at.is_some());
    }

    #[test]
    fn three_sources_outside_window_is_verified() {
        let mut story = base_story(3);
        story.last_source_added_at = Utc::now() - ChronoDuration::hours(2);
        apply_status_transition(&mut story, &StatusConfig::default(), Utc::now(), &NoopObserver);
        assert_eq!(story.status, StoryStatus::Verified);
    }

    #[test]
    fn transition_to_same_status_is_a_noop() {
        let mut story = base_story(3);
        let config = StatusConfig::default();
        let now = Utc::now();
        apply_status_transition(&mut story, &config, now, &NoopObserver);
        let detected_at = story.breaking_detected_at;
        apply_status_transition(&mut story, &config, now, &NoopObserver);
        assert_eq!(story.breaking_detected_at, detected_at);
    }

    #[test]
    fn significance_is_high_for_a_fresh_single_source_story() {
        let story = base_story(1);
        let sigma = update_significance(&story, "Totally unrelated headline about sports", Utc::now());
        assert!(sigma > 0.5);
    }

    #[tokio::test]
    async fn sweep_decays_stale_breaking_story_to_verified() {
        use newsroom_core::clock::FixedClock;
        use newsroom_store::memory::InMemoryStore;

        let store: Arc<InMemoryStore<Story>> = Arc::new(InMemoryStore::new());
        let mut story = base_story(3);
        story.status = StoryStatus::Breaking;
        story.last_source_added_at = Utc::now() - ChronoDuration::hours(2);
        store.upsert(STORY_CLUSTERS, story, None).await.unwrap();

        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        let sweeper = StatusSweeper::new(store.clone(), StatusConfig::default(), clock, Arc::new(NoopObserver));

        let changed = sweeper.run_cycle().await.unwrap();
        assert_eq!(changed, 1);

        let updated = store.get(STORY_CLUSTERS, "s1", "world").await.unwrap().unwrap();
        assert_eq!(updated.status, StoryStatus::Verified);
    }

    #[tokio::test]
    async fn sweep_skips_monitoring_stories() {
        use newsroom_core::clock::FixedClock;
        use newsroom_store::memory::InMemoryStore;

        let store: Arc<InMemoryStore<Story>> = Arc::new(InMemoryStore::new());
        store.upsert(STORY_CLUSTERS, base_story(1), None).await.unwrap();

        let clock: SharedClock = Arc::new(FixedClock::at(Utc::now()));
        let sweeper = StatusSweeper::new(store, StatusConfig::default(), clock, Arc::new(NoopObserver));

        let changed = sweeper.run_cycle().await.unwrap();
        assert_eq!(changed, 0);
    }
}
