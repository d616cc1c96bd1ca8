//! Feed API query composition (I, §4.7): the non-HTTP part of `GET /feed` —
//! candidate selection, application-side sort (the store's query ordering
//! is unspecified, per §6/§9), and source diversification. Handlers stay
//! thin and delegate here, the way `handlers/artists.rs` dispatches to a
//! service function rather than embedding query logic in the route.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use newsroom_core::{diversify_by_source, verification_weight};
use newsroom_core::models::{Story, StoryStatus};
use newsroom_store::containers::STORY_CLUSTERS;
use newsroom_store::DocumentStore;

#[derive(Debug, Clone)]
pub struct FeedQueryConfig {
    pub candidate_window: ChronoDuration,
    pub candidate_multiplier: usize,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for FeedQueryConfig {
    fn default() -> Self {
        Self { candidate_window: ChronoDuration::days(7), candidate_multiplier: 3, default_limit: 20, max_limit: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct StoryPage {
    pub stories: Vec<Story>,
    pub has_more: bool,
}

pub struct FeedQuery {
    stories: Arc<dyn DocumentStore<Story>>,
    config: FeedQueryConfig,
}

impl FeedQuery {
    pub fn new(stories: Arc<dyn DocumentStore<Story>>, config: FeedQueryConfig) -> Self {
        Self { stories, config }
    }

    /// `GET /feed`: excludes `MONITORING` (§4.7's essential invariant —
    /// never show an unverified, single-source item), sorts
    /// `(BREAKING first, last_updated desc)`, diversifies by source, then
    /// paginates.
    pub async fn feed(&self, category: Option<&str>, limit: usize, offset: usize) -> anyhow::Result<StoryPage> {
        let limit = limit.clamp(1, self.config.max_limit);
        let cutoff = Utc::now() - self.config.candidate_window;

        let mut candidates = self
            .stories
            .query(STORY_CLUSTERS, category, &|s: &Story| {
                s.status != StoryStatus::Monitoring && s.last_updated >= cutoff
            })
            .await?;

        candidates.sort_by(|a, b| {
            let a_breaking = a.status == StoryStatus::Breaking;
            let b_breaking = b.status == StoryStatus::Breaking;
            b_breaking.cmp(&a_breaking).then_with(|| b.last_updated.cmp(&a.last_updated))
        });

        let fetch_count = limit.saturating_mul(self.config.candidate_multiplier);
        candidates.truncate(fetch_count);

        let diversified = diversify_by_source(
            &candidates,
            candidates.len(),
            |s| s.primary_source.as_str(),
            |s| verification_weight(s.source_count),
        );

        let has_more = diversified.len() > offset + limit;
        let page = diversified.into_iter().skip(offset).take(limit).collect();

        Ok(StoryPage { stories: page, has_more })
    }

    /// `GET /breaking`: currently-`BREAKING` stories, newest first.
    pub async fn breaking(&self, limit: usize) -> anyhow::Result<Vec<Story>> {
        let limit = limit.clamp(1, self.config.max_limit);
        let mut breaking =
            self.stories.query(STORY_CLUSTERS, None, &|s: &Story| s.status == StoryStatus::Breaking).await?;
        breaking.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        breaking.truncate(limit);
        Ok(breaking)
    }

    /// `GET /feed/last-modified`: max `last_updated` in scope, for
    /// adaptive-polling clients.
    pub async fn last_modified(&self, category: Option<&str>) -> anyhow::Result<Option<chrono::DateTime<Utc>>> {
        let stories = self
            .stories
            .query(STORY_CLUSTERS, category, &|s: &Story| s.status != StoryStatus::Monitoring)
            .await?;
        Ok(stories.into_iter().map(|s| s.last_updated).max())
    }

    pub async fn story(&self, id: &str, category: &str) -> anyhow::Result<Option<Story>> {
        Ok(self.stories.get(STORY_CLUSTERS, id, category).await?)
    }

    /// `GET /story/{id}`: the route carries only an id, not the category
    /// partition `get` needs, so this scans every partition. Story ids are
    /// content-addressed (`new_story_id`) and therefore unique across
    /// categories, so at most one match is expected.
    pub async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Story>> {
        let matches = self.stories.query(STORY_CLUSTERS, None, &|s: &Story| s.id == id).await?;
        Ok(matches.into_iter().next())
    }
}
