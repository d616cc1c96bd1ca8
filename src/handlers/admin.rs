//! `/admin/metrics` (§6): component health plus the pipeline counters
//! §6 names. Admin-gated by a static bearer token, the simplest analog the
//! teacher's auth stack offers for a single internal endpoint that doesn't
//! warrant a full auth subsystem (explicitly out of scope, §6).

use std::sync::atomic::Ordering;

use axum::{extract::State, http::HeaderMap};
use newsroom_core::models::{Story, StoryStatus};
use newsroom_store::containers::STORY_CLUSTERS;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub feed_poller: FeedPollerHealth,
    pub clustering: ClusteringHealth,
    pub summarizer: SummarizerHealth,
}

#[derive(Debug, Serialize)]
pub struct FeedPollerHealth {
    pub cycles_run: u64,
    pub feeds_polled: u64,
    pub articles_ingested: u64,
    pub duplicates_skipped: u64,
    pub network_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ClusteringHealth {
    pub articles_attached: u64,
    pub stories_created: u64,
    pub duplicate_sources_rejected: u64,
    pub dead_lettered: u64,
}

#[derive(Debug, Serialize)]
pub struct SummarizerHealth {
    pub enqueued: u64,
    pub generated: u64,
    pub skipped_stale: u64,
    pub skipped_over_budget: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub struct AdminMetricsResponse {
    pub articles_ingested_total: f64,
    pub stories_created_total: f64,
    pub summaries_generated_total: f64,
    pub avg_sources_per_story: f64,
    pub components: ComponentHealth,
}

fn admin_authorized(headers: &HeaderMap, expected_token: &str) -> bool {
    headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .map(|token| token == expected_token)
        .unwrap_or(false)
}

pub async fn get_admin_metrics(State(state): State<AppState>, headers: HeaderMap) -> Result<axum::Json<AdminMetricsResponse>> {
    if !admin_authorized(&headers, &state.config.server.admin_token) {
        return Err(AppError::NotFound { resource: "admin/metrics".to_string() });
    }

    let counts = state.metrics.pipeline_counts();

    let stories: Vec<Story> =
        state.stories.query(STORY_CLUSTERS, None, &|s: &Story| s.status != StoryStatus::Monitoring).await?;
    let avg_sources_per_story = if stories.is_empty() {
        0.0
    } else {
        stories.iter().map(|s| s.source_count as f64).sum::<f64>() / stories.len() as f64
    };

    let components = ComponentHealth {
        feed_poller: FeedPollerHealth {
            cycles_run: state.poller_stats.cycles_run.load(Ordering::Relaxed),
            feeds_polled: state.poller_stats.feeds_polled.load(Ordering::Relaxed),
            articles_ingested: state.poller_stats.articles_ingested.load(Ordering::Relaxed),
            duplicates_skipped: state.poller_stats.duplicates_skipped.load(Ordering::Relaxed),
            network_failures: state.poller_stats.network_failures.load(Ordering::Relaxed),
        },
        clustering: ClusteringHealth {
            articles_attached: state.clustering_stats.articles_attached.load(Ordering::Relaxed),
            stories_created: state.clustering_stats.stories_created.load(Ordering::Relaxed),
            duplicate_sources_rejected: state.clustering_stats.duplicate_sources_rejected.load(Ordering::Relaxed),
            dead_lettered: state.clustering_stats.dead_lettered.load(Ordering::Relaxed),
        },
        summarizer: SummarizerHealth {
            enqueued: state.summarizer_stats.enqueued.load(Ordering::Relaxed),
            generated: state.summarizer_stats.generated.load(Ordering::Relaxed),
            skipped_stale: state.summarizer_stats.skipped_stale.load(Ordering::Relaxed),
            skipped_over_budget: state.summarizer_stats.skipped_over_budget.load(Ordering::Relaxed),
            failed: state.summarizer_stats.failed.load(Ordering::Relaxed),
        },
    };

    Ok(axum::Json(AdminMetricsResponse {
        articles_ingested_total: counts.articles_ingested,
        stories_created_total: counts.stories_created,
        summaries_generated_total: counts.summaries_generated,
        avg_sources_per_story,
        components,
    }))
}

pub async fn get_prometheus_metrics(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    crate::metrics::metrics_handler(State(state.metrics)).await
}
