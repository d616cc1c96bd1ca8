//! Application wiring: `AppState` plus `create_router`, assembling the Feed
//! API (§4.7) over the document-store-backed pipeline. Follows the
//! teacher's `lib.rs` shape — `Arc`-wrapped service handles in `AppState`,
//! `Router::new().route(...).with_state(state)`, a CORS + tracing +
//! latency middleware stack — generalized to this domain's much smaller
//! route surface.

use std::sync::Arc;

use axum::{routing::get, Router};
use newsroom_core::models::{Article, Story};
use newsroom_ingest::poller::PollerStats;
use newsroom_services::{ClusteringStats, FeedQuery, SummarizerStats};
use newsroom_store::DocumentStore;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;

pub use config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stories: Arc<dyn DocumentStore<Story>>,
    pub articles: Arc<dyn DocumentStore<Article>>,
    pub feed_query: Arc<FeedQuery>,
    pub metrics: Arc<metrics::MetricsCollector>,
    pub poller_stats: Arc<PollerStats>,
    pub clustering_stats: Arc<ClusteringStats>,
    pub summarizer_stats: Arc<SummarizerStats>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = middleware::create_cors_layer();

    Router::new()
        .route("/feed", get(handlers::feed::get_feed))
        .route("/feed/last-modified", get(handlers::feed::get_last_modified))
        .route("/breaking", get(handlers::feed::get_breaking))
        .route("/story/:id", get(handlers::feed::get_story))
        .route("/story/:id/sources", get(handlers::feed::get_story_sources))
        .route("/admin/metrics", get(handlers::admin::get_admin_metrics))
        .route("/metrics", get(handlers::admin::get_prometheus_metrics))
        .route("/health", get(handlers::health::health))
        .route("/health/live", get(handlers::health::health_live))
        .route("/health/ready", get(handlers::health::health_ready))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn(middleware::tracing_middleware))
                .layer(axum::middleware::from_fn_with_state(state.metrics.clone(), middleware::latency_middleware)),
        )
        .with_state(state)
}
