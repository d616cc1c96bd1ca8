//! Router smoke test (§8 "Ambient-stack tests"): every documented route
//! returns the documented status for a trivial request, following the
//! teacher's handler-integration-test style but scoped to the Feed API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use newsroom_core::models::{SourceArticleRef, Story, StoryStatus};
use newsroom_services::{FeedQuery, FeedQueryConfig};
use newsroom_store::containers::STORY_CLUSTERS;
use newsroom_store::memory::InMemoryStore;
use newsroom_store::DocumentStore;
use newsroom_backend::{config::AppConfig, create_router, metrics::MetricsCollector, AppState};
use tower::ServiceExt;

fn sample_story(id: &str, status: StoryStatus, source_count: usize) -> Story {
    let now = Utc::now();
    Story {
        id: id.to_string(),
        category: "world".to_string(),
        title: "Major earthquake hits California coast".to_string(),
        primary_source: "bbc".to_string(),
        source_articles: (0..source_count)
            .map(|i| SourceArticleRef {
                article_id: format!("a{i}"),
                source: format!("source{i}"),
                title: "Major earthquake hits California coast".to_string(),
                url: format!("https://example.com/a{i}"),
                published_at: now,
            })
            .collect(),
        source_count,
        event_fingerprint: "abcd1234".to_string(),
        status,
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

fn test_state() -> AppState {
    let stories: Arc<dyn DocumentStore<Story>> = Arc::new(InMemoryStore::<Story>::new());
    let articles: Arc<dyn DocumentStore<newsroom_core::models::Article>> =
        Arc::new(InMemoryStore::<newsroom_core::models::Article>::new());
    let feed_query = Arc::new(FeedQuery::new(stories.clone(), FeedQueryConfig::default()));
    let metrics = Arc::new(MetricsCollector::new().expect("metrics registry"));

    AppState {
        config: Arc::new(test_config()),
        stories,
        articles,
        feed_query,
        metrics,
        poller_stats: Arc::new(newsroom_ingest::poller::PollerStats::default()),
        clustering_stats: Arc::new(newsroom_services::ClusteringStats::default()),
        summarizer_stats: Arc::new(newsroom_services::SummarizerStats::default()),
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        environment: newsroom_backend::config::Environment::Development,
        server: Default::default(),
        store: Default::default(),
        llm: Default::default(),
        feed_poller: Default::default(),
        clustering: Default::default(),
        clustering_cycle_period_secs: 5,
        status: Default::default(),
        summarizer: Default::default(),
        feed_query: Default::default(),
    }
}

#[tokio::test]
async fn health_routes_return_ok() {
    let app = create_router(test_state());

    for path in ["/health", "/health/live", "/health/ready"] {
        let response =
            app.clone().oneshot(Request::builder().uri(path).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn feed_returns_only_mature_stories() {
    let state = test_state();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s1", StoryStatus::Monitoring, 1), None).await.unwrap();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s2", StoryStatus::Developing, 2), None).await.unwrap();

    let app = create_router(state);
    let response = app.oneshot(Request::builder().uri("/feed").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("\"s2\""), "monitoring story should be filtered out, developing story should appear: {text}");
    assert!(!text.contains("\"s1\""));
}

#[tokio::test]
async fn breaking_endpoint_returns_only_breaking_stories() {
    let state = test_state();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s1", StoryStatus::Developing, 2), None).await.unwrap();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s2", StoryStatus::Breaking, 3), None).await.unwrap();

    let app = create_router(state);
    let response = app.oneshot(Request::builder().uri("/breaking").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("\"s2\""));
    assert!(!text.contains("\"s1\""));
}

#[tokio::test]
async fn story_by_id_found_and_not_found() {
    let state = test_state();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s1", StoryStatus::Verified, 3), None).await.unwrap();
    let app = create_router(state);

    let found = app
        .clone()
        .oneshot(Request::builder().uri("/story/s1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);

    let missing = app
        .oneshot(Request::builder().uri("/story/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn story_sources_endpoint_returns_source_refs() {
    let state = test_state();
    state.stories.upsert(STORY_CLUSTERS, sample_story("s1", StoryStatus::Verified, 3), None).await.unwrap();
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/story/s1/sources").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let sources: Vec<SourceArticleRef> = serde_json::from_slice(&body).unwrap();
    assert_eq!(sources.len(), 3);
}

#[tokio::test]
async fn admin_metrics_requires_token() {
    let app = create_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/admin/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_metrics_succeeds_with_correct_token() {
    let state = test_state();
    let token = state.config.server.admin_token.clone();
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/metrics")
                .header("x-admin-token", token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn prometheus_metrics_endpoint_serves_text() {
    let app = create_router(test_state());
    let response = app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
