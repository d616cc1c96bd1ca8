//! Full-pipeline end-to-end scenarios (§8 "Concrete end-to-end scenarios"):
//! ingest -> cluster -> status transition -> feed query, driven by a
//! `FixedClock` so the time-dependent rules are deterministic.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use newsroom_core::clock::{FixedClock, SharedClock};
use newsroom_core::fingerprint::fingerprint;
use newsroom_core::models::{Article, Story, StoryStatus};
use newsroom_services::{ClusteringConfig, ClusteringEngine, FeedQuery, FeedQueryConfig, NoopObserver, StatusConfig};
use newsroom_store::containers::{RAW_ARTICLES, STORY_CLUSTERS};
use newsroom_store::memory::InMemoryStore;
use newsroom_store::DocumentStore;

fn article(id: &str, source: &str, title: &str, published_at: chrono::DateTime<Utc>) -> Article {
    Article {
        id: id.to_string(),
        source: source.to_string(),
        source_name: source.to_string(),
        title: title.to_string(),
        description: "d".to_string(),
        url: format!("https://example.com/{id}"),
        published_at,
        fetched_at: published_at,
        category: "world".to_string(),
        category_confidence: 0.9,
        story_fingerprint: fingerprint(title),
        processed: false,
        story_id: None,
    }
}

struct Harness {
    engine: ClusteringEngine,
    articles: Arc<InMemoryStore<Article>>,
    stories: Arc<InMemoryStore<Story>>,
    clock: FixedClock,
}

fn harness() -> Harness {
    let articles = Arc::new(InMemoryStore::<Article>::new());
    let stories = Arc::new(InMemoryStore::<Story>::new());
    let clock = FixedClock::at(Utc::now());
    let shared: SharedClock = Arc::new(clock.clone());
    let engine = ClusteringEngine::new(
        articles.clone(),
        stories.clone(),
        ClusteringConfig::default(),
        StatusConfig::default(),
        shared,
        Arc::new(NoopObserver),
    );
    Harness { engine, articles, stories, clock }
}

async fn ingest(h: &Harness, a: Article) {
    h.articles.upsert(RAW_ARTICLES, a, None).await.unwrap();
    h.engine.run_cycle().await.unwrap();
}

async fn the_story(h: &Harness) -> Story {
    let mut all = h.stories.query(STORY_CLUSTERS, None, &|_: &Story| true).await.unwrap();
    assert_eq!(all.len(), 1, "expected a single clustered story");
    all.remove(0)
}

#[tokio::test]
async fn scenario_single_source_monitoring() {
    let h = harness();
    let now = h.clock.now();
    ingest(&h, article("a1", "bbc", "Major earthquake hits California coast", now)).await;

    let story = the_story(&h).await;
    assert_eq!(story.source_count, 1);
    assert_eq!(story.status, StoryStatus::Monitoring);
    assert_eq!(story.event_fingerprint, fingerprint("major earthquake hits california coast"));

    let feed_query = FeedQuery::new(h.stories.clone(), FeedQueryConfig::default());
    let page = feed_query.feed(None, 20, 0).await.unwrap();
    assert!(page.stories.is_empty(), "a MONITORING-only feed must be filtered out");
}

#[tokio::test]
async fn scenario_paraphrase_clustering_then_breaking_promotion() {
    let h = harness();
    let now = h.clock.now();
    ingest(&h, article("a1", "bbc", "Major earthquake hits California coast", now)).await;

    ingest(&h, article("a2", "reuters", "Magnitude 7.2 earthquake strikes California", now)).await;
    let after_second = the_story(&h).await;
    assert_eq!(after_second.source_count, 2);
    assert_eq!(after_second.status, StoryStatus::Developing);
    assert_eq!(
        after_second.source_articles.iter().map(|s| s.article_id.as_str()).collect::<Vec<_>>(),
        vec!["a1", "a2"],
        "attach order must be preserved"
    );

    ingest(&h, article("a3", "ap", "Major California earthquake causes coast damage", now)).await;
    let after_third = the_story(&h).await;
    assert_eq!(after_third.source_count, 3);
    assert_eq!(after_third.status, StoryStatus::Breaking);
    assert!(after_third.breaking_detected_at.is_some());

    let feed_query = FeedQuery::new(h.stories.clone(), FeedQueryConfig::default());
    let breaking = feed_query.breaking(10).await.unwrap();
    assert_eq!(breaking.len(), 1);
    assert_eq!(breaking[0].id, after_third.id);
}

#[tokio::test]
async fn scenario_duplicate_source_is_rejected() {
    let h = harness();
    let now = h.clock.now();
    ingest(&h, article("a1", "bbc", "Major earthquake hits California coast", now)).await;
    ingest(&h, article("a2", "reuters", "Magnitude 7.2 earthquake strikes California", now)).await;
    ingest(&h, article("a3", "ap", "Major California earthquake causes coast damage", now)).await;

    ingest(&h, article("a4", "bbc", "Major earthquake damage reported across California coast", now)).await;

    let story = the_story(&h).await;
    assert_eq!(story.source_count, 3, "duplicate source must not grow the story");

    let a4 = h.articles.get(RAW_ARTICLES, "a4", "world").await.unwrap().unwrap();
    assert!(a4.processed);
    assert_eq!(a4.story_id.as_deref(), Some(story.id.as_str()));
}

#[tokio::test]
async fn scenario_significance_bump_reorders_the_feed() {
    let h = harness();
    let now = h.clock.now();
    ingest(&h, article("a1", "bbc", "Major earthquake hits California coast", now)).await;
    ingest(&h, article("a2", "reuters", "Magnitude 7.2 earthquake strikes California", now)).await;

    // A second, unrelated story that stays put while the first gets bumped.
    ingest(&h, article("b1", "cnn", "Local bakery wins regional pastry award", now)).await;
    ingest(&h, article("b2", "npr", "Regional pastry competition names bakery winner", now)).await;

    h.clock.advance(ChronoDuration::hours(4));
    let later = h.clock.now();
    ingest(&h, article("a5", "guardian", "California earthquake: recovery underway", later)).await;

    let earthquake = h
        .stories
        .query(STORY_CLUSTERS, None, &|s: &Story| s.source_articles.iter().any(|a| a.article_id == "a5"))
        .await
        .unwrap()
        .remove(0);
    assert!(earthquake.update_significance > 0.5, "got {}", earthquake.update_significance);
    assert_eq!(earthquake.last_updated, later);

    let feed_query = FeedQuery::new(h.stories.clone(), FeedQueryConfig::default());
    let page = feed_query.feed(None, 20, 0).await.unwrap();
    assert_eq!(page.stories[0].id, earthquake.id, "most recently bumped story sorts first");
}
