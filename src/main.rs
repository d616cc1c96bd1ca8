//! Process entrypoint: loads configuration, wires the document stores and
//! the four background subsystems (§5) to a shared shutdown signal, and
//! serves the Feed API. Generalizes the teacher's `main.rs` startup
//! sequence (config load, pool construction, router assembly, graceful
//! shutdown on ctrl-c) to this pipeline's subsystem set.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{Config as RedisConfig, Runtime};
use newsroom_core::categorizer::CategoryTables;
use newsroom_core::clock::{SharedClock, SystemClock};
use newsroom_core::models::{Article, Story};
use newsroom_ingest::poller::FeedPoller;
use newsroom_services::{
    ClusteringEngine, FeedQuery, HttpLlmProvider, LlmProvider, MockLlmProvider, NoopObserver, StatusSweeper,
    Summarizer, SummarizerMetrics,
};
use newsroom_store::records::PollState;
use newsroom_store::{DocumentStore, InMemoryStore, RedisStore};
use newsroom_backend::{config::AppConfig, create_router, metrics::MetricsCollector, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    let config = AppConfig::from_env().map_err(|error| {
        tracing::error!(%error, "configuration invalid");
        error
    })?;
    tracing::info!(environment = ?config.environment, "starting newsroom backend");

    let clock: SharedClock = Arc::new(SystemClock);
    let metrics = Arc::new(MetricsCollector::new()?);

    let (articles, stories, poll_states) = build_stores(&config).await?;

    let feed_query =
        Arc::new(FeedQuery::new(stories.clone(), config.feed_query.clone()));

    let llm: Arc<dyn LlmProvider> = if config.llm.api_key.is_empty() {
        tracing::warn!("LLM_API_KEY not set, using a mock provider that returns canned summaries");
        Arc::new(MockLlmProvider::default())
    } else {
        Arc::new(HttpLlmProvider::new(config.llm.api_base.clone(), config.llm.api_key.clone()))
    };

    let poller = Arc::new(FeedPoller::new(
        poll_states,
        articles.clone(),
        config.feed_poller.clone(),
        clock.clone(),
        CategoryTables::seed(),
    ));

    let clustering = Arc::new(ClusteringEngine::new(
        articles.clone(),
        stories.clone(),
        config.clustering.clone(),
        config.status.clone(),
        clock.clone(),
        Arc::new(NoopObserver),
    ));

    let summarizer_metrics = Arc::new(SummarizerMetrics::new(&metrics.registry())?);
    let summarizer =
        Arc::new(Summarizer::new(stories.clone(), llm, config.summarizer.clone(), clock.clone(), summarizer_metrics));

    let sweeper =
        Arc::new(StatusSweeper::new(stories.clone(), config.status.clone(), clock.clone(), Arc::new(NoopObserver)));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let poller_handle = poller.clone().start(shutdown_rx.clone());
    let clustering_handle =
        clustering.clone().start(Duration::from_secs(config.clustering_cycle_period_secs), shutdown_rx.clone());
    let summarizer_handles = summarizer.clone().start(shutdown_rx.clone());
    let sweeper_handle = sweeper.clone().start(shutdown_rx.clone());
    let bridge_handle = spawn_stats_bridge(
        metrics.clone(),
        poller.stats.clone(),
        clustering.stats.clone(),
        summarizer.stats.clone(),
        shutdown_rx.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        stories,
        articles,
        feed_query,
        metrics,
        poller_stats: poller.stats.clone(),
        clustering_stats: clustering.stats.clone(),
        summarizer_stats: summarizer.stats.clone(),
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!(host = %config.server.host, port = config.server.port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = poller_handle.await;
    let _ = clustering_handle.await;
    for handle in summarizer_handles {
        let _ = handle.await;
    }
    let _ = sweeper_handle.await;
    let _ = bridge_handle.await;

    Ok(())
}

type Stores = (Arc<dyn DocumentStore<Article>>, Arc<dyn DocumentStore<Story>>, Arc<dyn DocumentStore<PollState>>);

/// Builds the three document stores the pipeline needs. Redis in any
/// non-development environment; in-memory is a deliberate local-dev
/// convenience, never reachable in production (`AppConfig::validate_production`
/// already refuses a localhost `REDIS_URL`, so this branch is dev-only in
/// practice).
async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    if config.environment.is_development() && config.store.redis_url.contains("localhost") {
        tracing::info!("using in-memory document stores for local development");
        return Ok((
            Arc::new(InMemoryStore::new()) as Arc<dyn DocumentStore<Article>>,
            Arc::new(InMemoryStore::new()) as Arc<dyn DocumentStore<Story>>,
            Arc::new(InMemoryStore::new()) as Arc<dyn DocumentStore<PollState>>,
        ));
    }

    let pool = RedisConfig::from_url(&config.store.redis_url).create_pool(Some(Runtime::Tokio1))?;
    Ok((
        Arc::new(RedisStore::new(pool.clone())) as Arc<dyn DocumentStore<Article>>,
        Arc::new(RedisStore::new(pool.clone())) as Arc<dyn DocumentStore<Story>>,
        Arc::new(RedisStore::new(pool)) as Arc<dyn DocumentStore<PollState>>,
    ))
}

/// Copies the pipeline's atomic stat counters into the Prometheus
/// registry every few seconds. The subsystems expose `Arc<Stats>` for
/// cheap in-process reads (`/admin/metrics`); this loop is what makes the
/// same numbers show up under `/metrics` for external scraping.
fn spawn_stats_bridge(
    metrics: Arc<MetricsCollector>,
    poller_stats: Arc<newsroom_ingest::poller::PollerStats>,
    clustering_stats: Arc<newsroom_services::ClusteringStats>,
    summarizer_stats: Arc<newsroom_services::SummarizerStats>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_articles_ingested = 0u64;
        let mut last_stories_created = 0u64;
        let mut last_duplicate_sources = 0u64;
        let mut last_dead_lettered = 0u64;
        let mut last_summaries_generated = 0u64;
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let articles_ingested = poller_stats.articles_ingested.load(Ordering::Relaxed);
                    for _ in last_articles_ingested..articles_ingested {
                        metrics.record_article_ingested();
                    }
                    last_articles_ingested = articles_ingested;

                    let stories_created = clustering_stats.stories_created.load(Ordering::Relaxed);
                    for _ in last_stories_created..stories_created {
                        metrics.record_story_created();
                    }
                    last_stories_created = stories_created;

                    let duplicate_sources = clustering_stats.duplicate_sources_rejected.load(Ordering::Relaxed);
                    for _ in last_duplicate_sources..duplicate_sources {
                        metrics.record_duplicate_source_rejected();
                    }
                    last_duplicate_sources = duplicate_sources;

                    let dead_lettered = clustering_stats.dead_lettered.load(Ordering::Relaxed);
                    for _ in last_dead_lettered..dead_lettered {
                        metrics.record_clustering_dead_lettered();
                    }
                    last_dead_lettered = dead_lettered;

                    let summaries_generated = summarizer_stats.generated.load(Ordering::Relaxed);
                    for _ in last_summaries_generated..summaries_generated {
                        metrics.record_summary_generated();
                    }
                    last_summaries_generated = summaries_generated;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() { break; }
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
