//! Liveness/readiness probes, following `handlers/monitoring.rs`'s split of
//! a shallow liveness check from a dependency-checking readiness check.

use axum::{extract::State, http::StatusCode, Json};
use newsroom_core::models::Story;
use newsroom_store::containers::STORY_CLUSTERS;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// `GET /health`: always 200 if the process is up and answering HTTP.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", timestamp: chrono::Utc::now() })
}

/// `GET /health/live`: process is running and the async runtime is
/// scheduling tasks. No dependency checks — a liveness failure should
/// trigger a restart, not cascade from a transient store outage.
pub async fn health_live() -> StatusCode {
    StatusCode::OK
}

/// `GET /health/ready`: the document store actually answers a query. A
/// readiness failure takes the instance out of a load balancer's rotation
/// without restarting it.
pub async fn health_ready(State(state): State<AppState>) -> StatusCode {
    match state.stories.query(STORY_CLUSTERS, None, &|_: &Story| false).await {
        Ok(_) => StatusCode::OK,
        Err(error) => {
            tracing::warn!(%error, "readiness check failed: story store unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
