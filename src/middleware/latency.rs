//! Request latency middleware.
//!
//! Records HTTP request count and duration for every endpoint, labelled by
//! method, matched route (not raw path, to avoid cardinality blowup from
//! path parameters like story ids) and status code.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::metrics::MetricsCollector;

pub async fn latency_middleware(
    State(metrics): State<Arc<MetricsCollector>>,
    matched_path: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = matched_path
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    metrics.increment_in_flight_requests();
    let timer = crate::metrics::RequestTimer::new(metrics.clone(), method, path);
    let response = next.run(request).await;
    metrics.decrement_in_flight_requests();
    timer.finish(response.status());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_latency_middleware_records_metrics() {
        let metrics = Arc::new(MetricsCollector::new().expect("failed to create metrics"));

        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn_with_state(metrics.clone(), latency_middleware))
            .with_state(metrics.clone());

        let response = app
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let metrics_text = metrics.get_metrics().expect("failed to render metrics");
        assert!(metrics_text.contains("newsroom_http_requests_total"));
        assert!(metrics_text.contains("method=\"GET\""));
        assert!(metrics_text.contains("endpoint=\"/test\""));
        assert!(metrics_text.contains("status_code=\"200\""));
    }
}
