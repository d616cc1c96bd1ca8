//! Correlation-id propagation for request tracing.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Attaches a correlation id to the request span and echoes it on the response,
/// generating one when the caller didn't send `x-correlation-id`.
pub async fn tracing_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = extract_or_generate_correlation_id(request.headers());
    request.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id.as_str(),
        method = %request.method(),
        uri = %request.uri(),
    );
    let _enter = span.enter();

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(correlation_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), header_value);
    }

    response
}

fn extract_or_generate_correlation_id(headers: &HeaderMap) -> CorrelationId {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| CorrelationId::from_string(s.to_string()))
        .unwrap_or_else(CorrelationId::new)
}

pub fn get_correlation_id_from_request(request: &Request) -> Option<CorrelationId> {
    request.extensions().get::<CorrelationId>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_generates_correlation_id_when_absent() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn(tracing_middleware));

        let response = app
            .oneshot(HttpRequest::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    }

    #[tokio::test]
    async fn test_echoes_caller_supplied_correlation_id() {
        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn(tracing_middleware));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/test")
                    .header(CORRELATION_ID_HEADER, "caller-supplied-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(CORRELATION_ID_HEADER).unwrap(),
            "caller-supplied-id"
        );
    }
}
