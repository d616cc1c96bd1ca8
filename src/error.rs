//! HTTP-facing error handling (§7). Wraps the core `NewsroomError` taxonomy
//! and collapses it to the three allowed API surfaces: `NotFound`,
//! `BadRequest`, and an opaque `InternalError`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use newsroom_core::error::NewsroomError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error response structure for consistent API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub message: String,
    pub correlation_id: String,
    pub timestamp: String,
}

/// Main application error type with comprehensive error handling
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request format")]
    InvalidRequestFormat(String),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field value: {field}")]
    InvalidFieldValue { field: String, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Option<u64> },

    #[error("Store connection failed")]
    StoreConnectionFailed,

    #[error("Store operation failed")]
    StoreOperationFailed(String),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal server error")]
    Internal { message: Option<String> },

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("JSON parsing error")]
    JsonParsingError(#[from] JsonRejection),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequestFormat(_)
            | AppError::MissingField { .. }
            | AppError::InvalidFieldValue { .. }
            | AppError::JsonParsingError(_) => StatusCode::BAD_REQUEST,

            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            AppError::ServiceUnavailable | AppError::StoreConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequestFormat(_) => "INVALID_REQUEST_FORMAT",
            AppError::MissingField { .. } => "MISSING_FIELD",
            AppError::InvalidFieldValue { .. } => "INVALID_FIELD_VALUE",
            AppError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::StoreConnectionFailed => "STORE_CONNECTION_FAILED",
            AppError::StoreOperationFailed(_) => "STORE_OPERATION_FAILED",
            AppError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AppError::Internal { .. } => "INTERNAL_SERVER_ERROR",
            AppError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            AppError::JsonParsingError(_) => "JSON_PARSING_ERROR",
        }
    }

    /// Get user-friendly message for this error
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidRequestFormat(msg) => format!("Invalid request format: {}", msg),
            AppError::MissingField { field } => format!("Missing required field: {}", field),
            AppError::InvalidFieldValue { field, message } => format!("Invalid value for {}: {}", field, message),
            AppError::NotFound { resource } => format!("{} not found", resource),
            AppError::RateLimitExceeded { .. } => "Too many requests, please try again later".to_string(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

/// Collapses the core taxonomy to the three allowed API surfaces (§7):
/// internal-only variants (`DuplicateSource`, `BudgetExceeded`, `Parse`,
/// `InvariantViolation`) are never constructed in a handler context and
/// fall through to `Internal` here if one ever escapes by mistake.
impl From<NewsroomError> for AppError {
    fn from(err: NewsroomError) -> Self {
        match err {
            NewsroomError::NotFound { container, id } => {
                AppError::NotFound { resource: format!("{container}/{id}") }
            }
            NewsroomError::BadRequest(message) => AppError::InvalidRequestFormat(message),
            NewsroomError::InvariantViolation(message) => {
                tracing::error!(%message, "invariant violation reached the API boundary");
                AppError::Internal { message: Some(message) }
            }
            other => {
                tracing::error!(error = %other, "internal error reached the API boundary");
                AppError::Internal { message: Some(other.to_string()) }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let error_code = self.error_code();
        let user_message = self.user_message();

        match &self {
            AppError::Internal { .. } | AppError::StoreConnectionFailed | AppError::ConfigurationError { .. } => {
                tracing::error!(
                    correlation_id = %correlation_id,
                    error_code = %error_code,
                    error = %self,
                    "Server error occurred"
                );
            }
            _ => {
                tracing::info!(
                    correlation_id = %correlation_id,
                    error_code = %error_code,
                    error = %self,
                    "Client error occurred"
                );
            }
        }

        let error_response = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            message: user_message,
            correlation_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError | redis::ErrorKind::AuthenticationFailed => AppError::StoreConnectionFailed,
            _ => AppError::StoreOperationFailed(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: Some(err.to_string()) }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequestFormat(format!("JSON error: {}", err))
    }
}

/// Result type alias for application errors
pub type Result<T> = std::result::Result<T, AppError>;