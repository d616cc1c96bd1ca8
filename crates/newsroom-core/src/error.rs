//! Domain-wide error taxonomy shared by every crate in the workspace.
//!
//! This mirrors the shape of a typical application error enum (status code,
//! error code, and a user-facing message derived per variant) but stays
//! storage- and transport-agnostic: the root package's HTTP layer maps these
//! down to the three surfaces the Feed API is allowed to show a caller
//! (`NotFound`, `BadRequest`, `InternalError`).

use thiserror::Error;

/// Errors that can occur anywhere in the pipeline.
#[derive(Debug, Error)]
pub enum NewsroomError {
    /// Feed fetch, LLM call, or store I/O that failed for a reason expected
    /// to clear up on retry.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Optimistic-concurrency conflict on a store upsert; the caller already
    /// retried the configured number of times.
    #[error("precondition failed: stale etag on {container}/{id}")]
    PreconditionFailed { container: String, id: String },

    /// An article's source already appears in the target story. Not an
    /// error condition — logged at debug and handled inline.
    #[error("duplicate source {source} on story {story_id}")]
    DuplicateSource { story_id: String, source: String },

    /// A feed entry failed to parse. Swallowed at the source; no retry.
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// The LLM provider refused the prompt on content-policy grounds.
    #[error("content policy refusal for story {story_id}")]
    ContentPolicyRefusal { story_id: String },

    /// The summarizer's cost meter tripped; the dispatcher pauses rather
    /// than propagating this to a caller.
    #[error("summarizer budget exceeded for the current window")]
    BudgetExceeded,

    /// No document exists for the given id.
    #[error("{container} document not found: {id}")]
    NotFound { container: String, id: String },

    /// A query parameter or request body failed validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An invariant from the data model was violated. Per the spec this is
    /// a programmer error: the worker that observes it should crash and let
    /// its supervisor restart it rather than silently continue.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NewsroomError {
    /// A stable machine-readable code, independent of the Display message.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK_ERROR",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::DuplicateSource { .. } => "DUPLICATE_SOURCE",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::ContentPolicyRefusal { .. } => "CONTENT_POLICY_REFUSAL",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a background subsystem should retry the operation that
    /// produced this error, per the propagation policy in the spec: most
    /// variants checkpoint-and-redeliver rather than retry in place.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::PreconditionFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NewsroomError>;
