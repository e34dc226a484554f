//! Error types for the dayplan ecosystem.

use thiserror::Error;

/// Errors that can occur in dayplan operations.
///
/// Every variant maps to a distinct user-visible failure so a client can
/// tell "re-sign-in" from "try again" from "that didn't parse, rephrase".
#[derive(Error, Debug)]
pub enum PlanError {
    /// The model returned data that cannot be coerced into the event shape
    /// at all (non-list root, non-object entries, wrong field types).
    #[error("Model output violates the event schema: {0}")]
    SchemaViolation(String),

    /// A single candidate failed validation (missing summary, missing both
    /// times, end before start, unparseable time expression).
    #[error("Invalid event candidate: {0}")]
    InvalidCandidate(String),

    /// Transport or non-2xx failure from the model provider.
    #[error("Model request failed: {0}")]
    Upstream(String),

    /// The model request exceeded its bounded timeout.
    #[error("Model request timed out after {0}s")]
    UpstreamTimeout(u64),

    /// The model returned zero candidates for a non-empty utterance, even
    /// after the single automatic retry.
    #[error("Model returned an empty schedule")]
    EmptyModelResponse,

    /// Unknown or expired session; the caller must start a new one.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The calendar provider rejected the credential.
    #[error("Calendar credential rejected: {0}")]
    Auth(String),

    /// The calendar provider is unreachable or failing.
    #[error("Calendar provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl PlanError {
    /// Stable machine-readable tag for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::SchemaViolation(_) => "schema_violation",
            PlanError::InvalidCandidate(_) => "invalid_candidate",
            PlanError::Upstream(_) => "upstream",
            PlanError::UpstreamTimeout(_) => "upstream_timeout",
            PlanError::EmptyModelResponse => "empty_model_response",
            PlanError::SessionNotFound(_) => "session_not_found",
            PlanError::Auth(_) => "auth",
            PlanError::ProviderUnavailable(_) => "provider_unavailable",
        }
    }
}

/// Result type alias for dayplan operations.
pub type PlanResult<T> = Result<T, PlanError>;
