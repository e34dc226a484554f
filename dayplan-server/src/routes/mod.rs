pub mod health;
pub mod schedule;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use dayplan_core::error::PlanError;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Convert planning errors to HTTP responses
pub struct AppError(PlanError);

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PlanError::SchemaViolation(_) | PlanError::InvalidCandidate(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PlanError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PlanError::Auth(_) => StatusCode::UNAUTHORIZED,
            PlanError::Upstream(_)
            | PlanError::EmptyModelResponse
            | PlanError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            PlanError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
        });
        (status, body).into_response()
    }
}
