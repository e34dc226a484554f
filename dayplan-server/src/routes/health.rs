//! Liveness endpoint

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health - Liveness check
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
