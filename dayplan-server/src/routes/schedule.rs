//! Planning session endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use dayplan_core::event::Schedule;
use dayplan_core::pipeline::PlanOutcome;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule", post(generate))
        .route("/schedule/{id}", get(get_schedule))
        .route("/schedule/{id}", delete(cancel))
        .route("/schedule/{id}/feedback", post(feedback))
        .route("/schedule/{id}/commit", post(commit))
}

/// Request body for generate and feedback rounds
#[derive(Deserialize)]
pub struct PlanRequest {
    pub utterance: String,
    pub access_token: String,
}

/// Request body for commit
#[derive(Deserialize)]
pub struct CommitRequest {
    pub access_token: String,
}

#[derive(Serialize)]
pub struct PlanResponse {
    pub session_id: String,
    pub schedule: Schedule,
    pub truncated: bool,
    pub warnings: Vec<String>,
}

impl From<PlanOutcome> for PlanResponse {
    fn from(outcome: PlanOutcome) -> Self {
        PlanResponse {
            session_id: outcome.session_id,
            schedule: outcome.schedule,
            truncated: outcome.truncated,
            warnings: outcome.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CommitResponse {
    pub schedule: Schedule,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub session_id: String,
    pub schedule: Schedule,
}

/// POST /schedule - Start a planning session from an utterance
async fn generate(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let outcome = state.planner().generate(&req.utterance, &req.access_token).await?;
    tracing::info!(session_id = %outcome.session_id, events = outcome.schedule.len(), "generated schedule");
    Ok(Json(outcome.into()))
}

/// POST /schedule/:id/feedback - Revise the proposal with another utterance
async fn feedback(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let outcome = state
        .planner()
        .feedback(&session_id, &req.utterance, &req.access_token)
        .await?;
    tracing::info!(%session_id, events = outcome.schedule.len(), "revised schedule");
    Ok(Json(outcome.into()))
}

/// POST /schedule/:id/commit - Write the proposal to the calendar
async fn commit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, AppError> {
    let schedule = state.planner().commit(&session_id, &req.access_token).await?;
    tracing::info!(%session_id, events = schedule.len(), "committed schedule");
    Ok(Json(CommitResponse { schedule }))
}

/// GET /schedule/:id - Current proposal for a session
async fn get_schedule(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let schedule = state.planner().schedule(&session_id).await?;
    Ok(Json(ScheduleResponse { session_id, schedule }))
}

/// DELETE /schedule/:id - Discard a session without committing
async fn cancel(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.planner().cancel(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
