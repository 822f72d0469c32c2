//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pipeline_running: bool,
    pub queue_backlog: usize,
    pub active_users: usize,
    pub reasoning_model: String,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipeline_running: state.is_running().await,
        queue_backlog: state.engine.queue_len(),
        active_users: state.engine.active_user_count(),
        reasoning_model: state.engine.reasoning_model(),
    }))
}
