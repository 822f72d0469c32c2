//! Presence and session endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use finpulse_core::types::SessionContext;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ActiveUsersResponse {
    pub users: Vec<String>,
    pub count: usize,
}

/// GET /presence/active
pub async fn active_users(State(state): State<AppState>) -> ApiResult<Json<ActiveUsersResponse>> {
    let users = state.engine.get_active_users().await;
    Ok(Json(ActiveUsersResponse {
        count: users.len(),
        users,
    }))
}

/// GET /presence/:user_id/session
pub async fn user_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SessionContext>> {
    state
        .engine
        .get_user_session(&user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No session for user {}", user_id)))
}
