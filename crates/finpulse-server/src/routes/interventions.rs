//! Intervention ledger endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use finpulse_core::types::{Feedback, Intervention};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::not_found(format!("Intervention not found: {}", id)))
}

/// GET /interventions/:id
pub async fn get_intervention(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Intervention>> {
    let id = parse_id(&id)?;
    state
        .engine
        .get_intervention(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Intervention not found: {}", id)))
}

#[derive(Debug, Deserialize)]
pub struct ListInterventionsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListInterventionsResponse {
    pub interventions: Vec<Intervention>,
    pub count: usize,
}

/// GET /users/:user_id/interventions
pub async fn list_interventions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListInterventionsQuery>,
) -> ApiResult<Json<ListInterventionsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let interventions = state.engine.list_interventions(&user_id, limit).await?;
    Ok(Json(ListInterventionsResponse {
        count: interventions.len(),
        interventions,
    }))
}

/// POST /interventions/:id/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(feedback): Json<Feedback>,
) -> ApiResult<Json<Intervention>> {
    let id = parse_id(&id)?;
    let updated = state.engine.submit_feedback(id, feedback).await?;
    Ok(Json(updated))
}
