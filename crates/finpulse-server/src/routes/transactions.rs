//! Synchronous transaction scoring.

use axum::{extract::State, Json};
use finpulse_core::types::TransactionPayload;
use finpulse_core::ScoreOutcome;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScoreTransactionRequest {
    pub user_id: String,
    pub transaction: TransactionPayload,
}

/// Score a transaction now.
/// POST /transactions/score
pub async fn score_transaction(
    State(state): State<AppState>,
    Json(request): Json<ScoreTransactionRequest>,
) -> ApiResult<Json<ScoreOutcome>> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::validation("user_id must not be empty"));
    }
    if !request.transaction.amount.is_finite() {
        return Err(ApiError::validation("amount must be a finite number"));
    }

    let outcome = state
        .engine
        .score_transaction(&request.transaction, request.user_id.trim())
        .await;
    Ok(Json(outcome))
}
