//! Activity ingestion endpoint.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use finpulse_core::types::{ActivityEvent, ActivityKind};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Client-reported activity, as sent over HTTP or a live connection.
#[derive(Debug, Deserialize)]
pub struct ActivityInput {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Client clock. Recorded as `reported_at`; the server stamps its own receive time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActivityInput {
    pub fn into_event(self, user_id: &str) -> ActivityEvent {
        let event = ActivityEvent::new(user_id, self.kind, self.payload);
        match self.timestamp {
            Some(at) => event.reported(at),
            None => event,
        }
    }
}

/// Request body for `POST /activity`.
#[derive(Debug, Deserialize)]
pub struct IngestActivityRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub activity: ActivityInput,
}

#[derive(Debug, Serialize)]
pub struct IngestActivityResponse {
    pub queued: bool,
    pub queue_backlog: usize,
}

/// Queue an activity event.
/// POST /activity
pub async fn ingest_activity(
    State(state): State<AppState>,
    Json(request): Json<IngestActivityRequest>,
) -> ApiResult<(StatusCode, Json<IngestActivityResponse>)> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::validation("user_id must not be empty"));
    }

    let event = request.activity.into_event(user_id);
    state.engine.ingest_activity(user_id, event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestActivityResponse {
            queued: true,
            queue_backlog: state.engine.queue_len(),
        }),
    ))
}
