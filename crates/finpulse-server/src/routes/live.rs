//! Live WebSocket connection.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::activity::ActivityInput;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub user_id: String,
}

/// Upgrade to a live connection.
/// GET /ws?user_id=...
pub async fn live_socket(
    ws: WebSocketUpgrade,
    Query(query): Query<LiveQuery>,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let user_id = query.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::validation("user_id must not be empty"));
    }
    Ok(ws.on_upgrade(move |socket| serve_connection(socket, state, user_id)))
}

/// Pump hub messages out and activity frames in until either side closes.
async fn serve_connection(socket: WebSocket, state: AppState, user_id: String) {
    let mut subscriber = state.engine.live_hub().subscribe(&user_id);
    let (mut outbound, mut inbound) = socket.split();
    info!(user_id = %user_id, "Live connection opened");

    loop {
        tokio::select! {
            message = subscriber.recv() => {
                let Some(message) = message else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to encode live message");
                        continue;
                    }
                };
                if outbound.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = inbound.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ActivityInput>(&text) {
                        Ok(input) => {
                            let event = input.into_event(&user_id);
                            state.engine.ingest_activity(&user_id, event).await;
                        }
                        Err(e) => debug!(user_id = %user_id, error = %e, "Ignoring malformed activity frame"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(user_id = %user_id, error = %e, "Live connection error");
                    break;
                }
            }
        }
    }

    info!(user_id = %user_id, "Live connection closed");
}
