//! Route definitions for the REST API.

mod activity;
mod health;
mod interventions;
mod live;
mod presence;
mod transactions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Activity ingestion
        .route("/activity", post(activity::ingest_activity))
        // Synchronous scoring
        .route("/transactions/score", post(transactions::score_transaction))
        // Presence
        .route("/presence/active", get(presence::active_users))
        .route("/presence/:user_id/session", get(presence::user_session))
        // Interventions
        .route("/interventions/:id", get(interventions::get_intervention))
        .route("/interventions/:id/feedback", post(interventions::submit_feedback))
        .route("/users/:user_id/interventions", get(interventions::list_interventions))
        // Live connection
        .route("/ws", get(live::live_socket))
        // Attach state
        .with_state(state)
}

pub use activity::*;
pub use health::*;
pub use interventions::*;
pub use live::*;
pub use presence::*;
pub use transactions::*;
