//! Route tests driven through the router without a listener.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use finpulse_core::store::{MemoryExpiringStore, SqliteFinanceStore};
use finpulse_core::types::UserRecord;
use finpulse_core::{
    Engine, GenerationOptions, LlmResponse, Message, PipelineConfig, PulseResult, ReasoningModel,
};
use finpulse_server::{create_server, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct StubModel;

#[async_trait]
impl ReasoningModel for StubModel {
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> PulseResult<LlmResponse> {
        Ok(LlmResponse::text(
            json!({
                "confidence": 0.92,
                "riskLevel": "medium",
                "urgency": "high",
                "impact": "moderate",
                "reasoning": "Spending pace is ahead of budget",
                "recommendation": {"title": "Slow down", "description": "Spread purchases out."}
            })
            .to_string(),
        ))
    }

    fn model_name(&self) -> String {
        "stub".to_string()
    }
}

fn app() -> (Router, Arc<Engine>) {
    let store = Arc::new(SqliteFinanceStore::in_memory().unwrap());
    store.upsert_user(&UserRecord::new("u1")).unwrap();
    let engine = Arc::new(Engine::new(
        PipelineConfig::default(),
        store,
        Arc::new(MemoryExpiringStore::new()),
        Arc::new(StubModel),
    ));
    (create_server(AppState::new(engine.clone())), engine)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_reports_backlog() {
    let (app, _) = app();
    let (status, body) = send(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_backlog"], 0);
    assert_eq!(body["pipeline_running"], false);
    assert_eq!(body["reasoning_model"], "stub");
}

#[tokio::test]
async fn test_activity_is_accepted_and_queued() {
    let (app, engine) = app();
    let (status, body) = send(
        app.clone(),
        "POST",
        "/activity",
        Some(json!({"user_id": "u1", "type": "page_view", "payload": {"page": "/budgets"}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queue_backlog"], 1);

    engine.run_drain_cycle().await;
    let (status, body) = send(app.clone(), "GET", "/presence/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], json!(["u1"]));

    let (status, body) = send(app, "GET", "/presence/u1/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visits"][0]["page"], "/budgets");
}

#[tokio::test]
async fn test_client_timestamp_does_not_pin_presence() {
    let (app, engine) = app();
    let future = chrono::Utc::now() + chrono::Duration::days(365);
    let (status, _) = send(
        app,
        "POST",
        "/activity",
        Some(json!({
            "user_id": "u1",
            "type": "page_view",
            "payload": {"page": "/budgets"},
            "timestamp": future.to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    engine.run_drain_cycle().await;
    let presence = engine.get_user_presence("u1").await.unwrap();
    assert!(presence.last_activity <= chrono::Utc::now());
    assert_eq!(engine.sweep_presence(future - chrono::Duration::days(300)), 1);
    assert!(engine.get_active_users().await.is_empty());
}

#[tokio::test]
async fn test_activity_rejects_blank_user() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        "POST",
        "/activity",
        Some(json!({"user_id": "  ", "type": "page_view"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_score_then_feedback() {
    let (app, _) = app();
    let (status, outcome) = send(
        app.clone(),
        "POST",
        "/transactions/score",
        Some(json!({"user_id": "u1", "transaction": {"amount": 240.0, "category": "travel"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["should_intervene"], true);
    let id = outcome["intervention"]["id"].as_str().unwrap().to_string();

    let (status, listed) = send(app.clone(), "GET", "/users/u1/interventions?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 1);

    let (status, bad) = send(
        app.clone(),
        "POST",
        &format!("/interventions/{}/feedback", id),
        Some(json!({"rating": 7, "helpful": true})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad["error"]["code"], "VAL_004");

    let (status, updated) = send(
        app,
        "POST",
        &format!("/interventions/{}/feedback", id),
        Some(json!({"rating": 4, "helpful": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "acknowledged");
}

#[tokio::test]
async fn test_unknown_intervention_is_404() {
    let (app, _) = app();
    let missing = "4f1c7a9e-8e35-4d0b-9b55-3f7b1f0d2a11";
    let (status, _) = send(app.clone(), "GET", &format!("/interventions/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        app,
        "POST",
        &format!("/interventions/{}/feedback", missing),
        Some(json!({"rating": 5, "helpful": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ENT_001");
}
