//! Integration tests for the activity pipeline.
//!
//! Drives the public engine surface end to end with a scripted reasoning model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use finpulse_core::store::{MemoryExpiringStore, SqliteFinanceStore};
use finpulse_core::types::UserRecord;
use finpulse_core::{
    ActivityEvent, ActivityKind, Engine, Feedback, GenerationOptions, InterventionStatus,
    InterventionType, LlmResponse, Message, PipelineConfig, PipelineRuntime, PulseResult,
    ReasoningModel, SkipReason, TransactionPayload,
};
use serde_json::json;

/// Always answers with a high-confidence, high-urgency analysis.
struct ScriptedModel {
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReasoningModel for ScriptedModel {
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> PulseResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "confidence": 0.95,
            "riskLevel": "high",
            "urgency": "high",
            "impact": "significant",
            "reasoning": "Large discretionary purchase near the end of the month",
            "recommendation": {
                "title": "Hold off",
                "description": "Consider waiting until your next paycheck.",
                "action": "delay_purchase"
            }
        });
        Ok(LlmResponse::text(format!("```json\n{}\n```", body)))
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}

struct Fixture {
    engine: Arc<Engine>,
    store: Arc<SqliteFinanceStore>,
    model: Arc<ScriptedModel>,
}

fn fixture() -> Fixture {
    let store = Arc::new(SqliteFinanceStore::in_memory().unwrap());
    store
        .upsert_user(&UserRecord::new("alice").with_finances(5000.0, 4200.0, 1200.0, 3000.0))
        .unwrap();
    let model = Arc::new(ScriptedModel::new());
    let config = PipelineConfig::default().with_drain_interval(Duration::from_millis(20));
    let engine = Arc::new(Engine::new(
        config,
        store.clone(),
        Arc::new(MemoryExpiringStore::new()),
        model.clone(),
    ));
    Fixture {
        engine,
        store,
        model,
    }
}

#[tokio::test]
async fn test_transaction_start_reaches_live_connection() {
    let f = fixture();
    let mut connection = f.engine.live_hub().subscribe("alice");
    let mut runtime = PipelineRuntime::new(f.engine.clone());
    runtime.start().await.unwrap();

    f.engine
        .ingest_activity(
            "alice",
            ActivityEvent::new(
                "alice",
                ActivityKind::TransactionStart,
                json!({"amount": 899.0, "category": "shopping", "merchant": "Gadget Hut"}),
            ),
        )
        .await;

    let message = tokio::time::timeout(Duration::from_secs(2), connection.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.event, "intervention");
    assert_eq!(message.payload["type"], "spending_alert");

    runtime.shutdown().await.unwrap();

    let stored = f.engine.list_interventions("alice", 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, InterventionStatus::Delivered);
    assert_eq!(f.engine.get_active_users().await, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_cooldown_suppresses_second_score_in_same_category() {
    let f = fixture();
    let transaction = TransactionPayload::new(450.0, "shopping");

    let first = f.engine.score_transaction(&transaction, "alice").await;
    assert!(first.should_intervene);
    assert_eq!(first.intervention.unwrap().kind, InterventionType::SpendingAlert);

    let second = f.engine.score_transaction(&transaction, "alice").await;
    assert!(!second.should_intervene);
    assert_eq!(second.skip_reason, Some(SkipReason::Cooldown));
    assert_eq!(f.model.calls.load(Ordering::SeqCst), 1);

    let other = f
        .engine
        .score_transaction(&TransactionPayload::new(120.0, "food"), "alice")
        .await;
    assert!(other.should_intervene);
    assert_eq!(f.store.count_interventions("alice").unwrap(), 2);
}

#[tokio::test]
async fn test_feedback_is_attached_to_intervention() {
    let f = fixture();
    let outcome = f
        .engine
        .score_transaction(&TransactionPayload::new(300.0, "shopping"), "alice")
        .await;
    let id = outcome.intervention.unwrap().id;

    let updated = f
        .engine
        .submit_feedback(id, Feedback::new(5, true))
        .await
        .unwrap();
    assert_eq!(updated.status, InterventionStatus::Acknowledged);
    let learning = updated.learning.unwrap();
    assert!((learning.satisfaction - 1.0).abs() < 1e-9);
    assert!((learning.effectiveness - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_page_views_build_a_session() {
    let f = fixture();
    for page in ["/dashboard", "/budgets", "/goals"] {
        f.engine
            .ingest_activity(
                "alice",
                ActivityEvent::new(
                    "alice",
                    ActivityKind::PageView,
                    json!({"page": page, "session_id": "web-1", "duration_secs": 12}),
                ),
            )
            .await;
    }
    let report = f.engine.run_drain_cycle().await;
    assert_eq!(report.processed, 3);

    let session = f.engine.get_user_session("alice").await.unwrap();
    assert_eq!(session.visits.len(), 3);
    assert_eq!(session.total_duration_secs, 36);
    assert_eq!(f.model.calls.load(Ordering::SeqCst), 0);
}
