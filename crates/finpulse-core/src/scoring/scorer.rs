//! Decision scorer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::parser::parse_analysis;
use super::policy::{classify, policy_allows, priority};
use super::prompts::AnalysisRequest;
use crate::config::PipelineConfig;
use crate::cooldown::CooldownStore;
use crate::error::{PulseError, PulseResult};
use crate::profile::ProfileCache;
use crate::traits::{FinanceStore, GenerationOptions, ReasoningModel, ResponseFormat};
use crate::types::{
    Intervention, InterventionAnalysis, TransactionPayload, TriggerSource,
    UserFinancialProfileSnapshot,
};

/// Why a scoring call did not produce an intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A live cooldown exists for the (user, category) pair.
    Cooldown,
    /// No profile could be loaded for the user.
    ProfileUnavailable,
    /// The reasoning call failed, timed out, or returned an invalid analysis.
    AnalysisFailed,
    /// Confidence was below the threshold.
    LowConfidence,
    /// The user's intervention-level preference declined it.
    PolicyDeclined,
    /// A concurrent scorer claimed the cooldown first.
    CooldownClaimed,
    /// The intervention could not be written to the ledger.
    PersistFailed,
}

/// Result of one scoring call. Scoring never fails; problems are reported here.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub should_intervene: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<Intervention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreOutcome {
    fn intervene(intervention: Intervention) -> Self {
        Self {
            should_intervene: true,
            intervention: Some(intervention),
            skip_reason: None,
            error: None,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            should_intervene: false,
            intervention: None,
            skip_reason: Some(reason),
            error: None,
        }
    }

    fn failed(reason: SkipReason, error: &PulseError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::skip(reason)
        }
    }
}

/// Tunables for the scorer.
#[derive(Debug, Clone)]
pub struct ScorerSettings {
    pub confidence_threshold: f64,
    pub cooldown: Duration,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ScorerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            cooldown: config.cooldown(),
            timeout: config.reasoning_timeout(),
            temperature: config.reasoning.config.temperature,
            max_tokens: config.reasoning.config.max_tokens.min(2000),
        }
    }
}

/// Decides whether a transaction-like event warrants an intervention.
pub struct DecisionScorer {
    cooldowns: CooldownStore,
    profiles: ProfileCache,
    reasoning: Arc<dyn ReasoningModel>,
    store: Arc<dyn FinanceStore>,
    settings: ScorerSettings,
}

impl DecisionScorer {
    pub fn new(
        cooldowns: CooldownStore,
        profiles: ProfileCache,
        reasoning: Arc<dyn ReasoningModel>,
        store: Arc<dyn FinanceStore>,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            cooldowns,
            profiles,
            reasoning,
            store,
            settings,
        }
    }

    /// Score a transaction for a user, persisting an intervention when warranted.
    #[instrument(skip(self, transaction), fields(category = %transaction.category))]
    pub async fn score(&self, transaction: &TransactionPayload, user_id: &str) -> ScoreOutcome {
        let category = transaction.category.as_str();

        match self.cooldowns.is_in_cooldown(user_id, category).await {
            Ok(true) => {
                debug!("In cooldown, skipping");
                return ScoreOutcome::skip(SkipReason::Cooldown);
            }
            Ok(false) => {}
            Err(e) => {
                // Unknown cooldown state is treated as active.
                warn!(error = %e, "Cooldown check failed");
                return ScoreOutcome::failed(SkipReason::Cooldown, &e);
            }
        }

        let Some(profile) = self.profiles.get(user_id).await else {
            error!("No financial profile for user");
            return ScoreOutcome::skip(SkipReason::ProfileUnavailable);
        };

        let analysis = match self.analyze(transaction, &profile).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(error = %e, "Transaction analysis failed");
                return ScoreOutcome::failed(SkipReason::AnalysisFailed, &e);
            }
        };

        if analysis.confidence < self.settings.confidence_threshold {
            debug!(confidence = analysis.confidence, "Below confidence threshold");
            return ScoreOutcome::skip(SkipReason::LowConfidence);
        }

        if !policy_allows(profile.intervention_level, analysis.urgency, analysis.impact) {
            debug!(
                level = %profile.intervention_level,
                urgency = %analysis.urgency,
                impact = %analysis.impact,
                "Declined by intervention-level preference"
            );
            return ScoreOutcome::skip(SkipReason::PolicyDeclined);
        }

        let kind = classify(&analysis, category);
        let priority = priority(analysis.urgency, analysis.impact, analysis.confidence);
        let intervention = Intervention::new(
            user_id,
            kind,
            TriggerSource::TransactionScoring,
            category,
            analysis,
            priority,
        )
        .with_context(serde_json::json!({ "transaction": transaction }));

        self.persist(intervention).await
    }

    async fn analyze(
        &self,
        transaction: &TransactionPayload,
        profile: &UserFinancialProfileSnapshot,
    ) -> PulseResult<InterventionAnalysis> {
        let messages = AnalysisRequest::new(transaction, profile).to_messages()?;
        let options = GenerationOptions {
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
            response_format: Some(ResponseFormat::Json),
        };

        let response = tokio::time::timeout(
            self.settings.timeout,
            self.reasoning.generate(&messages, Some(options)),
        )
        .await
        .map_err(|_| PulseError::reasoning_timeout(self.settings.timeout.as_millis()))??;

        parse_analysis(response.content_or_empty())
    }

    async fn persist(&self, intervention: Intervention) -> ScoreOutcome {
        let user_id = intervention.user_id.as_str();
        let category = intervention.category.as_str();

        match self
            .cooldowns
            .try_claim(user_id, category, self.settings.cooldown)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Cooldown claimed concurrently, dropping duplicate");
                return ScoreOutcome::skip(SkipReason::CooldownClaimed);
            }
            Err(e) => {
                warn!(error = %e, "Failed to claim cooldown");
                return ScoreOutcome::failed(SkipReason::CooldownClaimed, &e);
            }
        }

        if let Err(e) = self.store.create_intervention(&intervention).await {
            error!(error = %e, "Failed to persist intervention");
            if let Err(release) = self.cooldowns.clear(user_id, category).await {
                warn!(error = %release, "Failed to release cooldown");
            }
            return ScoreOutcome::failed(SkipReason::PersistFailed, &e);
        }

        info!(
            intervention_id = %intervention.id,
            kind = %intervention.kind,
            priority = intervention.delivery.priority,
            confidence = intervention.analysis.confidence,
            "Intervention created"
        );
        ScoreOutcome::intervene(intervention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryExpiringStore, SqliteFinanceStore};
    use crate::traits::{LlmResponse, MockReasoningModel};
    use crate::types::{InterventionType, Message, UserRecord};
    use async_trait::async_trait;

    fn analysis_json(confidence: f64, risk: &str, urgency: &str, impact: &str) -> String {
        serde_json::json!({
            "confidence": confidence,
            "riskLevel": risk,
            "urgency": urgency,
            "impact": impact,
            "reasoning": "Purchase is large relative to monthly surplus",
            "recommendation": {
                "title": "Pause before buying",
                "description": "This purchase uses most of this month's surplus.",
                "action": "pause",
                "suggestedActions": ["Wait 24 hours"]
            }
        })
        .to_string()
    }

    struct Harness {
        scorer: DecisionScorer,
        store: Arc<SqliteFinanceStore>,
    }

    fn harness(model: Arc<dyn ReasoningModel>, level: &str) -> Harness {
        let store = Arc::new(SqliteFinanceStore::in_memory().unwrap());
        store
            .upsert_user(
                &UserRecord::new("u1")
                    .with_finances(4000.0, 3600.0, 500.0, 9000.0)
                    .with_intervention_level(level),
            )
            .unwrap();

        let kv = Arc::new(MemoryExpiringStore::new());
        let profiles = ProfileCache::new(kv.clone(), store.clone(), Duration::from_secs(300));
        let scorer = DecisionScorer::new(
            CooldownStore::new(kv),
            profiles,
            model,
            store.clone(),
            ScorerSettings::default(),
        );
        Harness { scorer, store }
    }

    fn model_returning(times: usize, content: String) -> Arc<dyn ReasoningModel> {
        let mut model = MockReasoningModel::new();
        model
            .expect_generate()
            .times(times)
            .returning(move |_, _| Ok(LlmResponse::text(content.clone())));
        Arc::new(model)
    }

    fn shopping(amount: f64) -> TransactionPayload {
        TransactionPayload::new(amount, "shopping").with_merchant("Gadget Store")
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_until_expiry() {
        let h = harness(
            model_returning(2, analysis_json(0.95, "high", "high", "significant")),
            "moderate",
        );

        let first = h.scorer.score(&shopping(400.0), "u1").await;
        assert!(first.should_intervene);
        let created = first.intervention.unwrap();
        assert_eq!(created.kind, InterventionType::SpendingAlert);
        assert_eq!(created.delivery.priority, 9);

        let again = h.scorer.score(&shopping(30.0), "u1").await;
        assert!(!again.should_intervene);
        assert_eq!(again.skip_reason, Some(SkipReason::Cooldown));

        tokio::time::advance(Duration::from_secs(299)).await;
        let still = h.scorer.score(&shopping(30.0), "u1").await;
        assert_eq!(still.skip_reason, Some(SkipReason::Cooldown));

        tokio::time::advance(Duration::from_secs(2)).await;
        let after = h.scorer.score(&shopping(400.0), "u1").await;
        assert!(after.should_intervene);
        assert_eq!(h.store.count_interventions("u1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_does_not_cross_categories() {
        let h = harness(
            model_returning(2, analysis_json(0.95, "high", "high", "significant")),
            "moderate",
        );
        assert!(h.scorer.score(&shopping(400.0), "u1").await.should_intervene);
        let food = TransactionPayload::new(180.0, "food");
        let outcome = h.scorer.score(&food, "u1").await;
        assert!(outcome.should_intervene);
        assert_eq!(
            outcome.intervention.unwrap().kind,
            InterventionType::BudgetWarning
        );
    }

    #[tokio::test]
    async fn test_malformed_output_is_absorbed_and_nothing_persisted() {
        let h = harness(
            model_returning(2, r#"{"confidence": 0.9, "riskLevel": "high"}"#.to_string()),
            "aggressive",
        );

        for _ in 0..2 {
            let outcome = h.scorer.score(&shopping(400.0), "u1").await;
            assert!(!outcome.should_intervene);
            assert_eq!(outcome.skip_reason, Some(SkipReason::AnalysisFailed));
            assert!(outcome.error.is_some());
        }
        assert_eq!(h.store.count_interventions("u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_absorbed() {
        let mut model = MockReasoningModel::new();
        model
            .expect_generate()
            .returning(|_, _| Err(PulseError::rate_limit("slow down")));
        let h = harness(Arc::new(model), "aggressive");

        let outcome = h.scorer.score(&shopping(400.0), "u1").await;
        assert_eq!(outcome.skip_reason, Some(SkipReason::AnalysisFailed));
        assert!(outcome.error.unwrap().contains("Rate limit"));
    }

    struct StalledModel;

    #[async_trait]
    impl ReasoningModel for StalledModel {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> PulseResult<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LlmResponse::text(analysis_json(0.99, "high", "immediate", "major")))
        }

        fn model_name(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoning_timeout_is_a_failed_analysis() {
        let h = harness(Arc::new(StalledModel), "aggressive");
        let outcome = h.scorer.score(&shopping(400.0), "u1").await;
        assert_eq!(outcome.skip_reason, Some(SkipReason::AnalysisFailed));
        assert!(outcome.error.unwrap().contains("timed out"));
        assert_eq!(h.store.count_interventions("u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_is_declined() {
        let h = harness(
            model_returning(1, analysis_json(0.79, "critical", "immediate", "major")),
            "aggressive",
        );
        let outcome = h.scorer.score(&shopping(400.0), "u1").await;
        assert_eq!(outcome.skip_reason, Some(SkipReason::LowConfidence));
    }

    #[tokio::test]
    async fn test_minimal_level_declines_high_urgency() {
        let h = harness(
            model_returning(1, analysis_json(0.85, "high", "high", "major")),
            "minimal",
        );
        let outcome = h.scorer.score(&shopping(400.0), "u1").await;
        assert!(!outcome.should_intervene);
        assert_eq!(outcome.skip_reason, Some(SkipReason::PolicyDeclined));
    }

    #[tokio::test]
    async fn test_aggressive_level_declines_low_and_minimal() {
        let h = harness(
            model_returning(1, analysis_json(0.85, "low", "low", "minimal")),
            "aggressive",
        );
        let outcome = h.scorer.score(&shopping(400.0), "u1").await;
        assert_eq!(outcome.skip_reason, Some(SkipReason::PolicyDeclined));
    }

    #[tokio::test]
    async fn test_priority_clamps_to_ten() {
        let h = harness(
            model_returning(1, analysis_json(0.95, "critical", "immediate", "major")),
            "minimal",
        );
        let outcome = h.scorer.score(&shopping(2400.0), "u1").await;
        assert!(outcome.should_intervene);
        assert_eq!(outcome.intervention.unwrap().delivery.priority, 10);
    }

    #[tokio::test]
    async fn test_unknown_user_skips_without_calling_reasoning() {
        let h = harness(model_returning(0, String::new()), "moderate");
        let outcome = h.scorer.score(&shopping(400.0), "nobody").await;
        assert_eq!(outcome.skip_reason, Some(SkipReason::ProfileUnavailable));
    }
}
