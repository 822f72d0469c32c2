//! Engine facade: the operations the route layer calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activity::{ActivityProcessor, ActivityQueue, DrainReport};
use crate::config::PipelineConfig;
use crate::cooldown::CooldownStore;
use crate::dispatch::{DispatchSettings, InterventionDispatcher};
use crate::engagement::EngagementSweep;
use crate::error::{PulseError, PulseResult};
use crate::live::LiveHub;
use crate::presence::PresenceTracker;
use crate::profile::ProfileCache;
use crate::scoring::{DecisionScorer, ScoreOutcome, ScorerSettings};
use crate::store::{MemoryExpiringStore, SqliteFinanceStore};
use crate::traits::{ExpiringStore, FinanceStore, ReasoningModel};
use crate::types::{
    ActivityEvent, Feedback, Intervention, LearningMetrics, PresenceEntry, SessionContext,
    TransactionPayload,
};

/// Owns every pipeline component and exposes the produced interface.
///
/// Background work (drain loop and sweeps) is driven by
/// [`PipelineRuntime`](crate::runtime::PipelineRuntime).
pub struct Engine {
    config: PipelineConfig,
    queue: Arc<ActivityQueue>,
    presence: Arc<PresenceTracker>,
    store: Arc<dyn FinanceStore>,
    profiles: ProfileCache,
    scorer: Arc<DecisionScorer>,
    dispatcher: Arc<InterventionDispatcher>,
    processor: ActivityProcessor,
    engagement: EngagementSweep,
    hub: LiveHub,
    kv: Arc<dyn ExpiringStore>,
    reasoning: Arc<dyn ReasoningModel>,
}

impl Engine {
    /// Wire the pipeline over the given collaborators.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn FinanceStore>,
        kv: Arc<dyn ExpiringStore>,
        reasoning: Arc<dyn ReasoningModel>,
    ) -> Self {
        let hub = LiveHub::new();
        let queue = Arc::new(ActivityQueue::new());
        let presence = Arc::new(PresenceTracker::new(config.presence_ttl()));
        let cooldowns = CooldownStore::new(kv.clone());
        let profiles = ProfileCache::new(kv.clone(), store.clone(), config.profile_ttl());

        let scorer = Arc::new(DecisionScorer::new(
            cooldowns.clone(),
            profiles.clone(),
            reasoning.clone(),
            store.clone(),
            ScorerSettings::from(&config),
        ));
        let dispatcher = Arc::new(InterventionDispatcher::new(
            store.clone(),
            Arc::new(hub.clone()),
            cooldowns,
            DispatchSettings::from(&config),
        ));
        let processor = ActivityProcessor::new(
            presence.clone(),
            store.clone(),
            kv.clone(),
            scorer.clone(),
            dispatcher.clone(),
            config.transaction_context_ttl(),
        );
        let engagement = EngagementSweep::new(store.clone(), dispatcher.clone(), config.inactivity());

        Self {
            config,
            queue,
            presence,
            store,
            profiles,
            scorer,
            dispatcher,
            processor,
            engagement,
            hub,
            kv,
            reasoning,
        }
    }

    /// Open the configured stores and wire the pipeline.
    ///
    /// The ledger is the SQLite file at `db_path`. The expiring store is Redis when
    /// `redis_url` is set and the `redis` feature is enabled, else in-process.
    pub async fn open(config: PipelineConfig, reasoning: Arc<dyn ReasoningModel>) -> PulseResult<Self> {
        config.validate()?;

        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %config.db_path.display(), "Opening finance store");
        let store: Arc<dyn FinanceStore> = Arc::new(SqliteFinanceStore::new(&config.db_path)?);
        let kv = Self::open_expiring_store(&config).await?;

        Ok(Self::new(config, store, kv, reasoning))
    }

    #[cfg(feature = "redis")]
    async fn open_expiring_store(config: &PipelineConfig) -> PulseResult<Arc<dyn ExpiringStore>> {
        match &config.redis_url {
            Some(url) => {
                debug!("Using Redis expiring store");
                Ok(Arc::new(crate::store::RedisExpiringStore::new(url, "finpulse").await?))
            }
            None => Ok(Arc::new(MemoryExpiringStore::new())),
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn open_expiring_store(config: &PipelineConfig) -> PulseResult<Arc<dyn ExpiringStore>> {
        if config.redis_url.is_some() {
            tracing::warn!("redis_url is set but the redis feature is disabled; using in-memory store");
        }
        Ok(Arc::new(MemoryExpiringStore::new()))
    }

    /// Queue an activity event for the drain loop, stamped with the receive time. Never blocks.
    pub async fn ingest_activity(&self, user_id: &str, mut event: ActivityEvent) {
        event.user_id = user_id.to_string();
        event.timestamp = Utc::now();
        self.queue.enqueue(event);
    }

    /// Score a transaction now and push any resulting intervention.
    #[instrument(skip(self, transaction))]
    pub async fn score_transaction(
        &self,
        transaction: &TransactionPayload,
        user_id: &str,
    ) -> ScoreOutcome {
        let outcome = self.scorer.score(transaction, user_id).await;
        if let (true, Some(intervention)) = (outcome.should_intervene, &outcome.intervention) {
            self.dispatcher.dispatch(user_id, intervention).await;
        }
        outcome
    }

    pub async fn get_active_users(&self) -> Vec<String> {
        self.presence.list_active()
    }

    pub async fn get_user_session(&self, user_id: &str) -> Option<SessionContext> {
        self.presence.get_session(user_id)
    }

    pub async fn get_user_presence(&self, user_id: &str) -> Option<PresenceEntry> {
        self.presence.get_presence(user_id)
    }

    /// Attach feedback to an intervention and return the updated record.
    ///
    /// Fails with a validation error for a rating outside 1..=5 and with
    /// not-found for an unknown intervention.
    #[instrument(skip(self, feedback), fields(rating = feedback.rating))]
    pub async fn submit_feedback(
        &self,
        intervention_id: Uuid,
        feedback: Feedback,
    ) -> PulseResult<Intervention> {
        feedback.validate()?;
        let metrics = LearningMetrics::from_feedback(&feedback);

        if !self
            .store
            .record_feedback(intervention_id, &feedback, &metrics)
            .await?
        {
            return Err(PulseError::intervention_not_found(intervention_id.to_string()));
        }

        info!(
            effectiveness = metrics.effectiveness,
            helpful = feedback.helpful,
            "Feedback recorded"
        );
        self.store
            .get_intervention(intervention_id)
            .await?
            .ok_or_else(|| PulseError::intervention_not_found(intervention_id.to_string()))
    }

    pub async fn get_intervention(&self, intervention_id: Uuid) -> PulseResult<Option<Intervention>> {
        self.store.get_intervention(intervention_id).await
    }

    pub async fn list_interventions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> PulseResult<Vec<Intervention>> {
        self.store.list_interventions(user_id, limit).await
    }

    /// Drop the cached profile after the user's financial data changed.
    pub async fn invalidate_profile(&self, user_id: &str) {
        self.profiles.invalidate(user_id).await;
    }

    /// One drain cycle over the activity queue.
    pub async fn run_drain_cycle(&self) -> DrainReport {
        self.processor
            .drain_once(&self.queue, self.config.batch_size)
            .await
    }

    /// Remove presence idle beyond the presence TTL.
    pub fn sweep_presence(&self, now: DateTime<Utc>) -> usize {
        let removed = self.presence.sweep(now);
        let pruned = self.hub.prune();
        debug!(removed, pruned, "Presence sweep complete");
        removed
    }

    /// Reclaim expired cooldown, profile and context keys.
    pub async fn purge_expired_keys(&self) -> usize {
        match self.kv.purge_expired().await {
            Ok(purged) => {
                debug!(purged, "Expired keys purged");
                purged
            }
            Err(e) => {
                warn!(error = %e, "Failed to purge expired keys");
                0
            }
        }
    }

    /// One engagement sweep.
    pub async fn run_engagement_sweep(&self, now: DateTime<Utc>) -> PulseResult<usize> {
        self.engagement.run_once(now).await
    }

    pub fn live_hub(&self) -> &LiveHub {
        &self.hub
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_user_count(&self) -> usize {
        self.presence.active_count()
    }

    pub fn reasoning_model(&self) -> String {
        self.reasoning.model_name()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
