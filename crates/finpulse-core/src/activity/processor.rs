//! Per-kind handling of drained activity events.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::queue::ActivityQueue;
use crate::dispatch::{goal_intervention, goal_milestone, InterventionDispatcher};
use crate::error::PulseResult;
use crate::presence::PresenceTracker;
use crate::scoring::DecisionScorer;
use crate::traits::{ExpiringStore, FinanceStore};
use crate::types::{
    ActivityEvent, ActivityKind, BudgetCheckPayload, GoalUpdatePayload, TransactionPayload,
};

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
}

/// Routes activity events to their handlers.
pub struct ActivityProcessor {
    presence: Arc<PresenceTracker>,
    store: Arc<dyn FinanceStore>,
    context_store: Arc<dyn ExpiringStore>,
    scorer: Arc<DecisionScorer>,
    dispatcher: Arc<InterventionDispatcher>,
    context_ttl: Duration,
}

impl ActivityProcessor {
    pub fn new(
        presence: Arc<PresenceTracker>,
        store: Arc<dyn FinanceStore>,
        context_store: Arc<dyn ExpiringStore>,
        scorer: Arc<DecisionScorer>,
        dispatcher: Arc<InterventionDispatcher>,
        context_ttl: Duration,
    ) -> Self {
        Self {
            presence,
            store,
            context_store,
            scorer,
            dispatcher,
            context_ttl,
        }
    }

    /// Process up to `batch_size` queued events in arrival order.
    ///
    /// A failing event is logged and skipped; the rest of the batch still runs.
    pub async fn drain_once(&self, queue: &ActivityQueue, batch_size: usize) -> DrainReport {
        let batch = queue.drain_batch(batch_size).await;
        if batch.is_empty() {
            return DrainReport::default();
        }

        let mut report = DrainReport::default();
        for event in &batch {
            report.processed += 1;
            if let Err(e) = self.process(event).await {
                report.failed += 1;
                warn!(
                    user_id = %event.user_id,
                    kind = %event.kind,
                    error = %e,
                    "Activity event dropped"
                );
            }
        }

        debug!(
            processed = report.processed,
            failed = report.failed,
            remaining = queue.len(),
            "Drain cycle complete"
        );
        report
    }

    /// Handle one event: presence and activity bookkeeping, then the per-kind handler.
    pub async fn process(&self, event: &ActivityEvent) -> PulseResult<()> {
        let recorded = self.presence.record_activity(event);
        if let Err(e) = self
            .store
            .record_user_activity(&event.user_id, event.timestamp)
            .await
        {
            warn!(user_id = %event.user_id, error = %e, "Failed to record user activity");
        }
        recorded?;

        match event.kind {
            ActivityKind::PageView => Ok(()),
            ActivityKind::TransactionStart => self.on_transaction_start(event).await,
            ActivityKind::FinancialDecision => {
                let transaction: TransactionPayload = event.parse_payload()?;
                self.score_and_dispatch(&event.user_id, &transaction).await;
                Ok(())
            }
            ActivityKind::TransactionComplete => self.on_transaction_complete(event).await,
            ActivityKind::BudgetCheck => self.on_budget_check(event).await,
            ActivityKind::GoalUpdate => self.on_goal_update(event).await,
        }
    }

    fn context_key(user_id: &str) -> String {
        format!("txctx:{}", user_id)
    }

    async fn on_transaction_start(&self, event: &ActivityEvent) -> PulseResult<()> {
        let transaction: TransactionPayload = event.parse_payload()?;

        let context = serde_json::json!({
            "transaction": transaction,
            "started_at": event.timestamp,
            "reported_at": event.reported_at,
        });
        if let Err(e) = self
            .context_store
            .set_with_ttl(
                &Self::context_key(&event.user_id),
                context.to_string(),
                self.context_ttl,
            )
            .await
        {
            warn!(user_id = %event.user_id, error = %e, "Failed to store transaction context");
        }

        self.score_and_dispatch(&event.user_id, &transaction).await;
        Ok(())
    }

    async fn score_and_dispatch(&self, user_id: &str, transaction: &TransactionPayload) {
        let outcome = self.scorer.score(transaction, user_id).await;
        if !outcome.should_intervene {
            return;
        }
        if let Some(intervention) = outcome.intervention {
            self.dispatcher.dispatch(user_id, &intervention).await;
        }
    }

    async fn on_transaction_complete(&self, event: &ActivityEvent) -> PulseResult<()> {
        let transaction: TransactionPayload = event.parse_payload()?;
        let user_id = event.user_id.as_str();

        if let Err(e) = self
            .context_store
            .delete(&Self::context_key(user_id))
            .await
        {
            debug!(user_id, error = %e, "Failed to clear transaction context");
        }

        let anomaly = self
            .dispatcher
            .check_anomalous_spend(user_id, &transaction.category, transaction.amount)
            .await;
        let budget = self
            .dispatcher
            .check_stored_budget(user_id, &transaction.category)
            .await;

        anomaly?;
        budget?;
        Ok(())
    }

    async fn on_budget_check(&self, event: &ActivityEvent) -> PulseResult<()> {
        let check: BudgetCheckPayload = event.parse_payload()?;
        let user_id = event.user_id.as_str();

        let budget = match check.budget {
            Some(budget) => Some(budget),
            None => self.store.get_budget(user_id, &check.category).await?,
        };
        let Some(budget) = budget else {
            debug!(user_id, category = %check.category, "No budget set, skipping check");
            return Ok(());
        };
        let spent = match check.spent {
            Some(spent) => spent,
            None => {
                self.dispatcher
                    .month_to_date_spend(user_id, &check.category)
                    .await?
            }
        };

        self.dispatcher
            .check_budget_threshold(user_id, &check.category, spent, budget)
            .await?;
        Ok(())
    }

    async fn on_goal_update(&self, event: &ActivityEvent) -> PulseResult<()> {
        let update: GoalUpdatePayload = event.parse_payload()?;
        let Some(milestone) = goal_milestone(update.progress) else {
            return Ok(());
        };
        let reached = self
            .store
            .highest_goal_milestone(&event.user_id, &update.goal_id)
            .await?;
        if reached.is_some_and(|m| m >= milestone) {
            debug!(
                user_id = %event.user_id,
                goal_id = %update.goal_id,
                milestone,
                "Goal milestone already reached"
            );
            return Ok(());
        }

        let intervention = goal_intervention(
            &event.user_id,
            &update.goal_id,
            update.name.as_deref(),
            milestone,
        );
        let created = self
            .dispatcher
            .persist_and_dispatch(intervention, &format!("goal:{}:{}", update.goal_id, milestone))
            .await?;
        if created.is_some() {
            info!(
                user_id = %event.user_id,
                goal_id = %update.goal_id,
                milestone,
                "Goal milestone reached"
            );
        }
        Ok(())
    }
}
