//! Intervention dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tracing::{debug, info, warn};

use super::rules::{anomaly_intervention, budget_intervention, budget_utilization, is_anomalous};
use crate::config::PipelineConfig;
use crate::cooldown::CooldownStore;
use crate::error::PulseResult;
use crate::traits::{FinanceStore, LiveChannel, LiveMessage};
use crate::types::{DeliveryChannel, Intervention};

/// Live event name for intervention notifications.
pub const INTERVENTION_EVENT: &str = "intervention";

/// Rule thresholds and the cooldown applied to rule interventions.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub budget_threshold: f64,
    pub anomaly_multiplier: f64,
    pub anomaly_window: chrono::Duration,
    pub cooldown: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for DispatchSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            budget_threshold: config.budget_threshold,
            anomaly_multiplier: config.anomaly_multiplier,
            anomaly_window: config.anomaly_window(),
            cooldown: config.cooldown(),
        }
    }
}

/// Pushes interventions to live connections and records delivery.
pub struct InterventionDispatcher {
    store: Arc<dyn FinanceStore>,
    live: Arc<dyn LiveChannel>,
    cooldowns: CooldownStore,
    settings: DispatchSettings,
}

impl InterventionDispatcher {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        live: Arc<dyn LiveChannel>,
        cooldowns: CooldownStore,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            live,
            cooldowns,
            settings,
        }
    }

    /// Deliver a persisted intervention. Returns the number of live recipients.
    ///
    /// In-app interventions are pushed to every live connection of the user; none
    /// open is a silent no-op. Email interventions are handed off, not pushed.
    /// Either way the intervention is marked delivered.
    pub async fn dispatch(&self, user_id: &str, intervention: &Intervention) -> usize {
        let recipients = match intervention.delivery.channel {
            DeliveryChannel::InApp => match serde_json::to_value(intervention.to_notification()) {
                Ok(payload) => self
                    .live
                    .send(user_id, LiveMessage::new(INTERVENTION_EVENT, payload)),
                Err(e) => {
                    warn!(intervention_id = %intervention.id, error = %e, "Failed to encode notification");
                    0
                }
            },
            DeliveryChannel::Email => {
                info!(
                    user_id,
                    intervention_id = %intervention.id,
                    kind = %intervention.kind,
                    "Intervention handed off for email delivery"
                );
                0
            }
        };

        debug!(user_id, intervention_id = %intervention.id, recipients, "Intervention dispatched");

        if let Err(e) = self.store.mark_delivered(intervention.id, Utc::now()).await {
            warn!(intervention_id = %intervention.id, error = %e, "Failed to mark intervention delivered");
        }
        recipients
    }

    /// Persist and deliver a rule intervention if `cooldown_category` is free.
    ///
    /// Returns `None` when a cooldown suppressed it.
    pub async fn persist_and_dispatch(
        &self,
        intervention: Intervention,
        cooldown_category: &str,
    ) -> PulseResult<Option<Intervention>> {
        let user_id = intervention.user_id.clone();

        if !self
            .cooldowns
            .try_claim(&user_id, cooldown_category, self.settings.cooldown)
            .await?
        {
            debug!(user_id = %user_id, cooldown_category, "Rule intervention suppressed by cooldown");
            return Ok(None);
        }

        if let Err(e) = self.store.create_intervention(&intervention).await {
            self.cooldowns.clear(&user_id, cooldown_category).await?;
            return Err(e);
        }

        info!(
            user_id = %user_id,
            intervention_id = %intervention.id,
            kind = %intervention.kind,
            trigger = %intervention.trigger,
            "Rule intervention created"
        );
        self.dispatch(&user_id, &intervention).await;
        Ok(Some(intervention))
    }

    /// Budget rule: utilization strictly above the threshold yields a budget warning.
    pub async fn check_budget_threshold(
        &self,
        user_id: &str,
        category: &str,
        spent: f64,
        budget: f64,
    ) -> PulseResult<Option<Intervention>> {
        let Some(utilization) = budget_utilization(spent, budget) else {
            return Ok(None);
        };
        if utilization <= self.settings.budget_threshold {
            return Ok(None);
        }

        let intervention = budget_intervention(user_id, category, spent, budget, utilization);
        self.persist_and_dispatch(intervention, &format!("budget:{}", category))
            .await
    }

    /// Budget rule using the stored budget and month-to-date spend.
    pub async fn check_stored_budget(
        &self,
        user_id: &str,
        category: &str,
    ) -> PulseResult<Option<Intervention>> {
        let Some(budget) = self.store.get_budget(user_id, category).await? else {
            return Ok(None);
        };
        let spent = self.month_to_date_spend(user_id, category).await?;
        self.check_budget_threshold(user_id, category, spent, budget)
            .await
    }

    pub(crate) async fn month_to_date_spend(&self, user_id: &str, category: &str) -> PulseResult<f64> {
        let now = Utc::now();
        let month_start = now
            .date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        Ok(self
            .store
            .category_spend(user_id, category, month_start)
            .await?
            .total)
    }

    /// Anomaly rule: an amount strictly above the multiple of the windowed
    /// per-transaction average yields a spending alert.
    pub async fn check_anomalous_spend(
        &self,
        user_id: &str,
        category: &str,
        amount: f64,
    ) -> PulseResult<Option<Intervention>> {
        let since = Utc::now() - self.settings.anomaly_window;
        let summary = self.store.category_spend(user_id, category, since).await?;
        let Some(average) = summary.average() else {
            return Ok(None);
        };
        if !is_anomalous(amount, average, self.settings.anomaly_multiplier) {
            return Ok(None);
        }

        let intervention = anomaly_intervention(user_id, category, amount, average);
        self.persist_and_dispatch(intervention, &format!("anomaly:{}", category))
            .await
    }
}
