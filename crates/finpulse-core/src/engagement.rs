//! Periodic re-engagement of inactive users.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::dispatch::InterventionDispatcher;
use crate::error::PulseResult;
use crate::traits::FinanceStore;
use crate::types::{
    DeliveryChannel, Impact, Intervention, InterventionAnalysis, InterventionType, Recommendation,
    RiskLevel, TriggerSource, Urgency, UserRecord,
};

const ENGAGEMENT_PRIORITY: u8 = 2;

/// Finds users idle beyond the inactivity window and nudges them by email.
///
/// There is no cooldown gate. A user gets at most one engagement intervention
/// per idle stretch because the store skips users already nudged since their
/// last activity.
pub struct EngagementSweep {
    store: Arc<dyn FinanceStore>,
    dispatcher: Arc<InterventionDispatcher>,
    inactivity: Duration,
}

impl EngagementSweep {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        dispatcher: Arc<InterventionDispatcher>,
        inactivity: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            inactivity,
        }
    }

    /// Run one sweep. Returns the number of interventions created.
    pub async fn run_once(&self, now: DateTime<Utc>) -> PulseResult<usize> {
        let users = self
            .store
            .users_needing_engagement(now - self.inactivity)
            .await?;
        if users.is_empty() {
            debug!("No inactive users to engage");
            return Ok(0);
        }

        let mut created = 0;
        for user in &users {
            let intervention = engagement_intervention(user, now);
            if let Err(e) = self.store.create_intervention(&intervention).await {
                warn!(user_id = %user.id, error = %e, "Failed to create engagement intervention");
                continue;
            }
            self.dispatcher.dispatch(&user.id, &intervention).await;
            created += 1;
        }

        info!(candidates = users.len(), created, "Engagement sweep complete");
        Ok(created)
    }
}

fn engagement_intervention(user: &UserRecord, now: DateTime<Utc>) -> Intervention {
    let last_seen = user.last_active_at.unwrap_or(user.created_at);
    let idle_days = (now - last_seen).num_days();

    let analysis = InterventionAnalysis::fixed(
        1.0,
        RiskLevel::Low,
        Urgency::Low,
        Impact::Minimal,
        format!("No activity for {} days", idle_days),
        Recommendation::new(
            "We miss you",
            "Check in on your budgets and goals to stay on track.",
            "check_in",
        )
        .with_actions(["Review this month's spending", "Update your savings goals"]),
    )
    .with_factor("idle_days", idle_days as f64);

    let mut intervention = Intervention::new(
        &user.id,
        InterventionType::Engagement,
        TriggerSource::ScheduledInactivity,
        "engagement",
        analysis,
        ENGAGEMENT_PRIORITY,
    )
    .with_channel(DeliveryChannel::Email)
    .with_context(serde_json::json!({
        "last_active_at": last_seen,
        "idle_days": idle_days,
    }));
    intervention.created_at = now;
    intervention
}
