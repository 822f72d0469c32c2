//! Persistence collaborator: the system of record for users, transactions and
//! the intervention ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PulseResult;
use crate::types::{Feedback, Intervention, LearningMetrics, UserRecord};

/// Aggregate of a user's spend in one category over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendSummary {
    pub total: f64,
    pub count: u64,
}

impl SpendSummary {
    /// Mean amount per transaction, or `None` with no transactions.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

/// Storage operations the pipeline relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FinanceStore: Send + Sync {
    /// Read the authoritative user record.
    async fn get_user(&self, user_id: &str) -> PulseResult<Option<UserRecord>>;

    /// Bump the user's activity counter and last-active timestamp.
    async fn record_user_activity(&self, user_id: &str, at: DateTime<Utc>) -> PulseResult<()>;

    /// Total and count of the user's transactions in `category` since `since`.
    async fn category_spend(
        &self,
        user_id: &str,
        category: &str,
        since: DateTime<Utc>,
    ) -> PulseResult<SpendSummary>;

    /// Monthly budget for the user's category, if one is set.
    async fn get_budget(&self, user_id: &str, category: &str) -> PulseResult<Option<f64>>;

    /// Append an intervention to the ledger.
    async fn create_intervention(&self, intervention: &Intervention) -> PulseResult<()>;

    /// Read an intervention by id.
    async fn get_intervention(&self, id: Uuid) -> PulseResult<Option<Intervention>>;

    /// Mark an intervention delivered. Returns false if it does not exist.
    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> PulseResult<bool>;

    /// Attach feedback and learning metrics. Returns false if the intervention does not exist.
    async fn record_feedback(
        &self,
        id: Uuid,
        feedback: &Feedback,
        metrics: &LearningMetrics,
    ) -> PulseResult<bool>;

    /// Most recent interventions for a user, newest first.
    async fn list_interventions(&self, user_id: &str, limit: usize)
        -> PulseResult<Vec<Intervention>>;

    /// Highest milestone already recorded for a goal, from its goal_progress interventions.
    async fn highest_goal_milestone(&self, user_id: &str, goal_id: &str)
        -> PulseResult<Option<u8>>;

    /// Users last active before `inactive_before` with no engagement intervention
    /// created since that last activity.
    async fn users_needing_engagement(
        &self,
        inactive_before: DateTime<Utc>,
    ) -> PulseResult<Vec<UserRecord>>;
}
