//! Persisted interventions and their feedback sub-record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::analysis::{InterventionAnalysis, Urgency};
use crate::error::{ErrorCode, PulseError, PulseResult};

/// Kind of nudge surfaced to the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterventionType {
    SpendingAlert,
    BudgetWarning,
    InvestmentAdvice,
    DebtReduction,
    GoalProgress,
    Engagement,
}

/// What produced the intervention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerSource {
    TransactionScoring,
    BudgetThreshold,
    AnomalousSpend,
    GoalMilestone,
    ScheduledInactivity,
}

/// Channel the intervention is delivered through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryChannel {
    #[default]
    InApp,
    Email,
}

/// Lifecycle: created -> delivered -> acknowledged. No transition back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterventionStatus {
    #[default]
    Created,
    Delivered,
    Acknowledged,
}

/// Delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: DeliveryChannel,
    /// 1..=10.
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// User-submitted feedback on an intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// 1..=5.
    pub rating: u8,
    pub helpful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(rating: u8, helpful: bool) -> Self {
        Self {
            rating,
            helpful,
            comment: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(PulseError::Validation {
                message: format!("Rating must be between 1 and 5, got {}", self.rating),
                code: ErrorCode::ValInvalidRating,
                details: Default::default(),
                suggestion: Some("Submit a rating from 1 to 5".to_string()),
            });
        }
        Ok(())
    }
}

/// Metrics derived from feedback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningMetrics {
    /// rating / 5.
    pub satisfaction: f64,
    /// 0.6 * satisfaction + 0.4 * helpful.
    pub effectiveness: f64,
}

impl LearningMetrics {
    pub fn from_feedback(feedback: &Feedback) -> Self {
        let satisfaction = f64::from(feedback.rating) / 5.0;
        let helpful = if feedback.helpful { 1.0 } else { 0.0 };
        Self {
            satisfaction,
            effectiveness: 0.6 * satisfaction + 0.4 * helpful,
        }
    }
}

/// Durable intervention record. Only delivery bookkeeping and the feedback
/// sub-record change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub trigger: TriggerSource,
    /// Category the cooldown is keyed on.
    pub category: String,
    /// Trigger-specific context (transaction, budget figures, ...).
    #[serde(default)]
    pub context: serde_json::Value,
    pub analysis: InterventionAnalysis,
    pub delivery: Delivery,
    pub status: InterventionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning: Option<LearningMetrics>,
    pub created_at: DateTime<Utc>,
}

impl Intervention {
    pub fn new(
        user_id: impl Into<String>,
        kind: InterventionType,
        trigger: TriggerSource,
        category: impl Into<String>,
        analysis: InterventionAnalysis,
        priority: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            trigger,
            category: category.into(),
            context: serde_json::Value::Null,
            analysis,
            delivery: Delivery {
                channel: DeliveryChannel::InApp,
                priority: priority.clamp(1, 10),
                sent_at: None,
            },
            status: InterventionStatus::Created,
            feedback: None,
            learning: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_channel(mut self, channel: DeliveryChannel) -> Self {
        self.delivery.channel = channel;
        self
    }

    /// Normalized payload pushed to live connections.
    pub fn to_notification(&self) -> InterventionNotification {
        InterventionNotification {
            id: self.id,
            kind: self.kind,
            title: self.analysis.recommendation.title.clone(),
            description: self.analysis.recommendation.description.clone(),
            urgency: self.analysis.urgency,
            priority: self.delivery.priority,
            suggested_actions: self.analysis.recommendation.suggested_actions.clone(),
        }
    }
}

/// What a connected client receives for a new intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionNotification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub title: String,
    pub description: String,
    pub urgency: Urgency,
    pub priority: u8,
    pub suggested_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Impact, Recommendation, RiskLevel};

    fn sample() -> Intervention {
        Intervention::new(
            "u1",
            InterventionType::BudgetWarning,
            TriggerSource::BudgetThreshold,
            "food",
            InterventionAnalysis::fixed(
                0.95,
                RiskLevel::Medium,
                Urgency::High,
                Impact::Significant,
                "85% of the food budget used",
                Recommendation::new("Food budget almost spent", "85% used", "review")
                    .with_actions(["Plan meals at home"]),
            ),
            14,
        )
    }

    #[test]
    fn test_priority_is_clamped_on_creation() {
        assert_eq!(sample().delivery.priority, 10);
    }

    #[test]
    fn test_notification_shape() {
        let intervention = sample();
        let value = serde_json::to_value(intervention.to_notification()).unwrap();
        assert_eq!(value["type"], "budget_warning");
        assert_eq!(value["urgency"], "high");
        assert_eq!(value["title"], "Food budget almost spent");
        assert_eq!(value["suggested_actions"][0], "Plan meals at home");
    }

    #[test]
    fn test_feedback_validation_and_metrics() {
        assert!(Feedback::new(0, true).validate().is_err());
        assert!(Feedback::new(6, true).validate().is_err());

        let feedback = Feedback::new(4, true);
        feedback.validate().unwrap();
        let metrics = LearningMetrics::from_feedback(&feedback);
        assert!((metrics.satisfaction - 0.8).abs() < 1e-9);
        assert!((metrics.effectiveness - 0.88).abs() < 1e-9);

        let unhelpful = LearningMetrics::from_feedback(&Feedback::new(5, false));
        assert!((unhelpful.effectiveness - 0.6).abs() < 1e-9);
    }
}
