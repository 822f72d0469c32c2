//! Client-reported activity events and their typed payload views.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{ErrorCode, PulseError, PulseResult};

/// Kind of activity a client reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
    PageView,
    TransactionStart,
    TransactionComplete,
    FinancialDecision,
    GoalUpdate,
    BudgetCheck,
}

/// One client-reported action. Ephemeral: consumed by the activity processor, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: String,
    pub kind: ActivityKind,
    /// Kind-specific payload, interpreted through one of the `*Payload` views.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the server received the event. Presence and last-active bookkeeping use this.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Client clock at the time of the action, kept as metadata only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
}

impl ActivityEvent {
    pub fn new(user_id: impl Into<String>, kind: ActivityKind, payload: serde_json::Value) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            payload,
            timestamp: Utc::now(),
            reported_at: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn reported(mut self, at: DateTime<Utc>) -> Self {
        self.reported_at = Some(at);
        self
    }

    /// Deserialize the payload into a typed view.
    ///
    /// A payload that does not match is a contract violation and yields a validation error.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> PulseResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| PulseError::Validation {
            message: format!("Malformed {} payload: {}", self.kind, e),
            code: ErrorCode::ValInvalidFormat,
            details: [("user_id".to_string(), self.user_id.clone())].into(),
            suggestion: None,
        })
    }
}

/// Payload of transaction_start, transaction_complete and financial_decision events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub amount: f64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
}

impl TransactionPayload {
    pub fn new(amount: f64, category: impl Into<String>) -> Self {
        Self {
            amount,
            category: category.into(),
            description: None,
            merchant: None,
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }
}

/// Payload of page_view events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewPayload {
    pub page: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Payload of budget_check events. Missing figures are looked up in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheckPayload {
    pub category: String,
    #[serde(default)]
    pub spent: Option<f64>,
    #[serde(default)]
    pub budget: Option<f64>,
}

/// Payload of goal_update events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalUpdatePayload {
    pub goal_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Fraction of the goal reached, 0.0..=1.0.
    pub progress: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_wire_names() {
        let event: ActivityEvent = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "kind": "transaction_start",
            "payload": {"amount": 42.0, "category": "shopping"}
        }))
        .unwrap();
        assert_eq!(event.kind, ActivityKind::TransactionStart);
        assert_eq!(event.kind.to_string(), "transaction_start");
        assert_eq!(ActivityKind::from_str("budget_check").unwrap(), ActivityKind::BudgetCheck);
    }

    #[test]
    fn test_parse_payload() {
        let event = ActivityEvent::new(
            "u1",
            ActivityKind::TransactionComplete,
            serde_json::json!({"amount": 12.5, "category": "food", "merchant": "Deli"}),
        );
        let payload: TransactionPayload = event.parse_payload().unwrap();
        assert_eq!(payload.amount, 12.5);
        assert_eq!(payload.merchant.as_deref(), Some("Deli"));
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        let event = ActivityEvent::new(
            "u1",
            ActivityKind::TransactionStart,
            serde_json::json!({"category": "food"}),
        );
        let err = event.parse_payload::<TransactionPayload>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValInvalidFormat);
    }
}
