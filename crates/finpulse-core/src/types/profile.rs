//! User financial profile: the system-of-record row and its cached projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// How eagerly a user wants to be nudged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InterventionLevel {
    Minimal,
    #[default]
    Moderate,
    Aggressive,
}

impl InterventionLevel {
    /// Resolve a stored preference; unset or unknown values behave as `Moderate`.
    pub fn resolve(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }
}

/// Authoritative user record as read from the persistence store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub savings: f64,
    pub debt: f64,
    pub risk_tolerance: Option<String>,
    /// Raw preference string; see [`InterventionLevel::resolve`].
    pub intervention_level: Option<String>,
    pub health_score: Option<f64>,
    pub login_count: u32,
    pub activity_count: u64,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            monthly_income: 0.0,
            monthly_expenses: 0.0,
            savings: 0.0,
            debt: 0.0,
            risk_tolerance: None,
            intervention_level: None,
            health_score: None,
            login_count: 0,
            activity_count: 0,
            last_active_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_finances(mut self, income: f64, expenses: f64, savings: f64, debt: f64) -> Self {
        self.monthly_income = income;
        self.monthly_expenses = expenses;
        self.savings = savings;
        self.debt = debt;
        self
    }

    pub fn with_intervention_level(mut self, level: impl Into<String>) -> Self {
        self.intervention_level = Some(level.into());
        self
    }

    pub fn with_health_score(mut self, score: f64) -> Self {
        self.health_score = Some(score);
        self
    }

    pub fn with_last_active(mut self, at: DateTime<Utc>) -> Self {
        self.last_active_at = Some(at);
        self
    }
}

/// Read-mostly projection of a user's financial state, shared by scoring calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFinancialProfileSnapshot {
    pub user_id: String,
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
    pub debt: f64,
    pub risk_tolerance: String,
    pub intervention_level: InterventionLevel,
    /// 0..=100.
    pub health_score: f64,
    pub captured_at: DateTime<Utc>,
}

impl UserFinancialProfileSnapshot {
    /// Project a user record. A missing health score is derived from the record's figures.
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            user_id: record.id.clone(),
            income: record.monthly_income,
            expenses: record.monthly_expenses,
            savings: record.savings,
            debt: record.debt,
            risk_tolerance: record
                .risk_tolerance
                .clone()
                .unwrap_or_else(|| "moderate".to_string()),
            intervention_level: InterventionLevel::resolve(record.intervention_level.as_deref()),
            health_score: record
                .health_score
                .unwrap_or_else(|| derive_health_score(record)),
            captured_at: Utc::now(),
        }
    }
}

/// Health score from savings rate, debt load and emergency cushion.
fn derive_health_score(record: &UserRecord) -> f64 {
    if record.monthly_income <= 0.0 {
        return 0.0;
    }
    let savings_rate =
        ((record.monthly_income - record.monthly_expenses) / record.monthly_income).clamp(0.0, 1.0);
    let debt_ratio = (record.debt / (record.monthly_income * 12.0)).clamp(0.0, 1.0);
    let cushion_months = if record.monthly_expenses > 0.0 {
        (record.savings / record.monthly_expenses).min(6.0) / 6.0
    } else {
        1.0
    };

    let score = 40.0 * savings_rate + 30.0 * (1.0 - debt_ratio) + 30.0 * cushion_months;
    (score * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervention_level_resolution() {
        assert_eq!(InterventionLevel::resolve(Some("minimal")), InterventionLevel::Minimal);
        assert_eq!(InterventionLevel::resolve(Some("AGGRESSIVE")), InterventionLevel::Aggressive);
        assert_eq!(InterventionLevel::resolve(Some("bogus")), InterventionLevel::Moderate);
        assert_eq!(InterventionLevel::resolve(None), InterventionLevel::Moderate);
    }

    #[test]
    fn test_snapshot_projection() {
        let record = UserRecord::new("u1")
            .with_finances(5000.0, 3000.0, 12000.0, 0.0)
            .with_intervention_level("minimal");
        let snapshot = UserFinancialProfileSnapshot::from_record(&record);

        assert_eq!(snapshot.user_id, "u1");
        assert_eq!(snapshot.intervention_level, InterventionLevel::Minimal);
        assert_eq!(snapshot.risk_tolerance, "moderate");
        // savings rate 0.4 -> 16, no debt -> 30, 4 months cushion -> 20
        assert_eq!(snapshot.health_score, 66.0);
    }

    #[test]
    fn test_explicit_health_score_wins() {
        let record = UserRecord::new("u1").with_health_score(81.5);
        assert_eq!(UserFinancialProfileSnapshot::from_record(&record).health_score, 81.5);
    }

    #[test]
    fn test_zero_income_health() {
        let record = UserRecord::new("u1");
        assert_eq!(UserFinancialProfileSnapshot::from_record(&record).health_score, 0.0);
    }
}
