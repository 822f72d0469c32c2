//! Structured assessment produced by the decision scorer.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Assessed risk of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// How soon the user should act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Immediate,
}

impl Urgency {
    /// Priority bonus contributed by this urgency.
    pub fn priority_bonus(self) -> u8 {
        match self {
            Urgency::Immediate => 3,
            Urgency::High => 2,
            Urgency::Medium => 1,
            Urgency::Low => 0,
        }
    }
}

/// Expected financial impact of acting (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Impact {
    Minimal,
    Moderate,
    Significant,
    Major,
}

impl Impact {
    /// Priority bonus contributed by this impact.
    pub fn priority_bonus(self) -> u8 {
        match self {
            Impact::Major => 2,
            Impact::Significant => 1,
            Impact::Moderate | Impact::Minimal => 0,
        }
    }
}

/// A weighted factor that contributed to the assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub name: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What the user can expect from following the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub description: String,
    /// 0..=1.
    pub probability: f64,
}

/// The proposed nudge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    /// Action verb, e.g. "pause", "review", "transfer".
    pub action: String,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<ExpectedOutcome>,
}

/// Output of the decision scorer (or of a rule, with fixed defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionAnalysis {
    /// 0..=1.
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub urgency: Urgency,
    pub impact: Impact,
    pub reasoning: String,
    #[serde(default)]
    pub factors: Vec<Factor>,
    pub recommendation: Recommendation,
}

impl InterventionAnalysis {
    /// Build a rule-based analysis with fixed confidence/urgency/impact.
    pub fn fixed(
        confidence: f64,
        risk_level: RiskLevel,
        urgency: Urgency,
        impact: Impact,
        reasoning: impl Into<String>,
        recommendation: Recommendation,
    ) -> Self {
        Self {
            confidence,
            risk_level,
            urgency,
            impact,
            reasoning: reasoning.into(),
            factors: Vec::new(),
            recommendation,
        }
    }

    pub fn with_factor(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.factors.push(Factor {
            name: name.into(),
            weight,
            description: None,
        });
        self
    }
}

impl Recommendation {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            action: action.into(),
            suggested_actions: Vec::new(),
            expected_outcome: None,
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggested_actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonuses() {
        assert_eq!(Urgency::Immediate.priority_bonus(), 3);
        assert_eq!(Urgency::Low.priority_bonus(), 0);
        assert_eq!(Impact::Major.priority_bonus(), 2);
        assert_eq!(Impact::Moderate.priority_bonus(), 0);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let analysis = InterventionAnalysis::fixed(
            0.9,
            RiskLevel::High,
            Urgency::High,
            Impact::Significant,
            "over budget",
            Recommendation::new("Slow down", "You are near your limit", "review")
                .with_actions(["Review subscriptions"]),
        );
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["riskLevel"], "high");
        assert_eq!(value["recommendation"]["suggestedActions"][0], "Review subscriptions");
    }
}
