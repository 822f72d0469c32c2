//! Preference gate, type classification and priority.

use crate::types::{Impact, InterventionAnalysis, InterventionLevel, InterventionType, RiskLevel, Urgency};

/// Whether the user's intervention-level preference lets this analysis through.
pub fn policy_allows(level: InterventionLevel, urgency: Urgency, impact: Impact) -> bool {
    match level {
        InterventionLevel::Minimal => urgency == Urgency::Immediate && impact == Impact::Major,
        InterventionLevel::Moderate => urgency == Urgency::High || impact == Impact::Significant,
        InterventionLevel::Aggressive => !(urgency == Urgency::Low && impact == Impact::Minimal),
    }
}

/// Pick the intervention type. First matching rule wins.
pub fn classify(analysis: &InterventionAnalysis, category: &str) -> InterventionType {
    let category = category.trim().to_lowercase();

    if analysis.risk_level == RiskLevel::High && category == "shopping" {
        InterventionType::SpendingAlert
    } else if analysis.impact == Impact::Significant
        && matches!(category.as_str(), "housing" | "transportation" | "food")
    {
        InterventionType::BudgetWarning
    } else if category == "investment" && analysis.confidence > 0.9 {
        InterventionType::InvestmentAdvice
    } else if category == "debt_payment" {
        InterventionType::DebtReduction
    } else {
        InterventionType::SpendingAlert
    }
}

/// `5 + urgency bonus + impact bonus + (confidence > 0.9)`, clamped to `1..=10`.
pub fn priority(urgency: Urgency, impact: Impact, confidence: f64) -> u8 {
    let confidence_bonus = u8::from(confidence > 0.9);
    (5 + urgency.priority_bonus() + impact.priority_bonus() + confidence_bonus).clamp(1, 10)
}
