//! Fixed-default interventions for budget breaches and anomalous spend.

use crate::scoring::priority;
use crate::types::{
    Impact, Intervention, InterventionAnalysis, InterventionType, Recommendation, RiskLevel,
    TriggerSource, Urgency,
};

const BUDGET_CONFIDENCE: f64 = 0.95;
const ANOMALY_CONFIDENCE: f64 = 0.9;
const GOAL_CONFIDENCE: f64 = 0.9;

/// Progress milestones, in percent.
pub const GOAL_MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// `spent / budget`, or `None` without a positive budget.
pub fn budget_utilization(spent: f64, budget: f64) -> Option<f64> {
    (budget > 0.0).then(|| spent / budget)
}

/// True when `amount` is strictly above `multiplier` times a positive average.
pub fn is_anomalous(amount: f64, average: f64, multiplier: f64) -> bool {
    average > 0.0 && amount > multiplier * average
}

/// Budget warning for a category whose utilization crossed the threshold.
pub fn budget_intervention(
    user_id: &str,
    category: &str,
    spent: f64,
    budget: f64,
    utilization: f64,
) -> Intervention {
    let pct = (utilization * 100.0).round();
    let risk = if utilization >= 1.0 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };
    let remaining = (budget - spent).max(0.0);

    let analysis = InterventionAnalysis::fixed(
        BUDGET_CONFIDENCE,
        risk,
        Urgency::High,
        Impact::Significant,
        format!(
            "{:.2} of the {:.2} {} budget is spent ({}%)",
            spent, budget, category, pct
        ),
        Recommendation::new(
            format!("{}% of your {} budget used", pct, category),
            format!("You have {:.2} left in {} this month.", remaining, category),
            "review",
        )
        .with_actions([
            format!("Review recent {} transactions", category),
            "Adjust the budget if this month is an exception".to_string(),
        ]),
    )
    .with_factor("budget_utilization", utilization);

    Intervention::new(
        user_id,
        InterventionType::BudgetWarning,
        TriggerSource::BudgetThreshold,
        category,
        analysis,
        priority(Urgency::High, Impact::Significant, BUDGET_CONFIDENCE),
    )
    .with_context(serde_json::json!({
        "spent": spent,
        "budget": budget,
        "utilization": utilization,
    }))
}

/// Spending alert for a transaction far above the category average.
pub fn anomaly_intervention(
    user_id: &str,
    category: &str,
    amount: f64,
    average: f64,
) -> Intervention {
    let ratio = amount / average;

    let analysis = InterventionAnalysis::fixed(
        ANOMALY_CONFIDENCE,
        RiskLevel::High,
        Urgency::High,
        Impact::Moderate,
        format!(
            "{:.2} is {:.2}x the recent {} average of {:.2}",
            amount, ratio, category, average
        ),
        Recommendation::new(
            format!("Unusual {} purchase", category),
            format!(
                "This {:.2} transaction is about {:.1} times your usual {} spend.",
                amount, ratio, category
            ),
            "review",
        )
        .with_actions(["Confirm you made this purchase", "Check it fits this month's plan"]),
    )
    .with_factor("amount_to_average_ratio", ratio);

    Intervention::new(
        user_id,
        InterventionType::SpendingAlert,
        TriggerSource::AnomalousSpend,
        category,
        analysis,
        priority(Urgency::High, Impact::Moderate, ANOMALY_CONFIDENCE),
    )
    .with_context(serde_json::json!({
        "amount": amount,
        "average": average,
        "ratio": ratio,
    }))
}

/// Highest milestone reached by `progress` (a fraction), if any.
pub fn goal_milestone(progress: f64) -> Option<u8> {
    if !progress.is_finite() {
        return None;
    }
    let pct = progress * 100.0;
    GOAL_MILESTONES
        .iter()
        .rev()
        .copied()
        .find(|m| pct >= f64::from(*m))
}

/// Encouragement for reaching a goal milestone.
pub fn goal_intervention(
    user_id: &str,
    goal_id: &str,
    goal_name: Option<&str>,
    milestone: u8,
) -> Intervention {
    let name = goal_name.unwrap_or("your goal");
    let (title, description) = if milestone >= 100 {
        (
            format!("You reached {}!", name),
            format!("{} is complete. Consider setting the next one.", name),
        )
    } else {
        (
            format!("{}% of the way to {}", milestone, name),
            format!("You are {}% of the way there. Keep the momentum going.", milestone),
        )
    };

    let analysis = InterventionAnalysis::fixed(
        GOAL_CONFIDENCE,
        RiskLevel::Low,
        Urgency::Medium,
        Impact::Moderate,
        format!("Goal {} crossed the {}% milestone", goal_id, milestone),
        Recommendation::new(title, description, "celebrate")
            .with_actions(["Review your goal timeline"]),
    )
    .with_factor("goal_progress", f64::from(milestone) / 100.0);

    Intervention::new(
        user_id,
        InterventionType::GoalProgress,
        TriggerSource::GoalMilestone,
        "goals",
        analysis,
        priority(Urgency::Medium, Impact::Moderate, GOAL_CONFIDENCE),
    )
    .with_context(serde_json::json!({
        "goal_id": goal_id,
        "milestone": milestone,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_boundary() {
        assert!(is_anomalous(101.0, 50.0, 2.0));
        assert!(!is_anomalous(99.0, 50.0, 2.0));
        assert!(!is_anomalous(100.0, 50.0, 2.0));
        assert!(!is_anomalous(500.0, 0.0, 2.0));
    }

    #[test]
    fn test_goal_milestones() {
        assert_eq!(goal_milestone(0.1), None);
        assert_eq!(goal_milestone(0.25), Some(25));
        assert_eq!(goal_milestone(0.74), Some(50));
        assert_eq!(goal_milestone(1.2), Some(100));
        assert_eq!(goal_milestone(f64::NAN), None);

        let done = goal_intervention("u1", "g1", Some("Emergency fund"), 100);
        assert_eq!(done.kind, InterventionType::GoalProgress);
        assert_eq!(done.analysis.recommendation.title, "You reached Emergency fund!");
        assert_eq!(done.delivery.priority, 6);
    }

    #[test]
    fn test_utilization() {
        assert_eq!(budget_utilization(85.0, 100.0), Some(0.85));
        assert_eq!(budget_utilization(85.0, 0.0), None);
    }

    #[test]
    fn test_rule_defaults() {
        let budget = budget_intervention("u1", "food", 85.0, 100.0, 0.85);
        assert_eq!(budget.kind, InterventionType::BudgetWarning);
        assert_eq!(budget.analysis.confidence, 0.95);
        assert_eq!(budget.analysis.urgency, Urgency::High);
        assert_eq!(budget.analysis.impact, Impact::Significant);
        assert_eq!(budget.delivery.priority, 9);
        assert_eq!(budget.analysis.recommendation.title, "85% of your food budget used");

        let anomaly = anomaly_intervention("u1", "shopping", 101.0, 50.0);
        assert_eq!(anomaly.kind, InterventionType::SpendingAlert);
        assert_eq!(anomaly.trigger, TriggerSource::AnomalousSpend);
        assert_eq!(anomaly.analysis.impact, Impact::Moderate);
        assert_eq!(anomaly.delivery.priority, 7);
    }
}
