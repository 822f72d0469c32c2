//! Intervention delivery and the rule-based interventions that bypass scoring.

mod dispatcher;
mod rules;

pub use dispatcher::{DispatchSettings, InterventionDispatcher, INTERVENTION_EVENT};
pub use rules::{
    anomaly_intervention, budget_intervention, budget_utilization, goal_intervention,
    goal_milestone, is_anomalous, GOAL_MILESTONES,
};
