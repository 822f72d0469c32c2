//! Request sent to the reasoning collaborator.

use serde::{Deserialize, Serialize};

use crate::error::PulseResult;
use crate::types::{Message, TransactionPayload, UserFinancialProfileSnapshot};

/// Structured, prose-free analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub amount: f64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
    pub debt: f64,
    pub risk_tolerance: String,
    pub health_score: f64,
    pub intervention_level: String,
}

impl AnalysisRequest {
    pub fn new(transaction: &TransactionPayload, profile: &UserFinancialProfileSnapshot) -> Self {
        Self {
            amount: transaction.amount,
            category: transaction.category.clone(),
            description: transaction.description.clone(),
            merchant: transaction.merchant.clone(),
            income: profile.income,
            expenses: profile.expenses,
            savings: profile.savings,
            debt: profile.debt,
            risk_tolerance: profile.risk_tolerance.clone(),
            health_score: profile.health_score,
            intervention_level: profile.intervention_level.to_string(),
        }
    }

    /// System instruction plus the request serialized as the user turn.
    pub fn to_messages(&self) -> PulseResult<Vec<Message>> {
        Ok(vec![
            Message::system(analysis_system_prompt()),
            Message::user(serde_json::to_string(self)?),
        ])
    }
}

/// Instruction describing the response schema.
pub fn analysis_system_prompt() -> &'static str {
    r#"You assess a single financial transaction against the user's financial profile.
The user message is a JSON object with the transaction and profile figures.

Respond with one JSON object and nothing else:

{
    "confidence": <number between 0 and 1>,
    "riskLevel": "low|medium|high|critical",
    "urgency": "low|medium|high|immediate",
    "impact": "minimal|moderate|significant|major",
    "reasoning": "<short explanation>",
    "factors": [{"name": "<factor>", "weight": <number>, "description": "<optional>"}],
    "recommendation": {
        "title": "<short title>",
        "description": "<one or two sentences>",
        "action": "<verb such as pause, review, transfer>",
        "suggestedActions": ["<concrete step>"],
        "expectedOutcome": {"description": "<outcome>", "probability": <number between 0 and 1>}
    }
}
"#
}
