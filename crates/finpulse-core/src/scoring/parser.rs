//! Strict parsing of the reasoning collaborator's response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{PulseError, PulseResult};
use crate::types::{Factor, Impact, InterventionAnalysis, Recommendation, RiskLevel, Urgency};

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").unwrap());

/// Strip code fences and surrounding prose, leaving the outermost JSON object.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let inner = CODE_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);

    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecommendation {
    title: Option<String>,
    description: Option<String>,
    action: Option<String>,
    #[serde(default)]
    suggested_actions: Vec<String>,
    expected_outcome: Option<crate::types::ExpectedOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    confidence: Option<f64>,
    risk_level: Option<String>,
    urgency: Option<String>,
    impact: Option<String>,
    reasoning: Option<String>,
    #[serde(default)]
    factors: Vec<Factor>,
    recommendation: Option<RawRecommendation>,
}

fn required<T>(value: Option<T>, field: &str) -> PulseResult<T> {
    value.ok_or_else(|| PulseError::missing_field(field))
}

fn parse_enum<T: std::str::FromStr>(raw: String, field: &str) -> PulseResult<T> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| PulseError::parse(format!("Invalid {} '{}'", field, raw)))
}

/// Parse and validate an analysis.
///
/// Every required field must be present and `confidence` must lie in `[0, 1]`;
/// anything less is rejected rather than partially trusted.
pub fn parse_analysis(response: &str) -> PulseResult<InterventionAnalysis> {
    let json = extract_json(response);
    if json.is_empty() {
        return Err(PulseError::parse("Empty analysis response"));
    }

    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| PulseError::parse(format!("Failed to parse analysis JSON: {}", e)))?;

    let confidence = required(raw.confidence, "confidence")?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(PulseError::parse(format!(
            "confidence {} is outside [0, 1]",
            confidence
        )));
    }
    let risk_level: RiskLevel = parse_enum(required(raw.risk_level, "riskLevel")?, "riskLevel")?;
    let urgency: Urgency = parse_enum(required(raw.urgency, "urgency")?, "urgency")?;
    let impact: Impact = parse_enum(required(raw.impact, "impact")?, "impact")?;
    let reasoning = required(raw.reasoning, "reasoning")?;

    let rec = required(raw.recommendation, "recommendation")?;
    let recommendation = Recommendation {
        title: required(rec.title, "recommendation.title")?,
        description: required(rec.description, "recommendation.description")?,
        action: rec.action.unwrap_or_else(|| "review".to_string()),
        suggested_actions: rec.suggested_actions,
        expected_outcome: rec.expected_outcome,
    };

    Ok(InterventionAnalysis {
        confidence,
        risk_level,
        urgency,
        impact,
        reasoning,
        factors: raw.factors,
        recommendation,
    })
}
