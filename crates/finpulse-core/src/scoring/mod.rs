//! Decision scoring: reasoning-backed assessment of a transaction plus the
//! confidence and policy gates that decide whether to intervene.

mod parser;
mod policy;
mod prompts;
mod scorer;

pub use parser::{extract_json, parse_analysis};
pub use policy::{classify, policy_allows, priority};
pub use prompts::{analysis_system_prompt, AnalysisRequest};
pub use scorer::{DecisionScorer, ScoreOutcome, ScorerSettings, SkipReason};
