//! Configuration system for finpulse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PulseError, PulseResult};
use crate::traits::LlmConfig;

/// Reasoning provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProvider {
    #[default]
    Anthropic,
    OpenAI,
}

impl std::str::FromStr for ReasoningProvider {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(PulseError::UnsupportedProvider {
                provider: other.to_string(),
            }),
        }
    }
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningProviderConfig {
    /// Provider type.
    pub provider: ReasoningProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for ReasoningProviderConfig {
    fn default() -> Self {
        Self {
            provider: ReasoningProvider::Anthropic,
            config: LlmConfig {
                model: "claude-3-5-sonnet-20241022".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Pipeline configuration.
///
/// Every field has a default, so a config file only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Period of the activity drain loop.
    pub drain_interval_ms: u64,
    /// Maximum events processed per drain cycle.
    pub batch_size: usize,
    /// Analyses below this confidence never produce an intervention.
    pub confidence_threshold: f64,
    /// Cooldown applied after an intervention is created for a (user, category) pair.
    pub cooldown_secs: u64,
    /// Lifetime of a cached profile snapshot.
    pub profile_ttl_secs: u64,
    /// Lifetime of the ephemeral transaction-context snapshot.
    pub transaction_context_ttl_secs: u64,
    /// Upper bound on one reasoning call.
    pub reasoning_timeout_secs: u64,
    /// Presence and session entries idle longer than this are swept.
    pub presence_ttl_hours: i64,
    /// How often the presence sweep runs.
    pub presence_sweep_interval_secs: u64,
    /// How often the engagement sweep runs.
    pub engagement_interval_secs: u64,
    /// Users idle longer than this receive an engagement nudge.
    pub inactivity_days: i64,
    /// Budget utilization strictly above this ratio triggers a warning.
    pub budget_threshold: f64,
    /// A transaction strictly above this multiple of the category average is anomalous.
    pub anomaly_multiplier: f64,
    /// Window for the per-category average.
    pub anomaly_window_days: i64,
    /// Reasoning provider configuration.
    pub reasoning: ReasoningProviderConfig,
    /// Path to the SQLite ledger.
    pub db_path: PathBuf,
    /// Redis URL for the expiring store; the in-memory store is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let finpulse_dir = dirs::home_dir()
            .map(|h| h.join(".finpulse"))
            .unwrap_or_else(|| PathBuf::from(".finpulse"));

        Self {
            drain_interval_ms: 1000,
            batch_size: 10,
            confidence_threshold: 0.8,
            cooldown_secs: 300,
            profile_ttl_secs: 300,
            transaction_context_ttl_secs: 600,
            reasoning_timeout_secs: 10,
            presence_ttl_hours: 24,
            presence_sweep_interval_secs: 3600,
            engagement_interval_secs: 300,
            inactivity_days: 7,
            budget_threshold: 0.8,
            anomaly_multiplier: 2.0,
            anomaly_window_days: 30,
            reasoning: ReasoningProviderConfig::default(),
            db_path: finpulse_dir.join("finpulse.db"),
            redis_url: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> PulseResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| PulseError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| PulseError::Configuration(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| PulseError::Configuration(e.to_string()))
            }
            _ => Err(PulseError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Override fields from `FINPULSE_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(mut self) -> Self {
        env_parse("FINPULSE_DRAIN_INTERVAL_MS", &mut self.drain_interval_ms);
        env_parse("FINPULSE_BATCH_SIZE", &mut self.batch_size);
        env_parse("FINPULSE_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);
        env_parse("FINPULSE_COOLDOWN_SECS", &mut self.cooldown_secs);
        env_parse("FINPULSE_PROFILE_TTL_SECS", &mut self.profile_ttl_secs);
        env_parse("FINPULSE_REASONING_TIMEOUT_SECS", &mut self.reasoning_timeout_secs);
        env_parse("FINPULSE_ENGAGEMENT_INTERVAL_SECS", &mut self.engagement_interval_secs);
        env_parse("FINPULSE_INACTIVITY_DAYS", &mut self.inactivity_days);

        if let Ok(provider) = std::env::var("FINPULSE_REASONING_PROVIDER") {
            match provider.parse() {
                Ok(provider) => self.reasoning.provider = provider,
                Err(e) => tracing::warn!(error = %e, "Ignoring FINPULSE_REASONING_PROVIDER"),
            }
        }
        if let Ok(model) = std::env::var("FINPULSE_REASONING_MODEL") {
            self.reasoning.config.model = model;
        }
        let key_var = match self.reasoning.provider {
            ReasoningProvider::Anthropic => "ANTHROPIC_API_KEY",
            ReasoningProvider::OpenAI => "OPENAI_API_KEY",
        };
        if let Ok(api_key) = std::env::var(key_var) {
            self.reasoning.config.api_key = Some(api_key);
        }

        if let Ok(path) = std::env::var("FINPULSE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("FINPULSE_REDIS_URL") {
            self.redis_url = Some(url);
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> PulseResult<()> {
        if self.batch_size == 0 {
            return Err(PulseError::Configuration("batch_size must be at least 1".into()));
        }
        if self.drain_interval_ms == 0 {
            return Err(PulseError::Configuration(
                "drain_interval_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PulseError::Configuration(
                "confidence_threshold must be within 0.0..=1.0".into(),
            ));
        }
        if self.reasoning.config.max_tokens > 2000 {
            return Err(PulseError::Configuration(
                "reasoning max_tokens must not exceed 2000".into(),
            ));
        }
        Ok(())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_secs = cooldown.as_secs();
        self
    }

    pub fn with_profile_ttl(mut self, ttl: Duration) -> Self {
        self.profile_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningProviderConfig) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_secs)
    }

    pub fn transaction_context_ttl(&self) -> Duration {
        Duration::from_secs(self.transaction_context_ttl_secs)
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }

    pub fn presence_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.presence_sweep_interval_secs.max(1))
    }

    pub fn engagement_interval(&self) -> Duration {
        Duration::from_secs(self.engagement_interval_secs.max(1))
    }

    pub fn presence_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.presence_ttl_hours)
    }

    pub fn inactivity(&self) -> chrono::Duration {
        chrono::Duration::days(self.inactivity_days)
    }

    pub fn anomaly_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.anomaly_window_days)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(var, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.drain_interval(), Duration::from_secs(1));
        assert_eq!(config.cooldown(), Duration::from_secs(300));
        assert_eq!(config.profile_ttl(), Duration::from_secs(300));
        assert_eq!(config.reasoning_timeout(), Duration::from_secs(10));
        assert_eq!(config.reasoning.config.max_tokens, 2000);
        assert!((config.reasoning.config.temperature - 0.2).abs() < f32::EPSILON);
        assert!(config.db_path.ends_with("finpulse.db"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finpulse.toml");
        std::fs::write(
            &path,
            r#"
batch_size = 25
cooldown_secs = 60

[reasoning]
provider = "openai"
model = "gpt-4o-mini"
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.reasoning.provider, ReasoningProvider::OpenAI);
        assert_eq!(config.reasoning.config.model, "gpt-4o-mini");
        assert_eq!(config.confidence_threshold, 0.8);
    }

    #[test]
    fn test_yaml_and_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("finpulse.yaml");
        std::fs::write(&yaml, "confidence_threshold: 0.9\n").unwrap();
        assert_eq!(PipelineConfig::from_file(&yaml).unwrap().confidence_threshold, 0.9);

        let ini = dir.path().join("finpulse.ini");
        std::fs::write(&ini, "batch_size=1").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&ini),
            Err(PulseError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::default().with_batch_size(0).validate().is_err());
        assert!(PipelineConfig::default()
            .with_confidence_threshold(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Claude".parse::<ReasoningProvider>().unwrap(), ReasoningProvider::Anthropic);
        assert!("bard".parse::<ReasoningProvider>().is_err());
    }
}
