//! Factory for creating reasoning providers.

use std::sync::Arc;

use finpulse_core::config::{ReasoningProvider, ReasoningProviderConfig};
use finpulse_core::error::PulseResult;
use finpulse_core::traits::{LlmConfig, ReasoningModel};
use tracing::info;

use crate::anthropic::AnthropicReasoner;
use crate::openai::OpenAIReasoner;

/// Factory for creating reasoning providers.
pub struct ReasoningFactory;

impl ReasoningFactory {
    /// Create a reasoning provider from the given configuration.
    pub fn create(provider: ReasoningProvider, config: LlmConfig) -> PulseResult<Arc<dyn ReasoningModel>> {
        let model: Arc<dyn ReasoningModel> = match provider {
            ReasoningProvider::Anthropic => Arc::new(AnthropicReasoner::new(config)?),
            ReasoningProvider::OpenAI => Arc::new(OpenAIReasoner::new(config)?),
        };
        info!(provider = ?provider, model = %model.model_name(), "Reasoning provider ready");
        Ok(model)
    }

    /// Create the provider named by a pipeline's reasoning section.
    pub fn from_config(config: &ReasoningProviderConfig) -> PulseResult<Arc<dyn ReasoningModel>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Anthropic with a specific model.
    pub fn anthropic_with_model(model: impl Into<String>) -> PulseResult<Arc<dyn ReasoningModel>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(ReasoningProvider::Anthropic, config)
    }

    /// OpenAI with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> PulseResult<Arc<dyn ReasoningModel>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(ReasoningProvider::OpenAI, config)
    }
}
