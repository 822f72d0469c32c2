//! finpulse-llm - Reasoning provider implementations for finpulse.
//!
//! # Supported Providers
//!
//! - **Anthropic** - Claude models over the Messages API (default)
//! - **OpenAI** (feature: `openai`) - chat completion models
//!
//! # Example
//!
//! ```ignore
//! use finpulse_llm::ReasoningFactory;
//!
//! let reasoning = ReasoningFactory::anthropic_with_model("claude-3-5-sonnet-20241022")?;
//! ```

mod anthropic;
mod factory;
mod openai;

pub use anthropic::AnthropicReasoner;
pub use factory::ReasoningFactory;
pub use openai::OpenAIReasoner;

// Re-export core types for convenience
pub use finpulse_core::config::ReasoningProvider;
pub use finpulse_core::traits::{GenerationOptions, LlmConfig, LlmResponse, ReasoningModel, ResponseFormat};
