//! OpenAI reasoning provider.

use async_trait::async_trait;

use finpulse_core::error::{PulseError, PulseResult};
use finpulse_core::traits::{GenerationOptions, LlmConfig, LlmResponse, ReasoningModel};
use finpulse_core::types::Message;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};
#[cfg(feature = "openai")]
use finpulse_core::traits::{ResponseFormat, TokenUsage};
#[cfg(feature = "openai")]
use finpulse_core::types::MessageRole;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI reasoning provider over chat completions.
pub struct OpenAIReasoner {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIReasoner {
    /// Create a provider. The API key comes from the config or `OPENAI_API_KEY`.
    pub fn new(config: LlmConfig) -> PulseResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                PulseError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let openai_config = match config.base_url {
                Some(ref base_url) => OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(base_url),
                None => OpenAIConfig::new().with_api_key(api_key),
            };
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// o-series models reject sampling parameters.
    fn is_reasoning_only_model(&self) -> bool {
        let model = self.config.model.to_lowercase();
        ["o1", "o3", "o4"].iter().any(|m| model.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl ReasoningModel for OpenAIReasoner {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> PulseResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(Self::to_openai).collect(),
            ..Default::default()
        };

        if !self.is_reasoning_only_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }
        request.response_format = match options.format() {
            ResponseFormat::Json => Some(OpenAIResponseFormat::JsonObject),
            ResponseFormat::Text => None,
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PulseError::reasoning(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| PulseError::reasoning("No response choices returned"))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.clone(),
            usage,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> PulseResult<LlmResponse> {
        Err(PulseError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner(model: &str) -> OpenAIReasoner {
        OpenAIReasoner::new(LlmConfig {
            model: model.to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_model() {
        assert_eq!(reasoner("").model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_reasoning_only_models() {
        assert!(reasoner("o3-mini").is_reasoning_only_model());
        assert!(!reasoner("gpt-4o").is_reasoning_only_model());
    }
}
