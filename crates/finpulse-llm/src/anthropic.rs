//! Anthropic (Claude) reasoning provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use finpulse_core::error::{PulseError, PulseResult};
use finpulse_core::traits::{
    GenerationOptions, LlmConfig, LlmResponse, ReasoningModel, ResponseFormat, TokenUsage,
};
use finpulse_core::types::{split_system, Message, MessageRole};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Anthropic reasoning provider over the Messages API.
pub struct AnthropicReasoner {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicReasoner {
    /// Create a provider. The API key comes from the config or `ANTHROPIC_API_KEY`.
    pub fn new(config: LlmConfig) -> PulseResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                PulseError::Configuration("Anthropic API key not found. Set ANTHROPIC_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            api_key
                .parse()
                .map_err(|_| PulseError::Configuration("Invalid API key format".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PulseError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Build the request body. In JSON mode the reply is prefilled with `{`.
    fn build_request(&self, messages: &[Message], options: &GenerationOptions) -> AnthropicRequest {
        let (system, turns) = split_system(messages);
        let mut conversation: Vec<AnthropicMessage> = turns
            .into_iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        match options.format() {
            ResponseFormat::Json => conversation.push(AnthropicMessage {
                role: "assistant",
                content: "{".to_string(),
            }),
            ResponseFormat::Text => {}
        }

        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            system,
            messages: conversation,
        }
    }
}

fn parse_response(body: &str, prefilled: bool) -> PulseResult<LlmResponse> {
    let response: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| PulseError::reasoning(format!("Failed to parse response: {}", e)))?;

    let content = response
        .content
        .iter()
        .find(|c| c.content_type == "text")
        .and_then(|c| c.text.clone())
        .map(|text| if prefilled { format!("{{{}", text) } else { text });

    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.input_tokens,
        completion_tokens: u.output_tokens,
        total_tokens: u.input_tokens + u.output_tokens,
    });

    Ok(LlmResponse { content, usage })
}

#[async_trait]
impl ReasoningModel for AnthropicReasoner {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> PulseResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let request = self.build_request(messages, &options);
        let prefilled = options.format() == ResponseFormat::Json;

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PulseError::api(format!("Anthropic API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PulseError::api(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(PulseError::from_http_status(status.as_u16(), &message));
        }

        let parsed = parse_response(&body, prefilled)?;
        debug!(
            model = %self.config.model,
            total_tokens = parsed.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            "Anthropic call complete"
        );
        Ok(parsed)
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner() -> AnthropicReasoner {
        AnthropicReasoner::new(LlmConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults_model() {
        assert_eq!(reasoner().model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_system_messages_are_lifted() {
        let messages = vec![Message::system("rules"), Message::user("tx")];
        let request = reasoner().build_request(&messages, &GenerationOptions::default());
        assert_eq!(request.system.as_deref(), Some("rules"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, 2000);

        let text = GenerationOptions {
            response_format: Some(ResponseFormat::Text),
            ..Default::default()
        };
        let request = reasoner().build_request(&messages, &text);
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_json_mode_prefills_brace() {
        let options = GenerationOptions {
            response_format: Some(ResponseFormat::Json),
            temperature: Some(0.1),
            ..Default::default()
        };
        let request = reasoner().build_request(&[Message::user("tx")], &options);
        let last = request.messages.last().unwrap();
        assert_eq!(last.role, "assistant");
        assert_eq!(last.content, "{");
        assert_eq!(request.temperature, Some(0.1));

        let body = r#"{"content":[{"type":"text","text":"\"confidence\": 0.9}"}],"usage":{"input_tokens":10,"output_tokens":5}}"#;
        let parsed = parse_response(body, true).unwrap();
        assert_eq!(parsed.content.as_deref(), Some("{\"confidence\": 0.9}"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_unparseable_body_is_reasoning_error() {
        let err = parse_response("not json", false).unwrap_err();
        assert!(matches!(err, PulseError::Reasoning { .. }));
    }
}
