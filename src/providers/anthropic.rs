use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Serialize, Deserialize};

use crate::constants;
use crate::errors::{RotationError, RotationResult};
use crate::providers::client::ProviderClient;
use crate::providers::types::{ChatReply, Message, TokenUsage};

/// Client for Anthropic's Messages API (Claude models)
pub struct AnthropicClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
    #[serde(rename = "type")]
    content_type: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicClient {
    pub fn new(client: Client, endpoint: String, api_key: String, model: String) -> Self {
        Self { client, endpoint, api_key, model }
    }

    fn build_headers(&self) -> RotationResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|e| RotationError::ConfigError(format!("Invalid API key format: {}", e)))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(constants::ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn invoke(&self, messages: &[Message]) -> RotationResult<ChatReply> {
        let headers = self.build_headers()?;

        // Anthropic takes the system prompt as a top-level field, not a message
        let mut system_content = None;
        let mut regular_messages = Vec::new();

        for msg in messages {
            if msg.role == "system" {
                system_content = Some(msg.content.clone());
            } else {
                regular_messages.push(AnthropicMessage {
                    role: msg.role.clone(),
                    content: msg.content.clone(),
                });
            }
        }

        if regular_messages.is_empty() {
            if let Some(system) = system_content.take() {
                regular_messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: format!("Using this context: {}", system),
                });
            } else {
                return Err(RotationError::ApiError(
                    "Anthropic requires at least one message".to_string(),
                ));
            }
        }

        let request = AnthropicRequest {
            model: self.model.clone(),
            system: system_content,
            messages: regular_messages,
            max_tokens: 1024,
        };

        let response = self.client
            .post(&self.endpoint)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Rate limit exceeded".to_string());
            return Err(RotationError::RateLimit(format!(
                "anthropic rate limit: {}",
                error_text
            )));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RotationError::from_api_response(
                status,
                format!("Anthropic API error: {}", error_text),
            ));
        }

        let anthropic_response: AnthropicResponse = response.json().await?;

        if anthropic_response.content.is_empty() {
            return Err(RotationError::ApiError("No response from Anthropic".to_string()));
        }

        let usage = anthropic_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        let text = anthropic_response.content.iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.clone())
            .collect::<Vec<String>>()
            .join("");

        Ok(ChatReply {
            content: text,
            model: anthropic_response.model,
            usage,
        })
    }
}
