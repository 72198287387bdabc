use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Serialize, Deserialize};

use crate::errors::{RotationError, RotationResult};
use crate::providers::client::ProviderClient;
use crate::providers::types::{ChatReply, Message, ProviderType, TokenUsage};

/// Client for OpenAI's chat completion wire format.
///
/// OpenAI, Groq, DeepSeek and Perplexity all speak this format with Bearer
/// token authentication; only the endpoint differs.
pub struct OpenAiCompatClient {
    client: Client,
    provider: ProviderType,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Message,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiCompatClient {
    pub fn new(
        client: Client,
        provider: ProviderType,
        endpoint: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self { client, provider, endpoint, api_key, model }
    }

    fn build_headers(&self) -> RotationResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| RotationError::ConfigError(format!("Invalid API key format: {}", e)))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    async fn invoke(&self, messages: &[Message]) -> RotationResult<ChatReply> {
        let headers = self.build_headers()?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: false,
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
                "{} rate limit: {}",
                self.provider, error_text
            )));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("Unknown error. Status: {}", status));
            return Err(RotationError::from_api_response(
                status,
                format!("{} API error: {}", self.provider, error_text),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            RotationError::ApiError(format!("No response from {}", self.provider))
        })?;

        let usage = completion.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatReply {
            content: choice.message.content,
            model: completion.model,
            usage,
        })
    }
}
