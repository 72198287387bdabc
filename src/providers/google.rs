use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Serialize, Deserialize};

use crate::errors::{RotationError, RotationResult};
use crate::providers::client::ProviderClient;
use crate::providers::types::{ChatReply, Message, TokenUsage};

/// Client for Google's Gemini generateContent API
pub struct GoogleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GoogleContent>,
}

#[derive(Serialize, Deserialize)]
struct GoogleContent {
    role: String,
    parts: Vec<GooglePart>,
}

#[derive(Serialize, Deserialize)]
struct GooglePart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<GoogleCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Deserialize)]
struct GoogleUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount")]
    #[serde(default)]
    total_token_count: u32,
}

impl GoogleClient {
    pub fn new(client: Client, base_url: String, api_key: String, model: String) -> Self {
        Self { client, base_url, api_key, model }
    }

    /// Maps standard messages to Google's expected format.
    ///
    /// Gemini wants "model" instead of "assistant", no system role, and a
    /// "user" message first; the system prompt is folded into the first
    /// user message.
    fn map_messages_to_contents(messages: &[Message]) -> RotationResult<Vec<GoogleContent>> {
        let mut contents = Vec::new();
        let mut system_prompt: Option<String> = None;
        let mut first_user_index: Option<usize> = None;

        for msg in messages {
            match msg.role.as_str() {
                "system" => {
                    if system_prompt.is_some() {
                        return Err(RotationError::ApiError(
                            "Multiple system messages are not supported by the Google mapping".to_string(),
                        ));
                    }
                    system_prompt = Some(msg.content.clone());
                }
                "user" | "model" | "assistant" => {
                    let role = if msg.role == "assistant" { "model" } else { &msg.role };
                    if role == "user" && first_user_index.is_none() {
                        first_user_index = Some(contents.len());
                    }
                    contents.push(GoogleContent {
                        role: role.to_string(),
                        parts: vec![GooglePart { text: msg.content.clone() }],
                    });
                }
                other => {
                    log::warn!("Ignoring message with unknown role: {}", other);
                }
            }
        }

        if let Some(system) = system_prompt {
            let user_idx = first_user_index.ok_or_else(|| {
                RotationError::ApiError(
                    "System message provided but no user message found".to_string(),
                )
            })?;
            let part = &mut contents[user_idx].parts[0];
            part.text = format!("{}\n\n{}", system, part.text);
        }

        if contents.is_empty() {
            return Err(RotationError::ApiError(
                "No valid messages found for Google provider".to_string(),
            ));
        }
        if contents[0].role != "user" {
            return Err(RotationError::ApiError(format!(
                "Google chat must start with a 'user' role message, found '{}'",
                contents[0].role
            )));
        }

        Ok(contents)
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
    async fn invoke(&self, messages: &[Message]) -> RotationResult<ChatReply> {
        let contents = Self::map_messages_to_contents(messages)?;
        let request = GenerateContentRequest { contents };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        let response = self.client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
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
                "google rate limit: {}",
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
                format!("Google API error: {}", error_text),
            ));
        }

        let google_response: GenerateContentResponse = response.json().await?;

        let candidate = google_response.candidates.into_iter().next().ok_or_else(|| {
            RotationError::ApiError("No response from Google".to_string())
        })?;

        let text = candidate.content.parts.into_iter()
            .map(|p| p.text)
            .collect::<Vec<String>>()
            .join("");

        let usage = google_response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ChatReply {
            content: text,
            model: self.model.clone(),
            usage,
        })
    }
}
