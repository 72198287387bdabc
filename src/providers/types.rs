use serde::{Serialize, Deserialize};
use std::str::FromStr;

use crate::errors::RotationError;

/// Upstream LLM vendors this crate can rotate keys for.
///
/// Adding a vendor means adding a variant here and extending `ALL`,
/// `as_str`, `env_prefix` and the default policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    OpenAI,
    Google,
    Groq,
    Anthropic,
    DeepSeek,
    Perplexity,
}

impl ProviderType {
    /// Every known provider, in a stable order.
    pub const ALL: [ProviderType; 6] = [
        ProviderType::OpenAI,
        ProviderType::Google,
        ProviderType::Groq,
        ProviderType::Anthropic,
        ProviderType::DeepSeek,
        ProviderType::Perplexity,
    ];

    /// Lowercase identifier used in key ids and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Google => "google",
            ProviderType::Groq => "groq",
            ProviderType::Anthropic => "anthropic",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::Perplexity => "perplexity",
        }
    }

    /// Environment variable prefix for this provider's keys.
    ///
    /// Keys are looked up as `{PREFIX}_API_KEY_1` .. `{PREFIX}_API_KEY_10`,
    /// with a bare `{PREFIX}_API_KEY` accepted for the first slot.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "OPENAI",
            ProviderType::Google => "GOOGLE",
            ProviderType::Groq => "GROQ",
            ProviderType::Anthropic => "ANTHROPIC",
            ProviderType::DeepSeek => "DEEPSEEK",
            ProviderType::Perplexity => "PPLX",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "google" => Ok(ProviderType::Google),
            "groq" => Ok(ProviderType::Groq),
            "anthropic" => Ok(ProviderType::Anthropic),
            "deepseek" => Ok(ProviderType::DeepSeek),
            "perplexity" => Ok(ProviderType::Perplexity),
            other => Err(RotationError::ConfigError(format!(
                "Unknown provider '{}'\n  \
                 → Valid providers: openai, google, groq, anthropic, deepseek, perplexity",
                other
            ))),
        }
    }
}

/// A single chat message in the provider-agnostic format.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message { role: "user".to_string(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Message { role: "system".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: "assistant".to_string(), content: content.into() }
    }
}

/// Reply returned by a provider client.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Token usage as reported by the provider, when available.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
