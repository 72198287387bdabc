use serde::Deserialize;

use crate::providers::ProviderType;

/// Request and token ceilings for one provider, over trailing windows.
///
/// Read-only after load. Token ceilings are optional; most vendors only
/// publish request ceilings for low tiers.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitPolicy {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    #[serde(default)]
    pub tokens_per_minute: Option<u32>,
    #[serde(default)]
    pub tokens_per_day: Option<u32>,
}

impl RateLimitPolicy {
    /// Built-in ceilings per provider, used when no override is configured.
    pub fn default_for(provider: ProviderType) -> Self {
        match provider {
            ProviderType::OpenAI => RateLimitPolicy {
                requests_per_minute: 3500,
                requests_per_hour: 10_000,
                requests_per_day: 200_000,
                tokens_per_minute: Some(90_000),
                tokens_per_day: Some(2_000_000),
            },
            ProviderType::Google => RateLimitPolicy {
                requests_per_minute: 60,
                requests_per_hour: 1000,
                requests_per_day: 50_000,
                tokens_per_minute: None,
                tokens_per_day: None,
            },
            ProviderType::Groq => RateLimitPolicy {
                requests_per_minute: 30,
                requests_per_hour: 14_400,
                requests_per_day: 14_400,
                tokens_per_minute: None,
                tokens_per_day: None,
            },
            ProviderType::Anthropic => RateLimitPolicy {
                requests_per_minute: 50,
                requests_per_hour: 1000,
                requests_per_day: 50_000,
                tokens_per_minute: Some(40_000),
                tokens_per_day: Some(1_000_000),
            },
            ProviderType::DeepSeek => RateLimitPolicy {
                requests_per_minute: 60,
                requests_per_hour: 3600,
                requests_per_day: 86_400,
                tokens_per_minute: None,
                tokens_per_day: None,
            },
            ProviderType::Perplexity => RateLimitPolicy {
                requests_per_minute: 60,
                requests_per_hour: 1000,
                requests_per_day: 50_000,
                tokens_per_minute: None,
                tokens_per_day: None,
            },
        }
    }
}
