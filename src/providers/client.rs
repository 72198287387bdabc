use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::constants;
use crate::errors::{RotationError, RotationResult};
use crate::providers::anthropic::AnthropicClient;
use crate::providers::google::GoogleClient;
use crate::providers::openai_compat::OpenAiCompatClient;
use crate::providers::types::{ChatReply, Message, ProviderType};

/// A provider client bound to one credential and model.
///
/// The rotation core leases a key, builds one of these, makes a single
/// call and reports the outcome. Clients are cheap to construct; the
/// underlying HTTP client is shared by the factory.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> RotationResult<ChatReply>;
}

/// Builds provider clients for leased credentials.
///
/// The router depends only on this trait, so tests substitute scripted
/// clients without touching the network.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        provider: ProviderType,
        model: &str,
        api_key: &str,
    ) -> RotationResult<Arc<dyn ProviderClient>>;
}

/// Default factory producing reqwest-backed clients.
pub struct HttpClientFactory {
    client: Client,
    endpoint_overrides: HashMap<ProviderType, String>,
}

impl HttpClientFactory {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, endpoint_overrides: HashMap::new() }
    }

    /// Route a provider's traffic to a custom endpoint (proxy or
    /// self-hosted gateway). The URL is validated up front so a typo
    /// fails at configuration time rather than on the first call.
    pub fn with_endpoint(
        mut self,
        provider: ProviderType,
        endpoint: impl Into<String>,
    ) -> RotationResult<Self> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint).map_err(|e| {
            RotationError::ConfigError(format!(
                "Invalid endpoint '{}' for {}: {}",
                endpoint, provider, e
            ))
        })?;
        self.endpoint_overrides.insert(provider, endpoint);
        Ok(self)
    }

    fn endpoint_for(&self, provider: ProviderType, default: &str) -> String {
        self.endpoint_overrides
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(
        &self,
        provider: ProviderType,
        model: &str,
        api_key: &str,
    ) -> RotationResult<Arc<dyn ProviderClient>> {
        let client = self.client.clone();
        Ok(match provider {
            ProviderType::OpenAI => Arc::new(OpenAiCompatClient::new(
                client,
                provider,
                self.endpoint_for(provider, constants::OPENAI_API_ENDPOINT),
                api_key.to_string(),
                model.to_string(),
            )),
            ProviderType::Groq => Arc::new(OpenAiCompatClient::new(
                client,
                provider,
                self.endpoint_for(provider, constants::GROQ_API_ENDPOINT),
                api_key.to_string(),
                model.to_string(),
            )),
            ProviderType::DeepSeek => Arc::new(OpenAiCompatClient::new(
                client,
                provider,
                self.endpoint_for(provider, constants::DEEPSEEK_API_ENDPOINT),
                api_key.to_string(),
                model.to_string(),
            )),
            ProviderType::Perplexity => Arc::new(OpenAiCompatClient::new(
                client,
                provider,
                self.endpoint_for(provider, constants::PERPLEXITY_API_ENDPOINT),
                api_key.to_string(),
                model.to_string(),
            )),
            ProviderType::Anthropic => Arc::new(AnthropicClient::new(
                client,
                self.endpoint_for(provider, constants::ANTHROPIC_API_ENDPOINT),
                api_key.to_string(),
                model.to_string(),
            )),
            ProviderType::Google => Arc::new(GoogleClient::new(
                client,
                self.endpoint_for(provider, constants::GOOGLE_API_BASE),
                api_key.to_string(),
                model.to_string(),
            )),
        })
    }
}
