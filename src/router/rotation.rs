use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::broker::KeyBroker;
use crate::config::{self, Config};
use crate::constants;
use crate::errors::{RotationError, RotationResult};
use crate::providers::{ChatReply, ClientFactory, HttpClientFactory, Message, ProviderType};
use crate::router::models::{estimate_tokens, provider_for_model};

/// Outcome of one model's invocation in a fan-out.
#[derive(Debug)]
pub struct ModelReply {
    pub model: String,
    pub result: RotationResult<ChatReply>,
}

/// Drives the retry loop across the `KeyBroker` and the provider clients.
///
/// A call leases a key, builds a client bound to it, makes one attempt and
/// reports the outcome. Rate-limit failures rotate to the next attempt
/// (the error-prone key is now deprioritized by its own usage record);
/// every other failure propagates immediately.
pub struct LlmRouter {
    broker: Arc<KeyBroker>,
    factory: Arc<dyn ClientFactory>,
    max_retries: usize,
}

impl LlmRouter {
    /// Router over the given broker with the default HTTP client factory.
    pub fn new(broker: Arc<KeyBroker>) -> Self {
        Self {
            broker,
            factory: Arc::new(HttpClientFactory::new()),
            max_retries: constants::DEFAULT_MAX_RETRIES,
        }
    }

    /// Router with a custom client factory (tests use scripted clients).
    pub fn with_factory(broker: Arc<KeyBroker>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { broker, factory, max_retries: constants::DEFAULT_MAX_RETRIES }
    }

    /// Sets the default number of attempts for rate-limited requests.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builds broker, factory and router from a TOML configuration string.
    pub fn from_config_str(content: &str) -> RotationResult<Self> {
        Self::from_config(config::parse_config(content)?)
    }

    /// Builds broker, factory and router from a TOML configuration file.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> RotationResult<Self> {
        Self::from_config(config::load_config(path)?)
    }

    /// Builds broker, factory and router from a parsed configuration.
    pub fn from_config(config: Config) -> RotationResult<Self> {
        let max_retries = config.settings.max_retries;

        let mut factory = HttpClientFactory::new();
        for (name, endpoint) in &config.endpoints {
            let provider: ProviderType = name.parse()?;
            factory = factory.with_endpoint(provider, endpoint.clone())?;
        }

        let broker = KeyBroker::from_config(config)?;

        Ok(Self {
            broker: Arc::new(broker),
            factory: Arc::new(factory),
            max_retries,
        })
    }

    pub fn broker(&self) -> &KeyBroker {
        &self.broker
    }

    /// Invoke `model_name` with the router's default number of attempts.
    pub async fn invoke(
        &self,
        model_name: &str,
        messages: &[Message],
    ) -> RotationResult<ChatReply> {
        self.invoke_with_retries(model_name, messages, self.max_retries).await
    }

    /// Invoke `model_name`, rotating keys on rate limits for up to
    /// `max_retries` attempts.
    ///
    /// Broker failures (no keys configured, every key exhausted) are
    /// terminal: retrying cannot manufacture a new credential. Non-rate-
    /// limit provider errors are also terminal; they usually mean a
    /// malformed request or a permanent failure.
    pub async fn invoke_with_retries(
        &self,
        model_name: &str,
        messages: &[Message],
        max_retries: usize,
    ) -> RotationResult<ChatReply> {
        let provider = provider_for_model(model_name);
        let estimated_tokens = estimate_tokens(messages);

        let mut last_error: Option<RotationError> = None;

        for attempt in 1..=max_retries {
            let lease = self.broker.get_available_key(provider)?;
            info!(
                "Attempt {}/{}: using {} key {}",
                attempt, max_retries, provider, lease.id
            );

            let client = self.factory.create(provider, model_name, &lease.secret)?;

            match client.invoke(messages).await {
                Ok(reply) => {
                    // Provider-reported usage beats the local estimate
                    let tokens = reply
                        .usage
                        .as_ref()
                        .map(|u| u.total_tokens)
                        .unwrap_or(estimated_tokens);
                    self.broker.record_request(provider, &lease.id, tokens, true);
                    debug!("Successful request to {} with key {}", provider, lease.id);
                    return Ok(reply);
                }
                Err(err) => {
                    self.broker.record_request(provider, &lease.id, 0, false);

                    if err.is_rate_limit() {
                        warn!(
                            "Rate limit hit for {} key {}, trying next key",
                            provider, lease.id
                        );
                        last_error = Some(err);
                        continue;
                    }

                    error!("Non-retryable error for {}: {}", provider, err);
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or(RotationError::AllCredentialsExhausted(provider)))
    }

    /// Fan one message sequence out to several models concurrently.
    ///
    /// Each model's invocation is independent; one failing never affects
    /// the others. Results come back in input order.
    pub async fn invoke_many(&self, models: &[&str], messages: &[Message]) -> Vec<ModelReply> {
        let calls = models.iter().map(|model| async move {
            ModelReply {
                model: model.to_string(),
                result: self.invoke(model, messages).await,
            }
        });

        join_all(calls).await
    }
}
