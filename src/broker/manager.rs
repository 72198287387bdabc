use std::collections::HashMap;
use std::time::Instant;

use log::{info, warn};

use crate::broker::policy::RateLimitPolicy;
use crate::broker::pool::{KeyLease, KeyPool, KeyStatus};
use crate::config::{self, Config};
use crate::errors::{RotationError, RotationResult};
use crate::providers::ProviderType;

/// Observability snapshot for one provider's pool.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub provider: ProviderType,
    pub total_keys: usize,
    pub available_keys: usize,
    pub limits: RateLimitPolicy,
    pub keys: Vec<KeyStatus>,
    pub next_available: Option<Instant>,
}

/// Aggregates key pools and rate-limit policies across all providers.
///
/// This is the single entry point for "give me a usable key" and "record
/// the outcome of a call". Construct one instance at startup and pass it
/// by reference (or `Arc`) to whatever issues requests; there is no global
/// registry.
pub struct KeyBroker {
    pools: HashMap<ProviderType, KeyPool>,
}

impl KeyBroker {
    /// Starts an empty builder for programmatic construction.
    pub fn builder() -> KeyBrokerBuilder {
        KeyBrokerBuilder::new()
    }

    /// Loads keys from environment variables.
    ///
    /// For each provider, `{PREFIX}_API_KEY_1` .. `{PREFIX}_API_KEY_10` are
    /// scanned, with a bare `{PREFIX}_API_KEY` accepted for the first slot.
    /// Providers without keys simply get no pool; that only becomes an
    /// error on first use.
    pub fn from_env() -> Self {
        let mut builder = KeyBrokerBuilder::new();
        for provider in ProviderType::ALL {
            for secret in config::env_keys(provider) {
                builder = builder.add_key(provider, secret);
            }
        }
        builder.build()
    }

    /// Builds a broker from a TOML configuration file.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> RotationResult<Self> {
        Self::from_config(config::load_config(path)?)
    }

    /// Builds a broker from a TOML configuration string.
    pub fn from_config_str(content: &str) -> RotationResult<Self> {
        Self::from_config(config::parse_config(content)?)
    }

    /// Builds a broker from an already-parsed configuration.
    pub fn from_config(config: Config) -> RotationResult<Self> {
        let mut builder = KeyBrokerBuilder::new();

        for (name, policy) in config.limits {
            let provider: ProviderType = name.parse()?;
            builder = builder.policy(provider, policy);
        }

        for entry in config.keys {
            let provider: ProviderType = entry.provider.parse()?;
            builder = builder.add_key(provider, entry.api_key);
        }

        Ok(builder.build())
    }

    /// Providers that have at least one key loaded.
    pub fn providers(&self) -> Vec<ProviderType> {
        ProviderType::ALL
            .into_iter()
            .filter(|p| self.pools.contains_key(p))
            .collect()
    }

    /// Lease the next usable key for `provider`.
    ///
    /// Fails with `NoCredentialsConfigured` when the provider has no pool
    /// and `AllCredentialsExhausted` when every key is limited or blocked.
    /// This never waits; callers wanting to wait can consult
    /// `next_available_time`.
    pub fn get_available_key(&self, provider: ProviderType) -> RotationResult<KeyLease> {
        let pool = self
            .pools
            .get(&provider)
            .ok_or(RotationError::NoCredentialsConfigured(provider))?;

        pool.acquire()
            .ok_or(RotationError::AllCredentialsExhausted(provider))
    }

    /// Record the outcome of a call made with a leased key.
    ///
    /// On success the token count is appended to the key's usage and its
    /// error streak cleared; on failure the streak is bumped and tokens
    /// are ignored. Reports for unknown providers or key ids are dropped
    /// with a warning.
    pub fn record_request(&self, provider: ProviderType, key_id: &str, tokens: u32, success: bool) {
        match self.pools.get(&provider) {
            Some(pool) => pool.record(key_id, tokens, success),
            None => warn!("Ignoring outcome report for unconfigured provider {}", provider),
        }
    }

    /// Soonest estimated time any of the provider's keys becomes usable.
    ///
    /// `None` when the provider has no keys configured. Best-effort:
    /// concurrent usage between the call and the returned instant can push
    /// the real time out.
    pub fn next_available_time(&self, provider: ProviderType) -> Option<Instant> {
        self.pools.get(&provider)?.next_available_time()
    }

    /// Read-only snapshot of the provider's pool.
    pub fn provider_status(&self, provider: ProviderType) -> RotationResult<ProviderStatus> {
        let pool = self
            .pools
            .get(&provider)
            .ok_or(RotationError::NoCredentialsConfigured(provider))?;

        let keys = pool.key_statuses();
        let available_keys = keys.iter().filter(|k| !k.is_rate_limited).count();

        Ok(ProviderStatus {
            provider,
            total_keys: keys.len(),
            available_keys,
            limits: pool.policy().clone(),
            keys,
            next_available: pool.next_available_time(),
        })
    }

    /// Snapshots for every configured provider.
    pub fn all_status(&self) -> Vec<ProviderStatus> {
        self.providers()
            .into_iter()
            .filter_map(|p| self.provider_status(p).ok())
            .collect()
    }
}

/// Builder for `KeyBroker`.
///
/// Policies may be overridden per provider before or after adding keys;
/// providers without an override use the built-in defaults.
pub struct KeyBrokerBuilder {
    keys: HashMap<ProviderType, Vec<String>>,
    policies: HashMap<ProviderType, RateLimitPolicy>,
}

impl KeyBrokerBuilder {
    pub fn new() -> Self {
        Self { keys: HashMap::new(), policies: HashMap::new() }
    }

    /// Adds one key to the provider's pool.
    pub fn add_key(mut self, provider: ProviderType, secret: impl Into<String>) -> Self {
        let secrets = self.keys.entry(provider).or_default();
        if secrets.len() >= crate::constants::MAX_KEYS_PER_PROVIDER {
            warn!(
                "Ignoring key for {}: pool already holds {} keys",
                provider,
                crate::constants::MAX_KEYS_PER_PROVIDER
            );
            return self;
        }
        secrets.push(secret.into());
        self
    }

    /// Adds several keys to the provider's pool.
    pub fn add_keys<I, S>(mut self, provider: ProviderType, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for secret in secrets {
            self = self.add_key(provider, secret);
        }
        self
    }

    /// Overrides the rate-limit policy for a provider.
    pub fn policy(mut self, provider: ProviderType, policy: RateLimitPolicy) -> Self {
        self.policies.insert(provider, policy);
        self
    }

    /// Consumes the builder and constructs the `KeyBroker`.
    pub fn build(mut self) -> KeyBroker {
        let mut pools = HashMap::new();

        for (provider, secrets) in self.keys.drain() {
            if secrets.is_empty() {
                continue;
            }
            let policy = self
                .policies
                .remove(&provider)
                .unwrap_or_else(|| RateLimitPolicy::default_for(provider));
            pools.insert(provider, KeyPool::new(provider, secrets, policy));
        }

        if pools.is_empty() {
            warn!("KeyBroker built with no keys for any provider");
        } else {
            let loaded: Vec<String> = pools
                .iter()
                .map(|(p, pool)| format!("{}:{}", p, pool.len()))
                .collect();
            info!("Loaded API keys: {}", loaded.join(", "));
        }

        KeyBroker { pools }
    }
}

impl Default for KeyBrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
