//! Configuration types for TOML-based configuration.
//!
//! These types map directly to the TOML configuration file structure.

use std::collections::HashMap;

use serde::Deserialize;

use crate::broker::RateLimitPolicy;

/// Root configuration structure.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// API keys, one entry per key.
    #[serde(default)]
    pub keys: Vec<KeyConfig>,

    /// Per-provider rate-limit overrides, keyed by provider name.
    /// Providers without an entry use the built-in defaults.
    #[serde(default)]
    pub limits: HashMap<String, RateLimitPolicy>,

    /// Per-provider endpoint overrides (proxies, self-hosted gateways),
    /// keyed by provider name.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

/// Global settings.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Maximum number of attempts for rate-limited requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self { max_retries: default_max_retries() }
    }
}

fn default_max_retries() -> usize {
    crate::constants::DEFAULT_MAX_RETRIES
}

/// A single API key entry.
#[derive(Debug, Deserialize)]
pub struct KeyConfig {
    /// Provider name: "openai", "google", "groq", "anthropic",
    /// "deepseek" or "perplexity".
    pub provider: String,

    /// The key itself (supports environment variable syntax: "${VAR_NAME}").
    pub api_key: String,
}
