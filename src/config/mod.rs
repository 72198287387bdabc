//! Configuration module for TOML-based broker and router configuration.
//!
//! Two conventions are supported:
//!
//! - The environment convention: `{PREFIX}_API_KEY_1` .. `{PREFIX}_API_KEY_10`
//!   per provider (bare `{PREFIX}_API_KEY` fills the first slot), picked up
//!   by [`KeyBroker::from_env`](crate::KeyBroker::from_env).
//! - A TOML file, for declarative deployments:
//!
//! ```toml
//! [settings]
//! max_retries = 3
//!
//! [[keys]]
//! provider = "groq"
//! api_key = "${GROQ_API_KEY}"
//!
//! [[keys]]
//! provider = "groq"
//! api_key = "${GROQ_API_KEY_2}"
//!
//! [limits.groq]
//! requests_per_minute = 30
//! requests_per_hour = 14400
//! requests_per_day = 14400
//!
//! [endpoints]
//! openai = "https://my-proxy.internal/v1/chat/completions"
//! ```
//!
//! API keys can reference environment variables with the `${VAR_NAME}`
//! syntax; these are resolved at load time.

mod types;
mod loader;

pub use types::{Config, Settings, KeyConfig};
pub use loader::{load_config, parse_config, env_keys};
