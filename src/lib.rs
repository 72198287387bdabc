//! Keywheel is a Rust library that manages pools of API keys for multiple
//! LLM providers, with sliding-window rate limiting and transparent key
//! rotation.
//!
//! It lets an application fan requests out to several providers without
//! worrying about which of its keys is usable right now: the broker tracks
//! per-key usage over minute/hour/day windows, puts keys hammered by
//! consecutive errors on a cooldown, and the router retries rate-limited
//! calls on the next key in the pool.
//!
//! # Features
//!
//! - **Per-provider key pools**: round-robin rotation over any number of
//!   keys for OpenAI, Google, Groq, Anthropic, DeepSeek and Perplexity
//! - **Sliding-window rate limiting**: request and token ceilings over
//!   minute, hour and day windows, with sensible per-provider defaults
//! - **Error-triggered cooldowns**: three consecutive failures put a key
//!   on a five-minute block, independent of the window counters
//! - **Bounded retry loop**: rate-limit failures rotate to the next key;
//!   everything else propagates immediately
//! - **Status snapshots**: per-key counters, block state and the soonest
//!   time a pool becomes usable again
//!
//! # Example
//!
//! ```no_run
//! use keywheel::{KeyBroker, LlmRouter, Message};
//! use std::sync::Arc;
//!
//! async fn example() -> keywheel::RotationResult<()> {
//!     // Picks up OPENAI_API_KEY_1.., GROQ_API_KEY_1.. and friends
//!     let broker = Arc::new(KeyBroker::from_env());
//!     let router = LlmRouter::new(broker);
//!
//!     let messages = vec![Message::user("Explain Rust in one paragraph")];
//!     let reply = router.invoke("gpt-4o", &messages).await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod constants;
pub mod errors;
pub mod providers;
pub mod router;

pub use broker::{
    KeyBroker,
    KeyBrokerBuilder,
    KeyLease,
    KeyStatus,
    ProviderStatus,
    RateLimitPolicy,
};

pub use errors::{RotationError, RotationResult};

pub use providers::{
    ProviderType,
    Message,
    ChatReply,
    TokenUsage,
    ProviderClient,
    ClientFactory,
    HttpClientFactory,
};

pub use router::{LlmRouter, ModelReply, provider_for_model, estimate_tokens};

/// Initialize the logging system
///
/// This should be called at the start of your application in case
/// you want to activate the library's debug and info logging.
pub fn use_logging() {
    env_logger::init();
}
