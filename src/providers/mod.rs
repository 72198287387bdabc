/// Module for provider identities and provider client implementations
///
/// The rotation core never talks to a vendor directly; it leases a key,
/// asks a `ClientFactory` for a `ProviderClient` bound to that key, makes
/// one call and reports the outcome. Default HTTP clients:
/// - OpenAI-compatible chat completions (OpenAI, Groq, DeepSeek, Perplexity)
/// - Anthropic (Claude models)
/// - Google (Gemini models)

pub mod types;
pub mod client;
pub mod openai_compat;
pub mod anthropic;
pub mod google;

pub use types::{ProviderType, Message, ChatReply, TokenUsage};
pub use client::{ProviderClient, ClientFactory, HttpClientFactory};
pub use openai_compat::OpenAiCompatClient;
pub use anthropic::AnthropicClient;
pub use google::GoogleClient;
