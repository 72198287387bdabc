pub mod models;
pub mod rotation;

pub use models::{provider_for_model, estimate_tokens};
pub use rotation::{LlmRouter, ModelReply};
