use crate::constants;
use crate::providers::{Message, ProviderType};

/// Ordered classification rules: the first rule whose pattern occurs in
/// the lower-cased model name wins. Adding a provider means adding a row
/// here, nothing else.
const MODEL_RULES: &[(&[&str], ProviderType)] = &[
    (&["gpt", "openai"], ProviderType::OpenAI),
    (&["gemini", "google"], ProviderType::Google),
    (&["groq"], ProviderType::Groq),
    (&["claude", "anthropic"], ProviderType::Anthropic),
    (&["deepseek"], ProviderType::DeepSeek),
    (&["sonar", "perplexity", "pplx"], ProviderType::Perplexity),
];

/// Classify a model name to the provider that serves it.
///
/// This is a substring heuristic, not an authoritative registry: names
/// that match no rule fall back to OpenAI. Rules are evaluated in a fixed
/// priority order, so e.g. "deepseek-chat" resolves to DeepSeek even
/// though other vendors host deepseek-derived models.
pub fn provider_for_model(model_name: &str) -> ProviderType {
    let model_lower = model_name.to_lowercase();

    for (patterns, provider) in MODEL_RULES {
        if patterns.iter().any(|p| model_lower.contains(p)) {
            return *provider;
        }
    }

    ProviderType::OpenAI
}

/// Rough token estimate for a message sequence: total characters of roles
/// and contents divided by 4.
///
/// Used only for local usage accounting, never sent to a provider.
/// Provider tokenizers differ substantially (especially for non-English
/// text); whenever a reply carries real usage numbers those win.
pub fn estimate_tokens(messages: &[Message]) -> u32 {
    let total_chars: usize = messages
        .iter()
        .map(|m| m.role.len() + m.content.len())
        .sum();

    u32::try_from(total_chars / constants::CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}
