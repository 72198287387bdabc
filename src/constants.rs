// General
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const MAX_KEYS_PER_PROVIDER: usize = 10;
pub const CHARS_PER_TOKEN: usize = 4;

// Sliding windows (seconds)
pub const MINUTE_WINDOW_SECS: u64 = 60;
pub const HOUR_WINDOW_SECS: u64 = 3600;
pub const DAY_WINDOW_SECS: u64 = 86400;

// Usage entries older than this are pruned on every write
pub const USAGE_RETENTION_SECS: u64 = DAY_WINDOW_SECS;

// Error-triggered cooldown
pub const CONSECUTIVE_ERROR_LIMIT: u32 = 3;
pub const DEFAULT_BLOCK_SECS: u64 = 300;

// HTTP
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

// OpenAI
pub const OPENAI_API_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

// Groq (OpenAI-compatible)
pub const GROQ_API_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

// DeepSeek (OpenAI-compatible)
pub const DEEPSEEK_API_ENDPOINT: &str = "https://api.deepseek.com/chat/completions";

// Perplexity (OpenAI-compatible)
pub const PERPLEXITY_API_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

// Anthropic
pub const ANTHROPIC_API_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

// Google Gemini
pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
