use std::error::Error;
use std::fmt;

use crate::providers::ProviderType;

/// Custom error types for key rotation and provider calls
#[derive(Debug)]
pub enum RotationError {
    /// Error from the HTTP client
    RequestError(reqwest::Error),
    /// Error from the API provider
    ApiError(String),
    /// Rate limiting error
    RateLimit(String),
    /// Parsing error
    ParseError(String),
    /// Provider has no keys loaded at all
    NoCredentialsConfigured(ProviderType),
    /// Every key for the provider is currently limited or blocked
    AllCredentialsExhausted(ProviderType),
    /// Configuration error
    ConfigError(String),
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationError::RequestError(err) => write!(f, "Request error: {}", err),
            RotationError::ApiError(msg) => write!(f, "API error: {}", msg),
            RotationError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            RotationError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RotationError::NoCredentialsConfigured(provider) => {
                write!(f, "No API keys configured for {}", provider)
            }
            RotationError::AllCredentialsExhausted(provider) => {
                write!(f, "All API keys for {} are rate limited or blocked", provider)
            }
            RotationError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RotationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RotationError::RequestError(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert reqwest errors to RotationError
impl From<reqwest::Error> for RotationError {
    fn from(err: reqwest::Error) -> Self {
        RotationError::RequestError(err)
    }
}

/// Convert serde_json errors to RotationError
impl From<serde_json::Error> for RotationError {
    fn from(err: serde_json::Error) -> Self {
        RotationError::ParseError(err.to_string())
    }
}

/// Convert std::io::Error to RotationError
impl From<std::io::Error> for RotationError {
    fn from(err: std::io::Error) -> Self {
        RotationError::ConfigError(err.to_string())
    }
}

/// Convert toml parsing errors to RotationError
impl From<toml::de::Error> for RotationError {
    fn from(err: toml::de::Error) -> Self {
        RotationError::ConfigError(err.to_string())
    }
}

/// Result type alias for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;

impl RotationError {
    /// Returns RateLimit error for 429 status or rate limit keywords
    pub fn from_api_response(status: reqwest::StatusCode, error_message: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RotationError::RateLimit(error_message);
        }

        if is_rate_limit_message(&error_message) {
            return RotationError::RateLimit(error_message);
        }

        RotationError::ApiError(error_message)
    }

    /// Whether this error should trigger rotation to the next key.
    ///
    /// The retry loop branches on this instead of inspecting message text;
    /// keyword matching only happens once, when the error is classified at
    /// the provider boundary.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RotationError::RateLimit(_))
    }
}

/// Fallback classifier for providers that return opaque error bodies.
pub fn is_rate_limit_message(message: &str) -> bool {
    let msg_lower = message.to_lowercase();
    msg_lower.contains("rate limit")
        || msg_lower.contains("rate_limit_exceeded")
        || msg_lower.contains("too many requests")
        || msg_lower.contains("quota exceeded")
        || msg_lower.contains("429")
        || msg_lower.contains("overloaded")
        || msg_lower.contains("throttle")
}
