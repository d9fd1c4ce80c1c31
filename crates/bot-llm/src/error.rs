//! Error types for completion calls

use thiserror::Error;

/// Result type for completion calls
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while requesting a completion
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Too many requests in a short window; retrying later may succeed
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Billing or daily quota exhausted; retrying soon will not help
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Response arrived but carried no usable text
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether the provider refused the call because of rate or quota limits
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_) | Self::QuotaExceeded(_))
    }
}
