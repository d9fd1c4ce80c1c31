//! Error types for stock quote operations

use thiserror::Error;

/// Stock bot errors
///
/// `NotFound` and `SourceExhausted` are terminal outcomes reported to the user.
/// The transport variants are produced by individual strategies and never
/// reach the handler on their own; the fallback chains log them and move on.
#[derive(Debug, Error)]
pub enum StockError {
    /// No resolution strategy produced a ticker
    #[error("Symbol not found for {subject:?}")]
    NotFound { subject: String },

    /// Every quote strategy failed, including the alternate board retry
    #[error("All quote sources failed for {symbol}")]
    SourceExhausted { symbol: String },

    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Upstream answered but without the fields we need
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Operation did not finish within its budget
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u128 },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    /// Build a timeout error for `operation`
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_ms: after.as_millis(),
        }
    }
}

impl From<bot_utils::ConfigError> for StockError {
    fn from(err: bot_utils::ConfigError) -> Self {
        StockError::ConfigError(err.to_string())
    }
}

impl From<yahoo_finance_api::YahooError> for StockError {
    fn from(err: yahoo_finance_api::YahooError) -> Self {
        StockError::YahooFinanceError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = StockError::NotFound {
            subject: "없는회사".to_string(),
        };
        assert_eq!(err.to_string(), "Symbol not found for \"없는회사\"");

        let err = StockError::DataUnavailable {
            symbol: "005930.KS".to_string(),
            reason: "missing price".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for 005930.KS: missing price");

        let err = StockError::timeout("news feed", Duration::from_millis(3000));
        assert_eq!(err.to_string(), "news feed timed out after 3000ms");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: StockError = bot_utils::ConfigError::Invalid {
            key: "STOCK_BOT_ANALYSIS_BUDGET_MS".into(),
            value: "fast".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: invalid value for STOCK_BOT_ANALYSIS_BUDGET_MS: \"fast\""
        );
    }
}
