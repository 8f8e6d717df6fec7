//! Error types for the LLM and market data layers.
//!
//! Application code works with `anyhow::Result`; these enums exist where
//! callers need to branch on the failure (retry decisions, tool messages).

use thiserror::Error;

/// Errors returned by a chat model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The backend could not be reached.
    #[error("Cannot connect to LLM backend at {url}")]
    Connect { url: String },

    /// The backend answered with a non-success status.
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("Failed to parse LLM response: {0}")]
    Parse(String),

    /// The environment variable holding the API key is not set.
    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),

    /// Any other transport failure.
    #[error("Failed to send request: {0}")]
    Request(String),
}

impl LlmError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout { .. } | LlmError::Connect { .. } => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors returned by market data and search providers.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),
}

pub type MarketResult<T> = std::result::Result<T, MarketError>;
