//! Model client trait and errors

use std::time::Duration;

use async_trait::async_trait;

use super::types::{ModelRequest, ModelResponse};

/// Stateless model client - the full conversation goes in every request
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One model call: contents and tools in, text and tool requests out
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, LlmError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Errors that can occur during model calls
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
            LlmError::MissingApiKey { .. } => false,
        }
    }
}
