//! Error types for toolrag
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::llm::LlmError;

/// All error types that can occur in toolrag
#[derive(Debug, Error)]
pub enum ToolragError {
    /// Tool catalog failed to load or validate
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Language model call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool executor failed outside of a single invocation
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Tool arguments did not match the declared schema
    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ToolragError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for toolrag operations
pub type Result<T> = std::result::Result<T, ToolragError>;
