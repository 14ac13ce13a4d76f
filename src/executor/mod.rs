//! Tool executor gateway - runs a named tool with JSON arguments
//!
//! The orchestration loop only sees the `ToolExecutor` trait. `McpExecutor`
//! talks to an MCP server over stdio; `LocalExecutor` runs in-process
//! handlers.

mod local;
mod mcp;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use local::LocalExecutor;
pub use mcp::{McpConfig, McpExecutor};

/// Text a tool produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
}

impl ToolOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one tool. Errors are per call; the caller decides what they mean.
    async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ExecutorError>;

    /// Names of the tools this executor serves
    async fn list_tools(&self) -> Result<Vec<String>, ExecutorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Failed to start tool server: {0}")]
    Spawn(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Remote(String),

    #[error("Tool call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool server connection closed")]
    Closed,
}
