//! LLM Client Layer - model gateway with native function calling
//!
//! This module provides:
//! - Conversation types shared with the transcript and the wire format
//! - LlmClient trait for API abstraction
//! - GeminiClient implementation
//! - A scripted MockLlmClient for tests

pub mod client;
pub mod gemini;
pub mod mock;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockLlmClient;
pub use types::{
    Conversation, ConversationTurn, FunctionCall, FunctionResponse, ModelRequest, ModelResponse, Part, Role,
    ToolDeclaration, Usage,
};
