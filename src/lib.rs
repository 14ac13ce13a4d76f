//! toolrag - tool-retrieval-augmented chat orchestration
//!
//! Narrows a catalog of real estate query tools to the ones relevant to a
//! user message, then drives a bounded function-calling loop between a
//! language model and an MCP tool server.

pub mod api;
pub mod error;
pub mod executor;
pub mod id;
pub mod llm;
pub mod orchestrator;
pub mod selector;
pub mod tools;

pub use error::{Result, ToolragError};
