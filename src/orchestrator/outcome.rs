//! Loop states and what a finished request returns

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::config::PayloadKind;
use super::invocation::ResolvedInvocation;
use crate::llm::{ConversationTurn, Usage};
use crate::selector::ToolSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingModel,
    HasToolRequests,
    Done,
    AbortedLoopLimit,
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::AbortedLoopLimit | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::HasToolRequests => "has_tool_requests",
            Self::Done => "done",
            Self::AbortedLoopLimit => "aborted_loop_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-text result for the client: chart data or a map update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredPayload {
    pub kind: PayloadKind,
    pub tool: String,
    pub data: Value,
}

impl StructuredPayload {
    /// Result text parsed as JSON when possible, else kept as a string
    pub fn from_result(kind: PayloadKind, tool: impl Into<String>, text: &str) -> Self {
        let data = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
        Self {
            kind,
            tool: tool.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationTrace {
    pub tool: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&ResolvedInvocation> for InvocationTrace {
    fn from(resolved: &ResolvedInvocation) -> Self {
        Self {
            tool: resolved.invocation.name.clone(),
            arguments: resolved.invocation.arguments.clone(),
            error: resolved.error().map(str::to_string),
            elapsed_ms: resolved.elapsed.as_millis() as u64,
        }
    }
}

/// One model↔executor exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTrace {
    pub round: u32,
    pub invocations: Vec<InvocationTrace>,
}

impl RoundTrace {
    pub fn failures(&self) -> usize {
        self.invocations.iter().filter(|i| i.error.is_some()).count()
    }
}

/// Result of driving one request to a terminal state
#[derive(Debug, Clone, Serialize)]
pub struct ConverseOutcome {
    pub request_id: String,
    /// Done, AbortedLoopLimit, or Cancelled
    pub state: LoopState,
    /// Final answer, or the fixed limit message
    pub text: String,
    /// Last text the model produced before the loop was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_text: Option<String>,
    /// Last payload of each kind
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub payloads: BTreeMap<PayloadKind, StructuredPayload>,
    /// Prior history plus this request's turns
    pub transcript: Vec<ConversationTurn>,
    pub rounds: Vec<RoundTrace>,
    pub model_calls: u32,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<ToolSelection>,
}

impl ConverseOutcome {
    pub fn is_done(&self) -> bool {
        self.state == LoopState::Done
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == LoopState::Cancelled
    }

    pub fn executor_calls(&self) -> usize {
        self.rounds.iter().map(|r| r.invocations.len()).sum()
    }

    pub fn payload(&self, kind: PayloadKind) -> Option<&StructuredPayload> {
        self.payloads.get(&kind)
    }
}
