//! One requested tool call and its resolution

use std::time::Duration;

use serde_json::Value;

use crate::executor::ToolOutput;
use crate::llm::{FunctionCall, FunctionResponse, Part};

/// A tool call the model asked for in the current round
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Consume the invocation; it can only be resolved once
    pub fn resolve(self, outcome: InvocationOutcome, elapsed: Duration) -> ResolvedInvocation {
        ResolvedInvocation {
            invocation: self,
            outcome,
            elapsed,
        }
    }
}

impl From<&FunctionCall> for ToolInvocation {
    fn from(call: &FunctionCall) -> Self {
        Self::new(call.name.clone(), call.args.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Success(ToolOutput),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInvocation {
    pub invocation: ToolInvocation,
    pub outcome: InvocationOutcome,
    pub elapsed: Duration,
}

impl ResolvedInvocation {
    pub fn name(&self) -> &str {
        &self.invocation.name
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            InvocationOutcome::Failure(msg) => Some(msg),
            InvocationOutcome::Success(_) => None,
        }
    }

    /// The function response part fed into the next model call
    pub fn to_part(&self) -> Part {
        let response = match &self.outcome {
            InvocationOutcome::Success(output) => FunctionResponse::success(&self.invocation.name, &output.text),
            InvocationOutcome::Failure(msg) => FunctionResponse::failure(&self.invocation.name, msg),
        };
        Part::FunctionResponse(response)
    }
}
