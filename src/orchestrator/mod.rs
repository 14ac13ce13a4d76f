//! Tool-calling orchestration loop
//!
//! Drives one chat request through selection, model calls, and tool rounds
//! until the model answers, the round limit is hit, or the caller cancels.

mod config;
mod invocation;
mod outcome;
mod runner;

pub use config::{LOOP_LIMIT_MESSAGE, OrchestratorConfig, PayloadKind, SYSTEM_INSTRUCTION};
pub use invocation::{InvocationOutcome, ResolvedInvocation, ToolInvocation};
pub use outcome::{ConverseOutcome, InvocationTrace, LoopState, RoundTrace, StructuredPayload};
pub use runner::Orchestrator;
