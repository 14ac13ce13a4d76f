//! Orchestrator - drives the model/executor round-trip for one request.
//!
//! Each round:
//! 1. Sends the system instruction, transcript, and tool menu to the model
//! 2. Returns the text if the model asked for no tools
//! 3. Otherwise validates and runs every requested tool concurrently
//! 4. Appends the model's calls and all responses to the transcript
//!
//! The loop is bounded by `max_rounds`, not by wall-clock time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use super::config::{LOOP_LIMIT_MESSAGE, OrchestratorConfig, PayloadKind};
use super::invocation::{InvocationOutcome, ResolvedInvocation, ToolInvocation};
use super::outcome::{ConverseOutcome, InvocationTrace, LoopState, RoundTrace, StructuredPayload};
use crate::error::{Result, ToolragError};
use crate::executor::{ExecutorError, ToolExecutor};
use crate::id::generate_request_id;
use crate::llm::{ConversationTurn, LlmClient, ModelRequest, Role, ToolDeclaration, Usage};
use crate::selector::{LexicalSelector, SelectionOptions};
use crate::tools::ToolCatalog;

/// Accumulated state of one request
struct Progress {
    request_id: String,
    transcript: Vec<ConversationTurn>,
    rounds: Vec<RoundTrace>,
    model_calls: u32,
    usage: Usage,
    payloads: BTreeMap<PayloadKind, StructuredPayload>,
    last_text: Option<String>,
}

impl Progress {
    fn new(request_id: &str, history: &[ConversationTurn], message: &str) -> Self {
        let mut transcript = history.to_vec();
        transcript.push(ConversationTurn::user_text(message));
        Self {
            request_id: request_id.to_string(),
            transcript,
            rounds: Vec::new(),
            model_calls: 0,
            usage: Usage::default(),
            payloads: BTreeMap::new(),
            last_text: None,
        }
    }

    fn finish(self, state: LoopState, text: String) -> ConverseOutcome {
        let partial_text = match state {
            LoopState::AbortedLoopLimit => self.last_text,
            _ => None,
        };
        ConverseOutcome {
            request_id: self.request_id,
            state,
            text,
            partial_text,
            payloads: self.payloads,
            transcript: self.transcript,
            rounds: self.rounds,
            model_calls: self.model_calls,
            usage: self.usage,
            selection: None,
        }
    }
}

/// Runs requests against one model, one executor, and one catalog.
pub struct Orchestrator<L, E>
where
    L: LlmClient + ?Sized,
    E: ToolExecutor + ?Sized,
{
    llm: Arc<L>,
    executor: Arc<E>,
    catalog: Arc<ToolCatalog>,
    /// None means every request gets the full catalog
    selector: Option<LexicalSelector>,
    config: OrchestratorConfig,
}

impl<L, E> Orchestrator<L, E>
where
    L: LlmClient + ?Sized,
    E: ToolExecutor + ?Sized,
{
    /// Create an orchestrator with default selection and loop settings.
    pub fn new(llm: Arc<L>, executor: Arc<E>, catalog: Arc<ToolCatalog>) -> Self {
        let selector = LexicalSelector::new(catalog.clone(), SelectionOptions::default());
        Self {
            llm,
            executor,
            catalog,
            selector: Some(selector),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the selector; `None` disables selection
    pub fn with_selection(mut self, options: Option<SelectionOptions>) -> Self {
        self.selector = options.map(|opts| LexicalSelector::new(self.catalog.clone(), opts));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Select tools for the message, then converse.
    pub async fn respond(
        &self,
        message: &str,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<ConverseOutcome> {
        let request_id = generate_request_id();
        info!("[{}] User message: \"{}\"", request_id, truncate(message, 200));

        let (menu, selection) = match &self.selector {
            Some(selector) => {
                let selection = selector.select(message);
                info!(
                    "[{}] Tool selection ({}): {} of {} tools",
                    request_id,
                    selection.reason,
                    selection.len(),
                    self.catalog.len()
                );
                (self.catalog.menu(&selection.names), Some(selection))
            }
            None => {
                info!("[{}] Tool selection disabled, using all {} tools", request_id, self.catalog.len());
                (self.catalog.declarations(), None)
            }
        };

        let mut outcome = self.run(&request_id, message, history, menu, cancel).await?;
        outcome.selection = selection;
        Ok(outcome)
    }

    /// Drive the loop with an explicit tool menu.
    pub async fn converse(
        &self,
        message: &str,
        history: &[ConversationTurn],
        menu: Vec<ToolDeclaration>,
        cancel: &CancellationToken,
    ) -> Result<ConverseOutcome> {
        let request_id = generate_request_id();
        self.run(&request_id, message, history, menu, cancel).await
    }

    async fn run(
        &self,
        request_id: &str,
        message: &str,
        history: &[ConversationTurn],
        menu: Vec<ToolDeclaration>,
        cancel: &CancellationToken,
    ) -> Result<ConverseOutcome> {
        let started = Instant::now();
        let mut progress = Progress::new(request_id, history, message);
        let declared: HashMap<&str, &ToolDeclaration> = menu.iter().map(|d| (d.name.as_str(), d)).collect();
        let mut round: u32 = 0;
        let mut state = LoopState::AwaitingModel;

        debug!(
            "[{}] Tools: {}",
            request_id,
            menu.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        loop {
            debug!("[{}] State: {}", request_id, state);

            if cancel.is_cancelled() {
                info!("[{}] Cancelled before model call", request_id);
                return Ok(progress.finish(LoopState::Cancelled, String::new()));
            }

            let mut request = ModelRequest::new(&self.config.system_instruction, progress.transcript.clone())
                .with_tools(menu.clone());
            request.max_output_tokens = self.config.max_output_tokens;

            progress.model_calls += 1;
            let call_started = Instant::now();
            info!(
                "[{}] Model call #{} ({}, {} turns)",
                request_id,
                progress.model_calls,
                self.llm.model(),
                request.contents.len()
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("[{}] Cancelled during model call #{}", request_id, progress.model_calls);
                    return Ok(progress.finish(LoopState::Cancelled, String::new()));
                }
                result = self.llm.generate(request) => result,
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        "[{}] Model call #{} failed after {}ms: {}",
                        request_id,
                        progress.model_calls,
                        call_started.elapsed().as_millis(),
                        e
                    );
                    return Err(ToolragError::Llm(e));
                }
            };

            info!(
                "[{}] Model response #{} ({}ms, {} tool requests)",
                request_id,
                progress.model_calls,
                call_started.elapsed().as_millis(),
                response.function_calls.len()
            );
            progress.usage.add(&response.usage);
            if !response.text.is_empty() {
                progress.last_text = Some(response.text.clone());
            }

            if !response.has_tool_requests() {
                info!(
                    "[{}] Done: {} model calls, {} rounds, {}ms",
                    request_id,
                    progress.model_calls,
                    round,
                    started.elapsed().as_millis()
                );
                progress.transcript.push(ConversationTurn::model_text(&response.text));
                return Ok(progress.finish(LoopState::Done, response.text));
            }

            if round >= self.config.max_rounds {
                warn!(
                    "[{}] Max tool rounds ({}) exceeded, aborting",
                    request_id, self.config.max_rounds
                );
                return Ok(progress.finish(LoopState::AbortedLoopLimit, LOOP_LIMIT_MESSAGE.to_string()));
            }

            round += 1;
            state = LoopState::HasToolRequests;
            debug!("[{}] State: {} (round {})", request_id, state, round);

            if cancel.is_cancelled() {
                info!("[{}] Cancelled before tool dispatch", request_id);
                return Ok(progress.finish(LoopState::Cancelled, String::new()));
            }

            let dispatches = response
                .function_calls
                .iter()
                .map(|call| self.dispatch(request_id, ToolInvocation::from(call), &declared, cancel));
            let resolved: Vec<ResolvedInvocation> = join_all(dispatches).await;

            if cancel.is_cancelled() {
                info!(
                    "[{}] Cancelled during round {}, discarding {} results",
                    request_id,
                    round,
                    resolved.len()
                );
                return Ok(progress.finish(LoopState::Cancelled, String::new()));
            }

            for r in &resolved {
                if let (InvocationOutcome::Success(output), Some(kind)) =
                    (&r.outcome, self.config.payload_tools.get(r.name()))
                {
                    debug!("[{}] Structured payload from {}", request_id, r.name());
                    progress
                        .payloads
                        .insert(*kind, StructuredPayload::from_result(*kind, r.name(), &output.text));
                }
            }

            progress.rounds.push(RoundTrace {
                round,
                invocations: resolved.iter().map(InvocationTrace::from).collect(),
            });
            progress.transcript.push(response.to_turn());
            progress.transcript.push(ConversationTurn::new(
                Role::User,
                resolved.iter().map(ResolvedInvocation::to_part).collect(),
            ));

            state = LoopState::AwaitingModel;
        }
    }

    /// Validate and run one invocation. Never fails; errors become the outcome.
    async fn dispatch(
        &self,
        request_id: &str,
        invocation: ToolInvocation,
        declared: &HashMap<&str, &ToolDeclaration>,
        cancel: &CancellationToken,
    ) -> ResolvedInvocation {
        let started = Instant::now();
        let outcome = self.execute(request_id, &invocation, declared, cancel).await;

        match &outcome {
            InvocationOutcome::Success(output) => debug!(
                "[{}] <- {}: {} chars ({}ms)",
                request_id,
                invocation.name,
                output.text.len(),
                started.elapsed().as_millis()
            ),
            InvocationOutcome::Failure(msg) => warn!("[{}] Tool {} failed: {}", request_id, invocation.name, msg),
        }

        invocation.resolve(outcome, started.elapsed())
    }

    async fn execute(
        &self,
        request_id: &str,
        invocation: &ToolInvocation,
        declared: &HashMap<&str, &ToolDeclaration>,
        cancel: &CancellationToken,
    ) -> InvocationOutcome {
        let Some(decl) = declared.get(invocation.name.as_str()) else {
            return InvocationOutcome::Failure(ExecutorError::UnknownTool(invocation.name.clone()).to_string());
        };

        if let Err(reason) = decl.parameters.validate(&invocation.arguments, "arguments") {
            return InvocationOutcome::Failure(ToolragError::invalid_arguments(&invocation.name, reason).to_string());
        }

        if cancel.is_cancelled() {
            return InvocationOutcome::Failure("Request cancelled".to_string());
        }

        debug!(
            "[{}] -> {}({})",
            request_id,
            invocation.name,
            truncate(&invocation.arguments.to_string(), 200)
        );

        match self.executor.call(&invocation.name, &invocation.arguments).await {
            Ok(output) => InvocationOutcome::Success(output),
            Err(e) => InvocationOutcome::Failure(e.to_string()),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
