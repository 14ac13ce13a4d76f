//! Chat API - the inbound request/response contract
//!
//! `handle_chat` turns a `ChatRequest` into an HTTP-style status and JSON
//! body. Model failures are reported with a generic message; the detail only
//! goes to the log.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::executor::ToolExecutor;
use crate::llm::{ConversationTurn, LlmClient};
use crate::orchestrator::{ConverseOutcome, LoopState, Orchestrator, PayloadKind};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Client closed the request
pub const STATUS_CANCELLED: u16 = 499;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

const GENERIC_FAILURE: &str = "Failed to generate response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }

    /// History as conversation turns; assistant messages become model turns
    pub fn history_turns(&self) -> Vec<ConversationTurn> {
        self.history
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| match m.role {
                HistoryRole::User => ConversationTurn::user_text(&m.content),
                HistoryRole::Assistant => ConversationTurn::model_text(&m.content),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(rename = "chartData", skip_serializing_if = "Option::is_none", default)]
    pub chart_data: Option<Value>,
    #[serde(rename = "mapUpdate", skip_serializing_if = "Option::is_none", default)]
    pub map_update: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiBody {
    Chat(ChatResponse),
    Error(ErrorResponse),
}

/// Status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiReply {
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiBody::Error(ErrorResponse { error: message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.body).unwrap_or_else(|_| Value::Null)
    }

    /// Plain-text rendering: the answer, then any payloads as JSON
    pub fn to_text(&self) -> String {
        match &self.body {
            ApiBody::Error(e) => format!("Error ({}): {}", self.status, e.error),
            ApiBody::Chat(chat) => {
                let mut text = chat.response.clone();
                for (label, data) in [("chartData", &chat.chart_data), ("mapUpdate", &chat.map_update)] {
                    if let Some(data) = data {
                        text.push_str(&format!("\n\n{}: {}", label, data));
                    }
                }
                text
            }
        }
    }
}

impl From<ConverseOutcome> for ApiReply {
    fn from(outcome: ConverseOutcome) -> Self {
        if outcome.state == LoopState::Cancelled {
            return Self::error(STATUS_CANCELLED, "Request cancelled");
        }

        let mut payloads = outcome.payloads;
        let chart_data = payloads.remove(&PayloadKind::Chart).map(|p| p.data);
        let map_update = payloads.remove(&PayloadKind::MapUpdate).map(|p| p.data);

        Self {
            status: STATUS_OK,
            body: ApiBody::Chat(ChatResponse {
                response: outcome.text,
                chart_data,
                map_update,
            }),
        }
    }
}

/// Handle one chat request
pub async fn handle_chat<L, E>(
    orchestrator: &Orchestrator<L, E>,
    request: &ChatRequest,
    cancel: &CancellationToken,
) -> ApiReply
where
    L: LlmClient + ?Sized,
    E: ToolExecutor + ?Sized,
{
    if request.message.trim().is_empty() {
        warn!("Rejecting chat request with empty message");
        return ApiReply::error(STATUS_BAD_REQUEST, "Message is required");
    }

    let history = request.history_turns();
    match orchestrator.respond(&request.message, &history, cancel).await {
        Ok(outcome) => {
            info!(
                "[{}] Chat finished: {} ({} model calls, {} tool calls)",
                outcome.request_id,
                outcome.state,
                outcome.model_calls,
                outcome.executor_calls()
            );
            outcome.into()
        }
        Err(e) => {
            error!("Chat request failed: {}", e);
            ApiReply::error(STATUS_INTERNAL_ERROR, GENERIC_FAILURE)
        }
    }
}

/// Handle a raw JSON request body
pub async fn handle_chat_json<L, E>(
    orchestrator: &Orchestrator<L, E>,
    body: &str,
    cancel: &CancellationToken,
) -> ApiReply
where
    L: LlmClient + ?Sized,
    E: ToolExecutor + ?Sized,
{
    match serde_json::from_str::<ChatRequest>(body) {
        Ok(request) => handle_chat(orchestrator, &request, cancel).await,
        Err(e) => {
            warn!("Invalid chat request body: {}", e);
            ApiReply::error(STATUS_BAD_REQUEST, "Invalid request body")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::LocalExecutor;
    use crate::llm::{FunctionCall, MockLlmClient, ModelResponse, Role};
    use crate::tools::ToolCatalog;
    use serde_json::json;
    use std::sync::Arc;

    fn orchestrator(llm: Arc<MockLlmClient>) -> Orchestrator<MockLlmClient, LocalExecutor> {
        let executor = LocalExecutor::new()
            .with_fn("visualize_data", |args| Ok(args.to_string()))
            .with_fn("update_map", |_| Ok("centered".to_string()));
        Orchestrator::new(llm, Arc::new(executor), Arc::new(ToolCatalog::builtin().unwrap())).with_selection(None)
    }

    #[test]
    fn test_request_parsing() {
        let request: ChatRequest = serde_json::from_value(json!({
            "message": "and Reem?",
            "history": [
                {"role": "user", "content": "sales in Yas"},
                {"role": "assistant", "content": "1.5B AED"},
                {"role": "assistant", "content": "  "}
            ]
        }))
        .unwrap();

        let turns = request.history_turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Model);
        assert_eq!(turns[1].text(), "1.5B AED");
    }

    #[test]
    fn test_history_is_optional() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert!(request.history.is_empty());
    }

    #[test]
    fn test_response_serialization() {
        let reply = ApiReply {
            status: STATUS_OK,
            body: ApiBody::Chat(ChatResponse {
                response: "ok".into(),
                chart_data: None,
                map_update: None,
            }),
        };
        assert_eq!(reply.to_json(), json!({"response": "ok"}));
        assert_eq!(
            ApiReply::error(STATUS_BAD_REQUEST, "Message is required").to_json(),
            json!({"error": "Message is required"})
        );
    }

    #[test]
    fn test_text_rendering() {
        let reply = ApiReply {
            status: STATUS_OK,
            body: ApiBody::Chat(ChatResponse {
                response: "Map centered".into(),
                chart_data: None,
                map_update: Some(json!({"location": "YAS ISLAND"})),
            }),
        };
        assert_eq!(reply.to_text(), "Map centered\n\nmapUpdate: {\"location\":\"YAS ISLAND\"}");
        assert_eq!(
            ApiReply::error(STATUS_BAD_REQUEST, "Message is required").to_text(),
            "Error (400): Message is required"
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let reply = handle_chat(&orchestrator(llm.clone()), &ChatRequest::new("   "), &CancellationToken::new()).await;
        assert_eq!(reply.status, STATUS_BAD_REQUEST);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let reply = handle_chat_json(&orchestrator(llm), "{not json", &CancellationToken::new()).await;
        assert_eq!(reply.status, STATUS_BAD_REQUEST);
        assert_eq!(reply.to_json()["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_success_with_chart() {
        let llm = Arc::new(MockLlmClient::new(vec![
            ModelResponse::calls(vec![FunctionCall::new(
                "visualize_data",
                json!({"chart_type": "pie", "labels": ["1BR", "2BR"], "values": [40, 60]}),
            )]),
            ModelResponse::text("Here is the split"),
        ]));

        let reply = handle_chat_json(
            &orchestrator(llm),
            r#"{"message": "chart of unit layouts"}"#,
            &CancellationToken::new(),
        )
        .await;

        assert!(reply.is_success());
        let body = reply.to_json();
        assert_eq!(body["response"], "Here is the split");
        assert_eq!(body["chartData"]["chart_type"], "pie");
        assert!(body.get("mapUpdate").is_none());
    }

    #[tokio::test]
    async fn test_map_update_payload() {
        let llm = Arc::new(MockLlmClient::new(vec![
            ModelResponse::calls(vec![FunctionCall::new("update_map", json!({"location": "YAS ISLAND"}))]),
            ModelResponse::text("Map centered on Yas Island"),
        ]));

        let reply = handle_chat(&orchestrator(llm), &ChatRequest::new("show Yas on the map"), &CancellationToken::new()).await;

        let body = reply.to_json();
        assert_eq!(body["mapUpdate"], "centered");
        assert!(body.get("chartData").is_none());
    }

    #[tokio::test]
    async fn test_chart_and_map_in_one_round() {
        let llm = Arc::new(MockLlmClient::new(vec![
            ModelResponse::calls(vec![
                FunctionCall::new(
                    "visualize_data",
                    json!({"chart_type": "bar", "labels": ["Yas"], "values": [12]}),
                ),
                FunctionCall::new("update_map", json!({"location": "YAS ISLAND"})),
            ]),
            ModelResponse::text("Chart and map ready"),
        ]));

        let reply = handle_chat(&orchestrator(llm), &ChatRequest::new("chart Yas and show it"), &CancellationToken::new()).await;

        let body = reply.to_json();
        assert_eq!(body["chartData"]["chart_type"], "bar");
        assert_eq!(body["mapUpdate"], "centered");
    }

    #[tokio::test]
    async fn test_chart_survives_later_map_round() {
        let llm = Arc::new(MockLlmClient::new(vec![
            ModelResponse::calls(vec![FunctionCall::new(
                "visualize_data",
                json!({"chart_type": "line", "labels": ["2023", "2024"], "values": [1, 2]}),
            )]),
            ModelResponse::calls(vec![FunctionCall::new("update_map", json!({"location": "AL REEM ISLAND"}))]),
            ModelResponse::text("Done"),
        ]));

        let reply = handle_chat(&orchestrator(llm), &ChatRequest::new("trend for Reem on the map"), &CancellationToken::new()).await;

        let body = reply.to_json();
        assert_eq!(body["chartData"]["chart_type"], "line");
        assert_eq!(body["mapUpdate"], "centered");
    }

    #[tokio::test]
    async fn test_model_failure_is_generic() {
        let llm = Arc::new(MockLlmClient::new(vec![]).then_error("API key not valid"));
        let reply = handle_chat(&orchestrator(llm), &ChatRequest::new("hi"), &CancellationToken::new()).await;

        assert_eq!(reply.status, STATUS_INTERNAL_ERROR);
        assert_eq!(reply.to_json(), json!({"error": "Failed to generate response"}));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let llm = Arc::new(MockLlmClient::new(vec![ModelResponse::text("late")]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reply = handle_chat(&orchestrator(llm), &ChatRequest::new("hi"), &cancel).await;
        assert_eq!(reply.status, STATUS_CANCELLED);
    }
}
