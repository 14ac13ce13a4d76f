//! Scripted LlmClient for tests and offline runs

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{LlmClient, LlmError};
use super::types::{ModelRequest, ModelResponse};

enum Scripted {
    Response(ModelResponse),
    Error(String),
}

/// Returns scripted responses in order and records every request
///
/// Once the script runs out, the `repeat` response (if any) is returned
/// forever; otherwise the call fails with `InvalidResponse`.
pub struct MockLlmClient {
    script: Mutex<VecDeque<Scripted>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Scripted::Response).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always answer with the same response
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Queue a failure after the responses scripted so far
    pub fn then_error(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Scripted::Error(message.into()));
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        lock(&self.requests).last().cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, LlmError> {
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(LlmError::Api { status: 500, message }),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("mock script exhausted".to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ConversationTurn, FunctionCall};
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest::new("sys", vec![ConversationTurn::user_text("hi")])
    }

    #[tokio::test]
    async fn test_scripted_then_exhausted() {
        let mock = MockLlmClient::new(vec![ModelResponse::text("one")]);
        assert_eq!(mock.generate(request()).await.unwrap().text, "one");
        assert!(matches!(
            mock.generate(request()).await,
            Err(LlmError::InvalidResponse(_))
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_repeating() {
        let mock = MockLlmClient::repeating(ModelResponse::calls(vec![FunctionCall::new("a", json!({}))]));
        for _ in 0..3 {
            assert!(mock.generate(request()).await.unwrap().has_tool_requests());
        }
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_then_error() {
        let mock = MockLlmClient::new(vec![]).then_error("boom");
        let err = mock.generate(request()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(mock.last_request().unwrap().system_instruction, "sys");
    }
}
