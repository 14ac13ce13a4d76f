//! In-process executor - tool handlers registered by name

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{ExecutorError, ToolExecutor, ToolOutput};

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// Maps tool names to handlers
#[derive(Clone, Default)]
pub struct LocalExecutor {
    handlers: HashMap<String, Handler>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler
    pub fn with_async<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        self.handlers
            .insert(name.into(), Arc::new(move |args| Box::pin(handler(args))));
        self
    }

    /// Register a synchronous handler
    pub fn with_fn<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.with_async(name, move |args| {
            let handler = handler.clone();
            async move { handler(&args) }
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("LocalExecutor").field("tools", &names).finish()
    }
}

#[async_trait]
impl ToolExecutor for LocalExecutor {
    async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ExecutorError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ExecutorError::UnknownTool(name.to_string()))?;

        handler(arguments.clone())
            .await
            .map(ToolOutput::new)
            .map_err(ExecutorError::Remote)
    }

    async fn list_tools(&self) -> Result<Vec<String>, ExecutorError> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor() -> LocalExecutor {
        LocalExecutor::new()
            .with_fn("echo", |args| Ok(args["text"].as_str().unwrap_or_default().to_string()))
            .with_fn("fail", |_| Err("District not found".to_string()))
            .with_async("slow", |_| async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok("done".to_string())
            })
    }

    #[tokio::test]
    async fn test_call_handler() {
        let out = executor().call("echo", &json!({"text": "hi"})).await.unwrap();
        assert_eq!(out.text, "hi");
    }

    #[tokio::test]
    async fn test_handler_error_is_remote() {
        let err = executor().call("fail", &json!({})).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Remote(ref m) if m == "District not found"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = executor().call("nope", &json!({})).await.unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_async_handler_and_list() {
        let exec = executor();
        assert_eq!(exec.call("slow", &json!({})).await.unwrap().text, "done");
        assert_eq!(exec.list_tools().await.unwrap(), vec!["echo", "fail", "slow"]);
        assert_eq!(exec.len(), 3);
    }
}
