//! MCP executor - JSON-RPC 2.0 over a child process's stdio
//!
//! A fixed pool of server processes, each behind its own async mutex so a
//! channel only ever carries one request at a time. Calls pick a slot
//! round-robin. A slot whose connection dies or times out is emptied and
//! reopened on its next use.

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{ExecutorError, ToolExecutor, ToolOutput};

const PROTOCOL_VERSION: &str = "2024-11-05";
const NO_RESPONSE: &str = "No response from MCP server";

#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Server executable
    pub command: String,
    pub args: Vec<String>,
    /// Number of server processes
    pub pool_size: usize,
    /// Bound on each request, including spawn and handshake
    pub timeout: Duration,
    pub client_name: String,
    pub client_version: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["mcp-server/dist/index.js".to_string()],
            pool_size: 4,
            timeout: Duration::from_secs(30),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

struct Connection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl Connection {
    async fn open(config: &McpConfig) -> Result<Self, ExecutorError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::Spawn(format!("{}: {}", config.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutorError::Spawn("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Spawn("stdout not captured".to_string()))?;

        let mut conn = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        };
        conn.initialize(config).await?;
        Ok(conn)
    }

    async fn initialize(&mut self, config: &McpConfig) -> Result<(), ExecutorError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": config.client_name,
                        "version": config.client_version
                    }
                }),
            )
            .await?;

        tracing::debug!(
            server = %result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
            protocol = %result["protocolVersion"].as_str().unwrap_or("unknown"),
            "MCP server initialized"
        );

        self.notify("notifications/initialized", json!({})).await
    }

    async fn send(&mut self, message: &Value) -> Result<(), ExecutorError> {
        let mut line = serde_json::to_string(message).map_err(|e| ExecutorError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|_| ExecutorError::Closed)?;
        self.stdin.flush().await.map_err(|_| ExecutorError::Closed)
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), ExecutorError> {
        self.send(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, ExecutorError> {
        self.next_id += 1;
        let id = self.next_id;
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|_| ExecutorError::Closed)?;
            if read == 0 {
                return Err(ExecutorError::Closed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(_) => {
                    tracing::debug!(line = %trimmed, "Skipping non-JSON line from MCP server");
                    continue;
                }
            };

            // Server-initiated notifications and requests
            if message.get("method").is_some() {
                continue;
            }
            if message["id"].as_u64() != Some(id) {
                continue;
            }

            if let Some(error) = message.get("error") {
                let msg = error["message"].as_str().unwrap_or("Unknown MCP error");
                return Err(ExecutorError::Remote(msg.to_string()));
            }

            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

/// Pooled MCP client
pub struct McpExecutor {
    config: McpConfig,
    pool: Vec<Mutex<Option<Connection>>>,
    next: AtomicUsize,
}

impl McpExecutor {
    /// Create the pool; connections open on first use
    pub fn new(config: McpConfig) -> Self {
        let size = config.pool_size.max(1);
        Self {
            pool: (0..size).map(|_| Mutex::new(None)).collect(),
            next: AtomicUsize::new(0),
            config,
        }
    }

    /// Create the pool and open every connection now
    pub async fn connect(config: McpConfig) -> Result<Self, ExecutorError> {
        let executor = Self::new(config);
        for slot in &executor.pool {
            let conn = executor.open().await?;
            *slot.lock().await = Some(conn);
        }
        tracing::info!(
            command = %executor.config.command,
            pool_size = executor.pool.len(),
            "Connected to MCP server"
        );
        Ok(executor)
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    async fn open(&self) -> Result<Connection, ExecutorError> {
        tokio::time::timeout(self.config.timeout, Connection::open(&self.config))
            .await
            .map_err(|_| ExecutorError::Timeout(self.config.timeout))?
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ExecutorError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        let mut slot = self.pool[index].lock().await;

        if slot.is_none() {
            tracing::debug!(slot = index, "Opening MCP connection");
            *slot = Some(self.open().await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(ExecutorError::Closed);
        };

        match tokio::time::timeout(self.config.timeout, conn.request(method, params)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                if matches!(e, ExecutorError::Closed | ExecutorError::Protocol(_)) {
                    tracing::warn!(slot = index, error = %e, "Dropping MCP connection");
                    *slot = None;
                }
                Err(e)
            }
            Err(_) => {
                // A late reply would desync the stream; start fresh
                tracing::warn!(slot = index, method = %method, "MCP request timed out, dropping connection");
                *slot = None;
                Err(ExecutorError::Timeout(self.config.timeout))
            }
        }
    }

    /// Kill every server process
    pub async fn shutdown(&self) {
        for slot in &self.pool {
            if let Some(mut conn) = slot.lock().await.take() {
                let _ = conn.child.kill().await;
            }
        }
    }
}

impl std::fmt::Debug for McpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpExecutor")
            .field("command", &self.config.command)
            .field("pool_size", &self.pool.len())
            .finish()
    }
}

/// Text of the first content block; a block without text yields the raw result
fn parse_call_result(result: &Value) -> Result<ToolOutput, ExecutorError> {
    let first_text = result["content"].as_array().and_then(|c| c.first()).map(|block| {
        block["text"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| result.to_string())
    });

    if result["isError"].as_bool().unwrap_or(false) {
        return Err(ExecutorError::Remote(
            first_text.unwrap_or_else(|| "Tool execution failed".to_string()),
        ));
    }

    Ok(ToolOutput::new(first_text.unwrap_or_else(|| NO_RESPONSE.to_string())))
}

#[async_trait]
impl ToolExecutor for McpExecutor {
    async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ExecutorError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments.clone() };
        let started = Instant::now();

        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        let output = parse_call_result(&result)?;

        tracing::debug!(
            tool = %name,
            chars = output.text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "MCP tool call complete"
        );
        Ok(output)
    }

    async fn list_tools(&self) -> Result<Vec<String>, ExecutorError> {
        let mut names = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let tools = result["tools"]
                .as_array()
                .ok_or_else(|| ExecutorError::Protocol("tools/list result has no tools array".to_string()))?;
            names.extend(tools.iter().filter_map(|t| t["name"].as_str().map(str::to_string)));

            match result["nextCursor"].as_str() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_result_text() {
        let result = json!({"content": [{"type": "text", "text": "YAS ISLAND"}, {"type": "text", "text": "ignored"}]});
        assert_eq!(parse_call_result(&result).unwrap().text, "YAS ISLAND");
    }

    #[test]
    fn test_parse_call_result_without_text() {
        let result = json!({"content": [{"type": "image", "data": "abc"}]});
        let out = parse_call_result(&result).unwrap();
        assert!(out.text.contains("\"image\""));
    }

    #[test]
    fn test_parse_call_result_empty() {
        assert_eq!(parse_call_result(&json!({})).unwrap().text, NO_RESPONSE);
    }

    #[test]
    fn test_parse_call_result_is_error() {
        let result = json!({"content": [{"type": "text", "text": "District not found"}], "isError": true});
        let err = parse_call_result(&result).unwrap_err();
        assert!(matches!(err, ExecutorError::Remote(ref m) if m == "District not found"));
    }

    #[test]
    fn test_pool_size_floor() {
        let executor = McpExecutor::new(McpConfig {
            pool_size: 0,
            ..Default::default()
        });
        assert_eq!(executor.pool_size(), 1);
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        // Line-oriented fake MCP server
        const FAKE_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake","version":"0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","method":"notifications/message","params":{}}\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"get_districts"},{"name":"search_geospatial_metadata"}]}}\n' "$id" ;;
    *'"name":"fail"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"District not found"}],"isError":true}}\n' "$id" ;;
    *'"name":"hang"'*)
      sleep 5 ;;
    *'"name":"quit"'*)
      exit 0 ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}]}}\n' "$id" ;;
  esac
done
"#;

        fn config() -> McpConfig {
            McpConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), FAKE_SERVER.to_string()],
                pool_size: 2,
                timeout: Duration::from_secs(5),
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_call_and_list() {
            let executor = McpExecutor::connect(config()).await.unwrap();
            let out = executor.call("get_districts", &json!({"municipality": "Abu Dhabi"})).await.unwrap();
            assert_eq!(out.text, "ok");

            let tools = executor.list_tools().await.unwrap();
            assert_eq!(tools, vec!["get_districts", "search_geospatial_metadata"]);
            executor.shutdown().await;
        }

        #[tokio::test]
        async fn test_is_error_result() {
            let executor = McpExecutor::new(config());
            let err = executor.call("fail", &json!({})).await.unwrap_err();
            assert!(matches!(err, ExecutorError::Remote(ref m) if m == "District not found"));
        }

        #[tokio::test]
        async fn test_timeout_then_reconnect() {
            let executor = McpExecutor::new(McpConfig {
                pool_size: 1,
                timeout: Duration::from_millis(300),
                ..config()
            });
            let err = executor.call("hang", &json!({})).await.unwrap_err();
            assert!(matches!(err, ExecutorError::Timeout(_)));

            let out = executor.call("get_districts", &json!({})).await.unwrap();
            assert_eq!(out.text, "ok");
        }

        #[tokio::test]
        async fn test_closed_then_reconnect() {
            let executor = McpExecutor::new(McpConfig {
                pool_size: 1,
                ..config()
            });
            let err = executor.call("quit", &json!({})).await.unwrap_err();
            assert!(matches!(err, ExecutorError::Closed));

            assert_eq!(executor.call("get_districts", &json!({})).await.unwrap().text, "ok");
        }

        #[tokio::test]
        async fn test_spawn_failure() {
            let executor = McpExecutor::new(McpConfig {
                command: "/nonexistent/toolrag-mcp-server".to_string(),
                ..config()
            });
            let err = executor.call("get_districts", &json!({})).await.unwrap_err();
            assert!(matches!(err, ExecutorError::Spawn(_)));
        }
    }
}
