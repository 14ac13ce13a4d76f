//! Gemini API client implementation
//!
//! Implements LlmClient against the `generateContent` REST endpoint with
//! native function calling.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{FunctionCall, ModelRequest, ModelResponse, Usage};

/// Gemini API base URL
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model to use
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_GENERATIVE_AI_API_KEY";

/// Default max output tokens
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GeminiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// Reads the API key from the configured environment variable
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the request body for the Gemini API
    fn build_request(&self, request: &ModelRequest) -> Result<Value, LlmError> {
        let max_output_tokens = request.max_output_tokens.unwrap_or(self.config.max_output_tokens);

        let mut contents = serde_json::to_value(&request.contents)?;
        hoist_thought_signatures(&mut contents);

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": max_output_tokens
            }
        });

        if !request.system_instruction.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": request.system_instruction }]
            });
        }

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request.tools.iter().map(|t| t.to_gemini()).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        Ok(body)
    }

    /// Parse the API response into a ModelResponse
    fn parse_response(&self, body: Value) -> Result<ModelResponse, LlmError> {
        let usage = body
            .get("usageMetadata")
            .map(|u| {
                Usage::new(
                    u["promptTokenCount"].as_u64().unwrap_or(0),
                    u["candidatesTokenCount"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        let Some(candidate) = body["candidates"].as_array().and_then(|c| c.first()) else {
            if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
                return Err(LlmError::InvalidResponse(format!("Prompt blocked: {}", reason)));
            }
            return Err(LlmError::InvalidResponse("No candidates in response".to_string()));
        };

        match candidate["finishReason"].as_str() {
            Some("STOP") | None => {}
            Some(reason) => debug!("Gemini finish reason: {}", reason),
        }

        let mut text = String::new();
        let mut function_calls = Vec::new();

        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if part["thought"].as_bool().unwrap_or(false) {
                    continue;
                }
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
                if let Some(call) = part.get("functionCall") {
                    let name = call["name"]
                        .as_str()
                        .ok_or_else(|| LlmError::InvalidResponse("functionCall without a name".to_string()))?;
                    let args = match call.get("args") {
                        Some(Value::Null) | None => json!({}),
                        Some(args) => args.clone(),
                    };
                    let mut call = FunctionCall::new(name, args);
                    if let Some(signature) = part["thoughtSignature"].as_str() {
                        call = call.with_thought_signature(signature);
                    }
                    function_calls.push(call);
                }
            }
        }

        Ok(ModelResponse {
            text,
            function_calls,
            usage,
        })
    }

    /// Send a request to the Gemini API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Gemini rate limited, retry after {}s", retry_after);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        // Handle other errors
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&error_body),
            });
        }

        Ok(response.json().await?)
    }
}

/// Pull `error.message` out of a Gemini error body, else the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Gemini expects `thoughtSignature` beside `functionCall`, not inside it
fn hoist_thought_signatures(contents: &mut Value) {
    let Some(turns) = contents.as_array_mut() else {
        return;
    };
    for turn in turns {
        let Some(parts) = turn.get_mut("parts").and_then(Value::as_array_mut) else {
            continue;
        };
        for part in parts {
            let Some(part) = part.as_object_mut() else {
                continue;
            };
            let signature = part
                .get_mut("functionCall")
                .and_then(Value::as_object_mut)
                .and_then(|call| call.remove("thoughtSignature"));
            if let Some(signature) = signature {
                part.insert("thoughtSignature".to_string(), signature);
            }
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, LlmError> {
        let body = self.build_request(&request)?;
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .field("max_output_tokens", &self.config.max_output_tokens)
            .finish()
    }
}
