//! Conversation and request/response types for model calls
//!
//! `Part` and `ConversationTurn` serialize to the same JSON shape the model
//! API uses for `contents`, so a transcript can be stored, replayed, or sent
//! as-is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::tools::ParameterSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    /// Opaque signature the model attaches to a call; echoed back on the next request
    #[serde(rename = "thoughtSignature", default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            thought_signature: None,
        }
    }

    pub fn with_thought_signature(mut self, signature: impl Into<String>) -> Self {
        self.thought_signature = Some(signature.into());
        self
    }
}

/// The resolved outcome of one function call, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

impl FunctionResponse {
    /// `{"result": <text>}`
    pub fn success(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: json!({ "result": result.into() }),
        }
    }

    /// `{"error": <message>}`
    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: json!({ "error": error.into() }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.response.get("error").is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionResponse(resp) => Some(resp),
            _ => None,
        })
    }
}

/// Ordered transcript of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<ConversationTurn> {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Every function response must answer an earlier, unanswered function
    /// call of the same name. Calls belong to model turns, responses to user
    /// turns.
    pub fn check_pairing(&self) -> Result<(), String> {
        let mut pending: HashMap<&str, usize> = HashMap::new();

        for (i, turn) in self.turns.iter().enumerate() {
            for part in &turn.parts {
                match part {
                    Part::FunctionCall(call) => {
                        if turn.role != Role::Model {
                            return Err(format!("turn {}: function call '{}' outside a model turn", i, call.name));
                        }
                        *pending.entry(call.name.as_str()).or_default() += 1;
                    }
                    Part::FunctionResponse(resp) => {
                        if turn.role != Role::User {
                            return Err(format!(
                                "turn {}: function response '{}' outside a user turn",
                                i, resp.name
                            ));
                        }
                        match pending.get_mut(resp.name.as_str()) {
                            Some(count) if *count > 0 => *count -= 1,
                            _ => {
                                return Err(format!(
                                    "turn {}: function response '{}' has no matching call",
                                    i, resp.name
                                ));
                            }
                        }
                    }
                    Part::Text(_) => {}
                }
            }
        }

        Ok(())
    }
}

impl From<Vec<ConversationTurn>> for Conversation {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }
}

/// A tool as offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: ParameterSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Function declaration in the Gemini wire format
    ///
    /// Parameterless tools omit `parameters`; the API rejects an OBJECT
    /// schema with no properties.
    pub fn to_gemini(&self) -> Value {
        let mut decl = json!({
            "name": self.name,
            "description": self.description,
        });

        let has_properties = match &self.parameters {
            ParameterSchema::Object { properties, .. } => !properties.is_empty(),
            _ => true,
        };
        if has_properties {
            decl["parameters"] = self.parameters.to_gemini_schema();
        }

        decl
    }
}

/// Token usage reported by the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Everything needed for one model call
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    /// Full contents: prior history, the user message, and this request's rounds
    pub contents: Vec<ConversationTurn>,
    /// Tools the model may call; empty means no tools
    pub tools: Vec<ToolDeclaration>,
    /// Overrides the client's configured limit
    pub max_output_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(system_instruction: impl Into<String>, contents: Vec<ConversationTurn>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            contents,
            tools: Vec::new(),
            max_output_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }
}

/// What the model said: text, tool requests, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            function_calls,
            ..Default::default()
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.function_calls.is_empty()
    }

    /// The model turn to record in the transcript
    pub fn to_turn(&self) -> ConversationTurn {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(Part::text(self.text.clone()));
        }
        parts.extend(self.function_calls.iter().cloned().map(Part::FunctionCall));
        ConversationTurn::new(Role::Model, parts)
    }
}
