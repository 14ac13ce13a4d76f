//! Orchestrator configuration and fixed prompts

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Instruction sent with every model call unless overridden in config
pub const SYSTEM_INSTRUCTION: &str = r#"You are a Real Estate AI Assistant for Abu Dhabi, UAE.

CRITICAL DISCOVERY WORKFLOW:
1. **SEARCH FIRST**: If the user mentions ANY location (District, Project, or Community), you MUST first call `search_geospatial_metadata` to confirm its name and existence.
   - Example: User asks "sales in Yas" -> Call `search_geospatial_metadata(query="Yas")`
   - Example: User asks "transactions in جزيرة ياس" -> Call `search_geospatial_metadata(query="جزيرة ياس")`

2. **USE METADATA**: The search tool will return the VALID English name (e.g., "YAS ISLAND"). Use THIS name for subsequent data tools.
   - Do NOT guess names. Do NOT translate manually. Trust the search tool.

3. **GET DATA**: Once you have the valid name from step 2, call the appropriate data tool.
   - Example: Search returned "YAS ISLAND" -> Call `get_transaction_count(district="YAS ISLAND", year=2024)`

4. **MULTILINGUAL**: You understand English and Arabic. Always respond in the user's language, but use English names for tool arguments (from step 2).

5. **NEVER GUESS**: If search returns no results, tell the user you couldn't find that location.

6. **FORMAT**: Format numbers clearly (e.g., 1.5B AED, 1500 units)."#;

/// Returned when the model keeps asking for tools past the round limit
pub const LOOP_LIMIT_MESSAGE: &str =
    "I'm having trouble processing your request (too many steps). Please try a simpler question.";

/// What a payload tool's result feeds on the client side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Chart,
    MapUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tool rounds allowed per request
    pub max_rounds: u32,
    pub system_instruction: String,
    /// Per-call override of the client's output limit
    pub max_output_tokens: Option<u32>,
    /// Tools whose successful results are surfaced as structured payloads
    pub payload_tools: BTreeMap<String, PayloadKind>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            max_output_tokens: None,
            payload_tools: BTreeMap::from([
                ("visualize_data".to_string(), PayloadKind::Chart),
                ("update_map".to_string(), PayloadKind::MapUpdate),
            ]),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }
}
