//! Selector options and results

use serde::{Deserialize, Serialize};

/// Tool that is always offered so the model can resolve location names first
pub const DEFAULT_ALWAYS_INCLUDE: &str = "search_geospatial_metadata";

/// Knobs for one selection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    /// Maximum ranked tools kept on the normal path
    pub top_k: usize,
    /// Broader cutoff used when the normal path selects too few tools
    pub fallback_k: usize,
    /// Tool names forced into every ranked result
    pub always_include: Vec<String>,
    /// Attach per-tool scores to the result
    pub debug: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            top_k: 12,
            fallback_k: 20,
            always_include: vec![DEFAULT_ALWAYS_INCLUDE.to_string()],
            debug: false,
        }
    }
}

impl SelectionOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_fallback_k(mut self, fallback_k: usize) -> Self {
        self.fallback_k = fallback_k;
        self
    }

    pub fn with_always_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.always_include = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Which policy produced a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Top-k positive scores plus always-include
    Ranked,
    /// Empty message or nothing matched: whole catalog
    FallbackAll,
    /// Ranked result was too narrow, broadened to fallback-k
    FallbackTop,
    /// Scoring failed; empty selection
    Error,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranked => "ranked",
            Self::FallbackAll => "fallback_all",
            Self::FallbackTop => "fallback_top",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one tool against one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredTool {
    pub name: String,
    pub score: u32,
}

/// Ordered tool names chosen for a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelection {
    pub names: Vec<String>,
    pub reason: SelectionReason,
    /// Every tool's score in ranked order, only when debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored: Option<Vec<ScoredTool>>,
}

impl ToolSelection {
    pub fn new(names: Vec<String>, reason: SelectionReason) -> Self {
        Self {
            names,
            reason,
            scored: None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
