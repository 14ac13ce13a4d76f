//! Lexical tool selector
//!
//! Ranks catalog tools against a user message with a fixed integer score:
//!
//! - +5 per tool keyword found as a substring of the normalized message
//! - +1 per message token (2+ chars) present in the tool's search text
//! - +3 if the tool's normalized name appears in the message
//!
//! Ties keep catalog declaration order. Selection never fails: empty or
//! unmatched messages get the whole catalog, internal failures get an empty
//! selection.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use log::{debug, error};

use super::normalize::{normalize_text, tokenize};
use super::types::{ScoredTool, SelectionOptions, SelectionReason, ToolSelection};
use crate::tools::{ToolCatalog, ToolDescriptor};

const KEYWORD_SCORE: u32 = 5;
const TOKEN_SCORE: u32 = 1;
const NAME_SCORE: u32 = 3;
const MIN_TOKEN_CHARS: usize = 2;
const MIN_SELECTION: usize = 3;

/// Message that makes ranking panic in tests
#[cfg(test)]
pub(crate) const FAILING_MESSAGE: &str = "\u{0}selector failure\u{0}";

/// Pre-normalized view of one tool
#[derive(Debug, Clone)]
struct IndexedTool {
    name: String,
    name_norm: String,
    keywords_norm: Vec<String>,
    tokens: HashSet<String>,
}

impl IndexedTool {
    fn new(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.name.clone(),
            name_norm: normalize_text(&tool.name),
            keywords_norm: tool
                .keywords
                .iter()
                .map(|k| normalize_text(k))
                .filter(|k| !k.is_empty())
                .collect(),
            tokens: tokenize(&tool.search_text()).into_iter().collect(),
        }
    }

    fn score(&self, message_norm: &str, message_tokens: &[String]) -> u32 {
        if self.tokens.is_empty() {
            return 0;
        }

        let mut score = 0;

        for kw in &self.keywords_norm {
            if message_norm.contains(kw.as_str()) {
                score += KEYWORD_SCORE;
            }
        }

        for token in message_tokens {
            if token.chars().count() >= MIN_TOKEN_CHARS && self.tokens.contains(token) {
                score += TOKEN_SCORE;
            }
        }

        if !self.name_norm.is_empty() && message_norm.contains(self.name_norm.as_str()) {
            score += NAME_SCORE;
        }

        score
    }
}

/// Selector bound to one catalog
///
/// The catalog is immutable, so its search text is normalized once here and
/// reused for every message.
#[derive(Debug, Clone)]
pub struct LexicalSelector {
    catalog: Arc<ToolCatalog>,
    index: Vec<IndexedTool>,
    options: SelectionOptions,
}

impl LexicalSelector {
    pub fn new(catalog: Arc<ToolCatalog>, options: SelectionOptions) -> Self {
        let index = catalog.all().iter().map(IndexedTool::new).collect();
        Self {
            catalog,
            index,
            options,
        }
    }

    pub fn options(&self) -> &SelectionOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// Select tools for a message with the selector's own options
    pub fn select(&self, message: &str) -> ToolSelection {
        self.select_with(message, &self.options)
    }

    /// Select tools for a message with explicit options
    pub fn select_with(&self, message: &str, options: &SelectionOptions) -> ToolSelection {
        self.guarded(|| self.rank(message, options))
    }

    /// Run a ranking, turning a panic into an empty `error` selection
    fn guarded(&self, rank: impl FnOnce() -> ToolSelection) -> ToolSelection {
        match catch_unwind(AssertUnwindSafe(rank)) {
            Ok(selection) => {
                debug!(
                    "Tool selection ({}): {} of {} tools [{}]",
                    selection.reason,
                    selection.len(),
                    self.index.len(),
                    selection.names.join(", ")
                );
                selection
            }
            Err(_) => {
                error!("Tool selection failed, returning empty selection");
                ToolSelection::new(Vec::new(), SelectionReason::Error)
            }
        }
    }

    /// Score every tool, highest first, ties in catalog order
    pub fn scores(&self, message: &str) -> Vec<ScoredTool> {
        let message_norm = normalize_text(message);
        let message_tokens = tokenize(&message_norm);

        let mut scored: Vec<ScoredTool> = self
            .index
            .iter()
            .map(|tool| ScoredTool {
                name: tool.name.clone(),
                score: tool.score(&message_norm, &message_tokens),
            })
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }

    fn all_names(&self) -> Vec<String> {
        self.index.iter().map(|t| t.name.clone()).collect()
    }

    fn rank(&self, message: &str, options: &SelectionOptions) -> ToolSelection {
        #[cfg(test)]
        if message == FAILING_MESSAGE {
            panic!("ranking failed");
        }

        if message.trim().is_empty() {
            return ToolSelection::new(self.all_names(), SelectionReason::FallbackAll);
        }

        let scored = self.scores(message);
        let debug_scores = |s: &Vec<ScoredTool>| options.debug.then(|| s.clone());

        if scored.first().is_none_or(|top| top.score == 0) {
            return ToolSelection {
                names: self.all_names(),
                reason: SelectionReason::FallbackAll,
                scored: debug_scores(&scored),
            };
        }

        let positive: Vec<&str> = scored
            .iter()
            .filter(|s| s.score > 0)
            .map(|s| s.name.as_str())
            .collect();

        let ranked = merge(&options.always_include, positive.iter().take(options.top_k).copied());
        let floor = MIN_SELECTION.min(self.index.len());

        if ranked.len() < floor {
            let broader = merge(&options.always_include, positive.iter().take(options.fallback_k).copied());
            return ToolSelection {
                names: broader,
                reason: SelectionReason::FallbackTop,
                scored: debug_scores(&scored),
            };
        }

        ToolSelection {
            names: ranked,
            reason: SelectionReason::Ranked,
            scored: debug_scores(&scored),
        }
    }
}

/// Always-include names first, then ranked names, first occurrence wins
fn merge<'a>(always: &'a [String], ranked: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    always
        .iter()
        .map(String::as_str)
        .chain(ranked)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// One-shot selection without keeping a selector around
pub fn select(message: &str, catalog: Arc<ToolCatalog>, options: &SelectionOptions) -> ToolSelection {
    LexicalSelector::new(catalog, options.clone()).select(message)
}
