//! Tool selection - narrow the catalog to the tools relevant to one message

mod lexical;
mod normalize;
mod types;

#[cfg(test)]
pub(crate) use lexical::FAILING_MESSAGE;
pub use lexical::{LexicalSelector, select};
pub use normalize::{normalize_text, tokenize};
pub use types::{DEFAULT_ALWAYS_INCLUDE, ScoredTool, SelectionOptions, SelectionReason, ToolSelection};
