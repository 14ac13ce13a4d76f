//! Tool catalog loading and lookup
//!
//! The catalog is loaded once at startup, validated, and then shared
//! read-only (`Arc<ToolCatalog>`) by the selector and the orchestrator.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, ToolragError};
use crate::llm::ToolDeclaration;

use super::definition::ToolDescriptor;

/// Catalog embedded into the binary
const DEFAULT_CATALOG: &str = include_str!("default_catalog.yml");

/// File structure of a multi-tool catalog document
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    tools: Vec<ToolDescriptor>,
}

/// Immutable, validated collection of tool descriptors in declaration order
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    fingerprint: String,
}

impl ToolCatalog {
    /// Build a catalog from descriptors, validating every invariant
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            tool.check().map_err(ToolragError::Catalog)?;
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(ToolragError::Catalog(format!("duplicate tool name: {}", tool.name)));
            }
        }

        let fingerprint = fingerprint(&tools)?;
        Ok(Self {
            tools,
            index,
            fingerprint,
        })
    }

    /// The built-in real estate catalog
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_CATALOG)
    }

    /// Load a catalog document (`tools: [...]`) from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: CatalogDocument = serde_yaml::from_str(content)
            .map_err(|e| ToolragError::Catalog(format!("Failed to parse catalog YAML: {}", e)))?;
        Self::new(doc.tools)
    }

    /// Load a catalog document (`{"tools": [...]}`) from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: CatalogDocument = serde_json::from_str(content)
            .map_err(|e| ToolragError::Catalog(format!("Failed to parse catalog JSON: {}", e)))?;
        Self::new(doc.tools)
    }

    /// Load a catalog document from a file, format chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolragError::Catalog(format!("Failed to read catalog file {}: {}", path.display(), e)))?;

        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Load one tool per file from a directory
    ///
    /// Files are read in file-name order, which becomes declaration order.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for ext in ["json", "yml", "yaml"] {
            let pattern = dir.join(format!("*.{}", ext));
            let pattern = pattern.to_string_lossy();
            let entries = glob::glob(&pattern)
                .map_err(|e| ToolragError::Catalog(format!("Invalid catalog pattern {}: {}", pattern, e)))?;
            for entry in entries {
                let path = entry.map_err(|e| ToolragError::Catalog(format!("Failed to read catalog entry: {}", e)))?;
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut tools = Vec::with_capacity(files.len());
        for path in &files {
            let content = std::fs::read_to_string(path)?;
            let parsed = if is_json(path) {
                serde_json::from_str::<ToolDescriptor>(&content).map_err(|e| e.to_string())
            } else {
                serde_yaml::from_str::<ToolDescriptor>(&content).map_err(|e| e.to_string())
            };
            let tool = parsed.map_err(|e| {
                ToolragError::Catalog(format!("Invalid tool doc {}: {}", path.display(), e))
            })?;
            tools.push(tool);
        }

        log::debug!("Loaded {} tool docs from {}", tools.len(), dir.display());
        Self::new(tools)
    }

    /// Load from a path (file or directory), or the built-in catalog when absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let catalog = match path {
            Some(p) if p.is_dir() => Self::from_dir(p)?,
            Some(p) => Self::from_file(p)?,
            None => Self::builtin()?,
        };
        log::info!(
            "Tool catalog loaded: {} tools, fingerprint {}",
            catalog.len(),
            catalog.fingerprint()
        );
        Ok(catalog)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tools in declaration order
    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// All tool names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Short content hash, changes whenever any descriptor changes
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Declarations for every tool
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(ToolDescriptor::to_declaration).collect()
    }

    /// Declarations for the named tools, in the order given
    ///
    /// Unknown and repeated names are dropped. An empty name list yields the
    /// full catalog.
    pub fn menu(&self, names: &[String]) -> Vec<ToolDeclaration> {
        if names.is_empty() {
            return self.declarations();
        }

        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                let tool = self.get(name);
                if tool.is_none() {
                    log::warn!("Selected tool '{}' is not in the catalog, skipping", name);
                }
                tool
            })
            .map(ToolDescriptor::to_declaration)
            .collect()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn fingerprint(tools: &[ToolDescriptor]) -> Result<String> {
    let bytes = serde_json::to_vec(tools)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let result = hasher.finalize();
    Ok(hex::encode(&result[..8]))
}
