//! Tool descriptors
//!
//! Defines the catalog entry for a tool: what it does, when to use it, and the
//! words a user is likely to type when they need it.

use serde::{Deserialize, Serialize};

use super::schema::ParameterSchema;
use crate::llm::ToolDeclaration;

/// Coarse grouping of tools by data domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Geo,
    Sales,
    Rental,
    Supply,
    Municipality,
    Visualization,
    #[serde(other)]
    Other,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Sales => "sales",
            Self::Rental => "rental",
            Self::Supply => "supply",
            Self::Municipality => "municipality",
            Self::Visualization => "visualization",
            Self::Other => "other",
        }
    }
}

/// A sample user phrasing for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExample {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A tool as declared in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (e.g., "get_transaction_count")
    pub name: String,
    pub category: ToolCategory,
    /// Description shown to the model
    pub description: String,
    /// Trigger phrases describing when the tool applies
    #[serde(default, alias = "whenToUse")]
    pub when_to_use: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub examples: Vec<ToolExample>,
    /// Argument schema, always an object at the root
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    /// Create a descriptor with no hints and no parameters
    pub fn new(name: impl Into<String>, category: ToolCategory, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            description: description.into(),
            when_to_use: Vec::new(),
            keywords: Vec::new(),
            examples: Vec::new(),
            parameters: ParameterSchema::empty_object(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_when_to_use(mut self, hint: impl Into<String>) -> Self {
        self.when_to_use.push(hint.into());
        self
    }

    pub fn with_example(mut self, user: impl Into<String>, notes: Option<&str>) -> Self {
        self.examples.push(ToolExample {
            user: user.into(),
            notes: notes.map(str::to_string),
        });
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    /// Raw text the selector indexes for this tool
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.name.as_str(), self.description.as_str()];
        parts.extend(self.when_to_use.iter().map(String::as_str));
        parts.extend(self.keywords.iter().map(String::as_str));
        parts.extend(self.examples.iter().map(|e| e.user.as_str()));
        parts.join(" ")
    }

    /// Check the descriptor's own invariants (uniqueness is the catalog's job)
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("tool with empty name".to_string());
        }
        if self.description.trim().is_empty() {
            return Err(format!("tool '{}' has an empty description", self.name));
        }
        if !matches!(self.parameters, ParameterSchema::Object { .. }) {
            return Err(format!(
                "tool '{}' parameters must be an object schema, got {}",
                self.name,
                self.parameters.type_name()
            ));
        }
        self.parameters
            .check_well_formed(&format!("{}.parameters", self.name))
    }

    /// Convert to the declaration offered to the model
    pub fn to_declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new(&self.name, &self.description, self.parameters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("get_sales_value", ToolCategory::Sales, "Total sales value for a district")
            .with_keywords(["sales", "value", "revenue"])
            .with_when_to_use("User asks about sales value")
            .with_example("Sales in Yas Island 2024", Some("search first"))
    }

    #[test]
    fn test_search_text_concatenates_fields() {
        let text = descriptor().search_text();
        assert!(text.starts_with("get_sales_value Total sales value"));
        assert!(text.contains("User asks about sales value"));
        assert!(text.contains("revenue"));
        assert!(text.ends_with("Sales in Yas Island 2024"));
        // Notes are not indexed
        assert!(!text.contains("search first"));
    }

    #[test]
    fn test_check_ok() {
        assert!(descriptor().check().is_ok());
    }

    #[test]
    fn test_check_empty_name() {
        let tool = ToolDescriptor::new("  ", ToolCategory::Geo, "desc");
        assert!(tool.check().is_err());
    }

    #[test]
    fn test_check_empty_description() {
        let tool = ToolDescriptor::new("get_districts", ToolCategory::Geo, "");
        let err = tool.check().unwrap_err();
        assert!(err.contains("empty description"));
    }

    #[test]
    fn test_check_non_object_parameters() {
        let tool = ToolDescriptor::new("bad", ToolCategory::Other, "desc")
            .with_parameters(ParameterSchema::String {
                description: None,
                enum_values: None,
            });
        let err = tool.check().unwrap_err();
        assert!(err.contains("must be an object schema"));
    }

    #[test]
    fn test_category_deserialization() {
        let cat: ToolCategory = serde_yaml::from_str("municipality").unwrap();
        assert_eq!(cat, ToolCategory::Municipality);
        let other: ToolCategory = serde_yaml::from_str("weather").unwrap();
        assert_eq!(other, ToolCategory::Other);
    }

    #[test]
    fn test_camel_case_when_to_use_alias() {
        let json = r#"{
            "name": "get_districts",
            "category": "geo",
            "description": "Lists all districts",
            "whenToUse": ["list districts"],
            "parameters": {"type": "object", "properties": {}}
        }"#;
        let tool: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(tool.when_to_use, vec!["list districts".to_string()]);
        assert!(tool.keywords.is_empty());
    }

    #[test]
    fn test_missing_category_rejected() {
        let json = r#"{"name": "x", "description": "y", "parameters": {"type": "object"}}"#;
        assert!(serde_json::from_str::<ToolDescriptor>(json).is_err());
    }

    #[test]
    fn test_to_declaration() {
        let decl = descriptor().to_declaration();
        assert_eq!(decl.name, "get_sales_value");
        assert_eq!(decl.description, "Total sales value for a district");
    }
}
