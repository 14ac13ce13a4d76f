//! Parameter schemas for tool arguments
//!
//! A closed, recursive description of the arguments a tool accepts. The same
//! schema is rendered into the model's function declaration and used to
//! validate the arguments the model sends back before they are dispatched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Typed parameter schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSchema {
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Declaration order is kept; it is the order the model sees
        #[serde(default)]
        properties: IndexMap<String, ParameterSchema>,
        #[serde(default)]
        required: Vec<String>,
        #[serde(
            default,
            rename = "additionalProperties",
            alias = "additional_properties",
            skip_serializing_if = "Option::is_none"
        )]
        additional_properties: Option<bool>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<ParameterSchema>,
    },
}

impl ParameterSchema {
    /// Empty object schema (a tool that takes no arguments)
    pub fn empty_object() -> Self {
        Self::Object {
            description: None,
            properties: IndexMap::new(),
            required: Vec::new(),
            additional_properties: Some(false),
        }
    }

    /// Type name as written in catalog files
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Object { .. } => "object",
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Integer { .. } => "integer",
            Self::Boolean { .. } => "boolean",
            Self::Array { .. } => "array",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Object { description, .. }
            | Self::String { description, .. }
            | Self::Number { description }
            | Self::Integer { description }
            | Self::Boolean { description }
            | Self::Array { description, .. } => description.as_deref(),
        }
    }

    /// Check the schema itself is well formed.
    ///
    /// `path` names the node for error messages (e.g. `parameters.layout`).
    pub fn check_well_formed(&self, path: &str) -> Result<(), String> {
        match self {
            Self::Object {
                properties, required, ..
            } => {
                for key in required {
                    if !properties.contains_key(key) {
                        return Err(format!("{}: required field '{}' is not declared in properties", path, key));
                    }
                }
                for (key, child) in properties {
                    if key.trim().is_empty() {
                        return Err(format!("{}: property with empty name", path));
                    }
                    child.check_well_formed(&format!("{}.{}", path, key))?;
                }
                Ok(())
            }
            Self::String {
                enum_values: Some(values),
                ..
            } if values.is_empty() => Err(format!("{}: enum must not be empty", path)),
            Self::Array { items, .. } => items.check_well_formed(&format!("{}[]", path)),
            _ => Ok(()),
        }
    }

    /// Validate a JSON value against this schema
    pub fn validate(&self, value: &Value, path: &str) -> Result<(), String> {
        match self {
            Self::Object {
                properties,
                required,
                additional_properties,
                ..
            } => {
                let empty = Map::new();
                let object = match value {
                    Value::Object(map) => map,
                    // Models commonly omit the args object for zero-argument calls
                    Value::Null => &empty,
                    other => return Err(format!("{}: expected object, got {}", path, json_type(other))),
                };

                for key in required {
                    match object.get(key) {
                        None | Some(Value::Null) => {
                            return Err(format!("{}: missing required field '{}'", path, key));
                        }
                        Some(_) => {}
                    }
                }

                for (key, field) in object {
                    match properties.get(key) {
                        Some(child) => {
                            if field.is_null() && !required.contains(key) {
                                continue;
                            }
                            child.validate(field, &join_path(path, key))?;
                        }
                        None if *additional_properties == Some(false) => {
                            return Err(format!("{}: unexpected field '{}'", path, key));
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            Self::String { enum_values, .. } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("{}: expected string, got {}", path, json_type(value)))?;
                match enum_values {
                    Some(allowed) if !allowed.iter().any(|a| a == s) => {
                        Err(format!("{}: '{}' is not one of [{}]", path, s, allowed.join(", ")))
                    }
                    _ => Ok(()),
                }
            }
            Self::Number { .. } => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(format!("{}: expected number, got {}", path, json_type(value)))
                }
            }
            Self::Integer { .. } => match value.as_f64() {
                Some(n) if n.fract() == 0.0 => Ok(()),
                _ => Err(format!("{}: expected integer, got {}", path, json_type(value))),
            },
            Self::Boolean { .. } => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("{}: expected boolean, got {}", path, json_type(value)))
                }
            }
            Self::Array { items, .. } => {
                let elements = value
                    .as_array()
                    .ok_or_else(|| format!("{}: expected array, got {}", path, json_type(value)))?;
                for (i, element) in elements.iter().enumerate() {
                    items.validate(element, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
        }
    }

    /// Render as a Gemini function-declaration schema
    ///
    /// Gemini expects upper-case type names and does not accept
    /// `additionalProperties`.
    pub fn to_gemini_schema(&self) -> Value {
        let mut out = json!({ "type": self.type_name().to_uppercase() });

        if let Some(description) = self.description() {
            out["description"] = json!(description);
        }

        match self {
            Self::Object {
                properties, required, ..
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_gemini_schema()))
                    .collect();
                out["properties"] = Value::Object(props);
                if !required.is_empty() {
                    out["required"] = json!(required);
                }
            }
            Self::String {
                enum_values: Some(values),
                ..
            } => {
                out["enum"] = json!(values);
            }
            Self::Array { items, .. } => {
                out["items"] = items.to_gemini_schema();
            }
            _ => {}
        }

        out
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
