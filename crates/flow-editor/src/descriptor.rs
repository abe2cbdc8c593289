//! Node type descriptors
//!
//! Everything the view layer needs to render a node and its property
//! panel, and everything the editor needs to validate property edits.
//! Node types differ only in this data, never in behaviour.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::types::ConfigMap;

/// Palette grouping of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Flow entry and exit points
    Basic,
    /// Model-backed nodes
    Ai,
    /// Knowledge base access
    Knowledge,
    /// Branching and data shaping
    Logic,
    /// Calls to external systems
    Integration,
    /// Types the registry does not know
    Custom,
}

/// Widget used to edit a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditorKind {
    Text,
    TextArea,
    Number,
    Switch,
    Select { options: Vec<String> },
    Code { language: String },
    Json,
    VariableList,
}

/// Constraints on a property value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyValidation {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// One editable property of a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Key in the node data
    pub key: String,
    /// Human-readable label
    pub label: String,
    /// Widget used to edit the value
    pub editor_kind: EditorKind,
    /// Constraints checked on every edit
    pub validation: PropertyValidation,
}

impl PropertyDescriptor {
    /// Create a property descriptor
    pub fn new(key: impl Into<String>, label: impl Into<String>, editor_kind: EditorKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            editor_kind,
            validation: PropertyValidation::default(),
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, EditorKind::Text)
    }

    pub fn text_area(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, EditorKind::TextArea)
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, EditorKind::Number)
    }

    pub fn switch(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, EditorKind::Switch)
    }

    pub fn select(key: impl Into<String>, label: impl Into<String>, options: &[&str]) -> Self {
        Self::new(
            key,
            label,
            EditorKind::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
        )
    }

    pub fn code(key: impl Into<String>, label: impl Into<String>, language: &str) -> Self {
        Self::new(
            key,
            label,
            EditorKind::Code {
                language: language.to_string(),
            },
        )
    }

    /// Mark this property as required
    pub fn required(mut self) -> Self {
        self.validation.required = true;
        self
    }

    /// Bound a numeric property
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.validation.min = Some(min);
        self.validation.max = Some(max);
        self
    }

    /// Bound the length of a text property
    pub fn max_length(mut self, max: usize) -> Self {
        self.validation.max_length = Some(max);
        self
    }

    /// Check one value against this descriptor
    ///
    /// `None` means the key is absent from the node data.
    pub fn check(&self, value: Option<&serde_json::Value>) -> Result<()> {
        let value = match value {
            None | Some(serde_json::Value::Null) => {
                return if self.validation.required {
                    Err(self.fail("is required"))
                } else {
                    Ok(())
                };
            }
            Some(value) => value,
        };

        match &self.editor_kind {
            EditorKind::Text | EditorKind::TextArea | EditorKind::Code { .. } => {
                let text = value.as_str().ok_or_else(|| self.fail("must be text"))?;
                if self.validation.required && text.trim().is_empty() {
                    return Err(self.fail("is required"));
                }
                if let Some(max) = self.validation.max_length {
                    if text.chars().count() > max {
                        return Err(self.fail(&format!("must be at most {} characters", max)));
                    }
                }
            }
            EditorKind::Number => {
                let n = value.as_f64().ok_or_else(|| self.fail("must be a number"))?;
                if let Some(min) = self.validation.min {
                    if n < min {
                        return Err(self.fail(&format!("must be at least {}", min)));
                    }
                }
                if let Some(max) = self.validation.max {
                    if n > max {
                        return Err(self.fail(&format!("must be at most {}", max)));
                    }
                }
            }
            EditorKind::Switch => {
                if !value.is_boolean() {
                    return Err(self.fail("must be true or false"));
                }
            }
            EditorKind::Select { options } => {
                let choice = value.as_str().ok_or_else(|| self.fail("must be text"))?;
                if !options.iter().any(|o| o == choice) {
                    return Err(self.fail(&format!("must be one of {}", options.join(", "))));
                }
            }
            EditorKind::VariableList => {
                if !value.is_array() {
                    return Err(self.fail("must be a list"));
                }
            }
            EditorKind::Json => {}
        }
        Ok(())
    }

    fn fail(&self, reason: &str) -> FlowError {
        FlowError::invalid(format!("'{}' {}", self.label, reason))
    }
}

/// A named connection point on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleSpec {
    pub id: String,
    pub label: String,
    /// Whether more than one edge may attach
    pub multiple: bool,
}

impl HandleSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            multiple: false,
        }
    }

    /// Allow several edges on this handle
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Complete static description of a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeConfig {
    /// Type tag (e.g. "aiDialogNode")
    pub node_type: String,
    /// Human-readable label
    pub label: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub category: NodeCategory,
    pub inputs: Vec<HandleSpec>,
    pub outputs: Vec<HandleSpec>,
    /// Template copied into every new node of this type
    pub default_data: ConfigMap,
    /// Editable properties, in panel order
    pub properties: Vec<PropertyDescriptor>,
}

impl NodeTypeConfig {
    /// Find a property descriptor by key
    pub fn property(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn has_input(&self, handle: &str) -> bool {
        self.inputs.iter().any(|h| h.id == handle)
    }

    pub fn has_output(&self, handle: &str) -> bool {
        self.outputs.iter().any(|h| h.id == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_text() {
        let prop = PropertyDescriptor::text("prompt", "Prompt").required();
        assert!(prop.check(None).is_err());
        assert!(prop.check(Some(&json!("  "))).is_err());
        assert!(prop.check(Some(&json!(5))).is_err());
        assert!(prop.check(Some(&json!("hello"))).is_ok());
    }

    #[test]
    fn test_number_range() {
        let prop = PropertyDescriptor::number("temperature", "Temperature").range(0.0, 2.0);
        assert!(prop.check(None).is_ok());
        assert!(prop.check(Some(&json!(0.7))).is_ok());
        assert!(prop.check(Some(&json!(2.5))).is_err());
        assert!(prop.check(Some(&json!("hot"))).is_err());
    }

    #[test]
    fn test_select_options() {
        let prop = PropertyDescriptor::select("method", "Method", &["GET", "POST"]);
        assert!(prop.check(Some(&json!("POST"))).is_ok());
        let err = prop.check(Some(&json!("PATCH"))).unwrap_err();
        assert!(err.to_string().contains("GET, POST"));
    }

    #[test]
    fn test_max_length_counts_chars() {
        let prop = PropertyDescriptor::text("name", "Name").max_length(3);
        assert!(prop.check(Some(&json!("äöü"))).is_ok());
        assert!(prop.check(Some(&json!("abcd"))).is_err());
    }
}
