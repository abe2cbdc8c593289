//! Node type registry
//!
//! A read-only lookup table from type tag to `NodeTypeConfig`. The built-in
//! table is constructed once on first use and shared; callers that need
//! extra types build their own registry and `merge` the built-ins in.
//!
//! Lookups never fail hard: a server may define node types newer than this
//! client, so unknown tags resolve to a generic configurable shape.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::json;

use crate::descriptor::{EditorKind, HandleSpec, NodeCategory, NodeTypeConfig, PropertyDescriptor};
use crate::error::Result;
use crate::types::{ConfigMap, NodeKind};

static BUILTIN: Lazy<Arc<NodeRegistry>> = Lazy::new(|| {
    let mut registry = NodeRegistry::new();
    for config in builtin_configs() {
        registry.register(config);
    }
    Arc::new(registry)
});

static FALLBACK: Lazy<NodeTypeConfig> = Lazy::new(|| NodeTypeConfig {
    node_type: "configurableNode".to_string(),
    label: "Node".to_string(),
    description: "Node type not known to this editor".to_string(),
    icon: "settings".to_string(),
    color: "#8c8c8c".to_string(),
    category: NodeCategory::Custom,
    inputs: vec![HandleSpec::new("input", "Input").multiple()],
    outputs: vec![HandleSpec::new("output", "Output").multiple()],
    default_data: template(json!({ "label": "Node" })),
    properties: vec![PropertyDescriptor::text("label", "Label").required()],
});

/// Registry of node types keyed by type tag
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, NodeTypeConfig>,
    /// Registration order, used for palette listing
    order: Vec<String>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared built-in registry
    pub fn builtin() -> Arc<NodeRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// The shape used for unknown node types
    pub fn fallback() -> &'static NodeTypeConfig {
        &FALLBACK
    }

    /// Register a node type, replacing any entry with the same tag
    pub fn register(&mut self, config: NodeTypeConfig) {
        if !self.entries.contains_key(&config.node_type) {
            self.order.push(config.node_type.clone());
        }
        self.entries.insert(config.node_type.clone(), config);
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same tag.
    pub fn merge(&mut self, other: &NodeRegistry) {
        for tag in &other.order {
            if let Some(config) = other.entries.get(tag) {
                self.register(config.clone());
            }
        }
    }

    /// Get the entry for a type tag, or `None` for unknown types
    pub fn get_config(&self, node_type: &str) -> Option<&NodeTypeConfig> {
        self.entries.get(node_type)
    }

    /// Get the entry for a type tag, falling back to the generic shape
    pub fn config_or_fallback(&self, node_type: &str) -> &NodeTypeConfig {
        self.get_config(node_type).unwrap_or_else(|| Self::fallback())
    }

    /// A fresh copy of the default data for a type
    ///
    /// Every call returns a new map; two nodes never share configuration.
    pub fn get_default_data(&self, node_type: &str, label_override: Option<&str>) -> ConfigMap {
        let config = self.config_or_fallback(node_type);
        let mut data = config.default_data.clone();
        let label = label_override.unwrap_or(config.label.as_str());
        data.insert("label".to_string(), json!(label));
        data
    }

    /// Check a complete data map against the type's property descriptors
    pub fn validate_data(&self, node_type: &str, data: &ConfigMap) -> Result<()> {
        for property in &self.config_or_fallback(node_type).properties {
            property.check(data.get(&property.key))?;
        }
        Ok(())
    }

    /// Check only the keys present in a partial update
    ///
    /// Keys without a descriptor are accepted as user-extensible fields.
    pub fn validate_partial(&self, node_type: &str, partial: &ConfigMap) -> Result<()> {
        let config = self.config_or_fallback(node_type);
        for (key, value) in partial {
            if let Some(property) = config.property(key) {
                property.check(Some(value))?;
            }
        }
        Ok(())
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered type tags in registration order
    pub fn node_types(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Entries grouped by category, each group in registration order
    pub fn by_category(&self) -> HashMap<NodeCategory, Vec<&NodeTypeConfig>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeTypeConfig>> = HashMap::new();
        for tag in &self.order {
            if let Some(config) = self.entries.get(tag) {
                grouped.entry(config.category).or_default().push(config);
            }
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn template(value: serde_json::Value) -> ConfigMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}

fn entry(
    kind: NodeKind,
    label: &str,
    description: &str,
    icon: &str,
    color: &str,
    category: NodeCategory,
) -> NodeTypeConfig {
    NodeTypeConfig {
        node_type: kind.as_str().to_string(),
        label: label.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        category,
        inputs: vec![HandleSpec::new("input", "Input").multiple()],
        outputs: vec![HandleSpec::new("output", "Output").multiple()],
        default_data: ConfigMap::new(),
        properties: Vec::new(),
    }
}

fn builtin_configs() -> Vec<NodeTypeConfig> {
    vec![
        NodeTypeConfig {
            inputs: vec![],
            default_data: template(json!({ "label": "Start", "variables": [] })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::new(
                    "variables",
                    "Input Variables",
                    EditorKind::VariableList,
                ),
            ],
            ..entry(
                NodeKind::Start,
                "Start",
                "Entry point of the flow",
                "play-circle",
                "#52c41a",
                NodeCategory::Basic,
            )
        },
        NodeTypeConfig {
            outputs: vec![],
            default_data: template(json!({ "label": "End", "outputTemplate": "" })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::text_area("outputTemplate", "Output Template"),
            ],
            ..entry(
                NodeKind::End,
                "End",
                "Returns the flow result",
                "stop",
                "#f5222d",
                NodeCategory::Basic,
            )
        },
        NodeTypeConfig {
            default_data: template(json!({
                "label": "AI Dialog",
                "model": "",
                "systemPrompt": "",
                "prompt": "",
                "temperature": 0.7,
                "maxTokens": 2048,
                "stream": true,
            })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::text("model", "Model").required(),
                PropertyDescriptor::text_area("systemPrompt", "System Prompt").max_length(8000),
                PropertyDescriptor::text_area("prompt", "Prompt").required(),
                PropertyDescriptor::number("temperature", "Temperature").range(0.0, 2.0),
                PropertyDescriptor::number("maxTokens", "Max Tokens").range(1.0, 32768.0),
                PropertyDescriptor::switch("stream", "Stream Output"),
            ],
            ..entry(
                NodeKind::AiDialog,
                "AI Dialog",
                "Sends a prompt to a chat model",
                "message",
                "#1890ff",
                NodeCategory::Ai,
            )
        },
        NodeTypeConfig {
            default_data: template(json!({
                "label": "Knowledge Retrieval",
                "knowledgeBaseIds": [],
                "query": "",
                "topK": 5,
                "scoreThreshold": 0.5,
            })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::new(
                    "knowledgeBaseIds",
                    "Knowledge Bases",
                    EditorKind::Json,
                ),
                PropertyDescriptor::text_area("query", "Query").required(),
                PropertyDescriptor::number("topK", "Top K").range(1.0, 50.0),
                PropertyDescriptor::number("scoreThreshold", "Score Threshold").range(0.0, 1.0),
            ],
            ..entry(
                NodeKind::KnowledgeRetrieval,
                "Knowledge Retrieval",
                "Searches knowledge bases for relevant passages",
                "book",
                "#722ed1",
                NodeCategory::Knowledge,
            )
        },
        NodeTypeConfig {
            outputs: vec![HandleSpec::new("true", "True"), HandleSpec::new("false", "False")],
            default_data: template(json!({ "label": "Condition", "expression": "" })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::code("expression", "Condition", "expression").required(),
            ],
            ..entry(
                NodeKind::Condition,
                "Condition",
                "Branches on a boolean expression",
                "branches",
                "#fa8c16",
                NodeCategory::Logic,
            )
        },
        NodeTypeConfig {
            default_data: template(json!({
                "label": "HTTP Request",
                "method": "GET",
                "url": "",
                "headers": {},
                "body": "",
                "timeoutMs": 30000,
            })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::select(
                    "method",
                    "Method",
                    &["GET", "POST", "PUT", "DELETE", "PATCH"],
                ),
                PropertyDescriptor::text("url", "URL")
                    .required()
                    .max_length(2048),
                PropertyDescriptor::new("headers", "Headers", EditorKind::Json),
                PropertyDescriptor::code("body", "Body", "json"),
                PropertyDescriptor::number("timeoutMs", "Timeout (ms)").range(100.0, 300000.0),
            ],
            ..entry(
                NodeKind::HttpRequest,
                "HTTP Request",
                "Calls an external HTTP endpoint",
                "api",
                "#13c2c2",
                NodeCategory::Integration,
            )
        },
        NodeTypeConfig {
            default_data: template(json!({
                "label": "Code",
                "language": "javascript",
                "code": "",
            })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::select("language", "Language", &["javascript", "python"]),
                PropertyDescriptor::code("code", "Code", "javascript").required(),
            ],
            ..entry(
                NodeKind::Code,
                "Code",
                "Runs a user script on the backend",
                "code",
                "#2f54eb",
                NodeCategory::Logic,
            )
        },
        NodeTypeConfig {
            default_data: template(json!({ "label": "Template", "template": "" })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::text_area("template", "Template").required(),
            ],
            ..entry(
                NodeKind::Template,
                "Template",
                "Renders text from upstream values",
                "file-text",
                "#eb2f96",
                NodeCategory::Logic,
            )
        },
        NodeTypeConfig {
            outputs: vec![HandleSpec::new("output", "Output").multiple()],
            default_data: template(json!({
                "label": "Intent Classifier",
                "model": "",
                "intents": [],
            })),
            properties: vec![
                PropertyDescriptor::text("label", "Label").required(),
                PropertyDescriptor::text("model", "Model").required(),
                PropertyDescriptor::new(
                    "intents",
                    "Intents",
                    EditorKind::VariableList,
                ),
            ],
            ..entry(
                NodeKind::IntentClassifier,
                "Intent Classifier",
                "Routes input by detected intent",
                "apartment",
                "#faad14",
                NodeCategory::Ai,
            )
        },
    ]
}
