//! Core types for flow graphs
//!
//! These types define the structure of an agent flow: nodes, edges,
//! handles and the snapshots recorded by the history stack.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a handle (connection point)
pub type HandleId = String;

/// Node configuration values, keyed by property name
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Type tag of a node
///
/// Built-in registry entries get their own variant. Types defined by the
/// server after this client was built land in `Other` and resolve to the
/// registry's generic configurable shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Start,
    End,
    AiDialog,
    KnowledgeRetrieval,
    Condition,
    HttpRequest,
    Code,
    Template,
    IntentClassifier,
    Other(String),
}

impl NodeKind {
    /// Every built-in kind, in palette order
    pub const BUILTIN: [NodeKind; 9] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::AiDialog,
        NodeKind::KnowledgeRetrieval,
        NodeKind::Condition,
        NodeKind::HttpRequest,
        NodeKind::Code,
        NodeKind::Template,
        NodeKind::IntentClassifier,
    ];

    /// The wire tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Start => "startNode",
            NodeKind::End => "endNode",
            NodeKind::AiDialog => "aiDialogNode",
            NodeKind::KnowledgeRetrieval => "knowledgeRetrievalNode",
            NodeKind::Condition => "conditionNode",
            NodeKind::HttpRequest => "httpRequestNode",
            NodeKind::Code => "codeNode",
            NodeKind::Template => "templateNode",
            NodeKind::IntentClassifier => "intentClassifierNode",
            NodeKind::Other(tag) => tag,
        }
    }

    /// Whether this tag is not one of the built-in kinds
    pub fn is_custom(&self) -> bool {
        matches!(self, NodeKind::Other(_))
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        match tag {
            "startNode" => NodeKind::Start,
            "endNode" => NodeKind::End,
            "aiDialogNode" => NodeKind::AiDialog,
            "knowledgeRetrievalNode" => NodeKind::KnowledgeRetrieval,
            "conditionNode" => NodeKind::Condition,
            "httpRequestNode" => NodeKind::HttpRequest,
            "codeNode" => NodeKind::Code,
            "templateNode" => NodeKind::Template,
            "intentClassifierNode" => NodeKind::IntentClassifier,
            other => NodeKind::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::from(tag.as_str())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Other(tag) => tag,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in graph space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Reject NaN or infinite coordinates, which cannot round-trip through JSON
    pub fn checked(self) -> Result<Self, FlowError> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(FlowError::invalid(format!(
                "position ({}, {}) is not finite",
                self.x, self.y
            )))
        }
    }
}

/// Measured size of a rendered node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// A node instance in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Unique identifier, immutable once created
    pub id: NodeId,
    /// Registry type tag, immutable once created
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Position on the canvas
    pub position: Position,
    /// Configuration seeded from the registry template
    #[serde(default)]
    pub data: ConfigMap,
    /// Whether the node is selected in the editor
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    /// Size reported by the view layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl FlowNode {
    /// Create a node with empty data
    pub fn new(id: impl Into<String>, kind: impl Into<NodeKind>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position,
            data: ConfigMap::new(),
            selected: false,
            dimensions: None,
        }
    }

    /// Replace the node data
    pub fn with_data(mut self, data: ConfigMap) -> Self {
        self.data = data;
        self
    }

    /// Display label stored in the node data, if any
    pub fn label(&self) -> Option<&str> {
        self.data.get("label").and_then(|v| v.as_str())
    }
}

/// A directed connection between two nodes' handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Source handle ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleId>,
    /// Target handle ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<HandleId>,
    /// Whether the edge is selected in the editor
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl FlowEdge {
    /// Whether this edge touches the given node on either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Whether this edge connects the same handles as a connection request
    pub fn same_connection(&self, spec: &ConnectionSpec) -> bool {
        self.source == spec.source
            && self.target == spec.target
            && self.source_handle == spec.source_handle
            && self.target_handle == spec.target_handle
    }
}

/// A request to connect two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub source_handle: Option<HandleId>,
    #[serde(default)]
    pub target_handle: Option<HandleId>,
}

impl ConnectionSpec {
    /// Connect the default handles of two nodes
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Connect specific handles
    pub fn with_handles(
        mut self,
        source_handle: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.source_handle = Some(source_handle.into());
        self.target_handle = Some(target_handle.into());
        self
    }
}

/// A copy of the full node and edge collections at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Snapshot of an empty graph
    pub fn empty() -> Self {
        Self::default()
    }
}
