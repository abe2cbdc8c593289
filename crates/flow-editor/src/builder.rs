//! Fluent builder for flow graphs
//!
//! Provides a compact API for constructing flows programmatically, mostly
//! for tests and fixtures.

use crate::config::ConnectionPolicy;
use crate::error::Result;
use crate::graph::FlowGraph;
use crate::registry::NodeRegistry;
use crate::types::{ConfigMap, FlowEdge, FlowNode, GraphSnapshot, NodeKind, Position};

/// Fluent builder for constructing flow graphs
///
/// # Example
///
/// ```ignore
/// let graph = FlowBuilder::new("flow-1", "Greeting")
///     .add_node("start", NodeKind::Start, (0.0, 0.0))
///     .add_node("reply", NodeKind::AiDialog, (200.0, 0.0))
///     .with_data(serde_json::json!({"prompt": "Say hello"}))
///     .add_node("end", NodeKind::End, (400.0, 0.0))
///     .chain(&["start", "reply", "end"])
///     .build()?;
/// ```
pub struct FlowBuilder {
    id: String,
    name: String,
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    edge_counter: usize,
    policy: ConnectionPolicy,
    registry: Option<std::sync::Arc<NodeRegistry>>,
}

impl FlowBuilder {
    /// Create a new flow builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counter: 0,
            policy: ConnectionPolicy::default(),
            registry: None,
        }
    }

    /// Seed node data from the built-in registry templates
    pub fn with_templates(mut self) -> Self {
        self.registry = Some(NodeRegistry::builtin());
        self
    }

    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a node to the flow
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        kind: impl Into<NodeKind>,
        position: (f64, f64),
    ) -> Self {
        let kind = kind.into();
        let data = match &self.registry {
            Some(registry) => registry.get_default_data(kind.as_str(), None),
            None => ConfigMap::new(),
        };
        self.nodes.push(
            FlowNode::new(id, kind, Position::new(position.0, position.1)).with_data(data),
        );
        self
    }

    /// Merge data into the most recently added node
    ///
    /// Must be called immediately after `add_node`. Non-object values are
    /// ignored.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        if let (Some(node), serde_json::Value::Object(map)) = (self.nodes.last_mut(), data) {
            node.data.extend(map);
        }
        self
    }

    /// Connect the default handles of two nodes (auto-generates edge ID)
    pub fn add_edge(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.push_edge(source.into(), None, target.into(), None)
    }

    /// Connect specific handles of two nodes
    pub fn add_handle_edge(
        self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.push_edge(
            source.into(),
            Some(source_handle.into()),
            target.into(),
            Some(target_handle.into()),
        )
    }

    /// Connect each node to the next one in `ids`
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for pair in ids.windows(2) {
            self = self.add_edge(pair[0], pair[1]);
        }
        self
    }

    /// Snapshot of the nodes and edges without any checks
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone())
    }

    /// Build the graph, checking ids, endpoints and the connection policy
    pub fn build(self) -> Result<FlowGraph> {
        let snapshot = GraphSnapshot::new(self.nodes, self.edges);
        FlowGraph::from_snapshot(self.id, self.name, snapshot, self.policy)
    }

    fn push_edge(
        mut self,
        source: String,
        source_handle: Option<String>,
        target: String,
        target_handle: Option<String>,
    ) -> Self {
        self.edge_counter += 1;
        self.edges.push(FlowEdge {
            id: format!("edge-{}", self.edge_counter),
            source,
            target,
            source_handle,
            target_handle,
            selected: false,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chain_builds_linear_flow() {
        let graph = FlowBuilder::new("flow-1", "Greeting")
            .with_templates()
            .add_node("start", NodeKind::Start, (0.0, 0.0))
            .add_node("reply", NodeKind::AiDialog, (200.0, 0.0))
            .with_data(json!({ "prompt": "Say hello" }))
            .add_node("end", NodeKind::End, (400.0, 0.0))
            .chain(&["start", "reply", "end"])
            .build()
            .unwrap();

        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.edges().len(), 2);
        let reply = graph.node("reply").unwrap();
        assert_eq!(reply.data["prompt"], "Say hello");
        assert_eq!(reply.data["temperature"], 0.7);
        assert_eq!(graph.dependencies("end"), vec!["reply".to_string()]);
    }

    #[test]
    fn test_build_rejects_dangling_edge() {
        let result = FlowBuilder::new("flow", "Broken")
            .add_node("a", NodeKind::Code, (0.0, 0.0))
            .add_edge("a", "missing")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_handle_edges() {
        let graph = FlowBuilder::new("flow", "Branch")
            .add_node("cond", NodeKind::Condition, (0.0, 0.0))
            .add_node("yes", NodeKind::Code, (200.0, -50.0))
            .add_node("no", NodeKind::Code, (200.0, 50.0))
            .add_handle_edge("cond", "true", "yes", "input")
            .add_handle_edge("cond", "false", "no", "input")
            .build()
            .unwrap();

        let handles: Vec<_> = graph
            .outgoing_edges("cond")
            .filter_map(|e| e.source_handle.as_deref())
            .collect();
        assert_eq!(handles, vec!["true", "false"]);
    }
}
