//! In-memory flow graph
//!
//! `FlowGraph` holds the authoritative node and edge collections for one
//! editor session. It enforces referential integrity: an edge never outlives
//! either of its endpoints.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConnectionPolicy;
use crate::error::{FlowError, Result};
use crate::types::{
    ConfigMap, ConnectionSpec, Dimensions, EdgeId, FlowEdge, FlowNode, GraphSnapshot, NodeId,
    Position,
};

/// A structural delta produced by an interactive node gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    /// Node moved; `dragging` is true while the pointer is still down
    #[serde(rename_all = "camelCase")]
    Position {
        id: NodeId,
        position: Position,
        #[serde(default)]
        dragging: bool,
    },
    /// Selection toggled
    Select { id: NodeId, selected: bool },
    /// View layer measured the node
    Dimensions { id: NodeId, dimensions: Dimensions },
    /// Node deleted
    Remove { id: NodeId },
}

impl NodeChange {
    /// Whether this delta is an undoable edit
    ///
    /// Selection, measurement and in-flight drag frames are not.
    pub fn is_edit(&self) -> bool {
        match self {
            NodeChange::Position { dragging, .. } => !dragging,
            NodeChange::Remove { .. } => true,
            NodeChange::Select { .. } | NodeChange::Dimensions { .. } => false,
        }
    }
}

/// A structural delta produced by an interactive edge gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select { id: EdgeId, selected: bool },
    Remove { id: EdgeId },
}

impl EdgeChange {
    pub fn is_edit(&self) -> bool {
        matches!(self, EdgeChange::Remove { .. })
    }
}

/// What a batch of changes did to the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Nodes whose position, selection or size changed
    pub touched_nodes: Vec<NodeId>,
    /// Nodes removed by the batch
    pub removed_nodes: Vec<NodeId>,
    /// Edges removed by the batch, including cascaded ones
    pub removed_edges: Vec<EdgeId>,
    /// Whether any delta in the batch is an undoable edit
    pub is_edit: bool,
}

/// A removed node together with the edges that went with it
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: FlowNode,
    pub edges: Vec<FlowEdge>,
}

/// The mutable node/edge collections of an editor session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    /// Unique identifier for this flow
    pub id: String,
    /// Human-readable name
    pub name: String,
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    #[serde(skip)]
    policy: ConnectionPolicy,
}

impl FlowGraph {
    /// Create a new empty graph
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            policy: ConnectionPolicy::default(),
        }
    }

    /// Use a different connection policy
    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ConnectionPolicy) {
        self.policy = policy;
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a node by ID
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn edge(&self, id: &str) -> Option<&FlowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Get the IDs of nodes feeding this node, without duplicates
    pub fn dependencies(&self, node_id: &str) -> Vec<NodeId> {
        let mut deps: Vec<NodeId> = Vec::new();
        for edge in self.incoming_edges(node_id) {
            if !deps.contains(&edge.source) {
                deps.push(edge.source.clone());
            }
        }
        deps
    }

    /// Get the IDs of nodes fed by this node, without duplicates
    pub fn dependents(&self, node_id: &str) -> Vec<NodeId> {
        let mut deps: Vec<NodeId> = Vec::new();
        for edge in self.outgoing_edges(node_id) {
            if !deps.contains(&edge.target) {
                deps.push(edge.target.clone());
            }
        }
        deps
    }

    /// Append a node
    pub fn add_node(&mut self, node: FlowNode) -> Result<()> {
        if self.contains_node(&node.id) {
            return Err(FlowError::DuplicateId {
                kind: "Node",
                id: node.id,
            });
        }
        node.position.checked()?;
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and every edge touching it
    ///
    /// Removing an absent node is a no-op and returns `None`.
    pub fn remove_node(&mut self, id: &str) -> Option<RemovedNode> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(pos);
        let (edges, kept): (Vec<FlowEdge>, Vec<FlowEdge>) =
            self.edges.drain(..).partition(|e| e.touches(id));
        self.edges = kept;
        Some(RemovedNode { node, edges })
    }

    /// Remove an edge; absent ids are a no-op
    pub fn remove_edge(&mut self, id: &str) -> Option<FlowEdge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }

    /// Shallow-merge `partial` into a node's data
    pub fn update_node_data(&mut self, id: &str, partial: ConfigMap) -> Result<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| FlowError::node_not_found(id))?;
        for (key, value) in partial {
            node.data.insert(key, value);
        }
        Ok(())
    }

    /// Check a connection request against the graph and policy
    pub fn check_connection(&self, spec: &ConnectionSpec) -> Result<()> {
        if !self.contains_node(&spec.source) {
            return Err(FlowError::node_not_found(&spec.source));
        }
        if !self.contains_node(&spec.target) {
            return Err(FlowError::node_not_found(&spec.target));
        }
        if spec.source == spec.target && !self.policy.allow_self_loops {
            return Err(FlowError::invalid(format!(
                "self-loop on node '{}' is not allowed",
                spec.source
            )));
        }
        if !self.policy.allow_duplicate_edges && self.edges.iter().any(|e| e.same_connection(spec))
        {
            return Err(FlowError::invalid(format!(
                "'{}' is already connected to '{}'",
                spec.source, spec.target
            )));
        }
        Ok(())
    }

    /// Validate and append a new edge, returning its generated ID
    pub fn connect(&mut self, spec: ConnectionSpec) -> Result<EdgeId> {
        self.check_connection(&spec)?;
        let id = format!("edge-{}", uuid::Uuid::new_v4());
        self.edges.push(FlowEdge {
            id: id.clone(),
            source: spec.source,
            target: spec.target,
            source_handle: spec.source_handle,
            target_handle: spec.target_handle,
            selected: false,
        });
        Ok(id)
    }

    /// Append an edge that already carries an ID (used when loading flows)
    pub fn insert_edge(&mut self, edge: FlowEdge) -> Result<()> {
        if self.edge(&edge.id).is_some() {
            return Err(FlowError::DuplicateId {
                kind: "Edge",
                id: edge.id,
            });
        }
        let spec = ConnectionSpec {
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_handle: edge.source_handle.clone(),
            target_handle: edge.target_handle.clone(),
        };
        self.check_connection(&spec)?;
        self.edges.push(edge);
        Ok(())
    }

    /// Apply a batch of node deltas atomically
    ///
    /// Either every delta applies or the graph is left untouched.
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> Result<AppliedChanges> {
        let mut staged = self.clone();
        let mut applied = AppliedChanges::default();

        for change in changes {
            applied.is_edit |= change.is_edit();
            match change {
                NodeChange::Position { id, position, .. } => {
                    staged.node_mut(id)?.position = position.checked()?;
                    applied.touched_nodes.push(id.clone());
                }
                NodeChange::Select { id, selected } => {
                    staged.node_mut(id)?.selected = *selected;
                    applied.touched_nodes.push(id.clone());
                }
                NodeChange::Dimensions { id, dimensions } => {
                    staged.node_mut(id)?.dimensions = Some(*dimensions);
                    applied.touched_nodes.push(id.clone());
                }
                NodeChange::Remove { id } => {
                    if let Some(removed) = staged.remove_node(id) {
                        applied.removed_nodes.push(removed.node.id);
                        applied
                            .removed_edges
                            .extend(removed.edges.into_iter().map(|e| e.id));
                    }
                }
            }
        }

        applied
            .touched_nodes
            .retain(|id| !applied.removed_nodes.contains(id));
        let mut seen = HashSet::new();
        applied.touched_nodes.retain(|id| seen.insert(id.clone()));
        *self = staged;
        Ok(applied)
    }

    /// Apply a batch of edge deltas atomically
    pub fn apply_edge_changes(&mut self, changes: &[EdgeChange]) -> Result<AppliedChanges> {
        let mut staged = self.edges.clone();
        let mut applied = AppliedChanges::default();

        for change in changes {
            applied.is_edit |= change.is_edit();
            match change {
                EdgeChange::Select { id, selected } => {
                    let edge = staged
                        .iter_mut()
                        .find(|e| &e.id == id)
                        .ok_or_else(|| FlowError::edge_not_found(id))?;
                    edge.selected = *selected;
                }
                EdgeChange::Remove { id } => {
                    if let Some(pos) = staged.iter().position(|e| &e.id == id) {
                        staged.remove(pos);
                        applied.removed_edges.push(id.clone());
                    }
                }
            }
        }

        self.edges = staged;
        Ok(applied)
    }

    /// IDs of currently selected nodes
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.selected)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Deep copy of the current nodes and edges
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone())
    }

    /// Replace the nodes and edges with a snapshot's contents
    ///
    /// The snapshot is taken by value so the graph never shares storage
    /// with a history entry.
    pub fn restore(&mut self, snapshot: GraphSnapshot) {
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
    }

    /// Build a graph from a snapshot, checking ids and edge endpoints
    pub fn from_snapshot(
        id: impl Into<String>,
        name: impl Into<String>,
        snapshot: GraphSnapshot,
        policy: ConnectionPolicy,
    ) -> Result<Self> {
        let mut graph = FlowGraph::new(id, name).with_policy(policy);
        for node in snapshot.nodes {
            graph.add_node(node)?;
        }
        for edge in snapshot.edges {
            graph.insert_edge(edge)?;
        }
        Ok(graph)
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut FlowNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| FlowError::node_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn node(id: &str) -> FlowNode {
        FlowNode::new(id, NodeKind::Code, Position::default())
    }

    fn two_nodes() -> FlowGraph {
        let mut graph = FlowGraph::new("flow", "Test");
        graph.add_node(node("n1")).unwrap();
        graph.add_node(node("n2")).unwrap();
        graph
    }

    #[test]
    fn test_add_duplicate_node() {
        let mut graph = two_nodes();
        let err = graph.add_node(node("n1")).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateId { .. }));
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut graph = two_nodes();
        graph.add_node(node("n3")).unwrap();
        graph.connect(ConnectionSpec::new("n1", "n2")).unwrap();
        graph.connect(ConnectionSpec::new("n3", "n1")).unwrap();
        graph.connect(ConnectionSpec::new("n2", "n3")).unwrap();

        let removed = graph.remove_node("n1").unwrap();
        assert_eq!(removed.edges.len(), 2);
        assert!(graph.edges().iter().all(|e| !e.touches("n1")));
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_remove_absent_node_is_noop() {
        let mut graph = two_nodes();
        assert!(graph.remove_node("missing").is_none());
        assert!(graph.remove_edge("missing").is_none());
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_update_node_data_merges() {
        let mut graph = two_nodes();
        let mut first = ConfigMap::new();
        first.insert("a".into(), serde_json::json!(1));
        first.insert("b".into(), serde_json::json!(2));
        graph.update_node_data("n1", first).unwrap();

        let mut second = ConfigMap::new();
        second.insert("b".into(), serde_json::json!(3));
        graph.update_node_data("n1", second).unwrap();

        let data = &graph.node("n1").unwrap().data;
        assert_eq!(data["a"], 1);
        assert_eq!(data["b"], 3);

        let err = graph.update_node_data("missing", ConfigMap::new()).unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[test]
    fn test_connect_validation() {
        let mut graph = two_nodes();
        assert!(matches!(
            graph.connect(ConnectionSpec::new("n1", "missing")),
            Err(FlowError::NotFound { .. })
        ));
        assert!(matches!(
            graph.connect(ConnectionSpec::new("n1", "n1")),
            Err(FlowError::Validation(_))
        ));

        graph.connect(ConnectionSpec::new("n1", "n2")).unwrap();
        assert!(matches!(
            graph.connect(ConnectionSpec::new("n1", "n2")),
            Err(FlowError::Validation(_))
        ));
        // A different handle pair is a different connection
        graph
            .connect(ConnectionSpec::new("n1", "n2").with_handles("true", "input"))
            .unwrap();
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_self_loop_policy() {
        let mut graph = two_nodes().with_policy(ConnectionPolicy {
            allow_self_loops: true,
            allow_duplicate_edges: false,
        });
        graph.connect(ConnectionSpec::new("n1", "n1")).unwrap();
        assert_eq!(graph.dependencies("n1"), vec!["n1"]);
    }

    #[test]
    fn test_node_changes_are_atomic() {
        let mut graph = two_nodes();
        let before = graph.snapshot();

        let result = graph.apply_node_changes(&[
            NodeChange::Position {
                id: "n1".into(),
                position: Position::new(10.0, 10.0),
                dragging: false,
            },
            NodeChange::Select {
                id: "missing".into(),
                selected: true,
            },
        ]);

        assert!(result.is_err());
        assert_eq!(graph.snapshot(), before);
    }

    #[test]
    fn test_node_changes_remove_and_move() {
        let mut graph = two_nodes();
        graph.connect(ConnectionSpec::new("n1", "n2")).unwrap();

        let applied = graph
            .apply_node_changes(&[
                NodeChange::Position {
                    id: "n2".into(),
                    position: Position::new(5.0, 6.0),
                    dragging: false,
                },
                NodeChange::Remove { id: "n1".into() },
            ])
            .unwrap();

        assert!(applied.is_edit);
        assert_eq!(applied.removed_nodes, vec!["n1"]);
        assert_eq!(applied.removed_edges.len(), 1);
        assert_eq!(graph.node("n2").unwrap().position, Position::new(5.0, 6.0));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_selection_is_not_an_edit() {
        let mut graph = two_nodes();
        let applied = graph
            .apply_node_changes(&[NodeChange::Select {
                id: "n1".into(),
                selected: true,
            }])
            .unwrap();
        assert!(!applied.is_edit);
        assert_eq!(graph.selected_nodes(), vec!["n1"]);
    }

    #[test]
    fn test_touched_nodes_are_unique() {
        let mut graph = two_nodes();
        let applied = graph
            .apply_node_changes(&[
                NodeChange::Position {
                    id: "n1".into(),
                    position: Position::new(1.0, 1.0),
                    dragging: false,
                },
                NodeChange::Select {
                    id: "n2".into(),
                    selected: true,
                },
                NodeChange::Select {
                    id: "n1".into(),
                    selected: true,
                },
            ])
            .unwrap();
        assert_eq!(applied.touched_nodes, vec!["n1", "n2"]);
    }

    #[test]
    fn test_non_finite_positions_are_rejected() {
        let mut graph = two_nodes();
        let err = graph
            .add_node(FlowNode::new("bad", NodeKind::Code, Position::new(f64::NAN, 0.0)))
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));

        let result = graph.apply_node_changes(&[
            NodeChange::Position {
                id: "n2".into(),
                position: Position::new(3.0, 3.0),
                dragging: false,
            },
            NodeChange::Position {
                id: "n1".into(),
                position: Position::new(0.0, f64::NEG_INFINITY),
                dragging: false,
            },
        ]);
        assert!(result.is_err());
        assert_eq!(graph.node("n2").unwrap().position, Position::default());
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_edge_changes_are_atomic() {
        let mut graph = two_nodes();
        let edge_id = graph.connect(ConnectionSpec::new("n1", "n2")).unwrap();

        let result = graph.apply_edge_changes(&[
            EdgeChange::Remove { id: edge_id.clone() },
            EdgeChange::Select {
                id: "missing".into(),
                selected: true,
            },
        ]);
        assert!(result.is_err());
        assert!(graph.edge(&edge_id).is_some());

        let applied = graph
            .apply_edge_changes(&[EdgeChange::Remove { id: edge_id }])
            .unwrap();
        assert!(applied.is_edit);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_from_snapshot_rejects_dangling_edges() {
        let snapshot = GraphSnapshot::new(
            vec![node("a")],
            vec![FlowEdge {
                id: "e1".into(),
                source: "a".into(),
                target: "ghost".into(),
                source_handle: None,
                target_handle: None,
                selected: false,
            }],
        );
        let result = FlowGraph::from_snapshot("f", "F", snapshot, ConnectionPolicy::default());
        assert!(matches!(result, Err(FlowError::NotFound { .. })));
    }

    #[test]
    fn test_dependencies_deduplicate() {
        let mut graph = two_nodes();
        graph
            .connect(ConnectionSpec::new("n1", "n2").with_handles("a", "in"))
            .unwrap();
        graph
            .connect(ConnectionSpec::new("n1", "n2").with_handles("b", "in"))
            .unwrap();
        assert_eq!(graph.dependencies("n2"), vec!["n1"]);
        assert_eq!(graph.dependents("n1"), vec!["n2"]);
    }
}
