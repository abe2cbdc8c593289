//! Flow validation
//!
//! Structural checks run before a flow is saved or executed: start/end
//! presence, cycles, handle names and node properties. The graph model
//! already guarantees that every edge endpoint exists.

use std::collections::{HashMap, VecDeque};

use crate::graph::FlowGraph;
use crate::registry::NodeRegistry;
use crate::types::{NodeId, NodeKind};

/// Validation problem with location context
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationIssue {
    /// Nodes that sit on, or behind, a cycle
    #[error("Cycle detected involving nodes: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<NodeId> },

    /// A node has a type the registry does not know
    #[error("Unknown node type '{node_type}' for node '{node_id}'")]
    UnknownNodeType { node_id: NodeId, node_type: String },

    /// An edge names a handle the node type does not declare
    #[error("Edge '{edge_id}' uses unknown handle '{handle}' on node '{node_id}'")]
    UnknownHandle {
        edge_id: String,
        node_id: NodeId,
        handle: String,
    },

    /// A property value fails its descriptor
    #[error("Node '{node_id}': {message}")]
    InvalidProperty { node_id: NodeId, message: String },

    /// A node has no connections
    #[error("Node '{node_id}' has no connections")]
    OrphanedNode { node_id: NodeId },

    #[error("Flow has no start node")]
    MissingStartNode,

    #[error("Flow has no end node")]
    MissingEndNode,

    #[error("Flow has multiple start nodes")]
    MultipleStartNodes,
}

impl ValidationIssue {
    /// Whether the flow cannot run with this issue present
    ///
    /// Unknown types and orphans are shown as warnings only.
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self,
            Self::UnknownNodeType { .. } | Self::OrphanedNode { .. }
        )
    }
}

/// Validate a flow graph
///
/// Returns all issues found (not just the first). Pass a registry to enable
/// node type, handle and property checks.
pub fn validate_flow(graph: &FlowGraph, registry: Option<&NodeRegistry>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if graph.is_empty() {
        return issues;
    }

    validate_start_end_presence(graph, &mut issues);
    detect_cycles(graph, &mut issues);
    detect_orphans(graph, &mut issues);

    if let Some(reg) = registry {
        validate_node_types(graph, reg, &mut issues);
        validate_handles(graph, reg, &mut issues);
        validate_properties(graph, reg, &mut issues);
    }

    issues
}

fn validate_start_end_presence(graph: &FlowGraph, issues: &mut Vec<ValidationIssue>) {
    let starts = graph
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .count();
    match starts {
        0 => issues.push(ValidationIssue::MissingStartNode),
        1 => {}
        _ => issues.push(ValidationIssue::MultipleStartNodes),
    }

    if !graph.nodes().iter().any(|n| n.kind == NodeKind::End) {
        issues.push(ValidationIssue::MissingEndNode);
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(graph: &FlowGraph, issues: &mut Vec<ValidationIssue>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in graph.nodes() {
        in_degree.insert(&node.id, 0);
    }
    for edge in graph.edges() {
        *in_degree.entry(&edge.target).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(node_id) = queue.pop_front() {
        for edge in graph.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    // Whatever keeps a positive in-degree never became ready
    let stuck: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| in_degree.get(n.id.as_str()).copied().unwrap_or(0) > 0)
        .map(|n| n.id.clone())
        .collect();

    if !stuck.is_empty() {
        issues.push(ValidationIssue::CycleDetected { nodes: stuck });
    }
}

fn detect_orphans(graph: &FlowGraph, issues: &mut Vec<ValidationIssue>) {
    if graph.nodes().len() < 2 {
        return;
    }
    for node in graph.nodes() {
        if !graph.edges().iter().any(|e| e.touches(&node.id)) {
            issues.push(ValidationIssue::OrphanedNode {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all nodes have known types in the registry
fn validate_node_types(
    graph: &FlowGraph,
    registry: &NodeRegistry,
    issues: &mut Vec<ValidationIssue>,
) {
    for node in graph.nodes() {
        if !registry.has_node_type(node.kind.as_str()) {
            issues.push(ValidationIssue::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.kind.to_string(),
            });
        }
    }
}

/// Check named handles against the node types' declared handles
///
/// Edges without a handle attach to the node's default handle. Nodes of
/// unknown types are skipped; their handles are not known.
fn validate_handles(graph: &FlowGraph, registry: &NodeRegistry, issues: &mut Vec<ValidationIssue>) {
    for edge in graph.edges() {
        if let (Some(handle), Some(node)) = (&edge.source_handle, graph.node(&edge.source)) {
            if let Some(config) = registry.get_config(node.kind.as_str()) {
                if !config.has_output(handle) {
                    issues.push(ValidationIssue::UnknownHandle {
                        edge_id: edge.id.clone(),
                        node_id: node.id.clone(),
                        handle: handle.clone(),
                    });
                }
            }
        }
        if let (Some(handle), Some(node)) = (&edge.target_handle, graph.node(&edge.target)) {
            if let Some(config) = registry.get_config(node.kind.as_str()) {
                if !config.has_input(handle) {
                    issues.push(ValidationIssue::UnknownHandle {
                        edge_id: edge.id.clone(),
                        node_id: node.id.clone(),
                        handle: handle.clone(),
                    });
                }
            }
        }
    }
}

fn validate_properties(
    graph: &FlowGraph,
    registry: &NodeRegistry,
    issues: &mut Vec<ValidationIssue>,
) {
    for node in graph.nodes() {
        let Some(config) = registry.get_config(node.kind.as_str()) else {
            continue;
        };
        for property in &config.properties {
            if let Err(e) = property.check(node.data.get(&property.key)) {
                let message = match e {
                    crate::error::FlowError::Validation(msg) => msg,
                    other => other.to_string(),
                };
                issues.push(ValidationIssue::InvalidProperty {
                    node_id: node.id.clone(),
                    message,
                });
            }
        }
    }
}
