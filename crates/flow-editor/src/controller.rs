//! Flow editor controller
//!
//! `FlowEditor` is the single point of mutation for an editor session. It
//! owns the graph and its history, records exactly one history entry per
//! committed edit, and reports every change through an `EventSink`.
//!
//! Undo and redo restore a snapshot with [`Record::Skip`], so restoring a
//! state is never itself recorded as an edit.

use std::sync::Arc;

use crate::config::EditorConfig;
use crate::debug::ExecutionPlan;
use crate::dnd::{self, CanvasBounds, DropPayload, ScreenPoint, Viewport};
use crate::error::{FlowError, Result};
use crate::events::{EditorEvent, EventSink, RestoreReason};
use crate::graph::{AppliedChanges, EdgeChange, FlowGraph, NodeChange};
use crate::history::{HistoryStack, HistoryState};
use crate::registry::NodeRegistry;
use crate::types::{
    ConfigMap, ConnectionSpec, EdgeId, FlowNode, GraphSnapshot, NodeId, NodeKind, Position,
};
use crate::validation::{validate_flow, ValidationIssue};

/// Whether applying a graph state creates a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Push the resulting state onto the history
    Yes,
    /// Leave the history untouched (undo/redo)
    Skip,
}

/// One editor session: graph, history and change notifications
pub struct FlowEditor {
    graph: FlowGraph,
    history: HistoryStack,
    registry: Arc<NodeRegistry>,
    config: EditorConfig,
    events: Arc<dyn EventSink>,
}

impl FlowEditor {
    /// Create an editor over an empty, untitled flow
    ///
    /// The history is seeded with the empty graph so the first edit can be
    /// undone.
    pub fn new(config: EditorConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let graph = FlowGraph::new(uuid::Uuid::new_v4().to_string(), "Untitled Flow")
            .with_policy(config.connection);
        let mut history = HistoryStack::new(config.max_history_size);
        history.reset(&graph.snapshot())?;

        Ok(Self {
            graph,
            history,
            registry: NodeRegistry::builtin(),
            config,
            events,
        })
    }

    /// Use a registry other than the built-in one
    pub fn with_registry(mut self, registry: Arc<NodeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history_state(&self) -> HistoryState {
        self.history.state()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // =========================================================================
    // Node and edge edits
    // =========================================================================

    /// Add a fully formed node
    pub fn add_node(&mut self, node: FlowNode) -> Result<()> {
        let node_id = node.id.clone();
        self.graph.add_node(node)?;
        log::debug!("Added node '{}'", node_id);
        self.commit()?;
        self.emit(EditorEvent::NodeAdded { node_id });
        Ok(())
    }

    /// Create a node of `kind` seeded from the registry template
    pub fn create_node(
        &mut self,
        kind: NodeKind,
        position: Position,
        label: Option<&str>,
    ) -> Result<NodeId> {
        let data = self.registry.get_default_data(kind.as_str(), label);
        let id = format!("{}-{}", kind, uuid::Uuid::new_v4().simple());
        self.add_node(FlowNode::new(id.clone(), kind, position).with_data(data))?;
        Ok(id)
    }

    /// Create a node from a palette drop
    pub fn drop_node(
        &mut self,
        payload: &DropPayload,
        pointer: ScreenPoint,
        viewport: &Viewport,
        canvas: &CanvasBounds,
    ) -> Result<NodeId> {
        let position =
            dnd::drop_position(pointer, viewport, canvas, self.config.default_node_size)?;
        if !self.registry.has_node_type(payload.kind.as_str()) {
            log::warn!(
                "Dropped node type '{}' is not registered, using generic shape",
                payload.kind
            );
        }
        self.create_node(payload.kind.clone(), position, payload.label.as_deref())
    }

    /// Remove a node together with every edge touching it
    ///
    /// Records one history entry for the node and its edges. Returns
    /// `false` (and records nothing) when the node is already gone.
    pub fn remove_node(&mut self, id: &str) -> Result<bool> {
        Ok(self.remove_nodes(&[id])? > 0)
    }

    /// Remove several nodes as one undoable step
    ///
    /// Returns how many of them were present.
    pub fn remove_nodes<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<usize> {
        let mut node_ids = Vec::new();
        let mut edge_ids = Vec::new();
        for id in ids {
            if let Some(removed) = self.graph.remove_node(id.as_ref()) {
                node_ids.push(removed.node.id);
                edge_ids.extend(removed.edges.into_iter().map(|e| e.id));
            }
        }
        if node_ids.is_empty() {
            return Ok(0);
        }

        log::debug!(
            "Removed {} node(s) and {} edge(s)",
            node_ids.len(),
            edge_ids.len()
        );
        self.commit()?;
        let count = node_ids.len();
        self.emit(EditorEvent::NodesRemoved { node_ids, edge_ids });
        Ok(count)
    }

    /// Remove an edge; absent ids are a no-op
    pub fn remove_edge(&mut self, id: &str) -> Result<bool> {
        let Some(edge) = self.graph.remove_edge(id) else {
            return Ok(false);
        };
        log::debug!("Removed edge '{}'", edge.id);
        self.commit()?;
        self.emit(EditorEvent::EdgesRemoved {
            edge_ids: vec![edge.id],
        });
        Ok(true)
    }

    /// Merge property edits into a node's data
    ///
    /// Values are checked against the node type's property descriptors
    /// first; a rejected edit leaves the node unchanged.
    pub fn update_node_data(&mut self, id: &str, partial: ConfigMap) -> Result<()> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| FlowError::node_not_found(id))?;
        if let Err(e) = self.registry.validate_partial(node.kind.as_str(), &partial) {
            log::warn!("Rejected edit on node '{}': {}", id, e);
            return Err(e);
        }

        let keys: Vec<String> = partial.keys().cloned().collect();
        self.graph.update_node_data(id, partial)?;
        log::debug!("Updated node '{}' keys {:?}", id, keys);
        self.commit()?;
        self.emit(EditorEvent::NodeDataUpdated {
            node_id: id.to_string(),
            keys,
        });
        Ok(())
    }

    /// Connect two nodes, returning the new edge's ID
    pub fn connect(&mut self, spec: ConnectionSpec) -> Result<EdgeId> {
        let (source, target) = (spec.source.clone(), spec.target.clone());
        let edge_id = match self.graph.connect(spec) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Rejected connection {} -> {}: {}", source, target, e);
                return Err(e);
            }
        };
        log::debug!("Connected {} -> {} as '{}'", source, target, edge_id);
        self.commit()?;
        self.emit(EditorEvent::EdgeAdded {
            edge_id: edge_id.clone(),
            source,
            target,
        });
        Ok(edge_id)
    }

    /// Apply a batch of interactive node deltas
    ///
    /// Only batches containing a drag-end move or a removal are recorded.
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> Result<AppliedChanges> {
        let applied = self.graph.apply_node_changes(changes)?;
        if applied.is_edit {
            self.commit()?;
        }
        if !applied.removed_nodes.is_empty() {
            self.emit(EditorEvent::NodesRemoved {
                node_ids: applied.removed_nodes.clone(),
                edge_ids: applied.removed_edges.clone(),
            });
        }
        if !applied.touched_nodes.is_empty() {
            self.emit(EditorEvent::NodesChanged {
                node_ids: applied.touched_nodes.clone(),
            });
        }
        Ok(applied)
    }

    /// Apply a batch of interactive edge deltas
    pub fn apply_edge_changes(&mut self, changes: &[EdgeChange]) -> Result<AppliedChanges> {
        let applied = self.graph.apply_edge_changes(changes)?;
        if applied.is_edit {
            self.commit()?;
        }
        if !applied.removed_edges.is_empty() {
            self.emit(EditorEvent::EdgesRemoved {
                edge_ids: applied.removed_edges.clone(),
            });
        }
        Ok(applied)
    }

    /// Select a node, optionally keeping the current selection
    pub fn select_node(&mut self, id: &str, additive: bool) -> Result<()> {
        if !self.graph.contains_node(id) {
            return Err(FlowError::node_not_found(id));
        }
        let mut changes: Vec<NodeChange> = Vec::new();
        if !additive {
            changes.extend(
                self.graph
                    .selected_nodes()
                    .into_iter()
                    .filter(|n| n != id)
                    .map(|n| NodeChange::Select {
                        id: n,
                        selected: false,
                    }),
            );
        }
        changes.push(NodeChange::Select {
            id: id.to_string(),
            selected: true,
        });
        self.apply_node_changes(&changes)?;
        Ok(())
    }

    /// Deselect every node
    pub fn clear_selection(&mut self) -> Result<()> {
        let changes: Vec<NodeChange> = self
            .graph
            .selected_nodes()
            .into_iter()
            .map(|id| NodeChange::Select {
                id,
                selected: false,
            })
            .collect();
        if !changes.is_empty() {
            self.apply_node_changes(&changes)?;
        }
        Ok(())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Step back one edit
    ///
    /// Returns `false` and emits an informational notice at the start of
    /// the history.
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo() {
            None => {
                log::info!("Nothing to undo");
                self.emit(EditorEvent::info("Nothing to undo"));
                Ok(false)
            }
            Some(snapshot) => {
                self.apply_snapshot(snapshot?, Record::Skip, RestoreReason::Undo)?;
                Ok(true)
            }
        }
    }

    /// Step forward one edit
    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo() {
            None => {
                log::info!("Nothing to redo");
                self.emit(EditorEvent::info("Nothing to redo"));
                Ok(false)
            }
            Some(snapshot) => {
                self.apply_snapshot(snapshot?, Record::Skip, RestoreReason::Redo)?;
                Ok(true)
            }
        }
    }

    /// Replace the whole graph as one undoable edit (import, paste)
    ///
    /// The snapshot is checked for duplicate ids and dangling edges first.
    pub fn replace_graph(&mut self, snapshot: GraphSnapshot) -> Result<()> {
        let checked = FlowGraph::from_snapshot(
            self.graph.id.clone(),
            self.graph.name.clone(),
            snapshot,
            self.config.connection,
        )?;
        self.apply_snapshot(checked.snapshot(), Record::Yes, RestoreReason::Replace)
    }

    /// Open a different flow, discarding the current history
    pub fn load_graph(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        snapshot: GraphSnapshot,
    ) -> Result<()> {
        let graph = FlowGraph::from_snapshot(id, name, snapshot, self.config.connection)?;
        self.history.reset(&graph.snapshot())?;
        self.graph = graph;
        log::info!(
            "Loaded flow '{}' ({} nodes, {} edges)",
            self.graph.id,
            self.graph.nodes().len(),
            self.graph.edges().len()
        );
        self.emit(EditorEvent::GraphRestored {
            reason: RestoreReason::Load,
            node_count: self.graph.nodes().len(),
            edge_count: self.graph.edges().len(),
        });
        self.emit_history();
        Ok(())
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Check the flow against the structural rules and the registry
    pub fn validate(&self) -> Vec<ValidationIssue> {
        validate_flow(&self.graph, Some(&self.registry))
    }

    /// Build a step-through execution plan for the current graph
    pub fn build_plan(&self) -> ExecutionPlan {
        ExecutionPlan::from_graph(&self.graph)
    }

    fn apply_snapshot(
        &mut self,
        snapshot: GraphSnapshot,
        record: Record,
        reason: RestoreReason,
    ) -> Result<()> {
        self.graph.restore(snapshot);
        log::debug!(
            "Applied {:?} snapshot ({} nodes, {} edges)",
            reason,
            self.graph.nodes().len(),
            self.graph.edges().len()
        );
        match record {
            Record::Yes => self.commit()?,
            Record::Skip => self.emit_history(),
        }
        self.emit(EditorEvent::GraphRestored {
            reason,
            node_count: self.graph.nodes().len(),
            edge_count: self.graph.edges().len(),
        });
        Ok(())
    }

    /// Record the current graph as a new history entry
    fn commit(&mut self) -> Result<()> {
        self.history.push(&self.graph.snapshot())?;
        self.emit_history();
        Ok(())
    }

    fn emit_history(&self) {
        let state = self.history.state();
        self.emit(EditorEvent::HistoryChanged {
            can_undo: state.can_undo,
            can_redo: state.can_redo,
            index: state.index,
            len: state.len,
        });
    }

    fn emit(&self, event: EditorEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to deliver editor event: {}", e);
        }
    }
}
