//! Change notifications emitted by the editor
//!
//! Events are sent from the controller and the debug session to the view
//! layer (or any consumer) so it can re-render without diffing the graph.

use serde::{Deserialize, Serialize};

use crate::debug::{SessionState, StepStatus};
use crate::types::{EdgeId, NodeId};

/// Trait for sending editor events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, etc.)
/// allowing the editor to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: EditorEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

/// Why the whole graph was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestoreReason {
    Undo,
    Redo,
    Load,
    /// Replaced by an undoable import or paste
    Replace,
}

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Events emitted while editing or debugging a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditorEvent {
    /// A node was added
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId },

    /// Nodes were removed together with their edges
    #[serde(rename_all = "camelCase")]
    NodesRemoved {
        node_ids: Vec<NodeId>,
        edge_ids: Vec<EdgeId>,
    },

    /// A node's configuration was edited
    #[serde(rename_all = "camelCase")]
    NodeDataUpdated { node_id: NodeId, keys: Vec<String> },

    /// An edge was added
    #[serde(rename_all = "camelCase")]
    EdgeAdded {
        edge_id: EdgeId,
        source: NodeId,
        target: NodeId,
    },

    /// Edges were removed
    #[serde(rename_all = "camelCase")]
    EdgesRemoved { edge_ids: Vec<EdgeId> },

    /// Nodes moved, were selected or measured
    #[serde(rename_all = "camelCase")]
    NodesChanged { node_ids: Vec<NodeId> },

    /// The whole graph was replaced
    #[serde(rename_all = "camelCase")]
    GraphRestored {
        reason: RestoreReason,
        node_count: usize,
        edge_count: usize,
    },

    /// Undo/redo availability changed
    #[serde(rename_all = "camelCase")]
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        index: usize,
        len: usize,
    },

    /// Something the user should be told about
    Notice { level: NoticeLevel, message: String },

    /// A plan step changed status
    #[serde(rename_all = "camelCase")]
    StepStatusChanged { node_id: NodeId, status: StepStatus },

    /// Execution paused on a breakpoint
    #[serde(rename_all = "camelCase")]
    BreakpointHit {
        breakpoint_id: String,
        node_id: NodeId,
        hit_count: u32,
    },

    /// The debug session changed state
    SessionStateChanged { state: SessionState },
}

impl EditorEvent {
    /// Create an informational notice
    pub fn info(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Create a warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EditorEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<EditorEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EditorEvent> {
        self.events.lock().clone()
    }

    /// Get collected notices as (level, message) pairs
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EditorEvent::Notice { level, message } => Some((*level, message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EditorEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
