//! Flow Editor - editing core for visual agent flows
//!
//! This crate holds everything an agent-flow editor does that is not
//! drawing. It supports:
//!
//! - An in-memory flow graph with referential integrity
//! - A static, data-driven node type registry
//! - Compressed snapshot-based undo/redo
//! - Drag-and-drop node creation in graph coordinates
//! - Step-through debugging with breakpoints and watched expressions
//!
//! # Architecture
//!
//! - `FlowEditor`: single point of mutation; keeps graph and history in step
//! - `HistoryStack`: bounded linear history of compressed snapshots
//! - `EventSink`: generic change notifications (not tied to a UI toolkit)
//! - `DebugSession`: drives a run through a `NodeRunner` supplied by the host
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flow_editor::{ConnectionSpec, EditorConfig, FlowEditor, NodeKind, NullEventSink, Position};
//!
//! let mut editor = FlowEditor::new(EditorConfig::default(), Arc::new(NullEventSink))?;
//! let start = editor.create_node(NodeKind::Start, Position::new(0.0, 0.0), None)?;
//! let end = editor.create_node(NodeKind::End, Position::new(300.0, 0.0), None)?;
//! editor.connect(ConnectionSpec::new(start, end))?;
//! editor.undo()?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod controller;
pub mod debug;
pub mod descriptor;
pub mod dnd;
pub mod error;
pub mod events;
pub mod graph;
pub mod history;
pub mod registry;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::FlowBuilder;
pub use config::{ConnectionPolicy, EditorConfig};
pub use controller::{FlowEditor, Record};
pub use debug::{
    Breakpoint, BreakpointSet, DebugSession, ExecutionPlan, ExecutionStep, ExpressionContext,
    NodeRunReport, NodeRunRequest, NodeRunner, SessionState, StepOutcome, StepStatus, WatchList,
    WatchVariable,
};
pub use descriptor::{EditorKind, HandleSpec, NodeCategory, NodeTypeConfig, PropertyDescriptor};
pub use dnd::{CanvasBounds, DropPayload, ScreenPoint, Viewport};
pub use error::{FlowError, Result};
pub use events::{
    EditorEvent, EventError, EventSink, NoticeLevel, NullEventSink, RestoreReason, VecEventSink,
};
pub use graph::{AppliedChanges, EdgeChange, FlowGraph, NodeChange};
pub use history::{HistoryStack, HistoryState};
pub use registry::NodeRegistry;
pub use types::{
    ConfigMap, ConnectionSpec, Dimensions, EdgeId, FlowEdge, FlowNode, GraphSnapshot, HandleId,
    NodeId, NodeKind, Position,
};
pub use validation::{validate_flow, ValidationIssue};
