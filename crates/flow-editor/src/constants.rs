//! Editor-wide constants
//!
//! Single source of truth for limits and configuration defaults.

/// Default values for editor configuration
pub mod defaults {
    /// Number of snapshots kept by the history stack
    pub const MAX_HISTORY_SIZE: usize = 50;
    /// Whether an edge may connect a node to itself
    pub const ALLOW_SELF_LOOPS: bool = false;
    /// Whether the same handle pair may be connected twice
    pub const ALLOW_DUPLICATE_EDGES: bool = false;
    /// zstd level used for history snapshots
    pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;
    /// Node size assumed before the view layer reports one
    pub const NODE_WIDTH: f64 = 240.0;
    pub const NODE_HEIGHT: f64 = 80.0;
}

/// Drag-and-drop transfer keys set by the node palette
pub mod transfer {
    /// Carries the node type tag
    pub const NODE_TYPE: &str = "application/reactflow";
    /// Carries the display label
    pub const NODE_LABEL: &str = "node/label";
}

/// Viewport limits
pub mod viewport {
    /// Smallest zoom factor used when mapping screen to graph space
    pub const MIN_ZOOM: f64 = 0.05;
}

/// Expression evaluation limits
pub mod expressions {
    /// Nesting depth flattened into the evaluation context
    pub const MAX_CONTEXT_DEPTH: usize = 8;
}
