//! Configuration types for the flow editor

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::types::Dimensions;

/// Rules applied when connecting two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionPolicy {
    /// Accept edges whose source and target are the same node
    pub allow_self_loops: bool,
    /// Accept a second edge between the same pair of handles
    pub allow_duplicate_edges: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            allow_self_loops: defaults::ALLOW_SELF_LOOPS,
            allow_duplicate_edges: defaults::ALLOW_DUPLICATE_EDGES,
        }
    }
}

/// Settings for one editor session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Maximum number of history snapshots (at least 1)
    pub max_history_size: usize,
    /// Connection rules
    pub connection: ConnectionPolicy,
    /// Size assumed for a node before the view layer measures it
    pub default_node_size: Dimensions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history_size: defaults::MAX_HISTORY_SIZE,
            connection: ConnectionPolicy::default(),
            default_node_size: Dimensions {
                width: defaults::NODE_WIDTH,
                height: defaults::NODE_HEIGHT,
            },
        }
    }
}

impl EditorConfig {
    /// Override the history capacity
    pub fn with_max_history_size(mut self, size: usize) -> Self {
        self.max_history_size = size;
        self
    }

    /// Override the self-loop policy
    pub fn with_self_loops(mut self, allow: bool) -> Self {
        self.connection.allow_self_loops = allow;
        self
    }
}
