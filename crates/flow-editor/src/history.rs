//! Undo/redo history using compressed snapshots
//!
//! Each entry is a whole-graph snapshot, serialized and zstd-compressed on
//! push and decoded into a fresh value on undo/redo. A stored entry can
//! therefore never alias the live graph, and the cost of recording an edit
//! is one serialization of the graph.
//!
//! The history is linear: a new edit discards the redo tail.

use std::collections::VecDeque;

use serde::Serialize;

use crate::constants::defaults;
use crate::error::{FlowError, Result};
use crate::types::GraphSnapshot;

/// Undo/redo availability, as shown by the editor toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    /// Cursor position
    pub index: usize,
    /// Number of stored snapshots
    pub len: usize,
}

/// Bounded linear history of graph snapshots
pub struct HistoryStack {
    /// Compressed graph states (zstd)
    snapshots: VecDeque<Vec<u8>>,
    /// Current position in the stack
    current: usize,
    /// Maximum number of snapshots to keep
    max_snapshots: usize,
}

impl HistoryStack {
    /// Create a new history with the specified maximum size
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Push a new snapshot onto the stack
    ///
    /// This truncates any redo history (snapshots after current position)
    /// and evicts the oldest entries once capacity is exceeded.
    pub fn push(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        let compressed = Self::compress(snapshot)?;

        // Truncate any redo history
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.current + 1);
        }

        self.snapshots.push_back(compressed);
        self.current = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.current = self.current.saturating_sub(1);
        }

        log::debug!(
            "History push: index {} of {} ({} nodes, {} edges)",
            self.current,
            self.snapshots.len(),
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(())
    }

    /// Move back one snapshot
    ///
    /// Returns the previous graph state, or `None` when there is nothing to undo.
    /// The cursor only moves when the snapshot decodes.
    pub fn undo(&mut self) -> Option<Result<GraphSnapshot>> {
        if !self.can_undo() {
            return None;
        }
        let snapshot = self.decompress(self.current - 1);
        if snapshot.is_ok() {
            self.current -= 1;
        }
        Some(snapshot)
    }

    /// Move forward one snapshot
    ///
    /// Returns the next graph state, or `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Result<GraphSnapshot>> {
        if !self.can_redo() {
            return None;
        }
        let snapshot = self.decompress(self.current + 1);
        if snapshot.is_ok() {
            self.current += 1;
        }
        Some(snapshot)
    }

    /// Discard everything and start over from a single snapshot
    pub fn reset(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        let compressed = Self::compress(snapshot)?;
        self.snapshots.clear();
        self.snapshots.push_back(compressed);
        self.current = 0;
        Ok(())
    }

    /// Get the current graph state without moving the cursor
    pub fn current(&self) -> Option<Result<GraphSnapshot>> {
        if self.snapshots.is_empty() {
            None
        } else {
            Some(self.decompress(self.current))
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    /// Cursor position
    pub fn index(&self) -> usize {
        self.current
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_snapshots
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            index: self.current,
            len: self.snapshots.len(),
        }
    }

    /// Clear all snapshots
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }

    /// Get the total compressed size of all snapshots
    pub fn compressed_size(&self) -> usize {
        self.snapshots.iter().map(|s| s.len()).sum()
    }

    fn compress(snapshot: &GraphSnapshot) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(snapshot)?;
        zstd::encode_all(&json[..], defaults::SNAPSHOT_COMPRESSION_LEVEL)
            .map_err(|e| FlowError::Compression(e.to_string()))
    }

    /// Decompress a snapshot at the given index
    fn decompress(&self, index: usize) -> Result<GraphSnapshot> {
        let compressed = &self.snapshots[index];
        let json = zstd::decode_all(&compressed[..])
            .map_err(|e| FlowError::Compression(e.to_string()))?;
        let snapshot: GraphSnapshot = serde_json::from_slice(&json)?;
        Ok(snapshot)
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(defaults::MAX_HISTORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlowNode, NodeKind, Position};

    /// Snapshot whose single node is labelled with `name`
    fn make_snapshot(name: &str) -> GraphSnapshot {
        let mut data = crate::types::ConfigMap::new();
        data.insert("label".into(), serde_json::json!(name));
        GraphSnapshot::new(
            vec![FlowNode::new("node1", NodeKind::Code, Position::default()).with_data(data)],
            vec![],
        )
    }

    fn label(snapshot: &GraphSnapshot) -> String {
        snapshot.nodes[0].label().unwrap().to_string()
    }

    #[test]
    fn test_push_and_undo() {
        let mut stack = HistoryStack::new(10);

        stack.push(&make_snapshot("first")).unwrap();
        stack.push(&make_snapshot("second")).unwrap();
        stack.push(&make_snapshot("third")).unwrap();

        assert_eq!(label(&stack.current().unwrap().unwrap()), "third");
        assert_eq!(label(&stack.undo().unwrap().unwrap()), "second");
        assert_eq!(label(&stack.undo().unwrap().unwrap()), "first");

        // Can't undo further
        assert!(stack.undo().is_none());
        assert_eq!(stack.index(), 0);
    }

    #[test]
    fn test_undecodable_snapshot_keeps_cursor() {
        let mut stack = HistoryStack::new(10);
        stack.push(&make_snapshot("first")).unwrap();
        stack.push(&make_snapshot("second")).unwrap();
        stack.push(&make_snapshot("third")).unwrap();
        stack.snapshots[1] = b"not zstd".to_vec();

        assert!(stack.undo().unwrap().is_err());
        assert_eq!(stack.index(), 2);
        assert!(stack.undo().unwrap().is_err());
        assert_eq!(stack.index(), 2);

        stack.snapshots[1] = HistoryStack::compress(&make_snapshot("second")).unwrap();
        assert_eq!(label(&stack.undo().unwrap().unwrap()), "second");
        stack.snapshots[2] = b"broken".to_vec();
        assert!(stack.redo().unwrap().is_err());
        assert_eq!(stack.index(), 1);
    }

    #[test]
    fn test_redo() {
        let mut stack = HistoryStack::new(10);
        stack.push(&make_snapshot("first")).unwrap();
        stack.push(&make_snapshot("second")).unwrap();

        stack.undo();
        assert_eq!(label(&stack.redo().unwrap().unwrap()), "second");
        assert!(stack.redo().is_none());
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut stack = HistoryStack::new(10);
        stack.push(&make_snapshot("first")).unwrap();
        stack.push(&make_snapshot("second")).unwrap();
        stack.undo();

        stack.push(&make_snapshot("third")).unwrap();

        assert!(!stack.can_redo());
        assert_eq!(stack.len(), 2);
        assert_eq!(label(&stack.current().unwrap().unwrap()), "third");
    }

    #[test]
    fn test_cursor_advances_by_one_per_push() {
        let mut stack = HistoryStack::new(10);
        stack.reset(&GraphSnapshot::empty()).unwrap();
        assert!(!stack.can_undo());

        for i in 1..=5 {
            stack.push(&make_snapshot(&format!("edit_{}", i))).unwrap();
            assert_eq!(stack.index(), i);
            assert!(stack.can_undo());
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let max = 3;
        let total = 7;
        let mut stack = HistoryStack::new(max);

        for i in 1..=total {
            stack.push(&make_snapshot(&format!("edit_{}", i))).unwrap();
            assert!(stack.len() <= max);
            assert!(stack.index() < stack.len());
        }

        assert_eq!(stack.len(), max);
        while stack.can_undo() {
            stack.undo().unwrap().unwrap();
        }
        let oldest = label(&stack.current().unwrap().unwrap());
        assert_eq!(oldest, format!("edit_{}", total - max + 1));
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut stack = HistoryStack::new(10);
        stack.push(&make_snapshot("first")).unwrap();
        stack.push(&make_snapshot("second")).unwrap();
        stack.undo();

        stack.reset(&make_snapshot("loaded")).unwrap();
        assert_eq!(
            stack.state(),
            HistoryState {
                can_undo: false,
                can_redo: false,
                index: 0,
                len: 1
            }
        );
        assert_eq!(label(&stack.current().unwrap().unwrap()), "loaded");
    }

    #[test]
    fn test_restored_snapshot_is_independent() {
        let mut stack = HistoryStack::new(10);
        let mut snapshot = make_snapshot("original");
        stack.push(&snapshot).unwrap();

        snapshot.nodes[0]
            .data
            .insert("label".into(), serde_json::json!("mutated"));

        let mut restored = stack.current().unwrap().unwrap();
        assert_eq!(label(&restored), "original");
        restored.nodes.clear();
        assert_eq!(stack.current().unwrap().unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut stack = HistoryStack::new(0);
        stack.push(&make_snapshot("a")).unwrap();
        stack.push(&make_snapshot("b")).unwrap();
        assert_eq!(stack.capacity(), 1);
        assert_eq!(stack.len(), 1);
        assert!(!stack.can_undo());
        assert!(stack.compressed_size() > 0);
    }
}
