//! Drag-and-drop node creation
//!
//! The palette puts the node type and label in the drag transfer data. On
//! drop the pointer is mapped from screen space into graph space through the
//! viewport transform.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{transfer, viewport};
use crate::error::{FlowError, Result};
use crate::types::{Dimensions, NodeKind, Position};

/// What the palette put in the drag transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPayload {
    pub kind: NodeKind,
    /// Display label, when the palette supplied one
    pub label: Option<String>,
}

impl DropPayload {
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Read the payload from transfer data keyed by MIME-like type
    ///
    /// A missing or blank type tag means the drag did not come from the
    /// palette.
    pub fn from_transfer(data: &HashMap<String, String>) -> Result<Self> {
        let tag = data
            .get(transfer::NODE_TYPE)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                FlowError::invalid(format!("drop carries no '{}' entry", transfer::NODE_TYPE))
            })?;

        let label = data
            .get(transfer::NODE_LABEL)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            kind: NodeKind::from(tag),
            label,
        })
    }
}

/// A pointer location in client (screen) pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pan and zoom of the canvas
///
/// A graph point `p` is drawn at `p * zoom + (x, y)` relative to the canvas
/// origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Map a point relative to the canvas origin into graph space
    pub fn to_flow(&self, rel_x: f64, rel_y: f64) -> Position {
        let zoom = self.zoom.max(viewport::MIN_ZOOM);
        Position::new((rel_x - self.x) / zoom, (rel_y - self.y) / zoom)
    }

    /// Map a screen point into graph space given where the canvas sits
    ///
    /// Fails when the pointer, canvas or viewport carry non-finite values.
    pub fn screen_to_flow(&self, point: ScreenPoint, canvas: &CanvasBounds) -> Result<Position> {
        self.to_flow(point.x - canvas.left, point.y - canvas.top)
            .checked()
    }
}

/// Visible canvas rectangle in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether a screen point lies inside the canvas (edges inclusive)
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }

    /// Centre of the canvas in screen pixels
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Graph-space position for a node dropped at `pointer`
///
/// The node is centred on the drop point. A pointer outside the canvas puts
/// the node at the centre of the visible canvas instead.
pub fn drop_position(
    pointer: ScreenPoint,
    view: &Viewport,
    canvas: &CanvasBounds,
    node_size: Dimensions,
) -> Result<Position> {
    let anchor = if canvas.contains(pointer) {
        pointer
    } else {
        log::debug!(
            "Drop at ({}, {}) outside canvas, using centre",
            pointer.x,
            pointer.y
        );
        canvas.center()
    };
    let at = view.screen_to_flow(anchor, canvas)?;
    Position::new(at.x - node_size.width / 2.0, at.y - node_size.height / 2.0).checked()
}
