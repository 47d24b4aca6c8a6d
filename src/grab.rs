//! Interactive move/resize sessions driven by pointer motion.

use bitflags::bitflags;

use crate::geometry::Rect;
use crate::view::ViewId;

bitflags! {
    /// Edges a resize drags, using the shell protocol's wire values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ResizeEdges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
        const TOP_LEFT = Self::TOP.bits() | Self::LEFT.bits();
        const TOP_RIGHT = Self::TOP.bits() | Self::RIGHT.bits();
        const BOTTOM_LEFT = Self::BOTTOM.bits() | Self::LEFT.bits();
        const BOTTOM_RIGHT = Self::BOTTOM.bits() | Self::RIGHT.bits();
    }
}

/// How the pointer is currently dragging a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabMode {
    Move,
    Resize { edges: ResizeEdges },
}

/// An exclusive interactive session bound to one view and the pointer.
///
/// `origin` is the pointer offset from the view corner for a move and the
/// absolute pointer position for a resize. `start_geometry` is the view's
/// box at grab start, with the size taken from a fresh geometry query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grab {
    pub view: ViewId,
    pub mode: GrabMode,
    pub origin: (f64, f64),
    pub start_geometry: Rect,
}

impl Grab {
    /// Target box for a resize grab at the given pointer position.
    ///
    /// Dragged edges follow the pointer while the opposite edges stay put;
    /// dimensions are clamped to at least 1, with the clamp stopping the
    /// dragged edge rather than moving the anchored one. For a non-resize
    /// grab this returns the start geometry unchanged.
    pub fn resize_target(&self, position: (f64, f64)) -> Rect {
        let GrabMode::Resize { edges } = self.mode else {
            return self.start_geometry;
        };
        let dx = (position.0 - self.origin.0).round() as i32;
        let dy = (position.1 - self.origin.1).round() as i32;

        let start = self.start_geometry;
        let mut target = start;
        if edges.contains(ResizeEdges::TOP) {
            target.height = (start.height - dy).max(1);
            target.y = start.y + start.height - target.height;
        } else if edges.contains(ResizeEdges::BOTTOM) {
            target.height = (start.height + dy).max(1);
        }
        if edges.contains(ResizeEdges::LEFT) {
            target.width = (start.width - dx).max(1);
            target.x = start.x + start.width - target.width;
        } else if edges.contains(ResizeEdges::RIGHT) {
            target.width = (start.width + dx).max(1);
        }
        target
    }
}
