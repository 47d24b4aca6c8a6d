//! Per-window state: identifiers, the view record, and damage requests.

use crate::geometry::Rect;

/// Identifier for a protocol surface, assigned by the embedder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Stable handle for a view in the shell's arena.
///
/// Handles stay valid until the view is destroyed; a stale handle fails
/// lookup instead of reaching freed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) u32);

/// Role advertised by a new shell surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRole {
    None,
    Toplevel,
    Popup,
}

/// Which shell protocol family produced the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellFamily {
    Xdg,
    XdgV6,
}

/// A geometry change sent to the client and not yet settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingConfigure {
    /// Target box. The position is applied with edge anchoring once the
    /// client acknowledges the size.
    pub geometry: Rect,
    /// Serial of the configure that carried the change.
    pub serial: u32,
}

/// One top-level window under management.
#[derive(Clone, Debug)]
pub struct View {
    pub surface: SurfaceId,
    pub family: ShellFamily,
    pub mapped: bool,
    /// Current layout box. Meaningful only while mapped.
    pub geometry: Rect,
    /// At most one outstanding change; a newer one overwrites it.
    pub pending: Option<PendingConfigure>,
}

impl View {
    pub(crate) fn new(surface: SurfaceId, family: ShellFamily) -> Self {
        Self {
            surface,
            family,
            mapped: false,
            geometry: Rect::default(),
            pending: None,
        }
    }
}

/// A redraw request handed to the damage sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Damage {
    /// The view's whole box, snapshotted when the damage was raised.
    Whole(Rect),
    /// Surface-local boxes reported by the latest commit.
    Region(Vec<Rect>),
}
