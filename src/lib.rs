//! Squall - Wayland compositor core
//!
//! Event multiplexing and surface lifecycle library.
pub mod geometry;
pub mod grab;
pub mod multiplexer;
pub mod shell;
pub mod testing;
pub mod view;

pub use geometry::Rect;
pub use grab::{Grab, GrabMode, ResizeEdges};
pub use multiplexer::{AuxiliaryHandle, Dispatch, DisplayConnection, MultiplexError, Multiplexer};
pub use shell::{Compositor, Shell};
pub use view::{Damage, PendingConfigure, ShellFamily, SurfaceId, SurfaceRole, View, ViewId};
