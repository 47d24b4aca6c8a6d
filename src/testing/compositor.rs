//! A compositor-services double that records what the shell asks of it.

use std::collections::HashMap;

use crate::geometry::Rect;
use crate::shell::Compositor;
use crate::view::{Damage, SurfaceId, ViewId};

/// One observed call into the compositor services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompositorCall {
    Damage {
        view: ViewId,
        damage: Damage,
    },
    Focus {
        view: ViewId,
    },
    Configure {
        surface: SurfaceId,
        width: i32,
        height: i32,
        serial: u32,
    },
}

/// Records every side effect and answers queries from tables the test
/// seeds before driving the shell.
#[derive(Debug, Default)]
pub struct RecordingCompositor {
    pub calls: Vec<CompositorCall>,
    /// Answer for geometry queries, by surface.
    pub geometry: HashMap<SurfaceId, Rect>,
    /// Answer for committed-size queries; falls back to the geometry size.
    pub committed: HashMap<SurfaceId, (i32, i32)>,
    /// Damage handed out by the next commit query, consumed on read.
    pub commit_damage: HashMap<SurfaceId, Vec<Rect>>,
    /// Latest acknowledged configure serial, by surface.
    pub acked: HashMap<SurfaceId, u32>,
    pub pointer: (f64, f64),
    pub pointer_focus: Option<SurfaceId>,
    /// View last given focus.
    pub focused: Option<ViewId>,
    /// When set, every configure returns this serial instead of counting
    /// up. Zero simulates a shell that schedules nothing.
    pub forced_serial: Option<u32>,
    next_serial: u32,
}

impl RecordingCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All damage raised against the view, in call order.
    pub fn damage_for(&self, view: ViewId) -> Vec<Damage> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                CompositorCall::Damage { view: v, damage } if *v == view => Some(damage.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn focus_count(&self, view: ViewId) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, CompositorCall::Focus { view: v } if *v == view))
            .count()
    }

    /// All configures issued, in call order.
    pub fn configures(&self) -> Vec<(SurfaceId, i32, i32, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                CompositorCall::Configure {
                    surface,
                    width,
                    height,
                    serial,
                } => Some((*surface, *width, *height, *serial)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Compositor for RecordingCompositor {
    fn surface_geometry(&mut self, surface: SurfaceId) -> Rect {
        self.geometry.get(&surface).copied().unwrap_or_default()
    }

    fn committed_size(&mut self, surface: SurfaceId) -> (i32, i32) {
        if let Some(&size) = self.committed.get(&surface) {
            return size;
        }
        let geometry = self.geometry.get(&surface).copied().unwrap_or_default();
        (geometry.width, geometry.height)
    }

    fn commit_damage(&mut self, surface: SurfaceId) -> Vec<Rect> {
        self.commit_damage.remove(&surface).unwrap_or_default()
    }

    fn acked_configure(&mut self, surface: SurfaceId) -> u32 {
        self.acked.get(&surface).copied().unwrap_or(0)
    }

    fn configure(&mut self, surface: SurfaceId, width: i32, height: i32) -> u32 {
        let serial = match self.forced_serial {
            Some(serial) => serial,
            None => {
                self.next_serial += 1;
                self.next_serial
            }
        };
        self.calls.push(CompositorCall::Configure {
            surface,
            width,
            height,
            serial,
        });
        serial
    }

    fn damage(&mut self, view: ViewId, damage: Damage) {
        self.calls.push(CompositorCall::Damage { view, damage });
    }

    fn focus(&mut self, view: ViewId) {
        self.focused = Some(view);
        self.calls.push(CompositorCall::Focus { view });
    }

    fn pointer_position(&mut self) -> (f64, f64) {
        self.pointer
    }

    fn pointer_focus(&mut self) -> Option<SurfaceId> {
        self.pointer_focus
    }
}
