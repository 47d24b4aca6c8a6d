//! Surface lifecycle and grab state machine for top-level windows.
//!
//! Views live in an arena keyed by [`ViewId`], with an ordered list of live
//! ids for stacking and a surface index for signal dispatch. Handlers are
//! keyed by [`SurfaceId`]: a signal for a surface whose view is gone hits a
//! failed lookup and returns, so destroy needs no subscription bookkeeping.
//!
//! Everything the machine cannot decide on its own (surface queries,
//! damage, focus, pointer state, configures) goes through the
//! [`Compositor`] services trait implemented by the embedder.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::geometry::Rect;
use crate::grab::{Grab, GrabMode, ResizeEdges};
use crate::view::{Damage, PendingConfigure, ShellFamily, SurfaceId, SurfaceRole, View, ViewId};

/// Services the embedding compositor provides to the state machine.
pub trait Compositor {
    /// The surface's window geometry box.
    fn surface_geometry(&mut self, surface: SurfaceId) -> Rect;

    /// Width and height of the current committed surface state.
    fn committed_size(&mut self, surface: SurfaceId) -> (i32, i32);

    /// Damage accumulated by the latest commit, surface-local.
    fn commit_damage(&mut self, surface: SurfaceId) -> Vec<Rect>;

    /// Serial of the most recent configure the client acknowledged.
    fn acked_configure(&mut self, surface: SurfaceId) -> u32;

    /// Ask the client to take a new size. Returns the serial of the
    /// scheduled configure, or zero when nothing was scheduled.
    fn configure(&mut self, surface: SurfaceId, width: i32, height: i32) -> u32;

    /// Mark part of a view as needing redraw.
    fn damage(&mut self, view: ViewId, damage: Damage);

    /// Move input focus to the view.
    fn focus(&mut self, view: ViewId);

    /// Current pointer position in layout coordinates.
    fn pointer_position(&mut self) -> (f64, f64);

    /// Surface currently holding pointer focus, if any.
    fn pointer_focus(&mut self) -> Option<SurfaceId>;
}

/// The per-window state machine: view arena, stacking order, grab slot.
#[derive(Debug, Default)]
pub struct Shell {
    views: HashMap<ViewId, View>,
    /// Live ids, frontmost first.
    stacking: Vec<ViewId>,
    by_surface: HashMap<SurfaceId, ViewId>,
    grab: Option<Grab>,
    next_view: u32,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new shell surface appeared. Only top-levels become views; other
    /// roles and surfaces already tracked are dropped without effect.
    pub fn surface_created(
        &mut self,
        surface: SurfaceId,
        family: ShellFamily,
        role: SurfaceRole,
    ) -> Option<ViewId> {
        if role != SurfaceRole::Toplevel {
            trace!("ignoring {:?} surface {:?}", role, surface);
            return None;
        }
        if self.by_surface.contains_key(&surface) {
            trace!("ignoring duplicate notification for surface {:?}", surface);
            return None;
        }

        let id = ViewId(self.next_view);
        self.next_view += 1;
        self.views.insert(id, View::new(surface, family));
        self.stacking.insert(0, id);
        self.by_surface.insert(surface, id);
        debug!("view {:?} created for surface {:?}", id, surface);
        Some(id)
    }

    /// The surface can be shown. Assigns the initial geometry, hands the
    /// view focus, and damages its whole box.
    pub fn map(&mut self, comp: &mut impl Compositor, surface: SurfaceId) {
        let Some(&id) = self.by_surface.get(&surface) else {
            return;
        };
        let geometry = comp.surface_geometry(surface);
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        view.mapped = true;
        view.geometry = geometry;
        comp.focus(id);
        comp.damage(id, Damage::Whole(geometry));
        debug!("view {:?} mapped at {:?}", id, geometry);
    }

    /// The surface can no longer be shown. Damages the last-known box so
    /// the area it occupied is cleared.
    pub fn unmap(&mut self, comp: &mut impl Compositor, surface: SurfaceId) {
        let Some(&id) = self.by_surface.get(&surface) else {
            return;
        };
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        view.mapped = false;
        comp.damage(id, Damage::Whole(view.geometry));
        debug!("view {:?} unmapped", id);
    }

    /// Reconcile view state against a newly committed surface state.
    ///
    /// No-op while unmapped. Forwards the commit's damage, tracks size
    /// changes (damaging both the old and the new box), and settles any
    /// pending geometry change the client has acknowledged: each axis whose
    /// pending target position differs from the current one is re-anchored
    /// as `pending_pos + pending_dim - new_dim`, keeping the opposite edge
    /// fixed during edge resizes. The pending record clears only when the
    /// acknowledged serial equals the target exactly.
    pub fn commit(&mut self, comp: &mut impl Compositor, surface: SurfaceId) {
        let Some(&id) = self.by_surface.get(&surface) else {
            return;
        };
        if !self.views.get(&id).map(|view| view.mapped).unwrap_or(false) {
            return;
        }

        let surface_damage = comp.commit_damage(surface);
        comp.damage(id, Damage::Region(surface_damage));

        let geometry = comp.surface_geometry(surface);
        let (width, height) = comp.committed_size(surface);
        let acked = comp.acked_configure(surface);

        let Some(view) = self.views.get_mut(&id) else {
            return;
        };

        let size_changed = view.geometry.width != width || view.geometry.height != height;
        if size_changed {
            comp.damage(id, Damage::Whole(view.geometry));
            view.geometry.width = width;
            view.geometry.height = height;
            comp.damage(id, Damage::Whole(view.geometry));
        }

        if let Some(pending) = view.pending {
            if acked >= pending.serial {
                if pending.geometry.x != view.geometry.x {
                    view.geometry.x = pending.geometry.x + pending.geometry.width - geometry.width;
                }
                if pending.geometry.y != view.geometry.y {
                    view.geometry.y =
                        pending.geometry.y + pending.geometry.height - geometry.height;
                }
                comp.damage(id, Damage::Whole(view.geometry));
                debug!(
                    "view {:?} settled at {:?} (serial {} acked {})",
                    id, view.geometry, pending.serial, acked
                );

                if acked == pending.serial {
                    view.pending = None;
                }
            }
        }
    }

    /// The surface is gone. Removes the view from arena, stacking order,
    /// and surface index in one step; later signals for this surface find
    /// nothing.
    pub fn destroy(&mut self, surface: SurfaceId) {
        let Some(id) = self.by_surface.remove(&surface) else {
            return;
        };
        self.views.remove(&id);
        self.stacking.retain(|&v| v != id);
        debug!("view {:?} destroyed", id);
    }

    /// Client asked for an interactive move. Ignored unless the surface
    /// holds pointer focus. Records the pointer offset from the view
    /// corner and a geometry snapshot, then takes the grab.
    pub fn request_move(&mut self, comp: &mut impl Compositor, surface: SurfaceId) {
        let Some(&id) = self.by_surface.get(&surface) else {
            return;
        };
        if comp.pointer_focus() != Some(surface) {
            trace!("move request from unfocused surface {:?}", surface);
            return;
        }
        let Some(view) = self.views.get(&id) else {
            return;
        };
        let pointer = comp.pointer_position();
        let size = comp.surface_geometry(surface);
        self.grab = Some(Grab {
            view: id,
            mode: GrabMode::Move,
            origin: (
                pointer.0 - f64::from(view.geometry.x),
                pointer.1 - f64::from(view.geometry.y),
            ),
            start_geometry: Rect::new(view.geometry.x, view.geometry.y, size.width, size.height),
        });
        debug!("move grab on view {:?}", id);
    }

    /// Client asked for an interactive resize. Same focus precondition as
    /// [`Self::request_move`]; records the absolute pointer position and
    /// the edges being dragged.
    pub fn request_resize(
        &mut self,
        comp: &mut impl Compositor,
        surface: SurfaceId,
        edges: ResizeEdges,
    ) {
        let Some(&id) = self.by_surface.get(&surface) else {
            return;
        };
        if comp.pointer_focus() != Some(surface) {
            trace!("resize request from unfocused surface {:?}", surface);
            return;
        }
        let Some(view) = self.views.get(&id) else {
            return;
        };
        let pointer = comp.pointer_position();
        let size = comp.surface_geometry(surface);
        self.grab = Some(Grab {
            view: id,
            mode: GrabMode::Resize { edges },
            origin: pointer,
            start_geometry: Rect::new(view.geometry.x, view.geometry.y, size.width, size.height),
        });
        debug!("resize grab on view {:?}, edges {:?}", id, edges);
    }

    /// Reposition a view immediately, damaging the old and the new box.
    pub fn move_to(&mut self, comp: &mut impl Compositor, view: ViewId, x: i32, y: i32) {
        let Some(v) = self.views.get_mut(&view) else {
            return;
        };
        comp.damage(view, Damage::Whole(v.geometry));
        v.geometry.x = x;
        v.geometry.y = y;
        comp.damage(view, Damage::Whole(v.geometry));
    }

    /// Record a configure-carried geometry change awaiting acknowledgement.
    /// Overwrites any previous pending change.
    pub fn set_pending(&mut self, view: ViewId, geometry: Rect, serial: u32) {
        let Some(v) = self.views.get_mut(&view) else {
            return;
        };
        if let Some(prev) = v.pending {
            debug_assert!(serial >= prev.serial, "configure serials went backwards");
        }
        v.pending = Some(PendingConfigure { geometry, serial });
    }

    /// Resize a view toward a target box, deferring any position change
    /// until the client acknowledges the new size.
    ///
    /// When the target keeps the current position the configure alone is
    /// enough. When it moves the view, the position is parked as pending
    /// state and settled at commit time; a zero serial from the configure
    /// means nothing was scheduled and the position applies right away.
    pub fn move_resize(&mut self, comp: &mut impl Compositor, view: ViewId, target: Rect) {
        let Some(v) = self.views.get(&view) else {
            return;
        };
        let surface = v.surface;
        let moves = target.x != v.geometry.x || target.y != v.geometry.y;

        let serial = comp.configure(surface, target.width, target.height);
        if !moves {
            return;
        }
        if serial == 0 {
            self.move_to(comp, view, target.x, target.y);
        } else {
            self.set_pending(view, target, serial);
        }
    }

    /// Apply the active grab to a new pointer position. No-op without a
    /// grab or when the grabbed view has been destroyed.
    pub fn pointer_motion(&mut self, comp: &mut impl Compositor, position: (f64, f64)) {
        let Some(grab) = self.grab else {
            return;
        };
        if !self.views.contains_key(&grab.view) {
            return;
        }
        match grab.mode {
            GrabMode::Move => {
                let x = (position.0 - grab.origin.0).round() as i32;
                let y = (position.1 - grab.origin.1).round() as i32;
                self.move_to(comp, grab.view, x, y);
            }
            GrabMode::Resize { .. } => {
                let target = grab.resize_target(position);
                self.move_resize(comp, grab.view, target);
            }
        }
    }

    /// Drop the active grab. The input layer calls this on button release.
    pub fn end_grab(&mut self) {
        if let Some(grab) = self.grab.take() {
            debug!("grab on view {:?} ended", grab.view);
        }
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn view_for_surface(&self, surface: SurfaceId) -> Option<ViewId> {
        self.by_surface.get(&surface).copied()
    }

    /// Live views in stacking order, frontmost first.
    pub fn views(&self) -> impl Iterator<Item = (ViewId, &View)> + '_ {
        self.stacking
            .iter()
            .filter_map(move |id| self.views.get(id).map(|view| (*id, view)))
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn grab(&self) -> Option<&Grab> {
        self.grab.as_ref()
    }
}
