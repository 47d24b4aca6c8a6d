//! Surface lifecycle tests
//!
//! Tests for map/unmap/commit sequencing, acknowledged repositioning, and
//! interactive grabs, driving the shell machine against a recording
//! compositor double.

use std::fmt::Write as _;

use insta::assert_snapshot;
use squall_core::testing::{init_logging, RecordingCompositor};
use squall_core::{Damage, Rect, ResizeEdges, Shell, ShellFamily, SurfaceId, SurfaceRole, ViewId};

/// Create a toplevel for `surface`, seed its geometry answer, map it, and
/// drop the setup calls from the record.
fn mapped_view(
    shell: &mut Shell,
    comp: &mut RecordingCompositor,
    surface: SurfaceId,
    geometry: Rect,
) -> ViewId {
    init_logging();
    comp.geometry.insert(surface, geometry);
    let id = shell
        .surface_created(surface, ShellFamily::Xdg, SurfaceRole::Toplevel)
        .expect("toplevel surface should create a view");
    shell.map(comp, surface);
    comp.clear_calls();
    id
}

/// Test that mapping assigns geometry, focuses, and damages the whole box
#[test]
fn test_map_assigns_geometry_focus_and_damage() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 300, 200));

    let id = shell
        .surface_created(SurfaceId(1), ShellFamily::Xdg, SurfaceRole::Toplevel)
        .unwrap();
    shell.map(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert!(view.mapped);
    assert_eq!(view.geometry, Rect::new(0, 0, 300, 200));
    assert_eq!(comp.focus_count(id), 1);
    assert_eq!(
        comp.damage_for(id),
        vec![Damage::Whole(Rect::new(0, 0, 300, 200))]
    );
}

/// Test that each newly mapped view takes focus
#[test]
fn test_newly_mapped_view_takes_focus() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();

    let first = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    assert_eq!(comp.focused, Some(first));

    let second = mapped_view(&mut shell, &mut comp, SurfaceId(2), Rect::new(0, 0, 640, 480));
    assert_eq!(comp.focused, Some(second));
}

/// Test that unmapping damages the box the view last occupied
#[test]
fn test_unmap_damages_last_known_box() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.move_to(&mut comp, id, 40, 30);
    comp.clear_calls();
    shell.unmap(&mut comp, SurfaceId(1));

    assert!(!shell.view(id).unwrap().mapped);
    assert_eq!(
        comp.damage_for(id),
        vec![Damage::Whole(Rect::new(40, 30, 300, 200))]
    );
}

/// Test that commit forwards the surface's own damage
#[test]
fn test_commit_forwards_surface_damage() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    comp.commit_damage
        .insert(SurfaceId(1), vec![Rect::new(5, 5, 10, 10)]);
    shell.commit(&mut comp, SurfaceId(1));

    assert_eq!(
        comp.damage_for(id),
        vec![Damage::Region(vec![Rect::new(5, 5, 10, 10)])]
    );
}

/// Test that commits after unmap have no effect
#[test]
fn test_commit_after_unmap_is_ignored() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.unmap(&mut comp, SurfaceId(1));
    comp.clear_calls();
    shell.commit(&mut comp, SurfaceId(1));

    assert!(comp.calls.is_empty());
}

/// Test that a committed size change damages the old and the new box
#[test]
fn test_commit_tracks_size_change() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 300, 250));
    shell.commit(&mut comp, SurfaceId(1));

    assert_eq!(shell.view(id).unwrap().geometry, Rect::new(0, 0, 300, 250));
    assert_eq!(
        comp.damage_for(id),
        vec![
            Damage::Region(vec![]),
            Damage::Whole(Rect::new(0, 0, 300, 200)),
            Damage::Whole(Rect::new(0, 0, 300, 250)),
        ]
    );
}

/// Test that a same-size commit raises no whole-box damage
#[test]
fn test_commit_without_size_change_skips_whole_damage() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.commit(&mut comp, SurfaceId(1));

    assert_eq!(comp.damage_for(id), vec![Damage::Region(vec![])]);
}

/// Test that a pending reposition waits for the acknowledgement
#[test]
fn test_unacked_reposition_defers() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.move_resize(&mut comp, id, Rect::new(100, 50, 400, 300));
    shell.commit(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(0, 0, 300, 200));
    assert!(view.pending.is_some());
}

/// Test that a commit at the old size re-anchors against the new one
#[test]
fn test_partial_commit_reanchors_position() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.move_resize(&mut comp, id, Rect::new(100, 50, 400, 300));
    comp.acked.insert(SurfaceId(1), 1);
    shell.commit(&mut comp, SurfaceId(1));

    // Client still committed 300x200, so the position compensates to keep
    // the target's far edges: x = 100 + 400 - 300, y = 50 + 300 - 200.
    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(200, 150, 300, 200));
    assert!(view.pending.is_none());
}

/// Test that a commit at the acknowledged size lands exactly on target
#[test]
fn test_reposition_settles_on_matching_commit() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    shell.move_resize(&mut comp, id, Rect::new(100, 50, 400, 300));
    comp.acked.insert(SurfaceId(1), 1);
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 400, 300));
    shell.commit(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(100, 50, 400, 300));
    assert!(view.pending.is_none());
}

/// Test that an acknowledgement past the target corrects but keeps pending
#[test]
fn test_overshooting_ack_corrects_without_clearing() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    comp.forced_serial = Some(5);
    shell.move_resize(&mut comp, id, Rect::new(100, 50, 400, 300));
    comp.acked.insert(SurfaceId(1), 6);
    shell.commit(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(200, 150, 300, 200));
    assert!(view.pending.is_some());

    // The next commit at the full size corrects the rest of the way
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 400, 300));
    shell.commit(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(100, 50, 400, 300));
    assert!(view.pending.is_some());
}

/// Test that a move grab tracks pointer motion with the grabbed offset
#[test]
fn test_move_grab_follows_pointer() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 100, 50);

    comp.pointer = (150.0, 80.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_move(&mut comp, SurfaceId(1));
    assert!(shell.grab().is_some());

    shell.pointer_motion(&mut comp, (170.0, 90.0));
    assert_eq!(shell.view(id).unwrap().geometry, Rect::new(120, 60, 300, 200));

    shell.pointer_motion(&mut comp, (200.0, 100.0));
    assert_eq!(shell.view(id).unwrap().geometry, Rect::new(150, 70, 300, 200));

    shell.end_grab();
    assert!(shell.grab().is_none());

    // Motion without a grab leaves the view alone
    shell.pointer_motion(&mut comp, (500.0, 500.0));
    assert_eq!(shell.view(id).unwrap().geometry, Rect::new(150, 70, 300, 200));
}

/// Test that grab requests from surfaces without pointer focus are dropped
#[test]
fn test_grab_requests_require_pointer_focus() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    comp.pointer_focus = None;
    shell.request_move(&mut comp, SurfaceId(1));
    assert!(shell.grab().is_none());

    comp.pointer_focus = Some(SurfaceId(9));
    shell.request_resize(&mut comp, SurfaceId(1), ResizeEdges::BOTTOM_RIGHT);
    assert!(shell.grab().is_none());
}

/// Test a full resize drag: configure, acknowledge, anchored settle
#[test]
fn test_resize_grab_configures_and_settles() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 100, 50);

    comp.pointer = (110.0, 60.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_resize(&mut comp, SurfaceId(1), ResizeEdges::TOP_LEFT);

    // Drag the top-left corner up and out by (40, 20)
    shell.pointer_motion(&mut comp, (70.0, 40.0));
    assert_eq!(comp.configures(), vec![(SurfaceId(1), 340, 220, 1)]);
    assert_eq!(shell.view(id).unwrap().geometry, Rect::new(100, 50, 300, 200));

    comp.acked.insert(SurfaceId(1), 1);
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 340, 220));
    shell.commit(&mut comp, SurfaceId(1));

    // Bottom-right corner stayed anchored at (400, 250)
    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(60, 30, 340, 220));
    assert!(view.pending.is_none());
}

/// Test that an overdragged left resize keeps the right edge anchored
#[test]
fn test_overdragged_resize_keeps_far_edge() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 100, 50);

    comp.pointer = (110.0, 60.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_resize(&mut comp, SurfaceId(1), ResizeEdges::LEFT);

    // Drag 350px right, well past the right edge at x = 400
    shell.pointer_motion(&mut comp, (460.0, 60.0));
    assert_eq!(comp.configures(), vec![(SurfaceId(1), 1, 200, 1)]);

    // The client refuses 1px and commits its 100px minimum instead
    comp.acked.insert(SurfaceId(1), 1);
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 100, 200));
    shell.commit(&mut comp, SurfaceId(1));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(300, 50, 100, 200));
    assert_eq!(view.geometry.x + view.geometry.width, 400);
    assert!(view.pending.is_none());
}

/// Test that a pure size change configures without parking a position
#[test]
fn test_resize_without_position_change_skips_pending() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 100, 50);

    comp.pointer = (390.0, 240.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_resize(&mut comp, SurfaceId(1), ResizeEdges::BOTTOM_RIGHT);
    shell.pointer_motion(&mut comp, (420.0, 260.0));

    assert_eq!(comp.configures(), vec![(SurfaceId(1), 330, 220, 1)]);
    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(100, 50, 300, 200));
    assert!(view.pending.is_none());
}

/// Test that a configure scheduling nothing applies the position at once
#[test]
fn test_unscheduled_configure_applies_position_immediately() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));

    comp.forced_serial = Some(0);
    shell.move_resize(&mut comp, id, Rect::new(150, 90, 200, 100));

    let view = shell.view(id).unwrap();
    assert_eq!(view.geometry, Rect::new(150, 90, 300, 200));
    assert!(view.pending.is_none());
    assert_eq!(
        comp.damage_for(id),
        vec![
            Damage::Whole(Rect::new(0, 0, 300, 200)),
            Damage::Whole(Rect::new(150, 90, 300, 200)),
        ]
    );
}

/// Test that the grab snapshot pairs stored position with queried size
#[test]
fn test_grab_snapshot_takes_size_from_fresh_query() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 100, 50);

    // The client grew since the last commit we tracked
    comp.geometry.insert(SurfaceId(1), Rect::new(0, 0, 320, 210));
    comp.pointer = (150.0, 80.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_move(&mut comp, SurfaceId(1));

    let grab = shell.grab().unwrap();
    assert_eq!(grab.start_geometry, Rect::new(100, 50, 320, 210));
    assert_eq!(grab.origin, (50.0, 30.0));
}

/// Snapshot test for the shell's visible state
#[test]
fn test_shell_state_snapshot() {
    let mut shell = Shell::new();
    let mut comp = RecordingCompositor::new();
    let id = mapped_view(&mut shell, &mut comp, SurfaceId(1), Rect::new(0, 0, 300, 200));
    shell.move_to(&mut comp, id, 120, 60);
    shell.move_resize(&mut comp, id, Rect::new(200, 100, 400, 300));
    shell.surface_created(SurfaceId(2), ShellFamily::XdgV6, SurfaceRole::Toplevel);

    comp.pointer = (150.0, 80.0);
    comp.pointer_focus = Some(SurfaceId(1));
    shell.request_move(&mut comp, SurfaceId(1));

    let mut state = String::new();
    for (id, view) in shell.views() {
        let pending = match view.pending {
            Some(p) => format!("serial {}", p.serial),
            None => "none".to_string(),
        };
        writeln!(
            state,
            "{:?} {:?} {:?} mapped={} geometry=({}, {}) {}x{} pending={}",
            id,
            view.surface,
            view.family,
            view.mapped,
            view.geometry.x,
            view.geometry.y,
            view.geometry.width,
            view.geometry.height,
            pending
        )
        .unwrap();
    }
    if let Some(grab) = shell.grab() {
        writeln!(
            state,
            "grab={:?} view={:?} origin=({}, {}) start=({}, {}) {}x{}",
            grab.mode,
            grab.view,
            grab.origin.0,
            grab.origin.1,
            grab.start_geometry.x,
            grab.start_geometry.y,
            grab.start_geometry.width,
            grab.start_geometry.height
        )
        .unwrap();
    }

    assert_snapshot!(state, @r"
    ViewId(1) SurfaceId(2) XdgV6 mapped=false geometry=(0, 0) 0x0 pending=none
    ViewId(0) SurfaceId(1) Xdg mapped=true geometry=(120, 60) 300x200 pending=serial 1
    grab=Move view=ViewId(0) origin=(30, 20) start=(120, 60) 300x200
    ");
}
