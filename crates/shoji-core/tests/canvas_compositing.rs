//! Canvas compositing through a live screen: borrowed-framebuffer and
//! private-surface paths, viewport placement, and resize behavior.

mod common;

use std::sync::{Arc, Mutex};

use common::{build_screen, ops_for, SurfaceOp};
use shoji_core::{
    CanvasError, CanvasOptions, Color, PixelExtent, PixelRect, Point, Rect, ScreenError, Size, ROOT,
};

#[test]
fn canvas_borrows_the_screen_framebuffer_when_caps_suffice() {
    let mut t = build_screen(1);
    let canvas = t.screen.create_canvas(CanvasOptions::default()).unwrap();
    assert!(!canvas.renders_to_texture());
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_position(id, Point::new(10.0, 20.0))
        .unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();

    assert!(t.created.lock().unwrap().is_empty());
    let ops = t.ops.lock().unwrap();
    let screen_ops: Vec<_> = ops_for(&ops, "screen").cloned().collect();
    // Widget rect (10,20)+100x50, 1px border inset, Y flipped into the
    // framebuffer's bottom-up space: y = 600 - 20 - 50 + 1.
    let viewport = PixelRect::new(11, 531, 98, 48);
    assert!(screen_ops.contains(&SurfaceOp::SetViewport(Some(viewport))));
    let begin = screen_ops
        .iter()
        .position(|op| *op == SurfaceOp::BeginPass)
        .expect("canvas pass on the screen surface");
    assert_eq!(screen_ops[begin + 1], SurfaceOp::EndPass);
    // The viewport restriction is lifted once the canvas pass ends.
    assert!(screen_ops[begin..].contains(&SurfaceOp::SetViewport(None)));
    assert!(!screen_ops.iter().any(|op| matches!(op, SurfaceOp::Blit { .. })));
}

#[test]
fn multisampled_canvas_owns_a_surface_and_blits_into_place() {
    let mut t = build_screen(1);
    let canvas = t
        .screen
        .create_canvas(CanvasOptions {
            samples: 4,
            ..CanvasOptions::default()
        })
        .unwrap();
    assert!(canvas.renders_to_texture());
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_position(id, Point::new(10.0, 20.0))
        .unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();

    let created = t.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].samples, 4);

    let ops = t.ops.lock().unwrap();
    let off_ops: Vec<_> = ops_for(&ops, "offscreen").cloned().collect();
    assert!(off_ops.contains(&SurfaceOp::Resize(PixelExtent::new(98, 48))));
    assert!(off_ops.contains(&SurfaceOp::BeginPass));
    // No Y flip on the private path; the blit lands at the widget rect.
    assert!(off_ops.contains(&SurfaceOp::Blit {
        src: PixelRect::new(0, 0, 98, 48),
        dst_origin: (11, 21),
    }));
}

#[test]
fn stable_canvas_size_never_reallocates_the_surface() {
    let mut t = build_screen(1);
    let canvas = t
        .screen
        .create_canvas(CanvasOptions {
            samples: 4,
            ..CanvasOptions::default()
        })
        .unwrap();
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();
    t.screen.redraw();
    t.screen.draw_all();

    assert_eq!(t.created.lock().unwrap().len(), 1);
    let ops = t.ops.lock().unwrap();
    let resizes = ops_for(&ops, "offscreen")
        .filter(|op| matches!(op, SurfaceOp::Resize(_)))
        .count();
    assert_eq!(resizes, 1);
}

#[test]
fn draw_hook_runs_inside_the_pass_with_the_final_extent() {
    let mut t = build_screen(1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut canvas = t.screen.create_canvas(CanvasOptions::default()).unwrap();
    let sink = seen.clone();
    canvas.set_on_draw(Box::new(move |surface| {
        sink.lock().unwrap().push(surface.extent());
    }));
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();
    assert_eq!(*seen.lock().unwrap(), vec![PixelExtent::new(800, 600)]);
}

#[test]
fn borrowed_canvas_clear_fills_its_region_with_the_background() {
    let mut t = build_screen(1);
    let background = Color::rgb(0.1, 0.2, 0.3);
    let mut canvas = t.screen.create_canvas(CanvasOptions::default()).unwrap();
    canvas.set_background_color(background);
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_position(id, Point::new(10.0, 20.0))
        .unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();

    // The screen pass cannot clear inside a viewport, so the background is
    // painted as a 2D fill covering the region inside the 1px border.
    let fills = t.fills.lock().unwrap();
    assert!(fills.contains(&(
        Rect::new(Point::new(11.0, 21.0), Size::new(98.0, 48.0)),
        background,
    )));
}

#[test]
fn borrowed_canvas_without_clear_leaves_the_frame_alone() {
    let mut t = build_screen(1);
    let canvas = t
        .screen
        .create_canvas(CanvasOptions {
            clear: false,
            ..CanvasOptions::default()
        })
        .unwrap();
    let id = t.screen.add_canvas(ROOT, canvas).unwrap();
    t.screen
        .tree_mut()
        .set_size(id, Size::new(100.0, 50.0))
        .unwrap();

    t.screen.draw_all();
    assert!(t.fills.lock().unwrap().is_empty());
}

#[test]
fn stencil_without_depth_is_rejected_up_front() {
    let mut t = build_screen(1);
    let result = t.screen.create_canvas(CanvasOptions {
        depth: false,
        stencil: true,
        ..CanvasOptions::default()
    });
    assert!(matches!(
        result,
        Err(ScreenError::Canvas(CanvasError::StencilRequiresDepth))
    ));
    assert!(t.created.lock().unwrap().is_empty());
}
