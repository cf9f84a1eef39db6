//! Narrow contract onto the immediate-mode 2D vector renderer.
//!
//! The core only needs the frame bracket, a mid-frame flush (so canvas
//! widgets can interleave their own GPU work in correct depth order), and
//! the handful of primitives used by tooltips and canvas borders. Widget
//! visuals draw through the same trait but are out of scope here.

use crate::geometry::{Color, Point, Rect};

pub trait VectorRenderer {
    /// Opens a frame in logical coordinates at the given pixel ratio.
    fn begin_frame(&mut self, width: f32, height: f32, pixel_ratio: f32);

    /// Closes the frame and submits all batched drawing.
    fn end_frame(&mut self);

    /// Flushes pending batched drawing mid-frame and restores the viewport,
    /// so GPU passes issued afterwards land on top of what was drawn so far.
    fn flush(&mut self, width: f32, height: f32, pixel_ratio: f32);

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color);

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, stroke_width: f32, color: Color);

    fn fill_triangle(&mut self, a: Point, b: Point, c: Point, color: Color);

    /// Measures `text` laid out at `pos`, wrapped to `max_width` when given.
    fn text_bounds(&mut self, pos: Point, max_width: Option<f32>, text: &str) -> Rect;

    fn draw_text_box(&mut self, pos: Point, max_width: Option<f32>, text: &str, color: Color);

    /// Multiplies all subsequent fills by `alpha` until reset to 1.
    fn set_global_alpha(&mut self, alpha: f32);
}
