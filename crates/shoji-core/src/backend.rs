//! Contract onto the windowing backend.
//!
//! The backend creates the native window and GPU context itself (out of
//! scope here); the screen is handed this capability object and a stable
//! [`WindowHandle`] used as its registry key. All methods are called from
//! the main thread only, except the waker returned by [`WindowBackend::redraw_waker`],
//! which must be callable from the redraw pacing thread.

use std::sync::Arc;

use crate::event::Cursor;
use crate::geometry::PixelExtent;

/// Opaque identity of a backend window, the registry key for its screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

pub trait WindowBackend {
    fn handle(&self) -> WindowHandle;

    /// Window size in backend screen coordinates (logical units times the
    /// content scale on most platforms).
    fn window_size(&self) -> PixelExtent;

    /// Framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> PixelExtent;

    /// Device scale factor mapping logical coordinates to framebuffer
    /// pixels.
    fn content_scale(&self) -> f32;

    fn set_window_size(&mut self, size: PixelExtent);

    fn set_caption(&mut self, caption: &str);

    fn set_visible(&mut self, visible: bool);

    fn set_cursor(&mut self, cursor: Cursor);

    /// Whether the user asked this window to close.
    fn close_requested(&self) -> bool;

    /// A thread-safe hook that wakes the blocked main loop (e.g. posts an
    /// empty backend event).
    fn redraw_waker(&self) -> Arc<dyn Fn() + Send + Sync>;
}
