//! Backend-independent core of the shoji UI toolkit: the retained widget
//! tree, the per-window input dispatcher, GPU canvas compositing, and the
//! redraw scheduler.
//!
//! A [`Screen`] pairs one native window (behind [`WindowBackend`]) with a
//! [`WidgetTree`] and routes translated input events through it. Screens are
//! collected in a [`ScreenRegistry`] driven by the [`MainLoop`], which paints
//! dirty screens and otherwise blocks in the backend's event pump; a pacing
//! thread keeps animations moving by marking screens dirty through their
//! lock-free [`ScreenPulse`]s.
//!
//! GPU and windowing concerns sit behind the [`surface`], [`render`], and
//! [`backend`] traits; the companion wgpu and winit crates provide the real
//! implementations.

pub mod backend;
pub mod canvas;
pub mod event;
pub mod geometry;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod screen;
pub mod surface;
pub mod widget;

pub use backend::{WindowBackend, WindowHandle};
pub use canvas::{Canvas, CanvasError, CanvasOptions};
pub use event::{Cursor, Key, KeyboardEvent, Modifiers, MouseButton, MouseButtons};
pub use geometry::{Color, PixelExtent, PixelRect, Point, Rect, Size};
pub use registry::ScreenRegistry;
pub use render::VectorRenderer;
pub use scheduler::{Deferred, EventPump, LoopError, MainLoop, RefreshRate};
pub use screen::{Screen, ScreenError, ScreenOptions, ScreenPulse};
pub use surface::{
    ClearPolicy, FramebufferCaps, SurfaceBinding, SurfaceError, SurfaceFactory, SurfaceSpec,
};
pub use widget::{
    DrawCx, DrawResult, EmptyWidget, EventCx, EventResult, ScreenRequest, Widget, WidgetError,
    WidgetId, WidgetKind, WidgetTree, ROOT,
};
