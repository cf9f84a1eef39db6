#![allow(dead_code)]

//! Shared test doubles: an in-memory window backend, a surface that records
//! the GPU calls made against it, a no-op vector renderer, and probe widgets
//! that trace the events they receive.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shoji_core::{
    Color, Cursor, EventCx, EventResult, FramebufferCaps, KeyboardEvent, Modifiers, MouseButton,
    MouseButtons, PixelExtent, PixelRect, Point, Rect, Screen, ScreenOptions, Size, SurfaceBinding,
    SurfaceError, SurfaceFactory, SurfaceSpec, VectorRenderer, Widget, WidgetId, WindowBackend,
    WindowHandle,
};

// ----------------------------------------------------------------------
// Surface double
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Resize(PixelExtent),
    Clear,
    SetViewport(Option<PixelRect>),
    BeginPass,
    EndPass,
    Blit { src: PixelRect, dst_origin: (i32, i32) },
    Present,
}

pub type OpLog = Arc<Mutex<Vec<(String, SurfaceOp)>>>;

pub fn ops_for<'a>(
    log: &'a [(String, SurfaceOp)],
    tag: &str,
) -> impl Iterator<Item = &'a SurfaceOp> {
    let tag = tag.to_string();
    log.iter().filter(move |(t, _)| *t == tag).map(|(_, op)| op)
}

pub struct TestSurface {
    tag: String,
    extent: PixelExtent,
    ops: OpLog,
}

impl TestSurface {
    pub fn new(tag: &str, extent: PixelExtent, ops: OpLog) -> Self {
        Self {
            tag: tag.to_string(),
            extent,
            ops,
        }
    }

    fn log(&self, op: SurfaceOp) {
        self.ops.lock().unwrap().push((self.tag.clone(), op));
    }
}

impl SurfaceBinding for TestSurface {
    fn extent(&self) -> PixelExtent {
        self.extent
    }

    fn resize(&mut self, extent: PixelExtent) {
        if extent != self.extent {
            self.extent = extent;
            self.log(SurfaceOp::Resize(extent));
        }
    }

    fn set_clear_color(&mut self, _color: Color) {}

    fn set_viewport(&mut self, viewport: Option<PixelRect>) {
        self.log(SurfaceOp::SetViewport(viewport));
    }

    fn clear(&mut self, _color: Color) {
        self.log(SurfaceOp::Clear);
    }

    fn begin_pass(&mut self) -> Result<(), SurfaceError> {
        self.log(SurfaceOp::BeginPass);
        Ok(())
    }

    fn end_pass(&mut self) {
        self.log(SurfaceOp::EndPass);
    }

    fn blit_to(
        &mut self,
        src: PixelRect,
        _dst: &mut dyn SurfaceBinding,
        dst_origin: (i32, i32),
    ) -> Result<(), SurfaceError> {
        self.log(SurfaceOp::Blit { src, dst_origin });
        Ok(())
    }

    fn present(&mut self) {
        self.log(SurfaceOp::Present);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct TestFactory {
    pub created: Arc<Mutex<Vec<SurfaceSpec>>>,
    ops: OpLog,
}

impl SurfaceFactory for TestFactory {
    fn create_surface(
        &mut self,
        spec: &SurfaceSpec,
    ) -> Result<Box<dyn SurfaceBinding>, SurfaceError> {
        self.created.lock().unwrap().push(*spec);
        Ok(Box::new(TestSurface::new(
            "offscreen",
            spec.extent,
            self.ops.clone(),
        )))
    }
}

// ----------------------------------------------------------------------
// Backend double
// ----------------------------------------------------------------------

#[derive(Clone)]
pub struct TestBackendHandles {
    pub window: Arc<Mutex<PixelExtent>>,
    pub framebuffer: Arc<Mutex<PixelExtent>>,
    pub close: Arc<AtomicBool>,
    pub visible: Arc<AtomicBool>,
    pub wakes: Arc<AtomicUsize>,
    pub cursor: Arc<Mutex<Cursor>>,
}

impl TestBackendHandles {
    pub fn new(extent: PixelExtent) -> Self {
        Self {
            window: Arc::new(Mutex::new(extent)),
            framebuffer: Arc::new(Mutex::new(extent)),
            close: Arc::new(AtomicBool::new(false)),
            visible: Arc::new(AtomicBool::new(true)),
            wakes: Arc::new(AtomicUsize::new(0)),
            cursor: Arc::new(Mutex::new(Cursor::Arrow)),
        }
    }

    pub fn set_size(&self, extent: PixelExtent) {
        *self.window.lock().unwrap() = extent;
        *self.framebuffer.lock().unwrap() = extent;
    }
}

pub struct TestBackend {
    handle: u64,
    scale: f32,
    handles: TestBackendHandles,
}

impl TestBackend {
    pub fn new(handle: u64, scale: f32, handles: TestBackendHandles) -> Self {
        Self {
            handle,
            scale,
            handles,
        }
    }
}

impl WindowBackend for TestBackend {
    fn handle(&self) -> WindowHandle {
        WindowHandle(self.handle)
    }

    fn window_size(&self) -> PixelExtent {
        *self.handles.window.lock().unwrap()
    }

    fn framebuffer_size(&self) -> PixelExtent {
        *self.handles.framebuffer.lock().unwrap()
    }

    fn content_scale(&self) -> f32 {
        self.scale
    }

    fn set_window_size(&mut self, size: PixelExtent) {
        self.handles.set_size(size);
    }

    fn set_caption(&mut self, _caption: &str) {}

    fn set_visible(&mut self, visible: bool) {
        self.handles.visible.store(visible, Ordering::SeqCst);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        *self.handles.cursor.lock().unwrap() = cursor;
    }

    fn close_requested(&self) -> bool {
        self.handles.close.load(Ordering::SeqCst)
    }

    fn redraw_waker(&self) -> Arc<dyn Fn() + Send + Sync> {
        let wakes = self.handles.wakes.clone();
        Arc::new(move || {
            wakes.fetch_add(1, Ordering::SeqCst);
        })
    }
}

// ----------------------------------------------------------------------
// Renderer double
// ----------------------------------------------------------------------

/// Draws nothing but records rectangle fills, so tests can observe 2D
/// painting such as the emulated canvas clear.
#[derive(Default)]
pub struct NullRenderer {
    pub fills: Arc<Mutex<Vec<(Rect, Color)>>>,
}

impl VectorRenderer for NullRenderer {
    fn begin_frame(&mut self, _width: f32, _height: f32, _pixel_ratio: f32) {}

    fn end_frame(&mut self) {}

    fn flush(&mut self, _width: f32, _height: f32, _pixel_ratio: f32) {}

    fn fill_rounded_rect(&mut self, rect: Rect, _radius: f32, color: Color) {
        self.fills.lock().unwrap().push((rect, color));
    }

    fn stroke_rounded_rect(&mut self, _rect: Rect, _radius: f32, _stroke_width: f32, _color: Color) {
    }

    fn fill_triangle(&mut self, _a: Point, _b: Point, _c: Point, _color: Color) {}

    fn text_bounds(&mut self, pos: Point, max_width: Option<f32>, text: &str) -> Rect {
        let width = (text.chars().count() as f32 * 8.0).min(max_width.unwrap_or(f32::MAX));
        Rect::new(pos, Size::new(width, 16.0))
    }

    fn draw_text_box(&mut self, _pos: Point, _max_width: Option<f32>, _text: &str, _color: Color) {}

    fn set_global_alpha(&mut self, _alpha: f32) {}
}

// ----------------------------------------------------------------------
// Screen assembly
// ----------------------------------------------------------------------

pub struct TestScreen {
    pub screen: Screen,
    pub handles: TestBackendHandles,
    pub ops: OpLog,
    pub created: Arc<Mutex<Vec<SurfaceSpec>>>,
    pub fills: Arc<Mutex<Vec<(Rect, Color)>>>,
}

pub fn build_screen(handle: u64) -> TestScreen {
    let extent = PixelExtent::new(800, 600);
    let ops: OpLog = Arc::new(Mutex::new(Vec::new()));
    let created = Arc::new(Mutex::new(Vec::new()));
    let fills = Arc::new(Mutex::new(Vec::new()));
    let handles = TestBackendHandles::new(extent);
    let screen = Screen::new(
        Box::new(TestBackend::new(handle, 1.0, handles.clone())),
        Box::new(TestSurface::new("screen", extent, ops.clone())),
        Box::new(TestFactory {
            created: created.clone(),
            ops: ops.clone(),
        }),
        Box::new(NullRenderer {
            fills: fills.clone(),
        }),
        ScreenOptions {
            caption: String::from("test"),
            background: Color::BLACK,
            framebuffer_caps: FramebufferCaps {
                depth: true,
                stencil: true,
            },
            visible: true,
        },
    )
    .expect("screen construction");
    TestScreen {
        screen,
        handles,
        ops,
        created,
        fills,
    }
}

/// Moves the pointer so the dispatcher sees logical position `(x, y)`
/// (undoing the raw-coordinate bias it applies).
pub fn move_cursor(screen: &mut Screen, x: f32, y: f32) {
    let ratio = screen.pixel_ratio();
    screen.cursor_moved(((x + 1.0) * ratio) as f64, ((y + 2.0) * ratio) as f64);
}

// ----------------------------------------------------------------------
// Probe widgets
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Button {
        id: WidgetId,
        pressed: bool,
        pos: (f32, f32),
    },
    Motion {
        id: WidgetId,
    },
    Drag {
        id: WidgetId,
    },
    Scroll {
        id: WidgetId,
    },
    Key {
        id: WidgetId,
    },
    Char {
        id: WidgetId,
        ch: char,
    },
    Focus {
        id: WidgetId,
        focused: bool,
    },
    Resize {
        id: WidgetId,
        size: (f32, f32),
    },
}

#[derive(Clone, Default)]
pub struct EventTrace(pub Arc<Mutex<Vec<TraceEvent>>>);

impl EventTrace {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn push(&self, event: TraceEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// A widget that traces every event it sees and consumes the configured
/// classes.
#[derive(Default)]
pub struct Probe {
    pub trace: EventTrace,
    pub consume_buttons: bool,
    pub consume_motion: bool,
    pub consume_drag: bool,
    pub consume_keys: bool,
    pub consume_chars: bool,
    pub consume_scroll: bool,
}

impl Probe {
    pub fn new(trace: &EventTrace) -> Self {
        Self {
            trace: trace.clone(),
            ..Self::default()
        }
    }
}

impl Widget for Probe {
    fn mouse_button_event(
        &mut self,
        cx: &mut EventCx<'_>,
        pos: Point,
        _button: MouseButton,
        pressed: bool,
        _modifiers: Modifiers,
    ) -> EventResult {
        self.trace.push(TraceEvent::Button {
            id: cx.widget,
            pressed,
            pos: (pos.x, pos.y),
        });
        Ok(self.consume_buttons)
    }

    fn mouse_motion_event(
        &mut self,
        cx: &mut EventCx<'_>,
        _pos: Point,
        _rel: Point,
        _buttons: MouseButtons,
        _modifiers: Modifiers,
    ) -> EventResult {
        self.trace.push(TraceEvent::Motion { id: cx.widget });
        Ok(self.consume_motion)
    }

    fn mouse_drag_event(
        &mut self,
        cx: &mut EventCx<'_>,
        _pos: Point,
        _rel: Point,
        _buttons: MouseButtons,
        _modifiers: Modifiers,
    ) -> EventResult {
        self.trace.push(TraceEvent::Drag { id: cx.widget });
        Ok(self.consume_drag)
    }

    fn scroll_event(&mut self, cx: &mut EventCx<'_>, _pos: Point, _delta: Point) -> EventResult {
        self.trace.push(TraceEvent::Scroll { id: cx.widget });
        Ok(self.consume_scroll)
    }

    fn keyboard_event(&mut self, cx: &mut EventCx<'_>, _event: &KeyboardEvent) -> EventResult {
        self.trace.push(TraceEvent::Key { id: cx.widget });
        Ok(self.consume_keys)
    }

    fn character_event(&mut self, cx: &mut EventCx<'_>, codepoint: char) -> EventResult {
        self.trace.push(TraceEvent::Char {
            id: cx.widget,
            ch: codepoint,
        });
        Ok(self.consume_chars)
    }

    fn focus_event(&mut self, cx: &mut EventCx<'_>, focused: bool) -> EventResult {
        self.trace.push(TraceEvent::Focus {
            id: cx.widget,
            focused,
        });
        Ok(false)
    }

    fn resize_event(&mut self, cx: &mut EventCx<'_>, size: Size) -> EventResult {
        self.trace.push(TraceEvent::Resize {
            id: cx.widget,
            size: (size.width, size.height),
        });
        Ok(false)
    }
}
