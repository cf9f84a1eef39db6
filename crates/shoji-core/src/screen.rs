//! Top-level screen: one native window, its widget tree, and the input
//! dispatcher.
//!
//! The screen translates backend input into tree dispatch and owns the
//! cross-cutting interaction state: pressed buttons, the drag target, the
//! focus path, modal containment, tooltip timing. Handlers talk back through
//! queued [`ScreenRequest`]s applied once dispatch unwinds, so no handler
//! ever reenters the dispatcher.
//!
//! Redraw pacing runs on another thread; everything it needs from the screen
//! is published through the lock-free [`ScreenPulse`], the only part of a
//! screen that crosses threads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;
use web_time::Instant;

use crate::backend::{WindowBackend, WindowHandle};
use crate::canvas::{Canvas, CanvasError, CanvasOptions};
use crate::event::{Cursor, KeyboardEvent, Modifiers, MouseButton, MouseButtons};
use crate::geometry::{Color, PixelExtent, Point, Rect, Size};
use crate::render::VectorRenderer;
use crate::surface::{FramebufferCaps, SurfaceBinding, SurfaceError, SurfaceFactory};
use crate::widget::{ScreenRequest, WidgetError, WidgetId, WidgetTree, ROOT};

/// Seconds the pointer must rest on a widget before its tooltip appears.
const TOOLTIP_DELAY: f32 = 0.5;
/// Tooltip fade-in window after the delay, in milliseconds since the last
/// interaction.
const TOOLTIP_FADE_START_MS: u64 = 250;
const TOOLTIP_FADE_END_MS: u64 = 1250;
const TOOLTIP_MAX_WIDTH: f32 = 150.0;

#[derive(Debug)]
pub enum ScreenError {
    Config { reason: &'static str },
    Widget(WidgetError),
    Surface(SurfaceError),
    Canvas(CanvasError),
}

impl std::fmt::Display for ScreenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenError::Config { reason } => write!(f, "screen configuration: {reason}"),
            ScreenError::Widget(err) => write!(f, "{err}"),
            ScreenError::Surface(err) => write!(f, "{err}"),
            ScreenError::Canvas(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ScreenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScreenError::Config { .. } => None,
            ScreenError::Widget(err) => Some(err),
            ScreenError::Surface(err) => Some(err),
            ScreenError::Canvas(err) => Some(err),
        }
    }
}

impl From<WidgetError> for ScreenError {
    fn from(err: WidgetError) -> Self {
        ScreenError::Widget(err)
    }
}

impl From<SurfaceError> for ScreenError {
    fn from(err: SurfaceError) -> Self {
        ScreenError::Surface(err)
    }
}

impl From<CanvasError> for ScreenError {
    fn from(err: CanvasError) -> Self {
        ScreenError::Canvas(err)
    }
}

pub struct ScreenOptions {
    pub caption: String,
    pub background: Color,
    /// Attachments the supplied framebuffer surface provides.
    pub framebuffer_caps: FramebufferCaps,
    pub visible: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            caption: String::from("Untitled"),
            background: Color::rgb(0.3, 0.3, 0.32),
            framebuffer_caps: FramebufferCaps::default(),
            visible: true,
        }
    }
}

/// The shareable, thread-safe slice of a screen's state.
///
/// The main thread publishes into it on every interaction; the redraw pacing
/// thread only ever reads atomics and calls the waker, so it never touches
/// the widget tree.
pub struct ScreenPulse {
    origin: Instant,
    dirty: AtomicBool,
    last_interaction_ms: AtomicU64,
    tooltip_hover: AtomicBool,
    waker: Arc<dyn Fn() + Send + Sync>,
}

impl ScreenPulse {
    fn new(waker: Arc<dyn Fn() + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            // Start dirty so the first loop iteration paints a frame.
            dirty: AtomicBool::new(true),
            last_interaction_ms: AtomicU64::new(0),
            tooltip_hover: AtomicBool::new(false),
            waker,
        })
    }

    /// Marks the screen dirty and wakes the blocked main loop, but only on
    /// the clean-to-dirty edge so repeated calls stay cheap.
    pub fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::AcqRel) {
            (self.waker)();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn touch(&self, now: Instant) {
        let ms = now.duration_since(self.origin).as_millis() as u64;
        self.last_interaction_ms.store(ms, Ordering::Release);
    }

    pub(crate) fn set_tooltip_hover(&self, hover: bool) {
        self.tooltip_hover.store(hover, Ordering::Release);
    }

    /// Whether a tooltip fade animation is currently in flight, meaning the
    /// pacing thread must keep frames coming even without input.
    pub fn tooltip_fade_active(&self) -> bool {
        if !self.tooltip_hover.load(Ordering::Acquire) {
            return false;
        }
        let now_ms = self.origin.elapsed().as_millis() as u64;
        let elapsed = now_ms.saturating_sub(self.last_interaction_ms.load(Ordering::Acquire));
        (TOOLTIP_FADE_START_MS..=TOOLTIP_FADE_END_MS).contains(&elapsed)
    }
}

pub struct Screen {
    backend: Box<dyn WindowBackend>,
    surface: Box<dyn SurfaceBinding>,
    factory: Box<dyn SurfaceFactory>,
    vg: Box<dyn VectorRenderer>,
    caps: FramebufferCaps,
    tree: WidgetTree,
    background: Color,
    caption: String,
    size: Size,
    fb_extent: PixelExtent,
    pixel_ratio: f32,
    visible: bool,
    process_events: bool,
    mouse_pos: Point,
    mouse_state: MouseButtons,
    modifiers: Modifiers,
    active_cursor: Cursor,
    drag_active: bool,
    drag_widget: Option<WidgetId>,
    // Innermost widget first, root last.
    focus_path: SmallVec<[WidgetId; 8]>,
    last_interaction: Instant,
    pulse: Arc<ScreenPulse>,
    // Reusable request buffer, taken out for the duration of a dispatch.
    requests: Vec<ScreenRequest>,
    resize_callback: Option<Box<dyn FnMut(Size)>>,
    drop_callback: Option<Box<dyn FnMut(&[PathBuf]) -> bool>>,
}

impl Screen {
    pub fn new(
        backend: Box<dyn WindowBackend>,
        surface: Box<dyn SurfaceBinding>,
        factory: Box<dyn SurfaceFactory>,
        vg: Box<dyn VectorRenderer>,
        options: ScreenOptions,
    ) -> Result<Self, ScreenError> {
        if options.framebuffer_caps.stencil && !options.framebuffer_caps.depth {
            return Err(ScreenError::Config {
                reason: "a stencil buffer requires a depth buffer",
            });
        }
        let mut backend = backend;
        backend.set_caption(&options.caption);
        backend.set_visible(options.visible);

        let fb_extent = backend.framebuffer_size();
        let window = backend.window_size();
        let pixel_ratio = backend.content_scale();
        let size = Size::new(
            window.width as f32 / pixel_ratio,
            window.height as f32 / pixel_ratio,
        );

        let mut tree = WidgetTree::new();
        tree.set_size(ROOT, size)?;

        let pulse = ScreenPulse::new(backend.redraw_waker());
        Ok(Self {
            backend,
            surface,
            factory,
            vg,
            caps: options.framebuffer_caps,
            tree,
            background: options.background,
            caption: options.caption,
            size,
            fb_extent,
            pixel_ratio,
            visible: options.visible,
            process_events: true,
            mouse_pos: Point::ZERO,
            mouse_state: MouseButtons::NONE,
            modifiers: Modifiers::NONE,
            active_cursor: Cursor::Arrow,
            drag_active: false,
            drag_widget: None,
            focus_path: SmallVec::new(),
            last_interaction: Instant::now(),
            pulse,
            requests: Vec::new(),
            resize_callback: None,
            drop_callback: None,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn handle(&self) -> WindowHandle {
        self.backend.handle()
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut WidgetTree {
        &mut self.tree
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn framebuffer_extent(&self) -> PixelExtent {
        self.fb_extent
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn mouse_pos(&self) -> Point {
        self.mouse_pos
    }

    pub fn framebuffer_caps(&self) -> FramebufferCaps {
        self.caps
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.backend.set_visible(visible);
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        let caption = caption.into();
        if caption != self.caption {
            self.backend.set_caption(&caption);
            self.caption = caption;
        }
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn process_events(&self) -> bool {
        self.process_events
    }

    pub fn set_process_events(&mut self, process: bool) {
        self.process_events = process;
    }

    pub fn close_requested(&self) -> bool {
        self.backend.close_requested()
    }

    pub fn pulse(&self) -> Arc<ScreenPulse> {
        self.pulse.clone()
    }

    pub fn drag_active(&self) -> bool {
        self.drag_active
    }

    pub fn drag_widget(&self) -> Option<WidgetId> {
        self.drag_widget
    }

    pub fn focus_path(&self) -> &[WidgetId] {
        &self.focus_path
    }

    pub fn set_resize_callback(&mut self, callback: Box<dyn FnMut(Size)>) {
        self.resize_callback = Some(callback);
    }

    pub fn set_drop_callback(&mut self, callback: Box<dyn FnMut(&[PathBuf]) -> bool>) {
        self.drop_callback = Some(callback);
    }

    /// Builds a [`Canvas`] against this screen's framebuffer capabilities.
    /// Configure it (draw hook, colors), then insert with
    /// [`Screen::add_canvas`].
    pub fn create_canvas(&mut self, options: CanvasOptions) -> Result<Canvas, ScreenError> {
        Ok(Canvas::new(self.caps, self.factory.as_mut(), options)?)
    }

    pub fn add_canvas(&mut self, parent: WidgetId, canvas: Canvas) -> Result<WidgetId, ScreenError> {
        let size = canvas.initial_size();
        let id = self.tree.add_child(parent, Box::new(canvas))?;
        self.tree.set_size(id, size)?;
        Ok(id)
    }

    /// Schedules a repaint; safe to call from handlers and other threads via
    /// the pulse.
    pub fn redraw(&self) {
        self.pulse.mark_dirty();
    }

    // ------------------------------------------------------------------
    // Input entry points (called by the backend adapter, main thread)
    // ------------------------------------------------------------------

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        if !self.process_events {
            return;
        }
        let p = Point::new(
            x as f32 / self.pixel_ratio - 1.0,
            y as f32 / self.pixel_ratio - 2.0,
        );
        self.touch_interaction();

        let mut requests = std::mem::take(&mut self.requests);
        let mut handled = false;
        if self.drag_active {
            match self.drag_widget {
                Some(drag) if self.tree.exists(drag) => {
                    let parent_abs = self
                        .tree
                        .parent(drag)
                        .map(|id| self.tree.absolute_position(id))
                        .unwrap_or(Point::ZERO);
                    handled = self.tree.deliver_drag(
                        &mut requests,
                        drag,
                        p - parent_abs,
                        p - self.mouse_pos,
                        self.mouse_state,
                        self.modifiers,
                    );
                }
                _ => {
                    self.drag_active = false;
                    self.drag_widget = None;
                }
            }
        } else if let Some(widget) = self.tree.find_widget(p) {
            self.refresh_cursor(widget);
        }
        if !handled {
            handled = self.tree.deliver_mouse_motion(
                &mut requests,
                p,
                p - self.mouse_pos,
                self.mouse_state,
                self.modifiers,
            );
        }
        self.mouse_pos = p;
        self.update_tooltip_probe();
        self.finish_dispatch(requests, handled);
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool, modifiers: Modifiers) {
        if !self.process_events {
            return;
        }
        // A modal window on the focus path confines pointer input to its
        // bounds; a blocked event leaves all interaction state untouched.
        if self.modal_blocks(self.mouse_pos) {
            return;
        }
        self.modifiers = modifiers;
        self.touch_interaction();
        if pressed {
            self.mouse_state.insert(button);
        } else {
            self.mouse_state.remove(button);
        }

        let mut requests = std::mem::take(&mut self.requests);
        let mut handled = false;
        let drop_widget = self.tree.find_widget(self.mouse_pos);

        // A release over some other widget still closes out the drag with a
        // synthesized release delivered to the drag target.
        if self.drag_active && !pressed {
            if let Some(drag) = self.drag_widget {
                if drop_widget != Some(drag) && self.tree.exists(drag) {
                    let parent_abs = self
                        .tree
                        .parent(drag)
                        .map(|id| self.tree.absolute_position(id))
                        .unwrap_or(Point::ZERO);
                    let pos = self.mouse_pos - parent_abs;
                    handled |= self.tree.invoke(&mut requests, drag, "mouse button", |w, cx| {
                        w.mouse_button_event(cx, pos, button, false, modifiers)
                    });
                }
            }
        }

        if let Some(widget) = drop_widget {
            self.refresh_cursor(widget);
        }

        if button.starts_drag() {
            if !self.drag_active && pressed {
                self.drag_widget = drop_widget.filter(|&w| w != ROOT);
                self.drag_active = self.drag_widget.is_some();
                if !self.drag_active {
                    // Press on bare screen space drops focus entirely.
                    self.update_focus(None);
                }
            } else if self.drag_active && !pressed {
                self.drag_active = false;
                self.drag_widget = None;
            }
        }

        handled |= self.tree.deliver_mouse_button(
            &mut requests,
            self.mouse_pos,
            button,
            pressed,
            modifiers,
        );
        self.finish_dispatch(requests, handled);
    }

    pub fn scroll(&mut self, dx: f64, dy: f64) {
        if !self.process_events {
            return;
        }
        if self.modal_blocks(self.mouse_pos) {
            return;
        }
        self.touch_interaction();
        let mut requests = std::mem::take(&mut self.requests);
        let handled = self.tree.deliver_scroll(
            &mut requests,
            self.mouse_pos,
            Point::new(dx as f32, dy as f32),
        );
        self.finish_dispatch(requests, handled);
    }

    /// Walks the focus path innermost to outermost (the root never receives
    /// keys), offering the event to focused widgets until one consumes it.
    pub fn keyboard(&mut self, event: KeyboardEvent) {
        if !self.process_events {
            return;
        }
        self.modifiers = event.modifiers;
        self.touch_interaction();
        let mut requests = std::mem::take(&mut self.requests);
        let mut handled = false;
        let path: SmallVec<[WidgetId; 8]> = self.focus_path.clone();
        for &widget in path.iter().take(path.len().saturating_sub(1)) {
            if self.tree.focused(widget)
                && self
                    .tree
                    .invoke(&mut requests, widget, "keyboard", |w, cx| {
                        w.keyboard_event(cx, &event)
                    })
            {
                handled = true;
                break;
            }
        }
        self.finish_dispatch(requests, handled);
    }

    /// Text input, routed like [`Screen::keyboard`].
    pub fn character(&mut self, codepoint: char) {
        if !self.process_events {
            return;
        }
        self.touch_interaction();
        let mut requests = std::mem::take(&mut self.requests);
        let mut handled = false;
        let path: SmallVec<[WidgetId; 8]> = self.focus_path.clone();
        for &widget in path.iter().take(path.len().saturating_sub(1)) {
            if self.tree.focused(widget)
                && self
                    .tree
                    .invoke(&mut requests, widget, "character", |w, cx| {
                        w.character_event(cx, codepoint)
                    })
            {
                handled = true;
                break;
            }
        }
        self.finish_dispatch(requests, handled);
    }

    pub fn files_dropped(&mut self, paths: &[PathBuf]) {
        if !self.process_events {
            return;
        }
        let handled = match self.drop_callback.as_mut() {
            Some(callback) => callback(paths),
            None => false,
        };
        if handled {
            self.pulse.mark_dirty();
        }
    }

    pub fn window_focus_changed(&mut self, focused: bool) {
        if !self.process_events {
            return;
        }
        self.tree.set_focused(ROOT, focused);
        let mut requests = std::mem::take(&mut self.requests);
        self.tree.invoke(&mut requests, ROOT, "focus", |w, cx| {
            w.focus_event(cx, focused)
        });
        self.finish_dispatch(requests, false);
    }

    /// Reacts to a backend resize. The backend's own sizes are authoritative;
    /// transitional zero sizes (minimize) are ignored outright. The root
    /// behavior is notified, then the screen callback; the redraw is
    /// synchronous so the window never shows a stale frame mid-resize.
    pub fn framebuffer_resized(&mut self) {
        if !self.process_events {
            return;
        }
        let fb = self.backend.framebuffer_size();
        let window = self.backend.window_size();
        if fb.is_empty() || window.is_empty() {
            return;
        }
        self.fb_extent = fb;
        self.size = Size::new(
            window.width as f32 / self.pixel_ratio,
            window.height as f32 / self.pixel_ratio,
        );
        if let Err(err) = self.tree.set_size(ROOT, self.size) {
            log::error!("root resize failed: {err}");
        }
        self.touch_interaction();
        let mut requests = std::mem::take(&mut self.requests);
        let size = self.size;
        let handled = self.tree.invoke(&mut requests, ROOT, "resize", |w, cx| {
            w.resize_event(cx, size)
        });
        self.finish_dispatch(requests, handled);
        if let Some(callback) = self.resize_callback.as_mut() {
            callback(self.size);
        }
        self.pulse.mark_dirty();
        self.draw_all();
    }

    pub fn content_scale_changed(&mut self) {
        self.pixel_ratio = self.backend.content_scale();
        self.framebuffer_resized();
    }

    // ------------------------------------------------------------------
    // Focus and window management
    // ------------------------------------------------------------------

    /// Refocuses onto `widget` (or nothing).
    ///
    /// The old path loses focus in stored order, innermost first; the new
    /// path is rebuilt by walking parents and gains focus outermost first,
    /// so ancestors are focused before their descendants. The enclosing
    /// window, if any, is raised.
    pub fn update_focus(&mut self, widget: Option<WidgetId>) {
        let mut requests = std::mem::take(&mut self.requests);

        let old: SmallVec<[WidgetId; 8]> = std::mem::take(&mut self.focus_path);
        for &w in &old {
            if self.tree.focused(w) {
                self.tree.set_focused(w, false);
                self.tree
                    .invoke(&mut requests, w, "focus", |b, cx| b.focus_event(cx, false));
            }
        }

        let mut window = None;
        let mut cursor = widget.filter(|&w| self.tree.exists(w));
        while let Some(id) = cursor {
            self.focus_path.push(id);
            if self.tree.is_window(id) {
                window = Some(id);
            }
            cursor = self.tree.parent(id);
        }

        let path: SmallVec<[WidgetId; 8]> = self.focus_path.clone();
        for &w in path.iter().rev() {
            self.tree.set_focused(w, true);
            self.tree
                .invoke(&mut requests, w, "focus", |b, cx| b.focus_event(cx, true));
        }

        if let Some(window) = window {
            self.move_window_to_front(window);
        }

        self.apply_queue(&mut requests);
        self.requests = requests;
    }

    /// Raises `window` to the top of the stacking order, then keeps hoisting
    /// popups above their parent windows until the order is stable.
    pub fn move_window_to_front(&mut self, window: WidgetId) {
        if self.tree.raise_child(window).is_err() {
            return;
        }
        loop {
            let children: Vec<WidgetId> = self.tree.children(ROOT).to_vec();
            let Some(base_index) = children.iter().position(|&c| c == window) else {
                return;
            };
            let mut changed = false;
            for (index, &child) in children.iter().enumerate() {
                if index < base_index && self.tree.popup_parent_window(child) == Some(window) {
                    self.move_window_to_front(child);
                    changed = true;
                    break;
                }
            }
            if !changed {
                return;
            }
        }
    }

    /// Removes `window` and its subtree. Focus and drag state referencing
    /// anything inside the window are cleared first so no stale ids survive.
    pub fn dispose_window(&mut self, window: WidgetId) -> Result<(), ScreenError> {
        if !self.tree.is_window(window) {
            return Err(WidgetError::NotAWindow { id: window }.into());
        }
        if self
            .focus_path
            .iter()
            .any(|&w| self.tree.is_descendant_of(w, window))
        {
            self.focus_path.clear();
        }
        if let Some(drag) = self.drag_widget {
            if self.tree.is_descendant_of(drag, window) {
                self.drag_widget = None;
                self.drag_active = false;
            }
        }
        self.tree.remove(window)?;
        self.pulse.mark_dirty();
        Ok(())
    }

    pub fn center_window(&mut self, window: WidgetId) -> Result<(), ScreenError> {
        let size = self.tree.size(window)?;
        self.tree.set_position(
            window,
            Point::new(
                (self.size.width - size.width) / 2.0,
                (self.size.height - size.height) / 2.0,
            ),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Paints one frame if the screen is dirty, clearing the dirty flag.
    pub fn draw_all(&mut self) {
        if !self.pulse.take_dirty() {
            return;
        }
        self.draw_setup();
        self.surface.clear(self.background);
        self.draw_widgets();
        self.surface.present();
    }

    fn draw_setup(&mut self) {
        let fb = self.backend.framebuffer_size();
        let window = self.backend.window_size();
        if !fb.is_empty() && !window.is_empty() {
            self.fb_extent = fb;
            self.size = Size::new(
                window.width as f32 / self.pixel_ratio,
                window.height as f32 / self.pixel_ratio,
            );
            if let Err(err) = self.tree.set_size(ROOT, self.size) {
                log::error!("root resize failed: {err}");
            }
        }
        self.surface.resize(self.fb_extent);
    }

    fn draw_widgets(&mut self) {
        self.vg
            .begin_frame(self.size.width, self.size.height, self.pixel_ratio);
        {
            let Self {
                tree,
                vg,
                surface,
                pixel_ratio,
                size,
                fb_extent,
                ..
            } = self;
            tree.draw_all(vg.as_mut(), surface.as_mut(), *pixel_ratio, *size, *fb_extent);
        }
        self.draw_tooltip();
        self.vg.end_frame();
    }

    fn draw_tooltip(&mut self) {
        let elapsed = self.last_interaction.elapsed().as_secs_f32();
        if elapsed <= TOOLTIP_DELAY {
            return;
        }
        let Some(widget) = self.tree.find_widget(self.mouse_pos) else {
            return;
        };
        let tooltip = self.tree.tooltip(widget);
        if tooltip.is_empty() {
            return;
        }
        let tooltip = tooltip.to_string();
        let abs = self.tree.absolute_position(widget);
        let widget_size = self.tree.size(widget).unwrap_or_default();
        let mut pos = Point::new(
            abs.x + widget_size.width / 2.0,
            abs.y + widget_size.height + 10.0,
        );

        let mut bounds = self.vg.text_bounds(pos, None, &tooltip);
        let mut half = bounds.size.width / 2.0;
        let mut wrap = None;
        if half > TOOLTIP_MAX_WIDTH / 2.0 {
            wrap = Some(TOOLTIP_MAX_WIDTH);
            bounds = self.vg.text_bounds(pos, wrap, &tooltip);
            half = bounds.size.width / 2.0;
        }
        // Keep the bubble on-screen near the left edge.
        let overflow = pos.x - half - 8.0;
        if overflow < 0.0 {
            pos.x -= overflow;
            bounds.origin.x -= overflow;
        }

        let alpha = (2.0 * (elapsed - TOOLTIP_DELAY)).min(1.0) * 0.8;
        self.vg.set_global_alpha(alpha);
        self.vg.fill_rounded_rect(
            Rect::new(
                bounds.origin - Point::new(4.0 + half, 4.0),
                Size::new(bounds.size.width + 8.0, bounds.size.height + 8.0),
            ),
            3.0,
            Color::BLACK,
        );
        let tip = Point::new(bounds.origin.x + bounds.size.width / 2.0 - half, bounds.origin.y);
        self.vg.fill_triangle(
            Point::new(tip.x, tip.y - 10.0),
            Point::new(tip.x + 7.0, tip.y + 1.0),
            Point::new(tip.x - 7.0, tip.y + 1.0),
            Color::BLACK,
        );
        self.vg
            .draw_text_box(pos - Point::new(half, 0.0), wrap, &tooltip, Color::WHITE);
        self.vg.set_global_alpha(1.0);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn touch_interaction(&mut self) {
        self.last_interaction = Instant::now();
        self.pulse.touch(self.last_interaction);
    }

    fn refresh_cursor(&mut self, widget: WidgetId) {
        let hint = self.tree.cursor(widget);
        if hint != self.active_cursor {
            self.active_cursor = hint;
            self.backend.set_cursor(hint);
        }
    }

    /// True when a modal window sits directly under the root on the focus
    /// path and `p` lies outside it.
    fn modal_blocks(&self, p: Point) -> bool {
        if self.focus_path.len() < 2 {
            return false;
        }
        let below_root = self.focus_path[self.focus_path.len() - 2];
        self.tree.is_modal_window(below_root) && !self.tree.contains_absolute(below_root, p)
    }

    fn update_tooltip_probe(&mut self) {
        let hover = self
            .tree
            .find_widget(self.mouse_pos)
            .is_some_and(|w| !self.tree.tooltip(w).is_empty());
        self.pulse.set_tooltip_hover(hover);
    }

    fn finish_dispatch(&mut self, mut requests: Vec<ScreenRequest>, handled: bool) {
        if handled {
            self.pulse.mark_dirty();
        }
        self.apply_queue(&mut requests);
        self.requests = requests;
    }

    /// Applies queued handler requests in submission order. Requests issued
    /// while applying (focus handlers raising windows and so on) run within
    /// their own nested queue.
    fn apply_queue(&mut self, requests: &mut Vec<ScreenRequest>) {
        let mut index = 0;
        while index < requests.len() {
            let request = requests[index];
            index += 1;
            match request {
                ScreenRequest::Focus(target) => self.update_focus(target),
                ScreenRequest::Redraw => self.pulse.mark_dirty(),
                ScreenRequest::MoveToFront(window) => self.move_window_to_front(window),
                ScreenRequest::DisposeWindow(window) => {
                    if let Err(err) = self.dispose_window(window) {
                        log::error!("window disposal request failed: {err}");
                    }
                }
            }
        }
        requests.clear();
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("caption", &self.caption)
            .field("size", &self.size)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}
