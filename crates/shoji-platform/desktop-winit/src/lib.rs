//! Winit adapter: implements the core window-backend contract over a winit
//! window and translates winit events into screen dispatch calls.
//!
//! The event loop itself stays with the application; per window it keeps one
//! [`WinitBackend`] (handed to the screen) and one [`WinitEventBridge`]
//! (fed from its `WindowEvent` stream).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use shoji_core::{Cursor, Key, KeyboardEvent, Modifiers, MouseButton, PixelExtent, Screen,
    WindowBackend, WindowHandle};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key as WinitKey, ModifiersState, NamedKey};
use winit::window::{CursorIcon, Window, WindowId};

/// Scroll distance, in logical units, one wheel line maps to.
const PIXELS_PER_LINE: f64 = 16.0;

pub struct WinitBackend {
    window: Arc<Window>,
    handle: WindowHandle,
    close: Arc<AtomicBool>,
    waker: Arc<dyn Fn() + Send + Sync>,
}

impl WinitBackend {
    /// Wraps `window`; `waker` must wake the blocked event loop from any
    /// thread (typically an `EventLoopProxy` sending a user event).
    pub fn new(window: Arc<Window>, waker: Arc<dyn Fn() + Send + Sync>) -> Self {
        static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
        Self {
            window,
            handle: WindowHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            close: Arc::new(AtomicBool::new(false)),
            waker,
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Flag flipped by the event bridge when the user asks the window to
    /// close.
    pub fn close_signal(&self) -> Arc<AtomicBool> {
        self.close.clone()
    }
}

impl WindowBackend for WinitBackend {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn window_size(&self) -> PixelExtent {
        let size = self.window.inner_size();
        PixelExtent::new(size.width, size.height)
    }

    fn framebuffer_size(&self) -> PixelExtent {
        let size = self.window.inner_size();
        PixelExtent::new(size.width, size.height)
    }

    fn content_scale(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn set_window_size(&mut self, size: PixelExtent) {
        let _ = self
            .window
            .request_inner_size(PhysicalSize::new(size.width, size.height));
    }

    fn set_caption(&mut self, caption: &str) {
        self.window.set_title(caption);
    }

    fn set_visible(&mut self, visible: bool) {
        self.window.set_visible(visible);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.window.set_cursor(cursor_icon(cursor));
    }

    fn close_requested(&self) -> bool {
        self.close.load(Ordering::Acquire)
    }

    fn redraw_waker(&self) -> Arc<dyn Fn() + Send + Sync> {
        self.waker.clone()
    }
}

fn cursor_icon(cursor: Cursor) -> CursorIcon {
    match cursor {
        Cursor::Arrow => CursorIcon::Default,
        Cursor::Hand => CursorIcon::Pointer,
        Cursor::Crosshair => CursorIcon::Crosshair,
        Cursor::Text => CursorIcon::Text,
        Cursor::ResizeHorizontal => CursorIcon::EwResize,
        Cursor::ResizeVertical => CursorIcon::NsResize,
    }
}

pub fn translate_mouse_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Back => MouseButton::Other(3),
        winit::event::MouseButton::Forward => MouseButton::Other(4),
        winit::event::MouseButton::Other(n) => MouseButton::Other(n.min(u8::MAX as u16) as u8),
    }
}

pub fn translate_modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        shift: state.shift_key(),
        ctrl: state.control_key(),
        alt: state.alt_key(),
        meta: state.super_key(),
    }
}

pub fn translate_key(logical: &WinitKey) -> Key {
    match logical {
        WinitKey::Named(named) => match named {
            NamedKey::Enter => Key::Enter,
            NamedKey::Tab => Key::Tab,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Delete => Key::Delete,
            NamedKey::Escape => Key::Escape,
            NamedKey::Space => Key::Space,
            NamedKey::ArrowUp => Key::ArrowUp,
            NamedKey::ArrowDown => Key::ArrowDown,
            NamedKey::ArrowLeft => Key::ArrowLeft,
            NamedKey::ArrowRight => Key::ArrowRight,
            NamedKey::Home => Key::Home,
            NamedKey::End => Key::End,
            NamedKey::PageUp => Key::PageUp,
            NamedKey::PageDown => Key::PageDown,
            _ => Key::Unidentified,
        },
        WinitKey::Character(text) => text
            .chars()
            .next()
            .map(Key::Character)
            .unwrap_or(Key::Unidentified),
        _ => Key::Unidentified,
    }
}

/// Per-window event translator. Feed it every `WindowEvent` for the window
/// whose screen it serves.
pub struct WinitEventBridge {
    modifiers: Modifiers,
    close: Arc<AtomicBool>,
}

impl WinitEventBridge {
    pub fn new(close: Arc<AtomicBool>) -> Self {
        Self {
            modifiers: Modifiers::NONE,
            close,
        }
    }

    pub fn dispatch(&mut self, screen: &mut Screen, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close.store(true, Ordering::Release);
            }
            WindowEvent::CursorMoved { position, .. } => {
                screen.cursor_moved(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                screen.mouse_button(
                    translate_mouse_button(*button),
                    *state == ElementState::Pressed,
                    self.modifiers,
                );
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(x, y) => {
                    screen.scroll(*x as f64, *y as f64);
                }
                MouseScrollDelta::PixelDelta(position) => {
                    screen.scroll(position.x / PIXELS_PER_LINE, position.y / PIXELS_PER_LINE);
                }
            },
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                screen.keyboard(KeyboardEvent {
                    key: translate_key(&event.logical_key),
                    scancode: 0,
                    pressed,
                    modifiers: self.modifiers,
                });
                if pressed {
                    if let Some(text) = event.text.as_ref() {
                        for ch in text.chars().filter(|ch| !ch.is_control()) {
                            screen.character(ch);
                        }
                    }
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = translate_modifiers(modifiers.state());
            }
            WindowEvent::Focused(focused) => {
                screen.window_focus_changed(*focused);
            }
            WindowEvent::Resized(_) => {
                screen.framebuffer_resized();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                screen.content_scale_changed();
            }
            WindowEvent::DroppedFile(path) => {
                screen.files_dropped(std::slice::from_ref(path));
            }
            WindowEvent::RedrawRequested => {
                screen.redraw();
            }
            _ => {}
        }
    }
}
