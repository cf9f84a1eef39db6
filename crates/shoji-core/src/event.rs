//! Platform-independent input event types.
//!
//! The backend adapter translates its native events into these before they
//! reach the screen dispatcher, so the core never depends on a windowing
//! crate.

/// A mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl MouseButton {
    fn bit(self) -> u32 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Right => 1 << 1,
            MouseButton::Middle => 1 << 2,
            MouseButton::Other(n) => 1u32 << (3 + (n as u32 % 29)),
        }
    }

    /// The two button classes that start and end drags.
    pub fn starts_drag(self) -> bool {
        matches!(self, MouseButton::Left | MouseButton::Right)
    }
}

/// Bit-mask of currently pressed mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseButtons(u32);

impl MouseButtons {
    pub const NONE: MouseButtons = MouseButtons(0);

    pub fn insert(&mut self, button: MouseButton) {
        self.0 |= button.bit();
    }

    pub fn remove(&mut self, button: MouseButton) {
        self.0 &= !button.bit();
    }

    pub fn contains(&self, button: MouseButton) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Shift key is pressed.
    pub shift: bool,
    /// Control key is pressed.
    pub ctrl: bool,
    /// Alt key is pressed (Option on macOS).
    pub alt: bool,
    /// Meta/Super key is pressed (Windows key, Cmd on macOS).
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers pressed.
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Returns true if any modifier is pressed.
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }

    /// Returns true if Ctrl (or Cmd on macOS) is pressed.
    pub fn command_or_ctrl(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            self.meta
        }
        #[cfg(not(target_os = "macos"))]
        {
            self.ctrl
        }
    }
}

/// Physical key identity, independent of keyboard layout.
///
/// Only the keys the core and common widgets route on are named; anything
/// else arrives as `Unidentified` with the backend scancode preserved in the
/// keyboard event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Character(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Unidentified,
}

/// A raw keyboard event as delivered along the focus path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardEvent {
    pub key: Key,
    /// Backend scancode, for widgets that want the physical key.
    pub scancode: u32,
    pub pressed: bool,
    pub modifiers: Modifiers,
}

/// Cursor icon hint a widget exposes for the pointer hovering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Arrow,
    Hand,
    Crosshair,
    Text,
    ResizeHorizontal,
    ResizeVertical,
}
