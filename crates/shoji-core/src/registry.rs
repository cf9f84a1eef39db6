//! Registry of live screens, keyed by their backend window handle.
//!
//! The main loop iterates the registry each frame; the redraw pacing thread
//! never sees screens, only the shared pulse list the registry keeps in sync
//! as screens come and go.

use std::sync::{Arc, Mutex};

use crate::backend::WindowHandle;
use crate::screen::{Screen, ScreenPulse};

pub struct ScreenRegistry {
    screens: Vec<Screen>,
    pulses: Arc<Mutex<Vec<Arc<ScreenPulse>>>>,
}

impl ScreenRegistry {
    pub fn new() -> Self {
        Self {
            screens: Vec::new(),
            pulses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Registers a screen; a previous screen with the same handle is
    /// replaced.
    pub fn insert(&mut self, screen: Screen) -> WindowHandle {
        let handle = screen.handle();
        self.screens.retain(|s| s.handle() != handle);
        self.screens.push(screen);
        self.sync_pulses();
        handle
    }

    pub fn remove(&mut self, handle: WindowHandle) -> Option<Screen> {
        let index = self.screens.iter().position(|s| s.handle() == handle)?;
        let screen = self.screens.remove(index);
        self.sync_pulses();
        Some(screen)
    }

    pub fn get(&self, handle: WindowHandle) -> Option<&Screen> {
        self.screens.iter().find(|s| s.handle() == handle)
    }

    pub fn get_mut(&mut self, handle: WindowHandle) -> Option<&mut Screen> {
        self.screens.iter_mut().find(|s| s.handle() == handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Screen> {
        self.screens.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Screen> {
        self.screens.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// The pulse list shared with the pacing thread.
    pub(crate) fn shared_pulses(&self) -> Arc<Mutex<Vec<Arc<ScreenPulse>>>> {
        self.pulses.clone()
    }

    fn sync_pulses(&self) {
        let mut pulses = self
            .pulses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pulses.clear();
        pulses.extend(self.screens.iter().map(|s| s.pulse()));
    }
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        Self::new()
    }
}
