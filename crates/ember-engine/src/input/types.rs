use std::fmt;

/// Keyboard key identifier.
///
/// Only the keys the lessons bind (plus a few common ones) have variants.
/// Everything else maps to `Key::Unknown(u32)` with the platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,

    // Function keys
    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    /// Platform-dependent key not yet represented here.
    Unknown(u32),
}

/// Key transition reported by the platform.
///
/// `Repeat` is kept apart from `Pressed` so that handlers matching on a press
/// fire once per physical press, not once per auto-repeat.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Repeat,
    Released,
}

/// Platform-agnostic input events emitted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key { key: Key, state: KeyState },

    /// The user asked the window system to close the window.
    CloseRequested,

    /// Framebuffer size changed, in physical pixels.
    Resized { width: u32, height: u32 },
}

impl InputEvent {
    /// Shorthand for a key press event.
    pub fn pressed(key: Key) -> Self {
        Self::Key {
            key,
            state: KeyState::Pressed,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
