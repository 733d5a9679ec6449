//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! Runtime code is responsible for translating platform events into `InputEvent`s
//! and queueing them.

mod queue;
mod types;

pub(crate) mod platform {
    pub(crate) mod winit;
}

pub use queue::EventQueue;
pub use types::{InputEvent, Key, KeyState};
