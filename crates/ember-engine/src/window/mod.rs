//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and drives one lesson session on
//! the window's GPU context.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
