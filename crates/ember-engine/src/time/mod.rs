//! Time subsystem.
//!
//! One `FrameClock` per render loop; its `elapsed()` seconds drive animation.

mod frame_clock;

pub use frame_clock::FrameClock;
