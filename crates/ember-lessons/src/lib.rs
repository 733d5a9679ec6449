//! The lessons, each described as a `LessonSpec`.
//!
//! Every binary in `src/bin` initialises logging and hands its lesson to
//! [`run`]. Tests run the same specs headless on a `TrackingContext`.

use anyhow::Result;
use ember_engine::device::GpuInit;
use ember_engine::lesson::LessonSpec;
use ember_engine::window::Runtime;

pub mod lessons;

pub use lessons::{glfw, maths, stb, triangle};

/// Opens the lesson window and blocks until the lesson closes.
pub fn run(lesson: LessonSpec) -> Result<()> {
    log::info!("starting lesson {}", lesson.name);
    Runtime::run(lesson, GpuInit::default())
}
