//! Ember engine crate.
//!
//! Window, GPU context and lesson runtime shared by the lesson binaries.
//! Lessons are described as data (`lesson::LessonSpec`) and run either on a
//! window (`window::Runtime`) or headless against `gfx::TrackingContext`.

pub mod capture;
pub mod device;
pub mod gfx;
pub mod input;
pub mod lesson;
pub mod logging;
pub mod time;
pub mod window;
