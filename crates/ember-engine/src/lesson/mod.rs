//! Lesson model: what a lesson creates, draws and listens for, and the
//! session that runs it against a `GraphicsContext`.

mod descriptor;
mod resources;
mod session;
pub mod transform;
mod uniforms;

pub use descriptor::{DrawPlan, LessonSpec, Pass, ResourceDesc, UniformUpdate, Validation};
pub use resources::ResourceSet;
pub use session::{LoopState, Session};
pub use uniforms::{PerFrameData, UniformSlots};
