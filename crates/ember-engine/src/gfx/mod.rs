//! GPU object model used by the lessons.
//!
//! `GraphicsContext` is the seam: `WgpuContext` renders through a device,
//! `TrackingContext` records calls so lessons can run without one.

mod context;
mod error;
mod handle;
mod registry;
pub mod shader;
pub mod texture;
mod tracking;
mod wgpu_context;

pub use context::{
    BufferRange, ClearColor, DrawCall, Filter, GraphicsContext, PolygonMode, PolygonOffset,
    ProgramDesc, ShaderStage, TextureFilter, VertexArrayDesc, Viewport,
};
pub use error::{GfxError, GfxResult};
pub use handle::{Handle, ResourceKind};
pub use tracking::{Op, TrackingContext};
pub use wgpu_context::WgpuContext;
