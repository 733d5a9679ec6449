//! GPU device + surface management.
//!
//! This module is responsible for:
//! - validating a `ContextRequest` against the adapter
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain) and depth buffer
//! - acquiring and presenting frames

mod error;
mod frame;
mod gpu;
mod init;
mod request;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use request::{check_support, AdapterCaps, ApiVersion, ContextRequest, Profile};
pub use surface::DEPTH_FORMAT;
