use std::path::PathBuf;

use crate::device::ContextRequest;

use super::context::ShaderStage;
use super::handle::Handle;

/// Errors reported at the `GraphicsContext` seam.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("context {request} is not supported: {reason}")]
    Unsupported {
        request: ContextRequest,
        reason: String,
    },

    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program failed to link:\n{log}")]
    Link { log: String },

    #[error("{0} does not refer to a live resource")]
    InvalidHandle(Handle),

    #[error("{0} was already released")]
    Released(Handle),

    #[error("write of {len} bytes at offset {offset} overflows {buffer} ({size} bytes)")]
    BufferOverflow {
        buffer: Handle,
        offset: u64,
        len: usize,
        size: u64,
    },

    #[error("offset {offset} into {buffer} is not a multiple of {alignment}")]
    Misaligned {
        buffer: Handle,
        offset: u64,
        alignment: u64,
    },

    #[error("draw does not match the interface of {vertex_array}: {reason}")]
    Binding { vertex_array: Handle, reason: String },

    #[error("failed to load texture {}: {source}", .path.display())]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("framebuffer readback failed: {0}")]
    Readback(String),

    #[error("surface failure: {0}")]
    Surface(String),
}

pub type GfxResult<T> = Result<T, GfxError>;
