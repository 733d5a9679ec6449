use std::fmt;

use image::{RgbImage, RgbaImage};

use super::error::{GfxError, GfxResult};
use super::handle::Handle;

/// Programmable pipeline stage a shader is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// Input interface of a program.
///
/// Vertices are generated in the shader from the vertex index, so the only
/// inputs are bound resources:
/// - binding 0: uniform block of `uniform_block` bytes (vertex stage)
/// - binding 1: 2D texture, binding 2: its sampler (fragment stage)
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct VertexArrayDesc {
    pub uniform_block: Option<u64>,
    pub sampled_texture: bool,
}

/// Depth offset applied to wireframe rasterization, in the
/// `factor * slope + units * r` form.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

/// Inputs to program linking.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProgramDesc {
    pub vertex: Handle,
    pub fragment: Handle,
    pub vertex_array: Handle,
    pub depth_test: bool,

    /// `Some` when the program is also drawn as a wireframe.
    pub wireframe: Option<PolygonOffset>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Minification and magnification filters of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureFilter {
    pub min: Filter,
    pub mag: Filter,
}

impl TextureFilter {
    pub const LINEAR: Self = Self {
        min: Filter::Linear,
        mag: Filter::Linear,
    };
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Sub-range of a uniform buffer bound to binding 0 for a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferRange {
    pub buffer: Handle,
    pub offset: u64,
    pub size: u64,
}

/// One non-indexed draw of `vertex_count` vertices.
///
/// Every binding is named explicitly; nothing is inherited from previous draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub program: Handle,
    pub vertex_array: Handle,
    pub uniforms: Option<BufferRange>,
    pub texture: Option<Handle>,
    pub polygon_mode: PolygonMode,
    pub vertex_count: u32,
}

/// Checks the bindings of `call` against its vertex array.
///
/// `buffer_size` is the size of the buffer named by `call.uniforms`.
pub(crate) fn check_draw_bindings(
    call: &DrawCall,
    vertex_array: &VertexArrayDesc,
    buffer_size: Option<u64>,
    alignment: u64,
) -> GfxResult<()> {
    let mismatch = |reason: &str| GfxError::Binding {
        vertex_array: call.vertex_array,
        reason: reason.to_string(),
    };

    match (vertex_array.uniform_block, call.uniforms) {
        (Some(_), None) => return Err(mismatch("uniform block at binding 0 is not bound")),
        (None, Some(_)) => return Err(mismatch("no uniform block is declared")),
        (Some(block), Some(range)) => {
            if range.size < block {
                return Err(mismatch("bound range is smaller than the uniform block"));
            }
            if range.offset % alignment != 0 {
                return Err(GfxError::Misaligned {
                    buffer: range.buffer,
                    offset: range.offset,
                    alignment,
                });
            }
            let size = buffer_size.unwrap_or(0);
            if range.offset.saturating_add(range.size) > size {
                return Err(GfxError::BufferOverflow {
                    buffer: range.buffer,
                    offset: range.offset,
                    len: range.size as usize,
                    size,
                });
            }
        }
        (None, None) => {}
    }

    match (vertex_array.sampled_texture, call.texture) {
        (true, None) => Err(mismatch("texture at binding 1 is not bound")),
        (false, Some(_)) => Err(mismatch("no sampled texture is declared")),
        _ => Ok(()),
    }
}

/// Rendering rectangle in framebuffer pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport covering a whole framebuffer of the given size.
    pub fn covering((width, height): (u32, u32)) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; 1.0 for an empty viewport.
    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl ClearColor {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

/// The GPU context a lesson renders through.
///
/// One thread owns the context. Objects live until `release`; the caller is
/// responsible for releasing every handle it was given, once.
pub trait GraphicsContext {
    /// Current drawable size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Required alignment of `BufferRange::offset`.
    fn uniform_offset_alignment(&self) -> u64;

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> GfxResult<Handle>;

    /// Compiles WGSL `source` for `stage`.
    ///
    /// On failure nothing is left allocated and the error carries the
    /// compiler diagnostics.
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> GfxResult<Handle>;

    /// Links a program. Link problems do not fail this call; they are reported
    /// by `program_info_log` and the program draws nothing.
    fn create_program(&mut self, desc: &ProgramDesc) -> GfxResult<Handle>;

    /// Link diagnostics, `None` when the program linked cleanly.
    fn program_info_log(&self, program: Handle) -> Option<String>;

    /// Allocates a fixed-size uniform buffer with rewritable contents.
    fn create_uniform_buffer(&mut self, size: u64) -> GfxResult<Handle>;

    /// Uploads an RGB image as a single-mip 2D texture.
    fn create_texture(&mut self, image: &RgbImage, filter: TextureFilter) -> GfxResult<Handle>;

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears colour and depth of the current frame.
    fn clear(&mut self, color: ClearColor) -> GfxResult<()>;

    /// Writes `data` at `offset`. Draws issued before the write observe the
    /// old contents.
    fn write_buffer(&mut self, buffer: Handle, offset: u64, data: &[u8]) -> GfxResult<()>;

    fn draw(&mut self, call: &DrawCall) -> GfxResult<()>;

    /// Reads the current frame's colour buffer as RGBA8, top row first.
    fn read_pixels(&mut self) -> GfxResult<RgbaImage>;

    /// Presents the current frame.
    fn present(&mut self) -> GfxResult<()>;

    fn release(&mut self, handle: Handle) -> GfxResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::handle::ResourceKind;

    fn draw(uniforms: Option<BufferRange>, texture: Option<Handle>) -> DrawCall {
        DrawCall {
            program: Handle::invalid(ResourceKind::Program),
            vertex_array: Handle::invalid(ResourceKind::VertexArray),
            uniforms,
            texture,
            polygon_mode: PolygonMode::Fill,
            vertex_count: 36,
        }
    }

    fn range(offset: u64) -> Option<BufferRange> {
        Some(BufferRange {
            buffer: Handle::invalid(ResourceKind::UniformBuffer),
            offset,
            size: 80,
        })
    }

    #[test]
    fn bindings_follow_the_vertex_array() {
        let va = VertexArrayDesc {
            uniform_block: Some(80),
            sampled_texture: true,
        };
        let texture = Some(Handle::invalid(ResourceKind::Texture));

        assert!(check_draw_bindings(&draw(range(0), texture), &va, Some(160), 16).is_ok());
        assert!(check_draw_bindings(&draw(range(80), texture), &va, Some(160), 16).is_ok());
        assert!(matches!(
            check_draw_bindings(&draw(range(0), None), &va, Some(160), 16),
            Err(GfxError::Binding { .. })
        ));
        assert!(matches!(
            check_draw_bindings(&draw(None, texture), &va, None, 16),
            Err(GfxError::Binding { .. })
        ));
        assert!(matches!(
            check_draw_bindings(&draw(range(80), texture), &va, Some(160), 256),
            Err(GfxError::Misaligned { .. })
        ));
        assert!(matches!(
            check_draw_bindings(&draw(range(160), texture), &va, Some(160), 16),
            Err(GfxError::BufferOverflow { .. })
        ));
    }

    #[test]
    fn viewport_aspect() {
        let vp = Viewport::covering((1920, 1080));
        assert!((vp.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert!(!vp.is_empty());
    }

    #[test]
    fn empty_viewport_has_unit_aspect() {
        let vp = Viewport::covering((800, 0));
        assert!(vp.is_empty());
        assert_eq!(vp.aspect(), 1.0);
    }
}
