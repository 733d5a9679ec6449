//! In-memory `GraphicsContext` that records what a lesson asks of the GPU.
//!
//! Shaders go through the same compile and link checks as on a device, so a
//! lesson that runs here cleanly will also build its pipelines on hardware.

use image::{Rgba, RgbaImage, RgbImage};

use crate::device::{check_support, AdapterCaps, ContextRequest};

use super::context::{
    check_draw_bindings, ClearColor, DrawCall, GraphicsContext, PolygonMode, ProgramDesc,
    ShaderStage, TextureFilter, VertexArrayDesc, Viewport,
};
use super::error::{GfxError, GfxResult};
use super::handle::{Handle, ResourceKind};
use super::registry::Registry;
use super::shader::{self, CompiledShader};

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Create(Handle),
    Release(Handle),
    Viewport(Viewport),
    Clear(ClearColor),
    Write {
        buffer: Handle,
        offset: u64,
        data: Vec<u8>,
    },
    Draw(DrawCall),
    ReadPixels { width: u32, height: u32 },
    Present,
}

#[derive(Debug)]
enum Tracked {
    VertexArray(VertexArrayDesc),
    Shader(CompiledShader),
    Program { log: Option<String>, wireframe: bool },
    UniformBuffer(Vec<u8>),
    Texture { width: u32, height: u32 },
}

#[derive(Debug)]
pub struct TrackingContext {
    request: ContextRequest,
    framebuffer: (u32, u32),
    alignment: u64,
    objects: Registry<Tracked>,
    clear_color: ClearColor,
    fail_readback: bool,
    ops: Vec<Op>,
}

impl TrackingContext {
    /// Creates a context the way a device bootstrap would, rejecting
    /// requests `caps` cannot satisfy.
    pub fn bootstrap(
        request: ContextRequest,
        caps: AdapterCaps,
        framebuffer: (u32, u32),
    ) -> GfxResult<Self> {
        check_support(&request, &caps)?;
        Ok(Self {
            request,
            framebuffer,
            alignment: 16,
            objects: Registry::default(),
            clear_color: ClearColor::TRANSPARENT,
            fail_readback: false,
            ops: Vec::new(),
        })
    }

    pub fn with_uniform_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Makes every following `read_pixels` fail.
    pub fn fail_readback(&mut self, fail: bool) {
        self.fail_readback = fail;
    }

    /// Simulates the window system resizing the drawable.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer = (width, height);
    }

    pub fn request(&self) -> ContextRequest {
        self.request
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Handles in creation order.
    pub fn created(&self) -> Vec<Handle> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Create(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    /// Handles in release order.
    pub fn released(&self) -> Vec<Handle> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Release(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Viewport(vp) => Some(*vp),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Present)).count()
    }

    /// Current contents of a live uniform buffer.
    pub fn buffer_contents(&self, buffer: Handle) -> GfxResult<&[u8]> {
        match self.objects.get(buffer, ResourceKind::UniformBuffer)? {
            Tracked::UniformBuffer(data) => Ok(data),
            _ => Err(GfxError::InvalidHandle(buffer)),
        }
    }

    /// Dimensions of a live texture as uploaded.
    pub fn texture_size(&self, texture: Handle) -> GfxResult<(u32, u32)> {
        match self.objects.get(texture, ResourceKind::Texture)? {
            Tracked::Texture { width, height } => Ok((*width, *height)),
            _ => Err(GfxError::InvalidHandle(texture)),
        }
    }

    fn create(&mut self, kind: ResourceKind, object: Tracked) -> Handle {
        let handle = self.objects.insert(kind, object);
        self.ops.push(Op::Create(handle));
        handle
    }

    /// Shader referenced by a program; the invalid handle links as a missing stage.
    fn attached_shader(&self, handle: Handle) -> GfxResult<Option<&CompiledShader>> {
        if !handle.is_valid() {
            return Ok(None);
        }
        match self.objects.get(handle, ResourceKind::Shader)? {
            Tracked::Shader(compiled) => Ok(Some(compiled)),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    fn buffer_len(&self, buffer: Handle) -> GfxResult<u64> {
        Ok(self.buffer_contents(buffer)?.len() as u64)
    }
}

impl GraphicsContext for TrackingContext {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer
    }

    fn uniform_offset_alignment(&self) -> u64 {
        self.alignment
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> GfxResult<Handle> {
        Ok(self.create(ResourceKind::VertexArray, Tracked::VertexArray(*desc)))
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> GfxResult<Handle> {
        let compiled = shader::compile(stage, source).map_err(|log| GfxError::Compile { stage, log })?;
        Ok(self.create(ResourceKind::Shader, Tracked::Shader(compiled)))
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> GfxResult<Handle> {
        let vertex_array = match self.objects.get(desc.vertex_array, ResourceKind::VertexArray)? {
            Tracked::VertexArray(va) => *va,
            _ => return Err(GfxError::InvalidHandle(desc.vertex_array)),
        };
        let vertex = self.attached_shader(desc.vertex)?;
        let fragment = self.attached_shader(desc.fragment)?;

        let log = shader::link(vertex, fragment, &vertex_array).err();
        let wireframe = desc.wireframe.is_some() && self.request.wireframe;
        Ok(self.create(ResourceKind::Program, Tracked::Program { log, wireframe }))
    }

    fn program_info_log(&self, program: Handle) -> Option<String> {
        match self.objects.get(program, ResourceKind::Program) {
            Ok(Tracked::Program { log, .. }) => log.clone(),
            _ => None,
        }
    }

    fn create_uniform_buffer(&mut self, size: u64) -> GfxResult<Handle> {
        let data = vec![0; size as usize];
        Ok(self.create(ResourceKind::UniformBuffer, Tracked::UniformBuffer(data)))
    }

    fn create_texture(&mut self, image: &RgbImage, _filter: TextureFilter) -> GfxResult<Handle> {
        let (width, height) = image.dimensions();
        Ok(self.create(ResourceKind::Texture, Tracked::Texture { width, height }))
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.ops.push(Op::Viewport(viewport));
    }

    fn clear(&mut self, color: ClearColor) -> GfxResult<()> {
        self.clear_color = color;
        self.ops.push(Op::Clear(color));
        Ok(())
    }

    fn write_buffer(&mut self, buffer: Handle, offset: u64, data: &[u8]) -> GfxResult<()> {
        let Tracked::UniformBuffer(contents) = self.objects.get_mut(buffer, ResourceKind::UniformBuffer)? else {
            return Err(GfxError::InvalidHandle(buffer));
        };
        let size = contents.len() as u64;
        let end = offset.checked_add(data.len() as u64).filter(|end| *end <= size);
        let Some(end) = end else {
            return Err(GfxError::BufferOverflow {
                buffer,
                offset,
                len: data.len(),
                size,
            });
        };
        let len = data.len() as u64;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GfxError::Misaligned {
                buffer,
                offset,
                alignment: wgpu::COPY_BUFFER_ALIGNMENT,
            });
        }
        contents[offset as usize..end as usize].copy_from_slice(data);
        self.ops.push(Op::Write {
            buffer,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> GfxResult<()> {
        let (linked, has_wireframe) = match self.objects.get(call.program, ResourceKind::Program)? {
            Tracked::Program { log, wireframe } => (log.is_none(), *wireframe),
            _ => return Err(GfxError::InvalidHandle(call.program)),
        };
        let vertex_array = match self.objects.get(call.vertex_array, ResourceKind::VertexArray)? {
            Tracked::VertexArray(va) => *va,
            _ => return Err(GfxError::InvalidHandle(call.vertex_array)),
        };
        let buffer_size = call
            .uniforms
            .map(|range| self.buffer_len(range.buffer))
            .transpose()?;
        if let Some(texture) = call.texture {
            self.objects.get(texture, ResourceKind::Texture)?;
        }
        check_draw_bindings(call, &vertex_array, buffer_size, self.alignment)?;
        if call.polygon_mode == PolygonMode::Line && !self.request.wireframe {
            return Err(GfxError::Unsupported {
                request: self.request,
                reason: "line polygon mode was not requested".to_string(),
            });
        }

        if !linked {
            log::debug!("skipping draw with unlinked {}", call.program);
            return Ok(());
        }
        if call.polygon_mode == PolygonMode::Line && !has_wireframe {
            return Err(GfxError::Link {
                log: format!("{} was linked without a wireframe pipeline", call.program),
            });
        }
        self.ops.push(Op::Draw(*call));
        Ok(())
    }

    fn read_pixels(&mut self) -> GfxResult<RgbaImage> {
        let (width, height) = self.framebuffer;
        if self.fail_readback {
            return Err(GfxError::Readback("readback disabled".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(GfxError::Readback("framebuffer is empty".to_string()));
        }
        self.ops.push(Op::ReadPixels { width, height });

        let c = self.clear_color;
        let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Ok(RgbaImage::from_pixel(
            width,
            height,
            Rgba([to_u8(c.r), to_u8(c.g), to_u8(c.b), to_u8(c.a)]),
        ))
    }

    fn present(&mut self) -> GfxResult<()> {
        self.ops.push(Op::Present);
        Ok(())
    }

    fn release(&mut self, handle: Handle) -> GfxResult<()> {
        self.objects.remove(handle)?;
        self.ops.push(Op::Release(handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Profile;
    use crate::gfx::BufferRange;

    fn ctx() -> TrackingContext {
        TrackingContext::bootstrap(
            ContextRequest::new(4, 6, Profile::Core).with_wireframe(),
            AdapterCaps::desktop(),
            (640, 480),
        )
        .unwrap()
    }

    #[test]
    fn unsupported_request_fails_bootstrap() {
        let err = TrackingContext::bootstrap(
            ContextRequest::new(3, 0, Profile::Core),
            AdapterCaps::desktop(),
            (640, 480),
        )
        .unwrap_err();
        assert!(matches!(err, GfxError::Unsupported { .. }));
    }

    #[test]
    fn write_out_of_bounds_is_rejected() {
        let mut ctx = ctx();
        let buf = ctx.create_uniform_buffer(80).unwrap();
        assert!(ctx.write_buffer(buf, 0, &[1; 80]).is_ok());
        assert!(matches!(
            ctx.write_buffer(buf, 16, &[1; 80]),
            Err(GfxError::BufferOverflow { .. })
        ));
        assert_eq!(ctx.buffer_contents(buf).unwrap(), &[1; 80][..]);
    }

    #[test]
    fn unaligned_write_is_rejected() {
        let mut ctx = ctx();
        let buf = ctx.create_uniform_buffer(16).unwrap();
        assert!(matches!(
            ctx.write_buffer(buf, 1, &[7; 3]),
            Err(GfxError::Misaligned { offset: 1, .. })
        ));
        assert!(matches!(
            ctx.write_buffer(buf, 4, &[7; 6]),
            Err(GfxError::Misaligned { .. })
        ));
        assert_eq!(ctx.buffer_contents(buf).unwrap(), &[0; 16][..]);
        assert!(ctx.write_buffer(buf, 4, &[7; 8]).is_ok());
    }

    #[test]
    fn use_after_release_is_an_error() {
        let mut ctx = ctx();
        let buf = ctx.create_uniform_buffer(16).unwrap();
        ctx.release(buf).unwrap();
        assert!(matches!(ctx.write_buffer(buf, 0, &[0; 4]), Err(GfxError::Released(_))));
        assert!(matches!(ctx.release(buf), Err(GfxError::Released(_))));
        assert_eq!(ctx.released(), vec![buf]);
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn misaligned_range_is_rejected() {
        let mut ctx = ctx().with_uniform_alignment(256);
        let va = ctx
            .create_vertex_array(&VertexArrayDesc {
                uniform_block: Some(80),
                sampled_texture: false,
            })
            .unwrap();
        let vs = ctx
            .create_shader(
                ShaderStage::Vertex,
                "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
            )
            .unwrap();
        let fs = ctx
            .create_shader(
                ShaderStage::Fragment,
                "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
            )
            .unwrap();
        let program = ctx
            .create_program(&ProgramDesc {
                vertex: vs,
                fragment: fs,
                vertex_array: va,
                depth_test: true,
                wireframe: None,
            })
            .unwrap();
        assert_eq!(ctx.program_info_log(program), None);

        let buf = ctx.create_uniform_buffer(160).unwrap();
        let call = DrawCall {
            program,
            vertex_array: va,
            uniforms: Some(BufferRange {
                buffer: buf,
                offset: 80,
                size: 80,
            }),
            texture: None,
            polygon_mode: PolygonMode::Fill,
            vertex_count: 3,
        };
        assert!(matches!(ctx.draw(&call), Err(GfxError::Misaligned { .. })));
        assert!(ctx.draws().is_empty());
    }

    #[test]
    fn readback_matches_framebuffer() {
        let mut ctx = ctx();
        ctx.resize(32, 16);
        let img = ctx.read_pixels().unwrap();
        assert_eq!(img.dimensions(), (32, 16));

        ctx.fail_readback(true);
        assert!(matches!(ctx.read_pixels(), Err(GfxError::Readback(_))));
    }
}
