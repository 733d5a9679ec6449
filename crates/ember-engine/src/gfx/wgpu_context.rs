//! `GraphicsContext` on top of wgpu.
//!
//! Draws are recorded and encoded lazily into one render pass per flush. A
//! flush happens before a buffer that pending draws read is rewritten, before
//! readback, before a release and at present, so every draw sees the buffer
//! contents that were current when it was issued.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::mpsc;

use image::{RgbImage, RgbaImage};
use winit::dpi::PhysicalSize;

use crate::device::{Gpu, GpuFrame, SurfaceErrorAction, DEPTH_FORMAT};

use super::context::{
    check_draw_bindings, BufferRange, ClearColor, DrawCall, Filter, GraphicsContext, PolygonMode,
    PolygonOffset, ProgramDesc, ShaderStage, TextureFilter, VertexArrayDesc, Viewport,
};
use super::error::{GfxError, GfxResult};
use super::handle::{Handle, ResourceKind};
use super::registry::Registry;
use super::shader::{self, CompiledShader, SAMPLER_BINDING, TEXTURE_BINDING, UNIFORM_BINDING};
use super::texture;

struct VertexArrayObject {
    desc: VertexArrayDesc,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

struct ShaderObject {
    compiled: CompiledShader,
    module: wgpu::ShaderModule,
}

struct ProgramObject {
    solid: Option<wgpu::RenderPipeline>,
    wireframe: Option<wgpu::RenderPipeline>,
    log: Option<String>,
}

struct BufferObject {
    buffer: wgpu::Buffer,
    size: u64,
}

struct TextureObject {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

enum GpuObject {
    VertexArray(VertexArrayObject),
    Shader(ShaderObject),
    Program(ProgramObject),
    UniformBuffer(BufferObject),
    Texture(TextureObject),
}

/// Everything a bind group is built from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct BindingKey {
    vertex_array: Handle,
    uniforms: Option<BufferRange>,
    texture: Option<Handle>,
}

impl BindingKey {
    fn references(&self, handle: Handle) -> bool {
        self.vertex_array == handle
            || self.uniforms.is_some_and(|r| r.buffer == handle)
            || self.texture == Some(handle)
    }
}

struct PendingDraw {
    program: Handle,
    mode: PolygonMode,
    bindings: BindingKey,
    vertex_count: u32,
    viewport: Viewport,
}

pub struct WgpuContext<'w> {
    gpu: Gpu<'w>,
    objects: Registry<GpuObject>,
    bind_groups: HashMap<BindingKey, wgpu::BindGroup>,

    /// Surface texture of the frame being rendered, acquired on first flush.
    frame: Option<GpuFrame>,

    viewport: Viewport,
    pending_clear: Option<ClearColor>,
    pending: Vec<PendingDraw>,
    warned_unlinked: HashSet<Handle>,
}

impl<'w> WgpuContext<'w> {
    pub fn new(gpu: Gpu<'w>) -> Self {
        let viewport = Viewport::covering((gpu.size().width, gpu.size().height));
        Self {
            gpu,
            objects: Registry::default(),
            bind_groups: HashMap::new(),
            frame: None,
            viewport,
            pending_clear: None,
            pending: Vec::new(),
            warned_unlinked: HashSet::new(),
        }
    }

    /// Follows a window resize. Work recorded for the current frame is dropped.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.pending.clear();
        self.pending_clear = None;
        self.frame = None;
        self.gpu.resize(size);
    }

    fn vertex_array(&self, handle: Handle) -> GfxResult<&VertexArrayObject> {
        match self.objects.get(handle, ResourceKind::VertexArray)? {
            GpuObject::VertexArray(va) => Ok(va),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    /// The invalid handle stands for a shader that failed to compile.
    fn attached_shader(&self, handle: Handle) -> GfxResult<Option<&ShaderObject>> {
        if !handle.is_valid() {
            return Ok(None);
        }
        match self.objects.get(handle, ResourceKind::Shader)? {
            GpuObject::Shader(shader) => Ok(Some(shader)),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    fn program(&self, handle: Handle) -> GfxResult<&ProgramObject> {
        match self.objects.get(handle, ResourceKind::Program)? {
            GpuObject::Program(program) => Ok(program),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    fn uniform_buffer(&self, handle: Handle) -> GfxResult<&BufferObject> {
        match self.objects.get(handle, ResourceKind::UniformBuffer)? {
            GpuObject::UniformBuffer(buffer) => Ok(buffer),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    fn texture(&self, handle: Handle) -> GfxResult<&TextureObject> {
        match self.objects.get(handle, ResourceKind::Texture)? {
            GpuObject::Texture(texture) => Ok(texture),
            _ => Err(GfxError::InvalidHandle(handle)),
        }
    }

    fn build_pipeline(
        &self,
        vertex_array: &VertexArrayObject,
        vertex: &ShaderObject,
        fragment: &ShaderObject,
        depth_test: bool,
        offset: Option<PolygonOffset>,
    ) -> wgpu::RenderPipeline {
        let (label, polygon_mode) = match offset {
            None => ("ember solid pipeline", wgpu::PolygonMode::Fill),
            Some(_) => ("ember wireframe pipeline", wgpu::PolygonMode::Line),
        };
        let bias = offset
            .map(|o| wgpu::DepthBiasState {
                constant: o.units as i32,
                slope_scale: o.factor,
                clamp: 0.0,
            })
            .unwrap_or_default();

        self.gpu
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&vertex_array.pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(vertex.compiled.entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(fragment.compiled.entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.gpu.surface_format(),
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },

                // The pass always carries a depth attachment; without depth
                // testing the pipeline neither tests nor writes it.
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_test,
                    depth_compare: if depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias,
                }),
                multisample: wgpu::MultisampleState::default(),

                multiview_mask: None,
                cache: None,
            })
    }

    fn ensure_bind_group(&mut self, key: BindingKey) -> GfxResult<()> {
        if self.bind_groups.contains_key(&key) {
            return Ok(());
        }

        let bind_group = {
            let layout = &self.vertex_array(key.vertex_array)?.bind_group_layout;
            let mut entries = Vec::with_capacity(3);
            if let Some(range) = key.uniforms {
                let buffer = self.uniform_buffer(range.buffer)?;
                entries.push(wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer.buffer,
                        offset: range.offset,
                        size: NonZeroU64::new(range.size),
                    }),
                });
            }
            if let Some(handle) = key.texture {
                let texture = self.texture(handle)?;
                entries.push(wgpu::BindGroupEntry {
                    binding: TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }

            self.gpu
                .device()
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("ember draw bind group"),
                    layout,
                    entries: &entries,
                })
        };

        self.bind_groups.insert(key, bind_group);
        Ok(())
    }

    /// Makes sure a surface texture is held. `false` means the frame is
    /// skipped (surface lost, outdated or minimized).
    fn ensure_frame(&mut self) -> GfxResult<bool> {
        if self.frame.is_some() {
            return Ok(true);
        }
        let size = self.gpu.size();
        if size.width == 0 || size.height == 0 {
            return Ok(false);
        }

        match self.gpu.acquire_frame() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(true)
            }
            Err(err) => {
                let message = err.to_string();
                match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("frame skipped: {message}");
                        Ok(false)
                    }
                    SurfaceErrorAction::Fatal => Err(GfxError::Surface(message)),
                }
            }
        }
    }

    /// Encodes the pending clear and draws into one pass and submits it.
    fn flush(&mut self) -> GfxResult<()> {
        if self.pending.is_empty() && self.pending_clear.is_none() {
            return Ok(());
        }
        if !self.ensure_frame()? {
            self.pending.clear();
            self.pending_clear = None;
            return Ok(());
        }
        let Some(frame) = self.frame.as_ref() else {
            return Ok(());
        };

        let clear = self.pending_clear.take();
        let target_width = frame.surface_texture.texture.width();
        let target_height = frame.surface_texture.texture.height();

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ember frame encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember lesson pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match clear {
                            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: c.r,
                                g: c.g,
                                b: c.b,
                                a: c.a,
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.gpu.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: match clear {
                            Some(_) => wgpu::LoadOp::Clear(1.0),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &self.pending {
                let pipeline = match self.program(draw.program) {
                    Ok(program) => match draw.mode {
                        PolygonMode::Fill => program.solid.as_ref(),
                        PolygonMode::Line => program.wireframe.as_ref(),
                    },
                    Err(_) => None,
                };
                let (Some(pipeline), Some(bind_group)) = (pipeline, self.bind_groups.get(&draw.bindings)) else {
                    continue;
                };

                let vp = draw.viewport;
                let x = vp.x.min(target_width);
                let y = vp.y.min(target_height);
                let width = vp.width.min(target_width - x);
                let height = vp.height.min(target_height - y);
                if width == 0 || height == 0 {
                    continue;
                }

                rpass.set_viewport(x as f32, y as f32, width as f32, height as f32, 0.0, 1.0);
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[]);
                rpass.draw(0..draw.vertex_count, 0..1);
            }
        }

        self.pending.clear();
        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

impl GraphicsContext for WgpuContext<'_> {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }

    fn uniform_offset_alignment(&self) -> u64 {
        self.gpu.uniform_offset_alignment()
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> GfxResult<Handle> {
        let mut entries = Vec::with_capacity(3);
        if let Some(block) = desc.uniform_block {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(block),
                },
                count: None,
            });
        }
        if desc.sampled_texture {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: TEXTURE_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let device = self.gpu.device();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ember vertex array bgl"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ember vertex array pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(self.objects.insert(
            ResourceKind::VertexArray,
            GpuObject::VertexArray(VertexArrayObject {
                desc: *desc,
                bind_group_layout,
                pipeline_layout,
            }),
        ))
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> GfxResult<Handle> {
        let compiled = shader::compile(stage, source).map_err(|log| GfxError::Compile { stage, log })?;

        let label = format!("ember {stage} shader");
        let module = self
            .gpu
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label.as_str()),
                source: wgpu::ShaderSource::Wgsl(compiled.source.as_str().into()),
            });

        Ok(self.objects.insert(
            ResourceKind::Shader,
            GpuObject::Shader(ShaderObject { compiled, module }),
        ))
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> GfxResult<Handle> {
        let program = {
            let vertex_array = self.vertex_array(desc.vertex_array)?;
            let vertex = self.attached_shader(desc.vertex)?;
            let fragment = self.attached_shader(desc.fragment)?;

            let linked = shader::link(
                vertex.map(|s| &s.compiled),
                fragment.map(|s| &s.compiled),
                &vertex_array.desc,
            );

            match (linked, vertex, fragment) {
                (Ok(()), Some(vs), Some(fs)) => {
                    let solid = self.build_pipeline(vertex_array, vs, fs, desc.depth_test, None);
                    let wireframe = desc
                        .wireframe
                        .filter(|_| self.gpu.request().wireframe)
                        .map(|offset| {
                            self.build_pipeline(vertex_array, vs, fs, desc.depth_test, Some(offset))
                        });
                    ProgramObject {
                        solid: Some(solid),
                        wireframe,
                        log: None,
                    }
                }
                (linked, _, _) => ProgramObject {
                    solid: None,
                    wireframe: None,
                    log: Some(linked.err().unwrap_or_else(|| "error: incomplete program".to_string())),
                },
            }
        };

        Ok(self
            .objects
            .insert(ResourceKind::Program, GpuObject::Program(program)))
    }

    fn program_info_log(&self, program: Handle) -> Option<String> {
        self.program(program).ok().and_then(|p| p.log.clone())
    }

    fn create_uniform_buffer(&mut self, size: u64) -> GfxResult<Handle> {
        let buffer = self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember uniform buffer"),
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(self.objects.insert(
            ResourceKind::UniformBuffer,
            GpuObject::UniformBuffer(BufferObject { buffer, size }),
        ))
    }

    fn create_texture(&mut self, image: &RgbImage, filter: TextureFilter) -> GfxResult<Handle> {
        let rgba = texture::expand_rgba(image);
        let (width, height) = rgba.dimensions();
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let device = self.gpu.device();
        let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ember texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            extent,
        );

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ember texture sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: filter_mode(filter.mag),
            min_filter: filter_mode(filter.min),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Ok(self.objects.insert(
            ResourceKind::Texture,
            GpuObject::Texture(TextureObject { view, sampler }),
        ))
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: ClearColor) -> GfxResult<()> {
        // A clear discards whatever was recorded before it.
        self.pending.clear();
        self.pending_clear = Some(color);
        Ok(())
    }

    fn write_buffer(&mut self, buffer: Handle, offset: u64, data: &[u8]) -> GfxResult<()> {
        let size = self.uniform_buffer(buffer)?.size;
        let len = data.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(GfxError::BufferOverflow {
                buffer,
                offset,
                len: data.len(),
                size,
            });
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GfxError::Misaligned {
                buffer,
                offset,
                alignment: wgpu::COPY_BUFFER_ALIGNMENT,
            });
        }

        let in_use = self
            .pending
            .iter()
            .any(|d| d.bindings.uniforms.is_some_and(|r| r.buffer == buffer));
        if in_use {
            self.flush()?;
        }

        let target = &self.uniform_buffer(buffer)?.buffer;
        self.gpu.queue().write_buffer(target, offset, data);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> GfxResult<()> {
        let (linked, has_wireframe) = {
            let program = self.program(call.program)?;
            (program.log.is_none(), program.wireframe.is_some())
        };
        let vertex_array = self.vertex_array(call.vertex_array)?.desc;
        let buffer_size = call
            .uniforms
            .map(|range| self.uniform_buffer(range.buffer).map(|b| b.size))
            .transpose()?;
        if let Some(texture) = call.texture {
            self.texture(texture)?;
        }
        check_draw_bindings(call, &vertex_array, buffer_size, self.uniform_offset_alignment())?;

        if call.polygon_mode == PolygonMode::Line && !self.gpu.request().wireframe {
            return Err(GfxError::Unsupported {
                request: self.gpu.request(),
                reason: "line polygon mode was not requested".to_string(),
            });
        }
        if !linked {
            if self.warned_unlinked.insert(call.program) {
                log::warn!("{} did not link; its draws are skipped", call.program);
            }
            return Ok(());
        }
        if call.polygon_mode == PolygonMode::Line && !has_wireframe {
            return Err(GfxError::Link {
                log: format!("{} was linked without a wireframe pipeline", call.program),
            });
        }
        if self.viewport.is_empty() || call.vertex_count == 0 {
            return Ok(());
        }

        let bindings = BindingKey {
            vertex_array: call.vertex_array,
            uniforms: call.uniforms,
            texture: call.texture,
        };
        self.ensure_bind_group(bindings)?;
        self.pending.push(PendingDraw {
            program: call.program,
            mode: call.polygon_mode,
            bindings,
            vertex_count: call.vertex_count,
            viewport: self.viewport,
        });
        Ok(())
    }

    fn read_pixels(&mut self) -> GfxResult<RgbaImage> {
        self.flush()?;
        if !self.gpu.supports_readback() {
            return Err(GfxError::Readback(
                "the surface does not allow copies".to_string(),
            ));
        }
        if !self.ensure_frame()? {
            return Err(GfxError::Readback("no frame is available".to_string()));
        }
        let Some(frame) = self.frame.as_ref() else {
            return Err(GfxError::Readback("no frame is available".to_string()));
        };

        let texture = &frame.surface_texture.texture;
        let (width, height) = (texture.width(), texture.height());
        let swap_red_blue = match texture.format() {
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            other => {
                return Err(GfxError::Readback(format!("cannot read back {other:?}")));
            }
        };

        let unpadded_row = 4 * width;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let device = self.gpu.device();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember readback buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GfxError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| GfxError::Readback(e.to_string()))?
            .map_err(|e| GfxError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded_row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        staging.unmap();

        if swap_red_blue {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| GfxError::Readback("readback size mismatch".to_string()))
    }

    fn present(&mut self) -> GfxResult<()> {
        self.flush()?;
        // A frame with no draws is still acquired and presented to keep vsync pacing.
        self.ensure_frame()?;
        if let Some(frame) = self.frame.take() {
            self.gpu.present(frame);
        }
        Ok(())
    }

    fn release(&mut self, handle: Handle) -> GfxResult<()> {
        if !self.pending.is_empty() {
            self.flush()?;
        }
        self.objects.remove(handle)?;
        self.bind_groups.retain(|key, _| !key.references(handle));
        self.warned_unlinked.remove(&handle);
        Ok(())
    }
}

impl Drop for WgpuContext<'_> {
    fn drop(&mut self) {
        if self.objects.len() > 0 {
            log::warn!(
                "{} GPU objects were never released: {:?}",
                self.objects.len(),
                self.objects.handles().map(|h| h.to_string()).collect::<Vec<_>>()
            );
        }
    }
}
