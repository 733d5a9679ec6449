use anyhow::{anyhow, bail, Context, Result};

use crate::gfx::{texture, GfxError, GraphicsContext, Handle, ProgramDesc, ResourceKind};

use super::descriptor::{ResourceDesc, Validation};
use super::uniforms::{PerFrameData, UniformSlots};

#[derive(Debug, Copy, Clone)]
struct Entry {
    handle: Handle,
    slots: Option<UniformSlots>,
}

/// GPU objects of a lesson, one per `ResourceDesc`, in creation order.
#[derive(Debug, Default)]
pub struct ResourceSet {
    entries: Vec<Entry>,
}

impl ResourceSet {
    /// Creates every object of `table` in order.
    ///
    /// If creation stops part-way, whatever was created so far is released
    /// before the error is returned.
    pub fn create<C>(ctx: &mut C, table: &[ResourceDesc], validation: Validation) -> Result<Self>
    where
        C: GraphicsContext + ?Sized,
    {
        let mut set = Self::default();
        for (index, desc) in table.iter().enumerate() {
            if let Err(err) = set.create_one(ctx, desc, validation) {
                if let Err(release_err) = set.release_all(ctx) {
                    log::error!("cleanup after failed creation: {release_err:#}");
                }
                return Err(err.context(format!("creating resource {index}")));
            }
        }
        Ok(set)
    }

    fn create_one<C>(&mut self, ctx: &mut C, desc: &ResourceDesc, validation: Validation) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        let mut slots = None;
        let handle = match desc {
            ResourceDesc::VertexArray(va) => ctx.create_vertex_array(va)?,

            ResourceDesc::Shader { stage, source } => match ctx.create_shader(*stage, source) {
                Ok(handle) => handle,
                Err(GfxError::Compile { stage, log }) => {
                    log::error!("error compiling {stage} shader:\n{log}");
                    if validation == Validation::Strict {
                        return Err(GfxError::Compile { stage, log }.into());
                    }
                    Handle::invalid(ResourceKind::Shader)
                }
                Err(err) => return Err(err.into()),
            },

            ResourceDesc::Program {
                vertex,
                fragment,
                vertex_array,
                depth_test,
                wireframe,
            } => {
                let desc = ProgramDesc {
                    vertex: self.earlier(*vertex)?,
                    fragment: self.earlier(*fragment)?,
                    vertex_array: self.earlier(*vertex_array)?,
                    depth_test: *depth_test,
                    wireframe: *wireframe,
                };
                let program = ctx.create_program(&desc)?;
                // Tracked before the log is checked so a strict failure still releases it.
                self.entries.push(Entry {
                    handle: program,
                    slots: None,
                });

                if let Some(log) = ctx.program_info_log(program) {
                    if validation == Validation::Strict {
                        return Err(GfxError::Link { log }.into());
                    }
                    log::warn!("{program} link log:\n{log}");
                }
                return Ok(());
            }

            ResourceDesc::UniformBuffer { records } => {
                let layout = UniformSlots::new(PerFrameData::SIZE, *records, ctx.uniform_offset_alignment());
                slots = Some(layout);
                ctx.create_uniform_buffer(layout.buffer_size())?
            }

            ResourceDesc::Texture { path, filter } => {
                let image = match texture::load_rgb(path) {
                    Ok(image) => image,
                    Err(err) if validation == Validation::Strict => return Err(err.into()),
                    Err(err) => {
                        log::error!("{err}; using a white placeholder");
                        texture::fallback_rgb()
                    }
                };
                ctx.create_texture(&image, *filter)
                    .with_context(|| format!("uploading {}", path.display()))?
            }
        };

        self.entries.push(Entry { handle, slots });
        Ok(())
    }

    /// Handle of an entry created before the one being built.
    fn earlier(&self, index: usize) -> Result<Handle> {
        self.entries
            .get(index)
            .map(|e| e.handle)
            .ok_or_else(|| anyhow!("resource {index} is referenced before it is created"))
    }

    pub fn handle(&self, index: usize) -> Option<Handle> {
        self.entries.get(index).map(|e| e.handle)
    }

    /// Slot layout of the uniform buffer at `index`.
    pub fn slots(&self, index: usize) -> Option<UniformSlots> {
        self.entries.get(index).and_then(|e| e.slots)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases everything in reverse creation order and empties the set.
    ///
    /// Invalid handles are skipped. A failed release does not stop the
    /// others; the first failure is returned.
    pub fn release_all<C>(&mut self, ctx: &mut C) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        let mut first_err = None;
        while let Some(entry) = self.entries.pop() {
            if !entry.handle.is_valid() {
                continue;
            }
            if let Err(err) = ctx.release(entry.handle) {
                log::error!("releasing {}: {err}", entry.handle);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => bail!(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AdapterCaps, ContextRequest, Profile};
    use crate::gfx::{ShaderStage, TextureFilter, TrackingContext, VertexArrayDesc};

    const VS: &str =
        "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0, 0.0, 0.0, 1.0); }";
    const FS: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
    const BROKEN: &str = "@vertex fn vs_main( {";

    fn ctx() -> TrackingContext {
        TrackingContext::bootstrap(
            ContextRequest::new(4, 6, Profile::Core),
            AdapterCaps::desktop(),
            (64, 64),
        )
        .unwrap()
    }

    fn table(vertex_source: &'static str) -> Vec<ResourceDesc> {
        vec![
            ResourceDesc::VertexArray(VertexArrayDesc::default()),
            ResourceDesc::Shader {
                stage: ShaderStage::Vertex,
                source: vertex_source,
            },
            ResourceDesc::Shader {
                stage: ShaderStage::Fragment,
                source: FS,
            },
            ResourceDesc::Program {
                vertex: 1,
                fragment: 2,
                vertex_array: 0,
                depth_test: false,
                wireframe: None,
            },
        ]
    }

    #[test]
    fn releases_in_reverse_creation_order() {
        let mut ctx = ctx();
        let mut set = ResourceSet::create(&mut ctx, &table(VS), Validation::Strict).unwrap();
        assert_eq!(set.len(), 4);

        set.release_all(&mut ctx).unwrap();
        let mut created = ctx.created();
        created.reverse();
        assert_eq!(ctx.released(), created);
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn lenient_compile_failure_leaves_invalid_handle() {
        let mut ctx = ctx();
        let mut set = ResourceSet::create(&mut ctx, &table(BROKEN), Validation::Lenient).unwrap();
        assert_eq!(set.handle(1), Some(Handle::invalid(ResourceKind::Shader)));

        let program = set.handle(3).unwrap();
        assert!(ctx.program_info_log(program).is_some());

        set.release_all(&mut ctx).unwrap();
        assert_eq!(ctx.live_count(), 0);
        assert_eq!(ctx.released().len(), 3);
    }

    #[test]
    fn strict_compile_failure_cleans_up() {
        let mut ctx = ctx();
        let err = ResourceSet::create(&mut ctx, &table(BROKEN), Validation::Strict).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GfxError>(),
            Some(GfxError::Compile { stage: ShaderStage::Vertex, .. })
        ));
        assert_eq!(ctx.created().len(), 1);
        assert_eq!(ctx.released(), ctx.created());
    }

    #[test]
    fn strict_link_failure_releases_the_program_too() {
        let mut ctx = ctx();
        let mut resources = table(VS);
        resources[2] = ResourceDesc::Shader {
            stage: ShaderStage::Fragment,
            source: "@fragment fn fs_main(@location(0) c: vec3<f32>) -> @location(0) vec4<f32> { return vec4<f32>(c, 1.0); }",
        };
        let err = ResourceSet::create(&mut ctx, &resources, Validation::Strict).unwrap_err();
        assert!(matches!(err.downcast_ref::<GfxError>(), Some(GfxError::Link { .. })));
        assert_eq!(ctx.created().len(), 4);
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut ctx = ctx();
        let resources = vec![ResourceDesc::Program {
            vertex: 1,
            fragment: 2,
            vertex_array: 0,
            depth_test: false,
            wireframe: None,
        }];
        assert!(ResourceSet::create(&mut ctx, &resources, Validation::Lenient).is_err());
    }

    #[test]
    fn uniform_buffer_is_sized_from_slots() {
        let mut ctx = ctx().with_uniform_alignment(256);
        let set = ResourceSet::create(
            &mut ctx,
            &[ResourceDesc::UniformBuffer { records: 2 }],
            Validation::Strict,
        )
        .unwrap();
        let slots = set.slots(0).unwrap();
        assert_eq!(slots.offset(1), 256);
        let buffer = set.handle(0).unwrap();
        assert_eq!(ctx.buffer_contents(buffer).unwrap().len(), 336);
    }

    #[test]
    fn missing_texture_is_replaced_when_lenient() {
        let mut ctx = ctx();
        let desc = ResourceDesc::Texture {
            path: "no/such/texture.jpg".into(),
            filter: TextureFilter::LINEAR,
        };

        let set = ResourceSet::create(&mut ctx, std::slice::from_ref(&desc), Validation::Lenient).unwrap();
        assert_eq!(ctx.texture_size(set.handle(0).unwrap()).unwrap(), (1, 1));

        let err = ResourceSet::create(&mut ctx, &[desc], Validation::Strict).unwrap_err();
        assert!(matches!(err.downcast_ref::<GfxError>(), Some(GfxError::Texture { .. })));
    }
}
