//! WGSL front end: compile diagnostics and program linking.
//!
//! Every shader is parsed and validated with `naga` before it reaches the
//! device, so failures come back as logs instead of device errors.

use std::fmt::Write as _;

use super::context::{ShaderStage, VertexArrayDesc};

/// Binding slots of the vertex array interface (group 0).
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;

/// A validated single-stage WGSL module.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub source: String,
    pub entry_point: String,
    module: naga::Module,
}

/// Byte layout of a uniform block as the shader sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub size: u32,
    pub members: Vec<(String, u32)>,
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates `source`, which must hold exactly one entry point of
/// `stage`. The error is the compiler log.
pub fn compile(stage: ShaderStage, source: &str) -> Result<CompiledShader, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;

    let mut entries = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == naga_stage(stage));

    let entry_point = match (entries.next(), entries.next()) {
        (Some(ep), None) => ep.name.clone(),
        (None, _) => return Err(format!("no {stage} entry point found")),
        (Some(_), Some(_)) => return Err(format!("more than one {stage} entry point")),
    };

    Ok(CompiledShader {
        stage,
        source: source.to_owned(),
        entry_point,
        module,
    })
}

impl CompiledShader {
    fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.name == self.entry_point)
    }

    /// User-defined (location) outputs of the entry point.
    fn outputs(&self) -> Vec<(u32, naga::TypeInner)> {
        let mut out = Vec::new();
        if let Some(result) = self.entry().and_then(|ep| ep.function.result.as_ref()) {
            self.collect_locations(result.binding.as_ref(), result.ty, &mut out);
        }
        out
    }

    /// User-defined (location) inputs of the entry point.
    fn inputs(&self) -> Vec<(u32, naga::TypeInner)> {
        let mut out = Vec::new();
        if let Some(ep) = self.entry() {
            for arg in &ep.function.arguments {
                self.collect_locations(arg.binding.as_ref(), arg.ty, &mut out);
            }
        }
        out
    }

    fn collect_locations(
        &self,
        binding: Option<&naga::Binding>,
        ty: naga::Handle<naga::Type>,
        out: &mut Vec<(u32, naga::TypeInner)>,
    ) {
        let inner = &self.module.types[ty].inner;
        match binding {
            Some(naga::Binding::Location { location, .. }) => out.push((*location, inner.clone())),
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = inner {
                    for member in members {
                        self.collect_locations(member.binding.as_ref(), member.ty, out);
                    }
                }
            }
        }
    }

    fn resource_bindings(&self) -> impl Iterator<Item = (&naga::GlobalVariable, naga::ResourceBinding)> {
        self.module
            .global_variables
            .iter()
            .filter_map(|(_, var)| var.binding.clone().map(|b| (var, b)))
    }

    fn type_span(&self, ty: naga::Handle<naga::Type>) -> u32 {
        self.module.types[ty].inner.size(self.module.to_ctx())
    }
}

/// Checks that `vertex` and `fragment` form a complete program over the
/// `vertex_array` interface. The error is the link log.
pub fn link(
    vertex: Option<&CompiledShader>,
    fragment: Option<&CompiledShader>,
    vertex_array: &VertexArrayDesc,
) -> Result<(), String> {
    let mut log = String::new();

    match vertex {
        Some(vs) if vs.stage == ShaderStage::Vertex => {}
        Some(_) => log.push_str("error: shader attached as vertex is not a vertex shader\n"),
        None => log.push_str("error: no valid vertex shader attached\n"),
    }
    match fragment {
        Some(fs) if fs.stage == ShaderStage::Fragment => {}
        Some(_) => log.push_str("error: shader attached as fragment is not a fragment shader\n"),
        None => log.push_str("error: no valid fragment shader attached\n"),
    }

    if let (Some(vs), Some(fs)) = (vertex, fragment) {
        let outputs = vs.outputs();
        for (location, ty) in fs.inputs() {
            match outputs.iter().find(|(l, _)| *l == location) {
                None => {
                    let _ = writeln!(
                        log,
                        "error: fragment input at location {location} is not written by the vertex shader"
                    );
                }
                Some((_, out_ty)) if *out_ty != ty => {
                    let _ = writeln!(log, "error: type mismatch at location {location}");
                }
                Some(_) => {}
            }
        }
    }

    for shader in [vertex, fragment].into_iter().flatten() {
        for (var, binding) in shader.resource_bindings() {
            if let Err(msg) = check_binding(shader, var, &binding, vertex_array) {
                let _ = writeln!(log, "error: {} shader: {msg}", shader.stage);
            }
        }
    }

    if log.is_empty() { Ok(()) } else { Err(log) }
}

fn check_binding(
    shader: &CompiledShader,
    var: &naga::GlobalVariable,
    binding: &naga::ResourceBinding,
    vertex_array: &VertexArrayDesc,
) -> Result<(), String> {
    let name = var.name.as_deref().unwrap_or("<unnamed>");
    if binding.group != 0 {
        return Err(format!("`{name}` uses bind group {}, only group 0 exists", binding.group));
    }

    let inner = &shader.module.types[var.ty].inner;
    match binding.binding {
        UNIFORM_BINDING => {
            let Some(declared) = vertex_array.uniform_block else {
                return Err(format!("`{name}` reads a uniform block the vertex array does not declare"));
            };
            if var.space != naga::AddressSpace::Uniform {
                return Err(format!("`{name}` at binding 0 must be a uniform block"));
            }
            let span = u64::from(shader.type_span(var.ty));
            if span > declared {
                return Err(format!(
                    "uniform block `{name}` is {span} bytes, the vertex array declares {declared}"
                ));
            }
            Ok(())
        }
        TEXTURE_BINDING | SAMPLER_BINDING if !vertex_array.sampled_texture => Err(format!(
            "`{name}` samples a texture the vertex array does not declare"
        )),
        TEXTURE_BINDING => match inner {
            naga::TypeInner::Image { .. } => Ok(()),
            _ => Err(format!("`{name}` at binding 1 must be a texture")),
        },
        SAMPLER_BINDING => match inner {
            naga::TypeInner::Sampler { comparison: false } => Ok(()),
            _ => Err(format!("`{name}` at binding 2 must be a filtering sampler")),
        },
        other => Err(format!("`{name}` uses undeclared binding {other}")),
    }
}

/// Layout of the uniform block at binding 0, if the shader declares one.
pub fn uniform_block_layout(shader: &CompiledShader) -> Option<BlockLayout> {
    let (var, _) = shader
        .resource_bindings()
        .find(|(var, b)| b.group == 0 && b.binding == UNIFORM_BINDING && var.space == naga::AddressSpace::Uniform)?;

    match &shader.module.types[var.ty].inner {
        naga::TypeInner::Struct { members, span } => Some(BlockLayout {
            size: *span,
            members: members
                .iter()
                .map(|m| (m.name.clone().unwrap_or_default(), m.offset))
                .collect(),
        }),
        _ => Some(BlockLayout {
            size: shader.type_span(var.ty),
            members: Vec::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct PerFrame {
    mvp: mat4x4<f32>,
    is_wireframe: i32,
};
@group(0) @binding(0) var<uniform> per_frame: PerFrame;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var out: VsOut;
    out.position = per_frame.mvp * vec4<f32>(f32(index), 0.0, 0.0, 1.0);
    out.color = vec3<f32>(1.0, 0.0, 0.0);
    return out;
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

    fn uniforms(size: u64) -> VertexArrayDesc {
        VertexArrayDesc {
            uniform_block: Some(size),
            sampled_texture: false,
        }
    }

    #[test]
    fn compiles_and_finds_entry_point() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        assert_eq!(vs.entry_point, "vs_main");
    }

    #[test]
    fn syntax_error_produces_log() {
        let log = compile(ShaderStage::Vertex, "@vertex fn broken( {").unwrap_err();
        assert!(!log.is_empty());
    }

    #[test]
    fn wrong_stage_is_a_compile_error() {
        let log = compile(ShaderStage::Vertex, FS).unwrap_err();
        assert!(log.contains("no vertex entry point"), "{log}");
    }

    #[test]
    fn matching_pair_links() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, FS).unwrap();
        assert_eq!(link(Some(&vs), Some(&fs), &uniforms(80)), Ok(()));
    }

    #[test]
    fn missing_stage_fails_link() {
        let fs = compile(ShaderStage::Fragment, FS).unwrap();
        let log = link(None, Some(&fs), &uniforms(80)).unwrap_err();
        assert!(log.contains("no valid vertex shader"), "{log}");
    }

    #[test]
    fn unmatched_fragment_input_fails_link() {
        let fs = compile(
            ShaderStage::Fragment,
            "@fragment fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(uv, 0.0, 1.0); }",
        )
        .unwrap();
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let log = link(Some(&vs), Some(&fs), &uniforms(80)).unwrap_err();
        assert!(log.contains("location 3"), "{log}");
    }

    #[test]
    fn undeclared_uniform_block_fails_link() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, FS).unwrap();
        assert!(link(Some(&vs), Some(&fs), &VertexArrayDesc::default()).is_err());
        assert!(link(Some(&vs), Some(&fs), &uniforms(16)).is_err());
    }

    #[test]
    fn reports_uniform_block_layout() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let layout = uniform_block_layout(&vs).unwrap();
        assert_eq!(layout.size, 80);
        assert_eq!(
            layout.members,
            vec![("mvp".to_string(), 0), ("is_wireframe".to_string(), 64)]
        );
    }
}
