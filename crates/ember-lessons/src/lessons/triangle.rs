use ember_engine::gfx::{ClearColor, ShaderStage, VertexArrayDesc};
use ember_engine::lesson::{DrawPlan, LessonSpec, Pass, ResourceDesc};

pub const VERTEX_SHADER: &str = include_str!("../../shaders/triangle.vert.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("../../shaders/triangle.frag.wgsl");

/// Lesson 02: one colour-interpolated triangle, vertices generated in the shader.
pub fn lesson() -> LessonSpec {
    let mut spec = LessonSpec::new("02_triangle");
    spec.clear = Some(ClearColor::BLACK);
    spec.resources = vec![
        ResourceDesc::VertexArray(VertexArrayDesc::default()),
        ResourceDesc::Shader {
            stage: ShaderStage::Vertex,
            source: VERTEX_SHADER,
        },
        ResourceDesc::Shader {
            stage: ShaderStage::Fragment,
            source: FRAGMENT_SHADER,
        },
        ResourceDesc::Program {
            vertex: 1,
            fragment: 2,
            vertex_array: 0,
            depth_test: false,
            wireframe: None,
        },
    ];
    spec.draw = Some(DrawPlan {
        program: 3,
        vertex_array: 0,
        uniforms: None,
        texture: None,
        vertex_count: 3,
        passes: vec![Pass::Solid],
    });
    spec
}
