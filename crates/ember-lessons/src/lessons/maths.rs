use ember_engine::gfx::{ClearColor, PolygonOffset, ShaderStage, VertexArrayDesc};
use ember_engine::lesson::{DrawPlan, LessonSpec, Pass, PerFrameData, ResourceDesc, UniformUpdate};

pub const VERTEX_SHADER: &str = include_str!("../../shaders/cube.vert.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("../../shaders/cube.frag.wgsl");

/// Pulls the wireframe towards the camera so it wins the depth test against
/// the solid pass it outlines.
pub const WIREFRAME_OFFSET: PolygonOffset = PolygonOffset {
    factor: -1.0,
    units: -1.0,
};

/// Number of vertices the cube shaders expand from the vertex index.
pub const CUBE_VERTICES: u32 = 36;

/// Corner colours of the cube, indexed like the corners in the vertex shader.
pub const CUBE_COLORS: [[f32; 3]; 8] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
];

/// Lesson 03: a spinning cube drawn solid, then again as a wireframe.
///
/// A single uniform slot is rewritten between the two draws.
pub fn lesson() -> LessonSpec {
    let mut spec = LessonSpec::new("03_maths");
    spec.context = spec.context.with_wireframe();
    spec.clear = Some(ClearColor::BLACK);
    spec.resources = vec![
        ResourceDesc::VertexArray(VertexArrayDesc {
            uniform_block: Some(PerFrameData::SIZE),
            sampled_texture: false,
        }),
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
            depth_test: true,
            wireframe: Some(WIREFRAME_OFFSET),
        },
        ResourceDesc::UniformBuffer { records: 1 },
    ];
    spec.draw = Some(DrawPlan {
        program: 3,
        vertex_array: 0,
        uniforms: Some((4, UniformUpdate::RewriteBetweenPasses)),
        texture: None,
        vertex_count: CUBE_VERTICES,
        passes: vec![Pass::Solid, Pass::Wireframe],
    });
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_shader_carries_the_corner_palette() {
        let mut rest = VERTEX_SHADER;
        for [r, g, b] in CUBE_COLORS {
            let literal = format!("vec3<f32>({r:.1}, {g:.1}, {b:.1})");
            let at = rest
                .find(&literal)
                .unwrap_or_else(|| panic!("{literal} missing or out of order"));
            rest = &rest[at + literal.len()..];
        }
        assert!(VERTEX_SHADER.contains("out.color = colors[index];"));
    }
}
