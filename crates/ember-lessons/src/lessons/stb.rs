use std::path::PathBuf;

use ember_engine::gfx::{ClearColor, ShaderStage, TextureFilter, VertexArrayDesc};
use ember_engine::input::Key;
use ember_engine::lesson::{DrawPlan, LessonSpec, Pass, PerFrameData, ResourceDesc, UniformUpdate};

use super::maths::{CUBE_VERTICES, WIREFRAME_OFFSET};

pub const VERTEX_SHADER: &str = include_str!("../../shaders/textured_cube.vert.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("../../shaders/textured_cube.frag.wgsl");

/// Texture image, relative to the working directory.
pub const TEXTURE_PATH: &str = "data/ch2_sample3_STB.jpg";

pub const CAPTURE_KEY: Key = Key::F9;

/// Lesson 05: the spinning cube textured from a JPEG, with F9 screenshots.
///
/// Both uniform records are written at once; each draw binds its own slot.
pub fn lesson() -> LessonSpec {
    let mut spec = LessonSpec::new("05_stb");
    spec.context = spec.context.with_wireframe();
    spec.clear = Some(ClearColor::BLACK);
    spec.capture_key = Some(CAPTURE_KEY);
    spec.resources = vec![
        ResourceDesc::VertexArray(VertexArrayDesc {
            uniform_block: Some(PerFrameData::SIZE),
            sampled_texture: true,
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
        ResourceDesc::UniformBuffer { records: 2 },
        ResourceDesc::Texture {
            path: PathBuf::from(TEXTURE_PATH),
            filter: TextureFilter::LINEAR,
        },
    ];
    spec.draw = Some(DrawPlan {
        program: 3,
        vertex_array: 0,
        uniforms: Some((4, UniformUpdate::SlotPerPass)),
        texture: Some(5),
        vertex_count: CUBE_VERTICES,
        passes: vec![Pass::Solid, Pass::Wireframe],
    });
    spec
}
