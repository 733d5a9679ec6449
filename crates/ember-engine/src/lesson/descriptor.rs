use std::path::PathBuf;

use crate::device::{ContextRequest, Profile};
use crate::gfx::{ClearColor, PolygonOffset, ShaderStage, TextureFilter, VertexArrayDesc};
use crate::input::Key;

/// How hard resource creation and capture failures hit the lesson.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Validation {
    /// Log and keep going: a failed shader leaves an invalid handle behind,
    /// link logs are warnings, a missing texture becomes a white texel and a
    /// failed capture is skipped.
    #[default]
    Lenient,
    /// Any of the above aborts the lesson.
    Strict,
}

/// One GPU object a lesson creates at startup.
///
/// Objects are created in table order and released in reverse; `Program`
/// refers to earlier entries by their index in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDesc {
    VertexArray(VertexArrayDesc),
    Shader {
        stage: ShaderStage,
        source: &'static str,
    },
    Program {
        vertex: usize,
        fragment: usize,
        vertex_array: usize,
        depth_test: bool,
        wireframe: Option<PolygonOffset>,
    },
    /// Holds `records` uniform records, one slot each.
    UniformBuffer { records: u64 },
    Texture {
        path: PathBuf,
        filter: TextureFilter,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Pass {
    Solid,
    Wireframe,
}

/// How per-frame uniform records reach the passes of a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformUpdate {
    /// One slot, rewritten before every pass.
    RewriteBetweenPasses,
    /// One slot per pass, all written up front; each pass binds its own.
    SlotPerPass,
}

/// What a lesson draws every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    pub program: usize,
    pub vertex_array: usize,
    pub uniforms: Option<(usize, UniformUpdate)>,
    pub texture: Option<usize>,
    pub vertex_count: u32,
    pub passes: Vec<Pass>,
}

/// Everything that distinguishes one lesson from another.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSpec {
    pub name: &'static str,
    pub title: String,
    pub size: (u32, u32),
    pub context: ContextRequest,
    pub resources: Vec<ResourceDesc>,
    /// `None` presents frames without touching them.
    pub clear: Option<ClearColor>,
    pub draw: Option<DrawPlan>,
    /// Key that saves a screenshot, if any.
    pub capture_key: Option<Key>,
    pub capture_dir: PathBuf,
    pub validation: Validation,
}

impl LessonSpec {
    /// A lesson with no resources: an empty 1920x1080 window on a 4.6 core
    /// context that closes on Escape.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            title: "Main window".to_string(),
            size: (1920, 1080),
            context: ContextRequest::new(4, 6, Profile::Core),
            resources: Vec::new(),
            clear: None,
            draw: None,
            capture_key: None,
            capture_dir: PathBuf::from("."),
            validation: Validation::Lenient,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = dir.into();
        self
    }
}
