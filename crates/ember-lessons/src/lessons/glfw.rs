use ember_engine::lesson::LessonSpec;

/// Lesson 01: an empty window on a 4.6 core context, closed with Escape.
pub fn lesson() -> LessonSpec {
    LessonSpec::new("01_glfw")
}
