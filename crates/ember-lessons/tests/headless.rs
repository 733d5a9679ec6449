//! Every lesson, run frame by frame on the resource-tracking context.

use std::mem::offset_of;
use std::path::PathBuf;

use chrono::Local;
use ember_engine::capture::screenshot_file_name;
use ember_engine::device::{AdapterCaps, ContextRequest, Profile};
use ember_engine::gfx::shader::{compile, link, uniform_block_layout};
use ember_engine::gfx::{GfxError, GraphicsContext, Op, ShaderStage, TrackingContext, Viewport};
use ember_engine::input::{EventQueue, InputEvent, Key};
use ember_engine::lesson::{LessonSpec, LoopState, PerFrameData, ResourceDesc, Session, Validation};
use ember_lessons::{glfw, maths, stb, triangle};

fn all_lessons() -> Vec<LessonSpec> {
    vec![glfw::lesson(), triangle::lesson(), maths::lesson(), stb::lesson()]
}

fn context_for(lesson: &LessonSpec, size: (u32, u32)) -> TrackingContext {
    TrackingContext::bootstrap(lesson.context, AdapterCaps::desktop(), size).unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ember-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn uniform_record_matches_every_shader_block() {
    let shaders = [
        (ShaderStage::Vertex, maths::VERTEX_SHADER),
        (ShaderStage::Fragment, maths::FRAGMENT_SHADER),
        (ShaderStage::Vertex, stb::VERTEX_SHADER),
    ];
    for (stage, source) in shaders {
        let shader = compile(stage, source).unwrap();
        let layout = uniform_block_layout(&shader).unwrap();
        assert_eq!(u64::from(layout.size), PerFrameData::SIZE);
        assert_eq!(
            layout.members,
            vec![
                ("mvp".to_string(), offset_of!(PerFrameData, mvp) as u32),
                ("is_wireframe".to_string(), offset_of!(PerFrameData, is_wireframe) as u32),
            ]
        );
    }
    assert_eq!(PerFrameData::SIZE % 16, 0);
}

#[test]
fn textured_wireframe_keeps_the_texture_colour() {
    let fragment = compile(ShaderStage::Fragment, stb::FRAGMENT_SHADER).unwrap();
    assert!(uniform_block_layout(&fragment).is_none());

    let vertex = compile(ShaderStage::Vertex, stb::VERTEX_SHADER).unwrap();
    let lesson = stb::lesson();
    let ResourceDesc::VertexArray(desc) = &lesson.resources[0] else {
        panic!("lesson 05 starts with its vertex array");
    };
    link(Some(&vertex), Some(&fragment), desc).unwrap();
}

#[test]
fn every_lesson_runs_and_tears_down_cleanly() {
    for lesson in all_lessons() {
        let name = lesson.name;
        let mut ctx = context_for(&lesson, (1920, 1080));
        let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

        for frame in 0..3 {
            session.frame(&mut ctx, frame as f32 / 60.0).unwrap();
        }
        session.handle_event(&InputEvent::pressed(Key::Escape));
        session.frame(&mut ctx, 1.0).unwrap();
        assert_eq!(session.frames_rendered(), 3, "{name}");
        assert_eq!(ctx.presents(), 3, "{name}");

        session.teardown(&mut ctx).unwrap();
        let mut created = ctx.created();
        created.reverse();
        assert_eq!(ctx.released(), created, "{name}");
        assert_eq!(ctx.live_count(), 0, "{name}");
    }
}

#[test]
fn lessons_draw_what_they_declare() {
    let expected = [(0, 0), (1, 3), (2, 36), (2, 36)];
    for (lesson, (draws, vertices)) in all_lessons().into_iter().zip(expected) {
        let mut ctx = context_for(&lesson, (800, 600));
        let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();
        session.frame(&mut ctx, 0.25).unwrap();

        let calls = ctx.draws();
        assert_eq!(calls.len(), draws);
        assert!(calls.iter().all(|c| c.vertex_count == vertices));
        session.teardown(&mut ctx).unwrap();
    }
}

#[test]
fn escape_before_the_first_frame_renders_nothing() {
    let lesson = stb::lesson();
    let mut ctx = context_for(&lesson, (640, 480));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

    let mut queue = EventQueue::new();
    queue.push(InputEvent::pressed(Key::Escape));
    session.deliver(&mut queue);
    assert_eq!(session.state(), LoopState::Closing);

    session.frame(&mut ctx, 0.0).unwrap();
    assert_eq!(session.frames_rendered(), 0);
    assert!(ctx.draws().is_empty());

    session.teardown(&mut ctx).unwrap();
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn close_request_ends_the_loop() {
    let lesson = triangle::lesson();
    let mut ctx = context_for(&lesson, (640, 480));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();
    session.handle_event(&InputEvent::CloseRequested);
    assert!(!session.is_running());
    session.teardown(&mut ctx).unwrap();
}

#[test]
fn viewport_tracks_resizes() {
    let lesson = maths::lesson();
    let mut ctx = context_for(&lesson, (1920, 1080));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

    session.frame(&mut ctx, 0.0).unwrap();
    ctx.resize(1280, 720);
    session.frame(&mut ctx, 0.1).unwrap();

    assert_eq!(ctx.viewports().last(), Some(&Viewport::covering((1280, 720))));
    assert_eq!(ctx.framebuffer_size(), (1280, 720));
    session.teardown(&mut ctx).unwrap();
}

#[test]
fn f9_writes_one_dated_png_of_framebuffer_size() {
    let dir = scratch_dir("capture");
    let lesson = stb::lesson().with_capture_dir(&dir);
    let mut ctx = context_for(&lesson, (320, 240));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

    session.frame(&mut ctx, 0.0).unwrap();
    session.handle_event(&InputEvent::pressed(Key::F9));
    session.frame(&mut ctx, 0.1).unwrap();
    let today = Local::now().date_naive();

    let files: Vec<_> = std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    assert_eq!(session.captures(), &files[..]);
    assert_eq!(
        files[0].file_name().and_then(|n| n.to_str()),
        Some(screenshot_file_name(today).as_str())
    );

    let png = image::open(&files[0]).unwrap();
    assert_eq!((png.width(), png.height()), (320, 240));
    assert_eq!(png.color().channel_count(), 4);

    // The read-back happens between the frame's draws and its present.
    let ops = ctx.ops();
    let readback = ops.iter().position(|op| matches!(op, Op::ReadPixels { .. })).unwrap();
    assert!(matches!(ops[readback - 1], Op::Draw(_)));
    assert_eq!(ops[readback + 1], Op::Present);

    session.teardown(&mut ctx).unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn capture_key_is_ignored_by_lessons_without_capture() {
    let dir = scratch_dir("no-capture");
    let lesson = maths::lesson().with_capture_dir(&dir);
    let mut ctx = context_for(&lesson, (320, 240));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

    session.handle_event(&InputEvent::pressed(Key::F9));
    session.frame(&mut ctx, 0.0).unwrap();
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    session.teardown(&mut ctx).unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

fn with_broken_vertex_shader(mut lesson: LessonSpec) -> LessonSpec {
    lesson.resources[1] = ResourceDesc::Shader {
        stage: ShaderStage::Vertex,
        source: "@vertex fn vs_main( {",
    };
    lesson
}

#[test]
fn lenient_lesson_survives_a_broken_shader() {
    let lesson = with_broken_vertex_shader(maths::lesson());
    let mut ctx = context_for(&lesson, (640, 480));
    let mut session = Session::bootstrap(&mut ctx, lesson).unwrap();

    session.frame(&mut ctx, 0.0).unwrap();
    assert!(ctx.draws().is_empty());
    assert_eq!(ctx.presents(), 1);

    session.teardown(&mut ctx).unwrap();
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn strict_lesson_rejects_a_broken_shader_without_leaking() {
    let lesson = with_broken_vertex_shader(maths::lesson()).with_validation(Validation::Strict);
    let mut ctx = context_for(&lesson, (640, 480));

    let err = Session::bootstrap(&mut ctx, lesson).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GfxError>(),
        Some(GfxError::Compile {
            stage: ShaderStage::Vertex,
            ..
        })
    ));
    assert_eq!(ctx.live_count(), 0);
    assert_eq!(ctx.released().len(), ctx.created().len());
}

#[test]
fn strict_lesson_rejects_a_missing_texture() {
    let mut lesson = stb::lesson().with_validation(Validation::Strict);
    lesson.resources[5] = ResourceDesc::Texture {
        path: PathBuf::from("no/such/ch2_sample3_STB.jpg"),
        filter: ember_engine::gfx::TextureFilter::LINEAR,
    };
    let mut ctx = context_for(&lesson, (640, 480));

    let err = Session::bootstrap(&mut ctx, lesson).unwrap_err();
    assert!(matches!(err.downcast_ref::<GfxError>(), Some(GfxError::Texture { .. })));
    assert_eq!(ctx.live_count(), 0);
}

#[test]
fn unsupported_requests_fail_bootstrap() {
    let caps = AdapterCaps::desktop();
    for request in [
        ContextRequest::new(3, 1, Profile::Core),
        ContextRequest::new(4, 7, Profile::Core),
        ContextRequest::new(5, 0, Profile::Compatibility),
    ] {
        assert!(
            matches!(
                TrackingContext::bootstrap(request, caps, (64, 64)),
                Err(GfxError::Unsupported { .. })
            ),
            "{request}"
        );
    }

    let no_lines = AdapterCaps {
        polygon_mode_line: false,
        ..caps
    };
    assert!(TrackingContext::bootstrap(maths::lesson().context, no_lines, (64, 64)).is_err());
    assert!(TrackingContext::bootstrap(triangle::lesson().context, no_lines, (64, 64)).is_ok());
}

#[test]
fn supported_requests_bootstrap() {
    for (major, minor, profile) in [
        (2, 1, Profile::Compatibility),
        (3, 3, Profile::Core),
        (4, 6, Profile::Core),
        (4, 6, Profile::Compatibility),
    ] {
        let request = ContextRequest::new(major, minor, profile);
        assert!(TrackingContext::bootstrap(request, AdapterCaps::desktop(), (64, 64)).is_ok(), "{request}");
    }
}
