use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuInit};
use crate::gfx::WgpuContext;
use crate::input::platform::winit::translate_window_event;
use crate::input::EventQueue;
use crate::lesson::{LessonSpec, Session};
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: PhysicalSize<u32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Main window".to_string(),
            initial_size: PhysicalSize::new(1920, 1080),
        }
    }
}

impl From<&LessonSpec> for RuntimeConfig {
    fn from(lesson: &LessonSpec) -> Self {
        Self {
            title: lesson.title.clone(),
            initial_size: PhysicalSize::new(lesson.size.0, lesson.size.1),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the lesson window and runs the lesson until it closes.
    ///
    /// The context request of `lesson` overrides the one in `gpu_init`.
    pub fn run(lesson: LessonSpec, mut gpu_init: GpuInit) -> Result<()> {
        gpu_init.context = lesson.context;
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(RuntimeConfig::from(&lesson), gpu_init, lesson);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    context: WgpuContext<'this>,
}

struct AppState {
    config: RuntimeConfig,
    gpu_init: GpuInit,

    /// Taken when the session is bootstrapped.
    lesson: Option<LessonSpec>,

    // Released explicitly by `shutdown` while `entry` still holds the context.
    session: Option<Session>,
    entry: Option<WindowEntry>,
    events: EventQueue,

    failure: Option<anyhow::Error>,
}

impl AppState {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, lesson: LessonSpec) -> Self {
        Self {
            config,
            gpu_init,
            lesson: Some(lesson),
            session: None,
            entry: None,
            events: EventQueue::new(),
            failure: None,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            context_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)).map(WgpuContext::new),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let lesson = self
            .lesson
            .take()
            .ok_or_else(|| anyhow!("lesson was already started"))?;
        let session = entry.with_context_mut(|ctx| Session::bootstrap(ctx, lesson))?;

        entry.with_window(|w| w.request_redraw());
        self.session = Some(session);
        self.entry = Some(entry);
        Ok(())
    }

    /// Tears the session down while its context is still alive.
    fn shutdown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        if let Err(err) = entry.with_context_mut(|ctx| session.teardown(ctx)) {
            self.record_failure(err.context("releasing lesson resources"));
        }
    }

    fn record_failure(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.record_failure(err);
        self.shutdown();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(entry), Some(session)) = (self.entry.as_mut(), self.session.as_mut()) else {
            return;
        };

        let result = entry.with_mut(|fields| {
            session.frame(fields.context, fields.clock.elapsed())
        });
        if let Err(err) = result {
            self.fail(event_loop, err.context("rendering frame"));
            return;
        }

        // Events arriving during the frame are seen after its swap.
        session.deliver(&mut self.events);
        if !session.is_running() {
            self.shutdown();
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.failure.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e.context("failed to start lesson"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; present blocks on vsync.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(ev) = translate_window_event(&event) {
            self.events.push(ev);
        }

        match &event {
            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_context_mut(|ctx| ctx.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_context_mut(|ctx| ctx.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
        self.entry = None;
    }
}
