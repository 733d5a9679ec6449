use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use chrono::Local;

use crate::capture;
use crate::gfx::{BufferRange, DrawCall, GraphicsContext, Handle, PolygonMode, ResourceKind, Viewport};
use crate::input::{EventQueue, InputEvent, Key, KeyState};

use super::descriptor::{DrawPlan, LessonSpec, Pass, UniformUpdate, Validation};
use super::resources::ResourceSet;
use super::transform::model_view_projection;
use super::uniforms::{PerFrameData, UniformSlots};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    Running,
    Closing,
}

/// Draw bindings of a lesson, resolved to handles once at bootstrap.
#[derive(Debug, Copy, Clone)]
struct ResolvedDraw {
    program: Handle,
    vertex_array: Handle,
    uniforms: Option<(Handle, UniformSlots, UniformUpdate)>,
    texture: Option<Handle>,
}

/// Runs one lesson against a `GraphicsContext`: owns its GPU objects, reacts
/// to input and renders frames until asked to close.
#[derive(Debug)]
pub struct Session {
    spec: LessonSpec,
    resources: ResourceSet,
    draw: Option<ResolvedDraw>,
    state: LoopState,
    pending_captures: u32,
    captures: Vec<PathBuf>,
    frames_rendered: u64,
}

impl Session {
    /// Creates the lesson's GPU objects.
    ///
    /// On error nothing created here is left alive.
    pub fn bootstrap<C>(ctx: &mut C, spec: LessonSpec) -> Result<Self>
    where
        C: GraphicsContext + ?Sized,
    {
        let mut resources = ResourceSet::create(ctx, &spec.resources, spec.validation)
            .with_context(|| format!("creating resources of lesson {}", spec.name))?;

        let draw = match spec.draw.as_ref().map(|plan| resolve(&resources, plan)).transpose() {
            Ok(draw) => draw,
            Err(err) => {
                if let Err(release_err) = resources.release_all(ctx) {
                    log::error!("cleanup after failed bootstrap: {release_err:#}");
                }
                return Err(err.context(format!("lesson {} has an invalid draw plan", spec.name)));
            }
        };

        log::info!(
            "lesson {} ready: {} GPU objects on a {} context",
            spec.name,
            resources.len(),
            spec.context
        );

        Ok(Self {
            spec,
            resources,
            draw,
            state: LoopState::Running,
            pending_captures: 0,
            captures: Vec::new(),
            frames_rendered: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn request_close(&mut self) {
        self.state = LoopState::Closing;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Screenshots written so far, oldest first.
    pub fn captures(&self) -> &[PathBuf] {
        &self.captures
    }

    pub fn handle_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::CloseRequested => self.request_close(),
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
            } => {
                if *key == Key::Escape {
                    self.request_close();
                } else if Some(*key) == self.spec.capture_key {
                    self.pending_captures += 1;
                }
            }
            // Viewport and aspect are read back from the context every frame.
            InputEvent::Resized { .. } => {}
            InputEvent::Key { .. } => {}
        }
    }

    /// Hands every queued event to `handle_event`, in arrival order.
    pub fn deliver(&mut self, queue: &mut EventQueue) {
        for event in queue.drain() {
            self.handle_event(&event);
        }
    }

    /// Renders and presents one frame. Does nothing once closing.
    pub fn frame<C>(&mut self, ctx: &mut C, elapsed: f32) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        if !self.is_running() {
            return Ok(());
        }

        let viewport = Viewport::covering(ctx.framebuffer_size());
        ctx.set_viewport(viewport);

        // Minimized: nothing to draw into; pending captures wait for a visible frame.
        if !viewport.is_empty() {
            if let Some(color) = self.spec.clear {
                ctx.clear(color)?;
            }
            if let Some(draw) = self.draw {
                self.draw_passes(ctx, &draw, elapsed, viewport.aspect())?;
            }
            while self.pending_captures > 0 {
                self.pending_captures -= 1;
                self.capture(ctx)?;
            }
        }

        ctx.present()?;
        self.frames_rendered += 1;
        Ok(())
    }

    fn draw_passes<C>(&self, ctx: &mut C, draw: &ResolvedDraw, elapsed: f32, aspect: f32) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        let Some(plan) = self.spec.draw.as_ref() else {
            return Ok(());
        };
        let mvp = model_view_projection(elapsed, aspect);
        let call = |uniforms: Option<BufferRange>, pass: Pass| DrawCall {
            program: draw.program,
            vertex_array: draw.vertex_array,
            uniforms,
            texture: draw.texture,
            polygon_mode: match pass {
                Pass::Solid => PolygonMode::Fill,
                Pass::Wireframe => PolygonMode::Line,
            },
            vertex_count: plan.vertex_count,
        };

        match draw.uniforms {
            None => {
                for &pass in &plan.passes {
                    ctx.draw(&call(None, pass))?;
                }
            }
            Some((buffer, slots, UniformUpdate::RewriteBetweenPasses)) => {
                let range = BufferRange {
                    buffer,
                    offset: slots.offset(0),
                    size: slots.record_size,
                };
                for &pass in &plan.passes {
                    let record = PerFrameData::new(mvp, pass == Pass::Wireframe);
                    ctx.write_buffer(buffer, range.offset, record.as_bytes())?;
                    ctx.draw(&call(Some(range), pass))?;
                }
            }
            Some((buffer, slots, UniformUpdate::SlotPerPass)) => {
                let mut bytes = vec![0u8; slots.buffer_size() as usize];
                for (slot, &pass) in plan.passes.iter().enumerate() {
                    let offset = slots.offset(slot as u64) as usize;
                    let record = PerFrameData::new(mvp, pass == Pass::Wireframe);
                    bytes[offset..offset + record.as_bytes().len()].copy_from_slice(record.as_bytes());
                }
                ctx.write_buffer(buffer, 0, &bytes)?;

                for (slot, &pass) in plan.passes.iter().enumerate() {
                    let range = BufferRange {
                        buffer,
                        offset: slots.offset(slot as u64),
                        size: slots.record_size,
                    };
                    ctx.draw(&call(Some(range), pass))?;
                }
            }
        }
        Ok(())
    }

    fn capture<C>(&mut self, ctx: &mut C) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        let today = Local::now().date_naive();
        match capture::capture_screenshot(ctx, &self.spec.capture_dir, today) {
            Ok(path) => {
                log::info!("screenshot saved to {}", path.display());
                self.captures.push(path);
                Ok(())
            }
            Err(err) if self.spec.validation == Validation::Strict => Err(err.context("screenshot failed")),
            Err(err) => {
                log::error!("screenshot failed: {err:#}");
                Ok(())
            }
        }
    }

    /// Releases every GPU object of the lesson, newest first.
    pub fn teardown<C>(mut self, ctx: &mut C) -> Result<()>
    where
        C: GraphicsContext + ?Sized,
    {
        log::info!(
            "lesson {} closing after {} frames",
            self.spec.name,
            self.frames_rendered
        );
        self.resources.release_all(ctx)
    }
}

fn resolve(resources: &ResourceSet, plan: &DrawPlan) -> Result<ResolvedDraw> {
    let handle = |index: usize, kind: ResourceKind| -> Result<Handle> {
        let Some(handle) = resources.handle(index) else {
            bail!("resource {index} does not exist");
        };
        ensure!(handle.kind() == kind, "resource {index} is a {handle}, expected {kind:?}");
        Ok(handle)
    };

    let uniforms = match plan.uniforms {
        None => None,
        Some((index, update)) => {
            let buffer = handle(index, ResourceKind::UniformBuffer)?;
            let slots = resources
                .slots(index)
                .with_context(|| format!("resource {index} has no uniform slots"))?;
            let needed = match update {
                UniformUpdate::RewriteBetweenPasses => 1,
                UniformUpdate::SlotPerPass => plan.passes.len() as u64,
            };
            ensure!(
                slots.count >= needed,
                "uniform buffer {index} holds {} records, the passes need {needed}",
                slots.count
            );
            Some((buffer, slots, update))
        }
    };

    Ok(ResolvedDraw {
        program: handle(plan.program, ResourceKind::Program)?,
        vertex_array: handle(plan.vertex_array, ResourceKind::VertexArray)?,
        uniforms,
        texture: plan.texture.map(|index| handle(index, ResourceKind::Texture)).transpose()?,
    })
}
