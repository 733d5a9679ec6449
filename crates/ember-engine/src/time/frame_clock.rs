use std::time::Instant;

/// Wall clock of a render loop.
///
/// Animation reads `elapsed`, the seconds since the loop started. It is not
/// clamped, so a stalled or minimized window resumes at the current angle.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since the clock was created.
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
