/// What the render loop does after the surface refused a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Lost or outdated: the surface was configured again at the current size.
    Reconfigured,
    /// Timed out or otherwise transient: present nothing this iteration.
    SkipFrame,
    /// Out of memory; the lesson cannot continue.
    Fatal,
}
