/// Swapchain image the current lesson frame renders into.
///
/// Held by the context from the first flush until `present`; no other frame
/// can be acquired meanwhile.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}
