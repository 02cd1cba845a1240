//! Off-screen render targets for the scene color buffer and bloom chain.

use crate::gpu::GpuContext;

/// An off-screen color target that can be both rendered to and sampled.
///
/// The scene passes draw into one of these instead of the surface so the
/// bloom chain can read the result back as a texture. Two more serve as the
/// bloom ping-pong pair: each blur iteration writes one while sampling the
/// other, then the roles swap.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Create a target matching the current surface size and format.
    pub fn new(gpu: &GpuContext, label: &str) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: gpu.width().max(1),
                height: gpu.height().max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: gpu.width().max(1),
            height: gpu.height().max(1),
        }
    }

    /// Recreate the target if the surface was resized since the last frame.
    ///
    /// Returns `true` when the texture was recreated, so callers can rebuild
    /// bind groups that referenced the old view.
    pub fn ensure_size(&mut self, gpu: &GpuContext, label: &str) -> bool {
        if self.width != gpu.width().max(1) || self.height != gpu.height().max(1) {
            *self = Self::new(gpu, label);
            true
        } else {
            false
        }
    }
}
