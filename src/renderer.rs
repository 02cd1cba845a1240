//! Frame orchestration.
//!
//! [`GraphRenderer`] owns every pass and runs one frame end to end: refresh
//! the shared uniforms, rebuild the per-frame buffers from the scene
//! snapshot, record the scene passes in order (grid → nodes → connections →
//! ports → particles) into the off-screen color target, then run the bloom
//! chain and composite into the acquired surface. Only the particle pool and
//! the glow tables survive between frames; everything else is rebuilt, so a
//! skipped frame leaves no stale state behind.

use crate::bloom::{BloomParams, BloomPass};
use crate::camera::{Camera2d, FrameUniforms};
use crate::connection_pass::ConnectionPass;
use crate::frame::FrameRing;
use crate::gpu::GpuContext;
use crate::grid_pass::{GridPass, GridStyle};
use crate::node_pass::NodePass;
use crate::particles::{ParticlePass, ParticleSystem};
use crate::port_pass::PortPass;
use crate::scene::GraphScene;
use crate::target::RenderTarget;

/// The complete frame-rendering pipeline.
pub struct GraphRenderer {
    frame_uniforms: wgpu::Buffer,
    grid_style: GridStyle,
    grid: GridPass,
    nodes: NodePass,
    connections: ConnectionPass,
    ports: PortPass,
    particle_system: ParticleSystem,
    particle_pass: ParticlePass,
    bloom: BloomPass,
    scene_target: RenderTarget,
    ring: FrameRing,
    time: f32,
}

impl GraphRenderer {
    pub fn new(gpu: &GpuContext) -> Self {
        let frame_uniforms = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            grid: GridPass::new(gpu, &frame_uniforms),
            nodes: NodePass::new(gpu, &frame_uniforms),
            connections: ConnectionPass::new(gpu, &frame_uniforms),
            ports: PortPass::new(gpu, &frame_uniforms),
            particle_system: ParticleSystem::new(),
            particle_pass: ParticlePass::new(gpu, &frame_uniforms),
            bloom: BloomPass::new(gpu),
            scene_target: RenderTarget::new(gpu, "Scene Color"),
            ring: FrameRing::new(),
            time: 0.0,
            grid_style: GridStyle::default(),
            frame_uniforms,
        }
    }

    /// Replace the grid theme.
    pub fn set_grid_style(&mut self, style: GridStyle) {
        self.grid_style = style;
    }

    pub fn grid_style(&self) -> GridStyle {
        self.grid_style
    }

    /// Replace the bloom tuning; out-of-range values are clamped.
    pub fn set_bloom_params(&mut self, gpu: &GpuContext, params: BloomParams) {
        self.bloom.set_params(gpu, params);
    }

    pub fn bloom_params(&self) -> BloomParams {
        self.bloom.params()
    }

    /// Render one frame from the host's scene snapshot.
    ///
    /// `dt` is the seconds elapsed since the previous call; negative values
    /// are treated as zero. If the surface cannot be acquired the frame is
    /// skipped without side effects and the next call starts clean.
    pub fn render(&mut self, gpu: &GpuContext, camera: &Camera2d, scene: &GraphScene, dt: f32) {
        let dt = dt.max(0.0);
        self.time += dt;
        let slot = self.ring.cursor();

        // CPU-side preparation. Each collection writes a disjoint ring
        // buffer, all before the frame's passes are recorded.
        let uniforms = camera.frame_uniforms(self.time);
        gpu.queue
            .write_buffer(&self.frame_uniforms, 0, bytemuck::cast_slice(&[uniforms]));
        self.grid.update(gpu, &self.grid_style, camera.zoom());

        let node_count = self.nodes.prepare(gpu, slot, &scene.nodes, dt);
        self.connections
            .prepare(gpu, slot, &scene.connections, camera.zoom());
        let port_count = self.ports.prepare(gpu, slot, &scene.ports, dt);

        for event in &scene.emissions {
            self.particle_system.emit(event);
        }
        self.particle_system.update(dt);
        let particle_count = self
            .particle_pass
            .prepare(gpu, slot, &mut self.particle_system);

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring and skipping frame");
                gpu.reconfigure();
                return;
            }
            Err(error) => {
                log::warn!("failed to acquire surface, skipping frame: {error}");
                return;
            }
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.scene_target.ensure_size(gpu, "Scene Color");

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.scene_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.grid.render(&mut pass);
            self.nodes.render(&mut pass, slot, node_count);
            self.connections.render(&mut pass, slot);
            self.ports.render(&mut pass, slot, port_count);
            self.particle_pass.render(&mut pass, slot, particle_count);
        }

        self.bloom
            .render(gpu, &mut encoder, &self.scene_target.view, &surface_view);

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.ring.advance();
    }
}
