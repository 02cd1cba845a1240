//! Particle simulation and rendering for ambient and feedback effects.
//!
//! The pool is a fixed-size arena with a free list of expired slot indices:
//! emission pops a free slot, expiry pushes it back, and the arena never
//! reallocates. Emission requests beyond capacity are dropped silently, in
//! input order, so the policy is deterministic. Simulation runs on the CPU
//! each frame; live particles are compacted into a storage buffer and drawn
//! as one batch of camera-facing quads with additive blending.

use bytemuck::Zeroable;
use rand::Rng;

use crate::binding::{BufferSlot, SAMPLER_BINDING, TextureSlot};
use crate::frame::{FRAMES_IN_FLIGHT, RingBuffer};
use crate::gpu::GpuContext;
use crate::scene::EmissionEvent;

/// Fixed particle pool capacity.
pub const POOL_SIZE: usize = 2048;

/// Side length of the generated noise texture.
const NOISE_SIZE: u32 = 256;

/// One simulated particle.
///
/// Bound as a storage array at `@group(0) @binding(4)`. The trailing float
/// pads the struct to a 16-byte multiple and is always zero. `life` counts
/// down from `max_life` to zero; the fragment stage fades alpha with the
/// remaining fraction.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub color: [f32; 4],
    pub size: f32,
    pub life: f32,
    pub max_life: f32,
    pub _padding: f32,
}

impl Particle {
    fn alive(&self) -> bool {
        self.life > 0.0
    }
}

/// Fixed-capacity particle pool with slot recycling.
pub struct ParticleSystem {
    pool: Box<[Particle]>,
    free: Vec<usize>,
    staging: Vec<Particle>,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self {
            pool: vec![Particle::zeroed(); POOL_SIZE].into_boxed_slice(),
            free: (0..POOL_SIZE).rev().collect(),
            staging: Vec::with_capacity(POOL_SIZE),
        }
    }

    /// Spawn particles for one emission event.
    ///
    /// Velocities are jittered component-wise between the event's min and max;
    /// size and lifetime get a little variation per particle. Once the pool is
    /// exhausted the remaining count is dropped.
    pub fn emit(&mut self, event: &EmissionEvent) {
        let mut rng = rand::rng();
        for spawned in 0..event.count {
            let Some(index) = self.free.pop() else {
                log::debug!(
                    "particle pool exhausted, dropping {} of {} requested",
                    event.count - spawned,
                    event.count
                );
                return;
            };
            let velocity = [
                rng.random_range(event.velocity_min.x..=event.velocity_max.x.max(event.velocity_min.x)),
                rng.random_range(event.velocity_min.y..=event.velocity_max.y.max(event.velocity_min.y)),
            ];
            let max_life = rng.random_range(0.6..1.4);
            self.pool[index] = Particle {
                position: event.position.to_array(),
                velocity,
                color: event.color.to_array(),
                size: rng.random_range(2.0..6.0),
                life: max_life,
                max_life,
                _padding: 0.0,
            };
        }
    }

    /// Advance every live particle by `dt` seconds.
    ///
    /// Expired slots go back on the free list exactly once.
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        for (index, particle) in self.pool.iter_mut().enumerate() {
            if !particle.alive() {
                continue;
            }
            particle.position[0] += particle.velocity[0] * dt;
            particle.position[1] += particle.velocity[1] * dt;
            particle.life = (particle.life - dt).max(0.0);
            if !particle.alive() {
                self.free.push(index);
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        POOL_SIZE - self.free.len()
    }

    /// Live particles compacted for upload, in pool order.
    pub fn compact(&mut self) -> &[Particle] {
        self.staging.clear();
        self.staging
            .extend(self.pool.iter().filter(|p| p.alive()).copied());
        &self.staging
    }
}

/// The particle render pass.
pub struct ParticlePass {
    pipeline: wgpu::RenderPipeline,
    particles: RingBuffer<Particle>,
    bind_groups: [wgpu::BindGroup; FRAMES_IN_FLIGHT],
    texture_bind_group: wgpu::BindGroup,
}

impl ParticlePass {
    pub fn new(gpu: &GpuContext, frame_uniforms: &wgpu::Buffer) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particle.wgsl").into()),
        });

        let particles = RingBuffer::new(
            gpu,
            "Particle Buffer",
            POOL_SIZE,
            wgpu::BufferUsages::STORAGE,
        );

        let (noise_view, sampler) = create_noise_texture(gpu);

        let buffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Uniforms.binding(),
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Particles.binding(),
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: TextureSlot::Noise.binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_groups = std::array::from_fn(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particle Bind Group"),
                layout: &buffer_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Uniforms.binding(),
                        resource: frame_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Particles.binding(),
                        resource: particles.buffer(slot).as_entire_binding(),
                    },
                ],
            })
        });

        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Texture Bind Group"),
            layout: &texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TextureSlot::Noise.binding(),
                    resource: wgpu::BindingResource::TextureView(&noise_view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&buffer_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        // Additive blend so overlapping particles build up into a glow.
        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            particles,
            bind_groups,
            texture_bind_group,
        }
    }

    /// Upload the live particles for this frame. Returns the draw count.
    pub fn prepare(&mut self, gpu: &GpuContext, slot: usize, system: &mut ParticleSystem) -> u32 {
        let live = system.compact();
        self.particles.write(gpu, slot, live) as u32
    }

    /// Draw all live particles in one batch.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, slot: usize, count: u32) {
        if count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_groups[slot], &[]);
        render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
        render_pass.draw(0..6, 0..count);
    }
}

/// Generate the tiling noise texture sampled for per-particle variation.
fn create_noise_texture(gpu: &GpuContext) -> (wgpu::TextureView, wgpu::Sampler) {
    let mut rng = rand::rng();
    let mut pixels = vec![0u8; (NOISE_SIZE * NOISE_SIZE * 4) as usize];
    rng.fill(pixels.as_mut_slice());

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Particle Noise"),
        size: wgpu::Extent3d {
            width: NOISE_SIZE,
            height: NOISE_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(NOISE_SIZE * 4),
            rows_per_image: Some(NOISE_SIZE),
        },
        wgpu::Extent3d {
            width: NOISE_SIZE,
            height: NOISE_SIZE,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Particle Noise Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    (view, sampler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Color;
    use glam::Vec2;

    fn burst(count: u32) -> EmissionEvent {
        EmissionEvent {
            position: Vec2::new(10.0, 20.0),
            velocity_min: Vec2::new(-50.0, -80.0),
            velocity_max: Vec2::new(50.0, -20.0),
            color: Color::rgb(1.0, 0.8, 0.3),
            count,
        }
    }

    #[test]
    fn particle_layout_matches_the_gpu_contract() {
        assert_eq!(std::mem::size_of::<Particle>(), 48);
        assert_eq!(std::mem::offset_of!(Particle, color), 16);
    }

    #[test]
    fn life_stays_within_bounds_every_tick() {
        let mut system = ParticleSystem::new();
        system.emit(&burst(64));
        for _ in 0..120 {
            system.update(0.05);
            for particle in system.pool.iter() {
                assert!(particle.life >= 0.0);
                assert!(particle.life <= particle.max_life);
            }
        }
    }

    #[test]
    fn expired_particles_are_never_uploaded() {
        let mut system = ParticleSystem::new();
        system.emit(&burst(32));
        assert_eq!(system.alive_count(), 32);
        // Max lifetime is under 1.4s; run well past it.
        for _ in 0..40 {
            system.update(0.1);
        }
        assert_eq!(system.alive_count(), 0);
        assert!(system.compact().is_empty());
    }

    #[test]
    fn emission_beyond_capacity_is_dropped() {
        let mut system = ParticleSystem::new();
        system.emit(&burst(POOL_SIZE as u32 + 500));
        assert_eq!(system.alive_count(), POOL_SIZE);
        // A second burst has nothing left to claim.
        system.emit(&burst(10));
        assert_eq!(system.alive_count(), POOL_SIZE);
    }

    #[test]
    fn expired_slots_are_recycled() {
        let mut system = ParticleSystem::new();
        system.emit(&burst(POOL_SIZE as u32));
        for _ in 0..40 {
            system.update(0.1);
        }
        assert_eq!(system.alive_count(), 0);
        system.emit(&burst(16));
        assert_eq!(system.alive_count(), 16);
    }

    #[test]
    fn particles_move_with_their_velocity() {
        let mut system = ParticleSystem::new();
        let event = EmissionEvent {
            velocity_min: Vec2::new(100.0, 0.0),
            velocity_max: Vec2::new(100.0, 0.0),
            ..burst(1)
        };
        system.emit(&event);
        system.update(0.5);
        let live = system.compact();
        assert_eq!(live.len(), 1);
        assert!((live[0].position[0] - (10.0 + 50.0)).abs() < 1e-3);
        assert!((live[0].position[1] - 20.0).abs() < 1e-3);
    }
}
