//! Bloom post-process chain: threshold extract → separable blur → composite.
//!
//! The scene color target is thresholded into the first bloom target, blurred
//! horizontally and vertically per iteration across the ping-pong pair, then
//! composited over the original into the presented surface as
//! `final = original + bloom × intensity`. Iteration count and radius are
//! clamped to small bounds so the per-frame cost stays fixed.

use crate::binding::{BufferSlot, SAMPLER_BINDING, TextureSlot};
use crate::gpu::GpuContext;
use crate::target::RenderTarget;

/// Hard upper bound on blur iterations.
pub const MAX_ITERATIONS: i32 = 8;
/// Hard upper bound on the blur kernel radius, in pixels.
pub const MAX_RADIUS: f32 = 32.0;

/// Bloom tuning, bound at `@group(0) @binding(5)`.
///
/// Values are clamped on assignment (see [`BloomParams::clamped`]); the
/// renderer never sees a malformed configuration.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomParams {
    /// Luminance above which a pixel feeds the bloom chain.
    pub threshold: f32,
    /// Strength of the bloom contribution in the composite.
    pub intensity: f32,
    /// Gaussian kernel radius in pixels.
    pub radius: f32,
    /// Blur iterations; each runs a horizontal and a vertical pass.
    pub iterations: i32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            intensity: 0.8,
            radius: 4.0,
            iterations: 3,
        }
    }
}

impl BloomParams {
    /// Clamp every field into its safe range, falling back to defaults for
    /// non-finite values.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let sanitize = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };
        Self {
            threshold: sanitize(self.threshold, defaults.threshold).max(0.0),
            intensity: sanitize(self.intensity, defaults.intensity).max(0.0),
            radius: sanitize(self.radius, defaults.radius).clamp(0.0, MAX_RADIUS),
            iterations: self.iterations.clamp(1, MAX_ITERATIONS),
        }
    }
}

/// Pass-internal blur direction, deliberately outside the shared slot table
/// (its own bind group) so it can never collide with a numbered slot.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurDirection {
    direction: [f32; 2],
    _padding: [f32; 2],
}

/// The three-stage bloom pass.
pub struct BloomPass {
    extract_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,

    params: BloomParams,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,

    extract_texture_layout: wgpu::BindGroupLayout,
    blur_texture_layout: wgpu::BindGroupLayout,
    composite_texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    // Written once; the horizontal and vertical blur swap bind groups
    // instead of re-uploading a direction uniform every pass.
    blur_h_bind_group: wgpu::BindGroup,
    blur_v_bind_group: wgpu::BindGroup,

    ping: RenderTarget,
    pong: RenderTarget,
}

impl BloomPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let extract_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Extract Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom_extract.wgsl").into()),
        });
        let blur_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Blur Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom_blur.wgsl").into()),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom_composite.wgsl").into()),
        });

        let params = BloomParams::default();
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Params"),
            size: std::mem::size_of::<BloomParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&params_buffer, 0, bytemuck::cast_slice(&[params]));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bloom Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Params Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: BufferSlot::BloomParams.binding(),
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Params Bind Group"),
            layout: &params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: BufferSlot::BloomParams.binding(),
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = wgpu::BindGroupLayoutEntry {
            binding: SAMPLER_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        // Extract samples the scene color at the color slot; blur samples the
        // bloom intermediate at the bloom slot.
        let extract_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Extract Texture Layout"),
                entries: &[texture_entry(TextureSlot::Color.binding()), sampler_entry],
            });
        let blur_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Blur Texture Layout"),
                entries: &[texture_entry(TextureSlot::Bloom.binding()), sampler_entry],
            });

        let composite_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Composite Texture Layout"),
                entries: &[
                    texture_entry(TextureSlot::Color.binding()),
                    texture_entry(TextureSlot::Bloom.binding()),
                    sampler_entry,
                ],
            });

        let direction_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Direction Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let blur_h_buffer = direction_buffer(gpu, [1.0, 0.0], "Blur Direction H");
        let blur_v_buffer = direction_buffer(gpu, [0.0, 1.0], "Blur Direction V");

        let blur_h_bind_group =
            direction_bind_group(device, &direction_layout, &blur_h_buffer, "Blur H Bind Group");
        let blur_v_bind_group =
            direction_bind_group(device, &direction_layout, &blur_v_buffer, "Blur V Bind Group");

        let extract_pipeline = fullscreen_pipeline(
            gpu,
            "Bloom Extract Pipeline",
            &extract_shader,
            &[&params_layout, &extract_texture_layout],
        );
        let blur_pipeline = fullscreen_pipeline(
            gpu,
            "Bloom Blur Pipeline",
            &blur_shader,
            &[&params_layout, &blur_texture_layout, &direction_layout],
        );
        let composite_pipeline = fullscreen_pipeline(
            gpu,
            "Bloom Composite Pipeline",
            &composite_shader,
            &[&params_layout, &composite_texture_layout],
        );

        let ping = RenderTarget::new(gpu, "Bloom Ping");
        let pong = RenderTarget::new(gpu, "Bloom Pong");

        Self {
            extract_pipeline,
            blur_pipeline,
            composite_pipeline,
            params,
            params_buffer,
            params_bind_group,
            extract_texture_layout,
            blur_texture_layout,
            composite_texture_layout,
            sampler,
            blur_h_bind_group,
            blur_v_bind_group,
            ping,
            pong,
        }
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Install new bloom tuning, clamping it into the safe ranges first.
    pub fn set_params(&mut self, gpu: &GpuContext, params: BloomParams) {
        let clamped = params.clamped();
        if clamped != params {
            log::warn!("bloom params out of range, clamped: {params:?} -> {clamped:?}");
        }
        self.params = clamped;
        gpu.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[clamped]));
    }

    fn texture_bind_group(
        &self,
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        slot: TextureSlot,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: slot.binding(),
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn run_fullscreen(
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        bind_groups: &[&wgpu::BindGroup],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
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
        pass.set_pipeline(pipeline);
        for (index, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, *bind_group, &[]);
        }
        pass.draw(0..3, 0..1);
    }

    /// Run the bloom chain over `scene_view` and composite into `output`.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        self.ping.ensure_size(gpu, "Bloom Ping");
        self.pong.ensure_size(gpu, "Bloom Pong");

        // Threshold extract: scene color → ping.
        let extract_input = self.texture_bind_group(
            gpu,
            &self.extract_texture_layout,
            TextureSlot::Color,
            scene_view,
        );
        Self::run_fullscreen(
            encoder,
            "Bloom Extract",
            &self.ping.view,
            &self.extract_pipeline,
            &[&self.params_bind_group, &extract_input],
        );

        // Separable blur, ping-pong per iteration: H ping→pong, V pong→ping.
        let ping_input =
            self.texture_bind_group(gpu, &self.blur_texture_layout, TextureSlot::Bloom, &self.ping.view);
        let pong_input =
            self.texture_bind_group(gpu, &self.blur_texture_layout, TextureSlot::Bloom, &self.pong.view);
        for _ in 0..self.params.iterations {
            Self::run_fullscreen(
                encoder,
                "Bloom Blur H",
                &self.pong.view,
                &self.blur_pipeline,
                &[&self.params_bind_group, &ping_input, &self.blur_h_bind_group],
            );
            Self::run_fullscreen(
                encoder,
                "Bloom Blur V",
                &self.ping.view,
                &self.blur_pipeline,
                &[&self.params_bind_group, &pong_input, &self.blur_v_bind_group],
            );
        }

        // Composite: original + bloom × intensity → output.
        let composite_input = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Composite Bind Group"),
            layout: &self.composite_texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TextureSlot::Color.binding(),
                    resource: wgpu::BindingResource::TextureView(scene_view),
                },
                wgpu::BindGroupEntry {
                    binding: TextureSlot::Bloom.binding(),
                    resource: wgpu::BindingResource::TextureView(&self.ping.view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        Self::run_fullscreen(
            encoder,
            "Bloom Composite",
            output,
            &self.composite_pipeline,
            &[&self.params_bind_group, &composite_input],
        );
    }
}

fn direction_buffer(gpu: &GpuContext, direction: [f32; 2], label: &str) -> wgpu::Buffer {
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<BlurDirection>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    gpu.queue.write_buffer(
        &buffer,
        0,
        bytemuck::cast_slice(&[BlurDirection {
            direction,
            _padding: [0.0, 0.0],
        }]),
    );
    buffer
}

fn direction_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn fullscreen_pipeline(
    gpu: &GpuContext,
    label: &str,
    shader: &wgpu::ShaderModule,
    layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let device = &gpu.device;
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format: gpu.config.format,
                blend: Some(wgpu::BlendState::REPLACE),
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
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_layout_matches_the_gpu_contract() {
        assert_eq!(std::mem::size_of::<BloomParams>(), 16);
    }

    #[test]
    fn malformed_params_are_clamped() {
        let clamped = BloomParams {
            threshold: -1.0,
            intensity: -0.5,
            radius: 100.0,
            iterations: 0,
        }
        .clamped();
        assert_eq!(clamped.threshold, 0.0);
        assert_eq!(clamped.intensity, 0.0);
        assert_eq!(clamped.radius, MAX_RADIUS);
        assert_eq!(clamped.iterations, 1);
    }

    #[test]
    fn iterations_are_bounded_above() {
        let clamped = BloomParams {
            iterations: 1000,
            ..Default::default()
        }
        .clamped();
        assert_eq!(clamped.iterations, MAX_ITERATIONS);
    }

    #[test]
    fn valid_params_pass_through_unchanged() {
        let params = BloomParams {
            threshold: 1.0,
            intensity: 0.0,
            radius: 2.0,
            iterations: 4,
        };
        assert_eq!(params.clamped(), params);
    }

    #[test]
    fn non_finite_fields_fall_back_to_defaults() {
        let clamped = BloomParams {
            threshold: f32::NAN,
            intensity: f32::INFINITY,
            radius: f32::NAN,
            iterations: 3,
        }
        .clamped();
        let defaults = BloomParams::default();
        assert_eq!(clamped.threshold, defaults.threshold);
        assert_eq!(clamped.radius, defaults.radius);
    }
}
