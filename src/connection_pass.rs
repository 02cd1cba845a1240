//! Curved connection rendering.
//!
//! Each connection is a cubic Bezier between two port positions, tessellated
//! on the CPU into centerline samples carrying arc-length progress and
//! thickness. The vertex stage extrudes every sample into a ribbon two
//! vertices wide; the fragment stage uses `progress` against the frame time
//! to animate a traveling glow along the curve.

use glam::Vec2;

use crate::binding::BufferSlot;
use crate::frame::{FRAMES_IN_FLIGHT, RingBuffer};
use crate::gpu::GpuContext;
use crate::scene::{Color, ConnectionDesc};

/// Ribbon thickness at the endpoints, and the degenerate fallback thickness.
pub const MIN_THICKNESS: f32 = 1.0;
/// Ribbon thickness at the curve midpoint.
pub const MAX_THICKNESS: f32 = 3.5;
/// Upper bound on samples for a single connection, however long or zoomed.
pub const MAX_SAMPLES_PER_CONNECTION: usize = 256;
/// Total centerline samples a frame's buffer can hold (incl. sentinels).
pub const MAX_CONNECTION_VERTICES: usize = 65536;

/// Target on-screen distance between adjacent samples, in pixels.
const PIXELS_PER_SAMPLE: f32 = 8.0;

/// One sample point along a connection curve.
///
/// Bound as a storage array at `@group(0) @binding(0)`. The explicit padding
/// fields satisfy WGSL struct alignment (`color` must sit on a 16-byte
/// boundary) and are always zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ConnectionVertex {
    pub position: [f32; 2],
    pub _pad0: [f32; 2],
    pub color: [f32; 4],
    /// Arc-length position along the curve in `[0, 1]`.
    pub progress: f32,
    pub thickness: f32,
    pub _pad1: [f32; 2],
}

fn cubic(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

/// Tessellate one connection into centerline samples.
///
/// Sample count scales with the curve's on-screen length at the current zoom,
/// bounded to `[2, MAX_SAMPLES_PER_CONNECTION]`. Progress is assigned by
/// accumulated arc length, so it is monotonically non-decreasing from 0 at
/// the source port to 1 at the target. Thickness tapers from
/// [`MAX_THICKNESS`] at the midpoint to [`MIN_THICKNESS`] at the endpoints.
/// Samples past `animation_phase` are faded, which renders a connection that
/// is still being drawn out as a ghost of its final shape.
///
/// Coincident endpoints produce exactly two samples at that position with the
/// minimum thickness; the tangent is never derived from a zero-length chord.
pub fn tessellate(desc: &ConnectionDesc, zoom: f32) -> Vec<ConnectionVertex> {
    let phase = desc.animation_phase.clamp(0.0, 1.0);

    if desc.from.distance_squared(desc.to) < 1e-6 {
        let vertex = |progress: f32| ConnectionVertex {
            position: desc.from.to_array(),
            _pad0: [0.0, 0.0],
            color: desc.color.to_array(),
            progress,
            thickness: MIN_THICKNESS,
            _pad1: [0.0, 0.0],
        };
        return vec![vertex(0.0), vertex(1.0)];
    }

    // Horizontal control handles, the usual look for left-to-right flows.
    let reach = ((desc.to.x - desc.from.x).abs() * 0.5).max(40.0);
    let c1 = desc.from + Vec2::new(reach, 0.0);
    let c2 = desc.to - Vec2::new(reach, 0.0);

    // The control polygon length bounds the curve length from above; good
    // enough to pick a sample density that keeps chord error subpixel.
    let estimate = desc.from.distance(c1) + c1.distance(c2) + c2.distance(desc.to);
    let samples = ((estimate * zoom / PIXELS_PER_SAMPLE).ceil() as usize)
        .clamp(2, MAX_SAMPLES_PER_CONNECTION);

    let points: Vec<Vec2> = (0..samples)
        .map(|i| cubic(desc.from, c1, c2, desc.to, i as f32 / (samples - 1) as f32))
        .collect();

    let mut arc = Vec::with_capacity(samples);
    let mut total = 0.0;
    arc.push(0.0);
    for pair in points.windows(2) {
        total += pair[0].distance(pair[1]);
        arc.push(total);
    }

    points
        .iter()
        .zip(&arc)
        .map(|(point, &length)| {
            let progress = (length / total).clamp(0.0, 1.0);
            let taper = (4.0 * progress * (1.0 - progress)).clamp(0.0, 1.0);
            let fade = if progress <= phase { 1.0 } else { 0.12 };
            ConnectionVertex {
                position: point.to_array(),
                _pad0: [0.0, 0.0],
                color: desc.color.faded(fade).to_array(),
                progress,
                thickness: MIN_THICKNESS + (MAX_THICKNESS - MIN_THICKNESS) * taper,
                _pad1: [0.0, 0.0],
            }
        })
        .collect()
}

/// Extrapolated sentinel sample appended after each connection so the vertex
/// stage can always take a forward difference for the tangent.
fn sentinel(samples: &[ConnectionVertex]) -> ConnectionVertex {
    let last = samples[samples.len() - 1];
    let mut out = last;
    if samples.len() >= 2 {
        let prev = samples[samples.len() - 2];
        out.position = [
            2.0 * last.position[0] - prev.position[0],
            2.0 * last.position[1] - prev.position[1],
        ];
    }
    out
}

/// Draw range for one connection: first sample index and sample count.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionRange {
    start: u32,
    count: u32,
}

/// The connection render pass.
pub struct ConnectionPass {
    pipeline: wgpu::RenderPipeline,
    vertices: RingBuffer<ConnectionVertex>,
    bind_groups: [wgpu::BindGroup; FRAMES_IN_FLIGHT],
    ranges: Vec<ConnectionRange>,
}

impl ConnectionPass {
    pub fn new(gpu: &GpuContext, frame_uniforms: &wgpu::Buffer) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Connection Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/connection.wgsl").into()),
        });

        let vertices = RingBuffer::new(
            gpu,
            "Connection Vertices",
            MAX_CONNECTION_VERTICES,
            wgpu::BufferUsages::STORAGE,
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Connection Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Vertices.binding(),
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Uniforms.binding(),
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_groups = std::array::from_fn(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Connection Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Vertices.binding(),
                        resource: vertices.buffer(slot).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Uniforms.binding(),
                        resource: frame_uniforms.as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Connection Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Connection Pipeline"),
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
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertices,
            bind_groups,
            ranges: Vec::new(),
        }
    }

    /// Tessellate and upload all connections for this frame.
    ///
    /// Connections that no longer fit in the fixed buffer are dropped in
    /// input order, never partially uploaded.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        slot: usize,
        connections: &[ConnectionDesc],
        zoom: f32,
    ) {
        self.ranges.clear();
        let mut staging: Vec<ConnectionVertex> = Vec::new();

        for desc in connections {
            let samples = tessellate(desc, zoom);
            // One extra slot for the tangent sentinel.
            if staging.len() + samples.len() + 1 > self.vertices.capacity() {
                log::warn!(
                    "connection buffer full after {} connections, dropping the rest",
                    self.ranges.len()
                );
                break;
            }
            self.ranges.push(ConnectionRange {
                start: staging.len() as u32,
                count: samples.len() as u32,
            });
            let tail = sentinel(&samples);
            staging.extend(samples);
            staging.push(tail);
        }

        self.vertices.write(gpu, slot, &staging);
    }

    /// Draw each connection as its own triangle strip.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, slot: usize) {
        if self.ranges.is_empty() {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_groups[slot], &[]);
        for range in &self.ranges {
            let first = range.start * 2;
            render_pass.draw(first..first + range.count * 2, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(from: Vec2, to: Vec2) -> ConnectionDesc {
        ConnectionDesc {
            from,
            to,
            color: Color::rgb(0.4, 0.7, 1.0),
            animation_phase: 1.0,
        }
    }

    #[test]
    fn vertex_layout_matches_the_gpu_contract() {
        // The explicit pads place `color` on a 16-byte boundary.
        assert_eq!(std::mem::size_of::<ConnectionVertex>(), 48);
        assert_eq!(std::mem::offset_of!(ConnectionVertex, color), 16);
    }

    #[test]
    fn progress_is_monotone_from_zero_to_one() {
        let samples = tessellate(&desc(Vec2::ZERO, Vec2::new(400.0, 150.0)), 1.0);
        assert!(samples.len() >= 2);
        assert_eq!(samples[0].progress, 0.0);
        assert_eq!(samples[samples.len() - 1].progress, 1.0);
        for pair in samples.windows(2) {
            assert!(pair[1].progress >= pair[0].progress);
        }
    }

    #[test]
    fn coincident_endpoints_yield_exactly_two_samples() {
        let point = Vec2::new(33.0, -7.0);
        let samples = tessellate(&desc(point, point), 1.0);
        assert_eq!(samples.len(), 2);
        for sample in &samples {
            assert_eq!(sample.position, point.to_array());
            assert_eq!(sample.thickness, MIN_THICKNESS);
        }
    }

    #[test]
    fn sample_count_scales_with_zoom_and_stays_bounded() {
        let long = desc(Vec2::ZERO, Vec2::new(2000.0, 0.0));
        let near = tessellate(&long, 1.0);
        let far = tessellate(&long, 0.1);
        assert!(near.len() > far.len());
        assert!(near.len() <= MAX_SAMPLES_PER_CONNECTION);
        assert!(far.len() >= 2);

        let extreme = tessellate(&long, 20.0);
        assert_eq!(extreme.len(), MAX_SAMPLES_PER_CONNECTION);
    }

    #[test]
    fn thickness_tapers_to_minimum_at_endpoints() {
        let samples = tessellate(&desc(Vec2::ZERO, Vec2::new(500.0, 0.0)), 1.0);
        assert_eq!(samples[0].thickness, MIN_THICKNESS);
        assert_eq!(samples[samples.len() - 1].thickness, MIN_THICKNESS);
        let mid = &samples[samples.len() / 2];
        assert!(mid.thickness > samples[0].thickness);
        assert!(mid.thickness <= MAX_THICKNESS);
    }

    #[test]
    fn animation_phase_fades_the_unreached_tail() {
        let mut connection = desc(Vec2::ZERO, Vec2::new(300.0, 0.0));
        connection.animation_phase = 0.5;
        let samples = tessellate(&connection, 1.0);
        let head_alpha = samples[0].color[3];
        let tail_alpha = samples[samples.len() - 1].color[3];
        assert!(head_alpha > tail_alpha);
    }

    #[test]
    fn out_of_range_phase_is_clamped() {
        let mut connection = desc(Vec2::ZERO, Vec2::new(300.0, 0.0));
        connection.animation_phase = 7.0;
        let samples = tessellate(&connection, 1.0);
        assert!(samples.iter().all(|s| s.color[3] == connection.color.a));
    }

    #[test]
    fn sentinel_continues_the_final_tangent() {
        let samples = tessellate(&desc(Vec2::ZERO, Vec2::new(100.0, 0.0)), 1.0);
        let tail = sentinel(&samples);
        let last = samples[samples.len() - 1];
        let prev = samples[samples.len() - 2];
        let dx = last.position[0] - prev.position[0];
        let dy = last.position[1] - prev.position[1];
        assert!((tail.position[0] - (last.position[0] + dx)).abs() < 1e-4);
        assert!((tail.position[1] - (last.position[1] + dy)).abs() < 1e-4);
    }
}
