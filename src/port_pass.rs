//! Instanced port socket rendering.
//!
//! Ports follow the same instancing scheme as nodes: one [`PortInstance`] per
//! socket, one draw call for the whole layer, and an analytic circle in the
//! fragment stage. Connected ports render a filled core, hovered ports a glow
//! ring driven by the same keyed animation table the node pass uses.

use std::collections::HashSet;

use crate::binding::BufferSlot;
use crate::frame::{FRAMES_IN_FLIGHT, RingBuffer};
use crate::glow::GlowTable;
use crate::gpu::GpuContext;
use crate::scene::PortDesc;

/// Most port instances a single frame can hold.
pub const MAX_PORTS: usize = 8192;

/// Per-port render state for GPU instancing.
///
/// Bound as a storage array at `@group(0) @binding(2)`. The padding after
/// `position` keeps `color` on a 16-byte boundary as WGSL requires; it is
/// always zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PortInstance {
    pub position: [f32; 2],
    pub _padding: [f32; 2],
    pub color: [f32; 4],
    pub radius: f32,
    pub connected: f32,
    pub hovered: f32,
    pub glow_intensity: f32,
}

/// Build one instance per port, in input order, advancing the glow table.
pub fn build_instances(ports: &[PortDesc], glow: &mut GlowTable, dt: f32) -> Vec<PortInstance> {
    let mut live = HashSet::with_capacity(ports.len());
    let instances = ports
        .iter()
        .map(|port| {
            live.insert(port.id);
            let glow_intensity = glow.advance(port.id, port.hovered, dt);
            PortInstance {
                position: port.position.to_array(),
                _padding: [0.0, 0.0],
                color: port.color.to_array(),
                radius: port.radius.max(0.5),
                connected: if port.connected { 1.0 } else { 0.0 },
                hovered: if port.hovered { 1.0 } else { 0.0 },
                glow_intensity,
            }
        })
        .collect();
    glow.evict(|id| live.contains(&id));
    instances
}

/// The instanced port render pass.
pub struct PortPass {
    pipeline: wgpu::RenderPipeline,
    instances: RingBuffer<PortInstance>,
    bind_groups: [wgpu::BindGroup; FRAMES_IN_FLIGHT],
    glow: GlowTable,
}

impl PortPass {
    pub fn new(gpu: &GpuContext, frame_uniforms: &wgpu::Buffer) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Port Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/port.wgsl").into()),
        });

        let instances = RingBuffer::new(
            gpu,
            "Port Instances",
            MAX_PORTS,
            wgpu::BufferUsages::STORAGE,
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Port Bind Group Layout"),
            entries: &[
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
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Instances.binding(),
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

        let bind_groups = std::array::from_fn(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Port Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Uniforms.binding(),
                        resource: frame_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Instances.binding(),
                        resource: instances.buffer(slot).as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Port Pipeline Layout"),
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
            label: Some("Port Pipeline"),
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
            instances,
            bind_groups,
            glow: GlowTable::new(),
        }
    }

    /// Rebuild and upload this frame's instances. Returns the instance count.
    pub fn prepare(&mut self, gpu: &GpuContext, slot: usize, ports: &[PortDesc], dt: f32) -> u32 {
        let instances = build_instances(ports, &mut self.glow, dt);
        self.instances.write(gpu, slot, &instances) as u32
    }

    /// Issue the single instanced draw for all ports.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, slot: usize, count: u32) {
        if count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_groups[slot], &[]);
        render_pass.draw(0..6, 0..count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Color;
    use glam::Vec2;

    fn port(id: u64, hovered: bool) -> PortDesc {
        PortDesc {
            id,
            position: Vec2::new(id as f32 * 10.0, 5.0),
            color: Color::rgb(0.3, 0.8, 0.5),
            radius: 6.0,
            connected: false,
            hovered,
        }
    }

    #[test]
    fn instance_layout_matches_the_gpu_contract() {
        assert_eq!(std::mem::size_of::<PortInstance>(), 48);
        assert_eq!(std::mem::offset_of!(PortInstance, color), 16);
    }

    #[test]
    fn one_instance_per_port_in_input_order() {
        let mut glow = GlowTable::new();
        let ports = vec![port(5, false), port(2, false), port(9, true)];
        let instances = build_instances(&ports, &mut glow, 0.016);
        assert_eq!(instances.len(), 3);
        for (instance, desc) in instances.iter().zip(&ports) {
            assert_eq!(instance.position, desc.position.to_array());
        }
    }

    #[test]
    fn hover_glow_animates_and_stays_in_range() {
        let mut glow = GlowTable::new();
        let first = build_instances(&[port(1, true)], &mut glow, 0.016);
        let second = build_instances(&[port(1, true)], &mut glow, 0.016);
        assert!(second[0].glow_intensity > first[0].glow_intensity);
        assert!((0.0..=1.0).contains(&second[0].glow_intensity));
    }

    #[test]
    fn tiny_radius_is_floored() {
        let mut glow = GlowTable::new();
        let mut desc = port(1, false);
        desc.radius = 0.0;
        let instances = build_instances(&[desc], &mut glow, 0.016);
        assert_eq!(instances[0].radius, 0.5);
    }
}
