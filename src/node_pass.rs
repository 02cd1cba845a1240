//! Instanced node rendering.
//!
//! Every visible node is one [`NodeInstance`] in a storage buffer; the whole
//! node layer is a single instanced draw over a shared 6-vertex quad. Corner
//! rounding, the border, and the selection glow are evaluated per-fragment
//! with a signed distance to a rounded rectangle, so draw-call count stays
//! constant no matter how many nodes the graph holds.

use std::collections::HashSet;

use glam::{Mat4, Vec3};

use crate::binding::BufferSlot;
use crate::frame::{FRAMES_IN_FLIGHT, RingBuffer};
use crate::glow::GlowTable;
use crate::gpu::GpuContext;
use crate::scene::NodeDesc;

/// Most node instances a single frame can hold.
pub const MAX_NODES: usize = 4096;

/// One corner of the shared node quad.
///
/// The quad spans `[0, 1]²`; each instance's transform stretches it over the
/// node's rectangle.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
}

/// Per-node render state for GPU instancing.
///
/// Bound as a storage array at `@group(0) @binding(2)`. Layout matches the
/// WGSL `NodeInstance` struct; the trailing float pads the struct to a
/// 16-byte multiple and is always zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeInstance {
    /// Position + size as a 2D affine transform in the z=0 plane.
    pub transform: [[f32; 4]; 4],
    pub background_color: [f32; 4],
    pub header_color: [f32; 4],
    pub border_color: [f32; 4],
    /// Node extent in graph units, for fragment-stage distance math.
    pub size: [f32; 2],
    pub corner_radius: f32,
    pub border_width: f32,
    pub glow_intensity: f32,
    pub selected: f32,
    pub hovered: f32,
    pub _padding: f32,
}

/// Build one instance per node, in input order, advancing the glow table.
///
/// Entries in the glow table whose node id vanished this frame are evicted.
/// Zero or negative node sizes fall back to a minimal 1×1 quad so the
/// transform never collapses.
pub fn build_instances(
    nodes: &[NodeDesc],
    glow: &mut GlowTable,
    dt: f32,
) -> Vec<NodeInstance> {
    let mut live = HashSet::with_capacity(nodes.len());
    let instances = nodes
        .iter()
        .map(|node| {
            live.insert(node.id);
            let glow_intensity = glow.advance(node.id, node.selected || node.hovered, dt);
            let size = node.size.max(glam::Vec2::ONE);
            let transform = Mat4::from_translation(Vec3::new(node.position.x, node.position.y, 0.0))
                * Mat4::from_scale(Vec3::new(size.x, size.y, 1.0));
            NodeInstance {
                transform: transform.to_cols_array_2d(),
                background_color: node.background_color.to_array(),
                header_color: node.header_color.to_array(),
                border_color: node.border_color.to_array(),
                size: size.to_array(),
                corner_radius: node.corner_radius.max(0.0),
                border_width: node.border_width.max(0.0),
                glow_intensity,
                selected: if node.selected { 1.0 } else { 0.0 },
                hovered: if node.hovered { 1.0 } else { 0.0 },
                _padding: 0.0,
            }
        })
        .collect();
    glow.evict(|id| live.contains(&id));
    instances
}

/// The instanced node render pass.
pub struct NodePass {
    pipeline: wgpu::RenderPipeline,
    instances: RingBuffer<NodeInstance>,
    bind_groups: [wgpu::BindGroup; FRAMES_IN_FLIGHT],
    glow: GlowTable,
}

impl NodePass {
    pub fn new(gpu: &GpuContext, frame_uniforms: &wgpu::Buffer) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Node Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/node.wgsl").into()),
        });

        // Two triangles over the unit square; per-corner color is white so
        // instance colors pass through unchanged.
        let quad = quad_vertices();
        let quad_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Node Quad"),
            size: std::mem::size_of_val(&quad) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&quad_buffer, 0, bytemuck::cast_slice(&quad));

        let instances = RingBuffer::new(
            gpu,
            "Node Instances",
            MAX_NODES,
            wgpu::BufferUsages::STORAGE,
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Node Bind Group Layout"),
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
                label: Some("Node Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: BufferSlot::Vertices.binding(),
                        resource: quad_buffer.as_entire_binding(),
                    },
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
            label: Some("Node Pipeline Layout"),
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
            label: Some("Node Pipeline"),
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
    pub fn prepare(&mut self, gpu: &GpuContext, slot: usize, nodes: &[NodeDesc], dt: f32) -> u32 {
        let instances = build_instances(nodes, &mut self.glow, dt);
        self.instances.write(gpu, slot, &instances) as u32
    }

    /// Issue the single instanced draw for all nodes.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, slot: usize, count: u32) {
        if count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_groups[slot], &[]);
        render_pass.draw(0..6, 0..count);
    }
}

fn quad_vertices() -> [NodeVertex; 6] {
    let corner = |x: f32, y: f32| NodeVertex {
        position: [x, y],
        tex_coord: [x, y],
        color: [1.0, 1.0, 1.0, 1.0],
    };
    [
        corner(0.0, 0.0),
        corner(1.0, 0.0),
        corner(0.0, 1.0),
        corner(1.0, 0.0),
        corner(1.0, 1.0),
        corner(0.0, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Color;
    use glam::Vec2;

    fn node(id: u64, x: f32) -> NodeDesc {
        NodeDesc {
            id,
            position: Vec2::new(x, 0.0),
            size: Vec2::new(180.0, 90.0),
            background_color: Color::rgb(0.2, 0.2, 0.25),
            header_color: Color::rgb(0.3, 0.3, 0.4),
            border_color: Color::rgb(0.5, 0.5, 0.6),
            corner_radius: 8.0,
            border_width: 1.5,
            selected: false,
            hovered: false,
        }
    }

    #[test]
    fn instance_layout_matches_the_gpu_contract() {
        assert_eq!(std::mem::size_of::<NodeVertex>(), 32);
        // 144 bytes: a 16-byte multiple, as storage array strides require.
        assert_eq!(std::mem::size_of::<NodeInstance>(), 144);
    }

    #[test]
    fn one_instance_per_node_in_input_order() {
        let mut glow = GlowTable::new();
        let nodes = vec![node(3, 30.0), node(1, 10.0), node(2, 20.0)];
        let instances = build_instances(&nodes, &mut glow, 0.016);
        assert_eq!(instances.len(), nodes.len());
        for (instance, desc) in instances.iter().zip(&nodes) {
            // Column-major: translation lives in column 3.
            assert_eq!(instance.transform[3][0], desc.position.x);
            assert_eq!(instance.transform[3][1], desc.position.y);
        }
    }

    #[test]
    fn transform_encodes_position_and_size() {
        let mut glow = GlowTable::new();
        let instances = build_instances(&[node(1, 40.0)], &mut glow, 0.016);
        let m = Mat4::from_cols_array_2d(&instances[0].transform);
        let far_corner = m * glam::Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!(far_corner.x, 40.0 + 180.0);
        assert_eq!(far_corner.y, 90.0);
    }

    #[test]
    fn zero_size_node_falls_back_to_minimal_quad() {
        let mut glow = GlowTable::new();
        let mut desc = node(1, 0.0);
        desc.size = Vec2::ZERO;
        let instances = build_instances(&[desc], &mut glow, 0.016);
        assert_eq!(instances[0].size, [1.0, 1.0]);
    }

    #[test]
    fn glow_rises_while_selected_and_is_evicted_when_gone() {
        let mut glow = GlowTable::new();
        let mut selected = node(1, 0.0);
        selected.selected = true;

        let first = build_instances(&[selected.clone(), node(2, 10.0)], &mut glow, 0.016);
        let second = build_instances(&[selected], &mut glow, 0.016);
        assert!(second[0].glow_intensity > first[0].glow_intensity);
        assert!((0.0..=1.0).contains(&second[0].glow_intensity));

        // Node 2 vanished in the second frame.
        assert!(glow.get(2).is_none());
        assert!(glow.get(1).is_some());
    }

    #[test]
    fn flags_are_normalized() {
        let mut glow = GlowTable::new();
        let mut desc = node(1, 0.0);
        desc.hovered = true;
        let instances = build_instances(&[desc], &mut glow, 0.016);
        assert_eq!(instances[0].hovered, 1.0);
        assert_eq!(instances[0].selected, 0.0);
        assert_eq!(instances[0]._padding, 0.0);
    }
}
