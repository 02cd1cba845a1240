//! Procedural background grid.
//!
//! A single fullscreen pass: the fragment shader maps each pixel back through
//! the camera transform into graph space and tests proximity to minor/major
//! grid-line multiples. Spacing is fixed in graph units, so lines stay put as
//! the camera pans and zooms; only their on-screen density changes. Minor
//! lines fade out once their pixel spacing gets small enough to alias.

use crate::binding::BufferSlot;
use crate::gpu::GpuContext;
use crate::scene::Color;

/// Minor grid lines per major grid line.
pub const MAJOR_RATIO: f32 = 10.0;

/// Grid appearance configuration supplied by the host theme.
#[derive(Clone, Copy, Debug)]
pub struct GridStyle {
    pub minor_color: Color,
    pub major_color: Color,
    pub background_color: Color,
    /// Minor line spacing in graph units; major spacing is always 10×.
    pub minor_spacing: f32,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            minor_color: Color::rgba(1.0, 1.0, 1.0, 0.05),
            major_color: Color::rgba(1.0, 1.0, 1.0, 0.12),
            background_color: Color::rgb(0.09, 0.09, 0.11),
            minor_spacing: 25.0,
        }
    }
}

/// Grid appearance uniforms, bound at `@group(0) @binding(3)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridUniforms {
    pub minor_color: [f32; 4],
    pub major_color: [f32; 4],
    pub background_color: [f32; 4],
    pub minor_spacing: f32,
    pub major_spacing: f32,
    pub zoom: f32,
    pub _padding: f32,
}

/// Derive the frame's grid uniforms from the style and the clamped zoom.
///
/// Spacing is re-derived every frame from the style rather than accumulated,
/// so it can never drift or grow unbounded as zoom changes. A non-positive
/// configured spacing falls back to the default.
pub fn derive_uniforms(style: &GridStyle, zoom: f32) -> GridUniforms {
    let minor = if style.minor_spacing > 0.0 {
        style.minor_spacing
    } else {
        log::warn!(
            "grid minor spacing {} is not positive, using default",
            style.minor_spacing
        );
        GridStyle::default().minor_spacing
    };
    GridUniforms {
        minor_color: style.minor_color.to_array(),
        major_color: style.major_color.to_array(),
        background_color: style.background_color.to_array(),
        minor_spacing: minor,
        major_spacing: minor * MAJOR_RATIO,
        zoom,
        _padding: 0.0,
    }
}

/// The background grid render pass.
pub struct GridPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GridPass {
    pub fn new(gpu: &GpuContext, frame_uniforms: &wgpu::Buffer) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/grid.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Uniforms"),
            size: std::mem::size_of::<GridUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::Uniforms.binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: BufferSlot::GridUniforms.binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: BufferSlot::Uniforms.binding(),
                    resource: frame_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BufferSlot::GridUniforms.binding(),
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Grid Pipeline"),
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
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    /// Upload this frame's grid uniforms.
    pub fn update(&self, gpu: &GpuContext, style: &GridStyle, zoom: f32) {
        let uniforms = derive_uniforms(style, zoom);
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Draw the grid as a fullscreen triangle.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_matches_the_gpu_contract() {
        assert_eq!(std::mem::size_of::<GridUniforms>(), 64);
    }

    #[test]
    fn major_spacing_is_ten_times_minor() {
        let style = GridStyle {
            minor_spacing: 10.0,
            ..Default::default()
        };
        let uniforms = derive_uniforms(&style, 1.0);
        assert_eq!(uniforms.minor_spacing, 10.0);
        assert_eq!(uniforms.major_spacing, 100.0);
    }

    #[test]
    fn spacing_is_zoom_invariant_in_graph_space() {
        let style = GridStyle {
            minor_spacing: 10.0,
            ..Default::default()
        };
        let near = derive_uniforms(&style, 1.0);
        let far = derive_uniforms(&style, 0.1);
        assert_eq!(near.major_spacing, far.major_spacing);
        assert_eq!(near.minor_spacing, far.minor_spacing);
        assert_eq!(far.zoom, 0.1);
    }

    #[test]
    fn non_positive_spacing_falls_back_to_default() {
        let style = GridStyle {
            minor_spacing: -5.0,
            ..Default::default()
        };
        let uniforms = derive_uniforms(&style, 1.0);
        assert!(uniforms.minor_spacing > 0.0);
        assert_eq!(
            uniforms.major_spacing,
            uniforms.minor_spacing * MAJOR_RATIO
        );
    }
}
