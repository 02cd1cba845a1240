//! # Flowcanvas
//!
//! **The GPU rendering core for interactive node-graph editors.**
//!
//! Flowcanvas draws a scene of draggable nodes, curved connections between
//! node ports, a zoomable background grid, and particle/bloom effects,
//! entirely on the GPU. The host application owns the window, the input, and
//! the graph domain model; once per frame it hands the renderer a snapshot of
//! what is visible and the renderer does the rest.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flowcanvas::*;
//!
//! # fn demo(window: std::sync::Arc<winit::window::Window>) {
//! let gpu = GpuContext::new(window);
//! let mut renderer = GraphRenderer::new(&gpu);
//! let camera = Camera2d::new().at(0.0, 0.0).with_zoom(1.0);
//!
//! let mut scene = GraphScene::new();
//! scene.nodes.push(NodeDesc {
//!     id: 1,
//!     position: Vec2::new(-90.0, -45.0),
//!     size: Vec2::new(180.0, 90.0),
//!     background_color: Color::rgb(0.16, 0.17, 0.21),
//!     header_color: Color::rgb(0.24, 0.35, 0.55),
//!     border_color: Color::rgb(0.45, 0.55, 0.75),
//!     corner_radius: 8.0,
//!     border_width: 1.5,
//!     selected: false,
//!     hovered: false,
//! });
//!
//! // Each redraw:
//! renderer.render(&gpu, &camera, &scene, 1.0 / 60.0);
//! # }
//! ```
//!
//! ## Pipeline
//!
//! Each frame runs Grid → Nodes (instanced) → Connections → Ports →
//! Particles into an off-screen color target, then the bloom chain
//! (extract → blur → composite) onto the surface. All passes share one
//! [`FrameUniforms`] record and the fixed [`BufferSlot`]/[`TextureSlot`]
//! binding table.

mod binding;
mod bloom;
mod camera;
mod connection_pass;
mod frame;
mod glow;
mod gpu;
mod grid_pass;
mod node_pass;
mod particles;
mod port_pass;
mod renderer;
mod scene;
mod target;

pub use binding::{BufferSlot, SAMPLER_BINDING, TextureSlot};
pub use bloom::{BloomParams, BloomPass, MAX_ITERATIONS, MAX_RADIUS};
pub use camera::{Camera2d, FrameUniforms, MAX_ZOOM, MIN_ZOOM};
pub use connection_pass::{
    ConnectionPass, ConnectionVertex, MAX_SAMPLES_PER_CONNECTION, MAX_THICKNESS, MIN_THICKNESS,
    tessellate,
};
pub use frame::{FRAMES_IN_FLIGHT, FrameRing, RingBuffer};
pub use glow::GlowTable;
pub use gpu::GpuContext;
pub use grid_pass::{GridPass, GridStyle, GridUniforms, MAJOR_RATIO};
pub use node_pass::{MAX_NODES, NodeInstance, NodePass, NodeVertex};
pub use particles::{POOL_SIZE, Particle, ParticlePass, ParticleSystem};
pub use port_pass::{MAX_PORTS, PortInstance, PortPass};
pub use renderer::GraphRenderer;
pub use scene::{Color, ConnectionDesc, EmissionEvent, GraphScene, NodeDesc, PortDesc};
pub use target::RenderTarget;

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2, Vec4};
