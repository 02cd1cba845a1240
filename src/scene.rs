//! The per-frame input contract between the host editor and the renderer.
//!
//! The host owns the node-graph domain model. Once per frame it hands the
//! renderer a [`GraphScene`]: plain descriptions of every visible node,
//! connection, and port, plus any particle emission events triggered since the
//! last frame. The renderer rebuilds its GPU buffers from this snapshot each
//! frame, so the host never needs to tell it what changed.

use glam::Vec2;

/// An RGBA color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Same color with alpha scaled by `factor`.
    pub fn faded(self, factor: f32) -> Self {
        Self {
            a: self.a * factor,
            ..self
        }
    }
}

/// Render state for one visible node.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    /// Stable identity across frames; keys the glow animation table.
    pub id: u64,
    /// Graph-space position of the node's top-left corner.
    pub position: Vec2,
    /// Node extent in graph units.
    pub size: Vec2,
    pub background_color: Color,
    pub header_color: Color,
    pub border_color: Color,
    pub corner_radius: f32,
    pub border_width: f32,
    pub selected: bool,
    pub hovered: bool,
}

/// Render state for one connection between two ports.
///
/// Endpoint positions are already resolved to graph space by the host;
/// `animation_phase` in `[0, 1]` drives the connect/flow animation and is
/// clamped on use.
#[derive(Clone, Debug)]
pub struct ConnectionDesc {
    pub from: Vec2,
    pub to: Vec2,
    pub color: Color,
    pub animation_phase: f32,
}

/// Render state for one port socket.
#[derive(Clone, Debug)]
pub struct PortDesc {
    /// Stable identity across frames; keys the glow animation table.
    pub id: u64,
    pub position: Vec2,
    pub color: Color,
    pub radius: f32,
    pub connected: bool,
    pub hovered: bool,
}

/// A discrete particle emission request (e.g. "connection completed").
///
/// Each spawned particle picks a velocity uniformly between `velocity_min`
/// and `velocity_max`, component-wise.
#[derive(Clone, Debug)]
pub struct EmissionEvent {
    pub position: Vec2,
    pub velocity_min: Vec2,
    pub velocity_max: Vec2,
    pub color: Color,
    pub count: u32,
}

/// Everything the renderer needs to draw one frame.
#[derive(Clone, Debug, Default)]
pub struct GraphScene {
    pub nodes: Vec<NodeDesc>,
    pub connections: Vec<ConnectionDesc>,
    pub ports: Vec<PortDesc>,
    pub emissions: Vec<EmissionEvent>,
}

impl GraphScene {
    pub fn new() -> Self {
        Self::default()
    }
}
