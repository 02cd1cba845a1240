use glam::{Mat4, Vec2, Vec3};

/// Smallest zoom the projection will ever be built with.
///
/// Zoom values at or below zero would produce a non-invertible projection, so
/// assignment clamps into `[MIN_ZOOM, MAX_ZOOM]` instead of propagating an
/// error into the frame loop.
pub const MIN_ZOOM: f32 = 0.05;
/// Largest zoom the projection will ever be built with.
pub const MAX_ZOOM: f32 = 20.0;

/// Per-frame camera and time uniforms, read-only across all passes.
///
/// Bound at `@group(0) @binding(1)` by every shader. The layout matches the
/// WGSL `FrameUniforms` struct field-for-field; the trailing padding satisfies
/// 16-byte uniform alignment and is always written as zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    /// Maps graph-space coordinates to normalized device coordinates.
    pub view_projection: [[f32; 4]; 4],
    /// Viewport size in pixels `[width, height]`.
    pub viewport_size: [f32; 2],
    /// Elapsed time in seconds.
    pub time: f32,
    /// Current zoom factor (already clamped).
    pub zoom: f32,
    /// Graph-space coordinate at the viewport center.
    pub pan: [f32; 2],
    pub _padding: [f32; 2],
}

/// A 2D pan/zoom camera over graph space.
///
/// `pan` is the graph-space point shown at the viewport center; `zoom` scales
/// graph units to pixels. The projection is
/// `orthographic(viewport) ∘ scale(zoom) ∘ translate(-pan)`, with +y pointing
/// down to match screen coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Camera2d {
    /// Graph-space coordinate at the viewport center.
    pub pan: Vec2,
    /// Viewport size in pixels.
    pub viewport: Vec2,
    zoom: f32,
}

impl Default for Camera2d {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            viewport: Vec2::new(1280.0, 720.0),
            zoom: 1.0,
        }
    }
}

impl Camera2d {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.pan = Vec2::new(x, y);
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.set_zoom(zoom);
        self
    }

    /// Set the zoom factor, clamping into `[MIN_ZOOM, MAX_ZOOM]`.
    ///
    /// Non-finite input falls back to the minimum zoom.
    pub fn set_zoom(&mut self, zoom: f32) {
        let clamped = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            MIN_ZOOM
        };
        if clamped != zoom {
            log::warn!("camera zoom {zoom} out of range, clamped to {clamped}");
        }
        self.zoom = clamped;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The graph→NDC matrix for the current pan/zoom/viewport.
    pub fn view_projection(&self) -> Mat4 {
        let half = (self.viewport * 0.5).max(Vec2::ONE);
        // +y down: top edge maps to -half.y.
        let projection = Mat4::orthographic_rh(-half.x, half.x, half.y, -half.y, -1.0, 1.0);
        let view = Mat4::from_scale(Vec3::new(self.zoom, self.zoom, 1.0))
            * Mat4::from_translation(Vec3::new(-self.pan.x, -self.pan.y, 0.0));
        projection * view
    }

    /// Build the frame uniforms for this camera at the given elapsed time.
    pub fn frame_uniforms(&self, time: f32) -> FrameUniforms {
        FrameUniforms {
            view_projection: self.view_projection().to_cols_array_2d(),
            viewport_size: self.viewport.to_array(),
            time,
            zoom: self.zoom,
            pan: self.pan.to_array(),
            _padding: [0.0, 0.0],
        }
    }

    /// Convert a screen-space pixel position to graph space.
    pub fn screen_to_graph(&self, screen: Vec2) -> Vec2 {
        (screen - self.viewport * 0.5) / self.zoom + self.pan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped_at_assignment() {
        let mut camera = Camera2d::new();
        camera.set_zoom(0.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);
        camera.set_zoom(-3.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);
        camera.set_zoom(1000.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
        camera.set_zoom(f32::NAN);
        assert_eq!(camera.zoom(), MIN_ZOOM);
    }

    #[test]
    fn degenerate_zoom_never_yields_a_singular_matrix() {
        let camera = Camera2d::new().with_zoom(0.0);
        let vp = camera.view_projection();
        assert!(vp.to_cols_array().iter().all(|v| v.is_finite()));
        assert!(vp.determinant().abs() > 0.0);
    }

    #[test]
    fn pan_point_projects_to_ndc_origin() {
        let camera = Camera2d::new().at(320.0, -75.0).with_zoom(2.0);
        let clip = camera.view_projection() * glam::Vec4::new(320.0, -75.0, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-5);
        assert!(clip.y.abs() < 1e-5);
    }

    #[test]
    fn uniform_layout_matches_the_gpu_contract() {
        // mat4x4 + vec2 + 2 floats + vec2 + 2 floats of padding.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 96);
    }

    #[test]
    fn screen_to_graph_round_trips() {
        let camera = Camera2d::new().at(100.0, 50.0).with_zoom(0.5);
        let graph = camera.screen_to_graph(Vec2::new(640.0, 360.0));
        assert!((graph - Vec2::new(100.0, 50.0)).length() < 1e-4);
    }
}
