//! The fixed GPU binding slot table shared by every pass.
//!
//! All passes bind their buffers and textures at the numbers defined here, so
//! the table is the single place where slot assignments live. The numbering is
//! part of the shader contract and must not change: every WGSL file under
//! `src/shaders/` hardcodes the same values in its `@binding` attributes.
//!
//! Buffers bind in `@group(0)`, textures in `@group(1)`. Samplers are not part
//! of the table (they are their own namespace on every backend); the shared
//! sampler binds in the texture group at [`SAMPLER_BINDING`].

/// Buffer binding numbers for `@group(0)`.
///
/// Each pass binds only the slots it uses; unused slots are simply absent from
/// that pass's bind group layout. Two passes may bind different data at the
/// same slot (node instances vs. port instances at [`BufferSlot::Instances`])
/// but never two different slots for the same datum.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    /// Per-vertex data: the shared node quad, connection strip vertices.
    Vertices = 0,
    /// Per-frame camera/time uniforms, read-only across all passes.
    Uniforms = 1,
    /// Per-instance data: node instances, port instances.
    Instances = 2,
    /// Grid appearance uniforms.
    GridUniforms = 3,
    /// The live particle buffer.
    Particles = 4,
    /// Bloom post-process tuning.
    BloomParams = 5,
}

/// Texture binding numbers for `@group(1)`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// The rendered scene color target.
    Color = 0,
    /// Bloom intermediate (ping-pong) target.
    Bloom = 1,
    /// Noise texture for particle variation.
    Noise = 2,
}

/// Binding number of the shared linear sampler in the texture group.
///
/// Sits after the last [`TextureSlot`] so it can never collide with one.
pub const SAMPLER_BINDING: u32 = 3;

impl BufferSlot {
    /// The `@binding` number in `@group(0)`.
    pub const fn binding(self) -> u32 {
        self as u32
    }
}

impl TextureSlot {
    /// The `@binding` number in `@group(1)`.
    pub const fn binding(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_slots_match_the_table() {
        assert_eq!(BufferSlot::Vertices.binding(), 0);
        assert_eq!(BufferSlot::Uniforms.binding(), 1);
        assert_eq!(BufferSlot::Instances.binding(), 2);
        assert_eq!(BufferSlot::GridUniforms.binding(), 3);
        assert_eq!(BufferSlot::Particles.binding(), 4);
        assert_eq!(BufferSlot::BloomParams.binding(), 5);
    }

    #[test]
    fn texture_slots_match_the_table() {
        assert_eq!(TextureSlot::Color.binding(), 0);
        assert_eq!(TextureSlot::Bloom.binding(), 1);
        assert_eq!(TextureSlot::Noise.binding(), 2);
    }

    #[test]
    fn slots_never_collide() {
        let buffers = [
            BufferSlot::Vertices,
            BufferSlot::Uniforms,
            BufferSlot::Instances,
            BufferSlot::GridUniforms,
            BufferSlot::Particles,
            BufferSlot::BloomParams,
        ];
        for (i, a) in buffers.iter().enumerate() {
            for b in &buffers[i + 1..] {
                assert_ne!(a.binding(), b.binding());
            }
        }

        let textures = [TextureSlot::Color, TextureSlot::Bloom, TextureSlot::Noise];
        for (i, a) in textures.iter().enumerate() {
            for b in &textures[i + 1..] {
                assert_ne!(a.binding(), b.binding());
            }
        }
        for t in &textures {
            assert_ne!(t.binding(), SAMPLER_BINDING);
        }
    }
}
