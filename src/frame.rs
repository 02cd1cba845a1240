//! Per-frame buffer rotation.
//!
//! GPU submission is asynchronous: the CPU may start preparing frame N+1
//! while the GPU is still consuming frame N's buffers. Every per-frame buffer
//! therefore exists as a ring of [`FRAMES_IN_FLIGHT`] instances; the CPU only
//! ever writes the slot selected by the [`FrameRing`] cursor, which advances
//! once per submitted frame. The rotation is plain index arithmetic, decoupled
//! from any backend synchronization primitive.

use crate::gpu::GpuContext;

/// Ring depth for per-frame buffers.
pub const FRAMES_IN_FLIGHT: usize = 3;

/// The frame cursor selecting which ring slot is safe to write this frame.
#[derive(Debug, Default)]
pub struct FrameRing {
    cursor: usize,
}

impl FrameRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot index the CPU may write this frame.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance to the next slot. Call once per submitted frame.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % FRAMES_IN_FLIGHT;
    }
}

/// A fixed-capacity GPU buffer replicated once per in-flight frame.
///
/// Capacity is fixed at creation; writes beyond it truncate with a warning
/// rather than growing the buffer mid-frame.
pub struct RingBuffer<T> {
    buffers: [wgpu::Buffer; FRAMES_IN_FLIGHT],
    capacity: usize,
    label: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T: bytemuck::Pod> RingBuffer<T> {
    pub fn new(
        gpu: &GpuContext,
        label: &'static str,
        capacity: usize,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffers = std::array::from_fn(|i| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} [{i}]")),
                size: (capacity * std::mem::size_of::<T>()) as u64,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        Self {
            buffers,
            capacity,
            label,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Upload `items` into the given ring slot, truncating at capacity.
    ///
    /// Returns the number of items actually written.
    pub fn write(&self, gpu: &GpuContext, slot: usize, items: &[T]) -> usize {
        let count = if items.len() > self.capacity {
            log::warn!(
                "{}: {} items exceed capacity {}, truncating",
                self.label,
                items.len(),
                self.capacity
            );
            self.capacity
        } else {
            items.len()
        };
        if count > 0 {
            gpu.queue
                .write_buffer(&self.buffers[slot], 0, bytemuck::cast_slice(&items[..count]));
        }
        count
    }

    pub fn buffer(&self, slot: usize) -> &wgpu::Buffer {
        &self.buffers[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_rotates_through_all_slots() {
        let mut ring = FrameRing::new();
        let mut seen = Vec::new();
        for _ in 0..FRAMES_IN_FLIGHT * 2 {
            seen.push(ring.cursor());
            ring.advance();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut ring = FrameRing::new();
        for _ in 0..100 {
            assert!(ring.cursor() < FRAMES_IN_FLIGHT);
            ring.advance();
        }
    }
}
