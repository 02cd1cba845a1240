//! Identity-keyed glow animation state.
//!
//! Instance buffers are rebuilt from scratch every frame, but the hover and
//! selection glow must animate smoothly across frames. That state lives here,
//! in a side table keyed by the stable id the host assigns to each node and
//! port, independent of the transient GPU buffers. Entries whose id no longer
//! appears in the current frame are evicted at the end of each build.

use std::collections::HashMap;

/// Seconds⁻¹ rate at which glow rises while a node or port is active.
const ATTACK_RATE: f32 = 10.0;
/// Seconds⁻¹ rate at which glow decays once inactive.
const DECAY_RATE: f32 = 4.0;

/// Per-identity glow intensities, eased toward 1 while active and toward 0
/// otherwise. Values are always clamped to `[0, 1]`.
#[derive(Debug, Default)]
pub struct GlowTable {
    entries: HashMap<u64, f32>,
}

impl GlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the glow for `id` by `dt` seconds and return its new value.
    ///
    /// Missing ids start at zero, so a newly hovered node fades in rather
    /// than popping to full intensity.
    pub fn advance(&mut self, id: u64, active: bool, dt: f32) -> f32 {
        let glow = self.entries.entry(id).or_insert(0.0);
        let (target, rate) = if active {
            (1.0, ATTACK_RATE)
        } else {
            (0.0, DECAY_RATE)
        };
        *glow += (target - *glow) * (1.0 - (-rate * dt.max(0.0)).exp());
        *glow = glow.clamp(0.0, 1.0);
        *glow
    }

    /// Drop every entry whose id is not accepted by `live`.
    pub fn evict<F: Fn(u64) -> bool>(&mut self, live: F) {
        self.entries.retain(|id, _| live(*id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<f32> {
        self.entries.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glow_eases_toward_target_and_stays_clamped() {
        let mut table = GlowTable::new();
        let mut last = 0.0;
        for _ in 0..20 {
            let glow = table.advance(7, true, 1.0 / 60.0);
            assert!(glow >= last);
            assert!((0.0..=1.0).contains(&glow));
            last = glow;
        }
        assert!(last > 0.9, "glow should approach 1.0 while active: {last}");

        for _ in 0..200 {
            table.advance(7, false, 1.0 / 60.0);
        }
        assert!(table.get(7).unwrap() < 0.05);
    }

    #[test]
    fn large_timestep_never_overshoots() {
        let mut table = GlowTable::new();
        let glow = table.advance(1, true, 10.0);
        assert!((0.0..=1.0).contains(&glow));
    }

    #[test]
    fn vanished_ids_are_evicted() {
        let mut table = GlowTable::new();
        table.advance(1, true, 0.016);
        table.advance(2, true, 0.016);
        table.advance(3, false, 0.016);
        table.evict(|id| id == 2);
        assert_eq!(table.len(), 1);
        assert!(table.get(2).is_some());
        assert!(table.get(1).is_none());
    }
}
