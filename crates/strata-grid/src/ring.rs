use std::sync::{Arc, Mutex, OnceLock};

use hashbrown::HashMap;
use strata_geom::GridCoord;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingEntry {
    pub offset: GridCoord,
    pub distance: f32,
}

/// Every offset of a `size×size` window, nearest to the center first.
#[derive(Debug)]
pub struct RingSchedule {
    size: usize,
    entries: Box<[RingEntry]>,
}

impl RingSchedule {
    pub fn new(size: usize) -> Self {
        assert!(size % 2 == 1, "ring schedule size must be odd, got {size}");
        let half = (size / 2) as i32;
        let mut offsets: Vec<(i32, i32)> = Vec::with_capacity(size * size);
        for dz in -half..=half {
            for dx in -half..=half {
                offsets.push((dx, dz));
            }
        }
        // Exact integer key; (dz, dx) breaks ties so the order is reproducible.
        offsets.sort_by_key(|&(dx, dz)| (dx * dx + dz * dz, dz, dx));
        let entries = offsets
            .into_iter()
            .map(|(dx, dz)| RingEntry {
                offset: GridCoord::new(dx, dz),
                distance: ((dx * dx + dz * dz) as f32).sqrt(),
            })
            .collect();
        Self { size, entries }
    }

    /// Process-wide schedule for `size`, built on first use.
    pub fn shared(size: usize) -> Arc<RingSchedule> {
        static SHARED: OnceLock<Mutex<HashMap<usize, Arc<RingSchedule>>>> = OnceLock::new();
        let table = SHARED.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = match table.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(size)
            .or_insert_with(|| Arc::new(RingSchedule::new(size)))
            .clone()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sweep radius: entries farther than this are never visited.
    #[inline]
    pub fn radius(&self) -> f32 {
        (self.size / 2) as f32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&RingEntry> {
        self.entries.get(i)
    }

    #[inline]
    pub fn entries(&self) -> &[RingEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_five_schedule_is_sorted_from_center() {
        let ring = RingSchedule::new(5);
        assert_eq!(ring.len(), 25);
        let first = ring.get(0).copied().unwrap();
        assert_eq!(first.offset, GridCoord::new(0, 0));
        assert_eq!(first.distance, 0.0);
        for pair in ring.entries().windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        let corners = ring
            .entries()
            .iter()
            .filter(|e| e.distance > ring.radius())
            .count();
        // (±2, ±1), (±1, ±2), (±2, ±2) sit outside the sweep circle.
        assert_eq!(corners, 12);
    }

    #[test]
    fn shared_schedules_are_reused() {
        let a = RingSchedule::shared(7);
        let b = RingSchedule::shared(7);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 49);
    }
}
