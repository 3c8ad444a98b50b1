use std::sync::{Arc, Mutex, OnceLock};

use hashbrown::HashMap;

/// Quadtree level of every lattice coordinate in `[0, edge]`.
///
/// The level of a coordinate is the size of the coarsest quadtree block it is
/// a midpoint of: its largest power-of-two divisor, with both tile borders
/// at the root level `edge`.
#[derive(Debug)]
pub struct QuadtreeLevels {
    edge: usize,
    table: Box<[usize]>,
}

impl QuadtreeLevels {
    pub fn new(edge: usize) -> Self {
        assert!(edge.is_power_of_two(), "tile edge must be a power of two");
        let table = (0..=edge)
            .map(|i| if i == 0 { edge } else { (i & i.wrapping_neg()).min(edge) })
            .collect();
        Self { edge, table }
    }

    /// Shared table for `edge`, built on first use.
    pub fn shared(edge: usize) -> Arc<QuadtreeLevels> {
        static SHARED: OnceLock<Mutex<HashMap<usize, Arc<QuadtreeLevels>>>> = OnceLock::new();
        let table = SHARED.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = match table.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(edge)
            .or_insert_with(|| Arc::new(QuadtreeLevels::new(edge)))
            .clone()
    }

    #[inline]
    pub fn edge(&self) -> usize {
        self.edge
    }

    #[inline]
    pub fn level(&self, i: usize) -> usize {
        self.table[i]
    }

    /// Level of a lattice point: the finer of its two coordinates.
    #[inline]
    pub fn point_level(&self, x: usize, z: usize) -> usize {
        self.table[x].min(self.table[z])
    }
}
