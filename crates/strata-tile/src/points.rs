use crate::levels::QuadtreeLevels;

/// Which lattice points of a tile carry a vertex.
///
/// Points are only ever added during a build. [`ActivePointSet::activate`]
/// keeps the set closed under the quadtree dependency rule so every block
/// the triangulator visits can be split without T-junctions.
#[derive(Clone, Debug)]
pub struct ActivePointSet {
    edge: usize,
    side: usize,
    bits: Vec<bool>,
    count: usize,
}

impl ActivePointSet {
    pub fn new(edge: usize) -> Self {
        let side = edge + 1;
        Self {
            edge,
            side,
            bits: vec![false; side * side],
            count: 0,
        }
    }

    #[inline]
    pub fn edge(&self) -> usize {
        self.edge
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    fn index(&self, x: i32, z: i32) -> Option<usize> {
        let n = self.side as i32;
        if x < 0 || z < 0 || x >= n || z >= n {
            return None;
        }
        Some(z as usize * self.side + x as usize)
    }

    /// Out-of-range points are never active.
    #[inline]
    pub fn is_active(&self, x: i32, z: i32) -> bool {
        self.index(x, z).is_some_and(|i| self.bits[i])
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
        self.count = 0;
    }

    pub fn clear_row(&mut self, z: usize) {
        let row = &mut self.bits[z * self.side..(z + 1) * self.side];
        let cleared = row.iter().filter(|b| **b).count();
        row.fill(false);
        self.count -= cleared;
    }

    /// Set a point without propagating. Returns whether it was newly set.
    pub fn force(&mut self, x: i32, z: i32) -> bool {
        let Some(i) = self.index(x, z) else {
            return false;
        };
        if self.bits[i] {
            return false;
        }
        self.bits[i] = true;
        self.count += 1;
        true
    }

    /// Set a point and every point it depends on. Returns how many were newly
    /// set.
    ///
    /// An edge midpoint needs the centers of the two blocks sharing its edge.
    /// A block center needs the two corners of its block that are midpoints of
    /// the parent block's edges (the diagonal not through the parent center).
    /// Propagation stops at points already active or outside the tile.
    pub fn activate(
        &mut self,
        x: i32,
        z: i32,
        levels: &QuadtreeLevels,
        stack: &mut Vec<(i32, i32)>,
    ) -> usize {
        stack.clear();
        stack.push((x, z));
        let mut added = 0;
        while let Some((x, z)) = stack.pop() {
            if !self.force(x, z) {
                continue;
            }
            added += 1;
            let lx = levels.level(x as usize) as i32;
            let lz = levels.level(z as usize) as i32;
            if lx > lz {
                stack.push((x - lz, z));
                stack.push((x + lz, z));
            } else if lz > lx {
                stack.push((x, z - lx));
                stack.push((x, z + lx));
            } else if (lx as usize) < self.edge {
                let l = lx;
                let bx = (x - l) / (2 * l);
                let bz = (z - l) / (2 * l);
                if (bx + bz) % 2 == 0 {
                    stack.push((x + l, z - l));
                    stack.push((x - l, z + l));
                } else {
                    stack.push((x - l, z - l));
                    stack.push((x + l, z + l));
                }
            }
        }
        added
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let side = self.side;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(move |(i, _)| ((i % side) as i32, (i / side) as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(edge: usize, grid: i32) -> ActivePointSet {
        let mut p = ActivePointSet::new(edge);
        for z in (0..=edge as i32).step_by(grid as usize) {
            for x in (0..=edge as i32).step_by(grid as usize) {
                p.force(x, z);
            }
        }
        p
    }

    #[test]
    fn edge_midpoint_pulls_in_adjacent_block_center() {
        let levels = QuadtreeLevels::new(8);
        let mut p = ActivePointSet::new(8);
        let mut stack = Vec::new();
        // x = 2 is a level-2 midpoint on the z = 0 border; the only block
        // sharing that edge is centered at (2, 2).
        let added = p.activate(2, 0, &levels, &mut stack);
        assert!(p.is_active(2, 2));
        assert!(p.is_active(4, 0) && p.is_active(0, 4) && p.is_active(4, 4));
        assert_eq!(added, p.count());
        assert!(!p.is_active(6, 2));
    }

    #[test]
    fn block_center_pulls_in_diagonal_away_from_parent_center() {
        let levels = QuadtreeLevels::new(8);
        let mut p = seeded(8, 4);
        let before = p.count();
        let mut stack = Vec::new();
        // (3, 1) centers block (2,0)-(4,2), the north-east quadrant of the
        // parent centered at (2, 2): it needs (2, 0) and (4, 2).
        let added = p.activate(3, 1, &levels, &mut stack);
        assert!(p.is_active(2, 0) && p.is_active(4, 2));
        // Both of those are edge midpoints and need their block centers.
        assert!(p.is_active(2, 2) && p.is_active(6, 2));
        assert_eq!(added, 5);
        assert_eq!(p.count(), before + 5);
        assert!(!p.is_active(1, 1) && !p.is_active(2, 4));
    }

    #[test]
    fn already_active_points_add_nothing() {
        let levels = QuadtreeLevels::new(8);
        let mut p = seeded(8, 4);
        let before = p.count();
        let mut stack = Vec::new();
        assert_eq!(p.activate(4, 4, &levels, &mut stack), 0);
        assert_eq!(p.count(), before);
        assert!(!p.is_active(-1, 0));
        assert!(!p.force(9, 0));
    }

    #[test]
    fn clear_row_keeps_count_consistent() {
        let mut p = seeded(8, 4);
        assert_eq!(p.count(), 9);
        p.clear_row(4);
        assert_eq!(p.count(), 6);
        assert_eq!(p.iter_active().count(), 6);
    }
}
