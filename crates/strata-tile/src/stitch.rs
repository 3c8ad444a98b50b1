use strata_grid::Direction;

use crate::levels::QuadtreeLevels;
use crate::points::ActivePointSet;

/// The `i`-th lattice point along the edge shared with the neighbor in `dir`:
/// `(ours, theirs)` in each tile's local coordinates.
#[inline]
pub fn shared_edge(dir: Direction, i: i32, edge: i32) -> ((i32, i32), (i32, i32)) {
    match dir {
        Direction::West => ((0, i), (edge, i)),
        Direction::East => ((edge, i), (0, i)),
        Direction::North => ((i, 0), (i, edge)),
        Direction::South => ((i, edge), (i, 0)),
    }
}

/// Activate every point on our edge that is active on the neighbor's side of
/// it. Returns the number of points newly activated, cascades included.
pub fn stitch_edge(
    ours: &mut ActivePointSet,
    theirs: &ActivePointSet,
    dir: Direction,
    levels: &QuadtreeLevels,
    stack: &mut Vec<(i32, i32)>,
) -> usize {
    let edge = ours.edge() as i32;
    let mut added = 0;
    for i in 0..=edge {
        let ((ox, oz), (nx, nz)) = shared_edge(dir, i, edge);
        if theirs.is_active(nx, nz) && !ours.is_active(ox, oz) {
            added += ours.activate(ox, oz, levels, stack);
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_edges_pair_up_in_world_space() {
        // West neighbor's east column is our west column.
        assert_eq!(shared_edge(Direction::West, 3, 8), ((0, 3), (8, 3)));
        assert_eq!(shared_edge(Direction::South, 5, 8), ((5, 8), (5, 0)));
        for dir in Direction::ALL {
            let (ours, theirs) = shared_edge(dir, 2, 8);
            let (back_theirs, back_ours) = shared_edge(dir.opposite(), 2, 8);
            assert_eq!((ours, theirs), (back_ours, back_theirs));
        }
    }

    #[test]
    fn stitching_copies_edge_points_and_cascades() {
        let levels = QuadtreeLevels::new(8);
        let mut ours = ActivePointSet::new(8);
        let mut theirs = ActivePointSet::new(8);
        let mut stack = Vec::new();
        theirs.force(8, 2);
        theirs.force(8, 5);
        let added = stitch_edge(&mut ours, &theirs, Direction::West, &levels, &mut stack);
        assert!(ours.is_active(0, 2) && ours.is_active(0, 5));
        // (0, 2) needs the center of the block to its east.
        assert!(ours.is_active(2, 2));
        assert_eq!(added, ours.count());
        assert!(!ours.is_active(8, 2));
    }
}
