use crate::mesh::{IndexMap, TerrainMesh};
use crate::points::ActivePointSet;

type P = (i32, i32);

/// Emits triangles for quadtree blocks over a tile's active points.
///
/// Only points that have a vertex in `index` are used; a triangle with a
/// missing vertex is dropped and counted in [`BlockCompiler::skipped`].
pub struct BlockCompiler<'a> {
    points: &'a ActivePointSet,
    index: &'a IndexMap,
    mesh: &'a mut TerrainMesh,
    skipped: usize,
}

impl<'a> BlockCompiler<'a> {
    pub fn new(points: &'a ActivePointSet, index: &'a IndexMap, mesh: &'a mut TerrainMesh) -> Self {
        Self {
            points,
            index,
            mesh,
            skipped: 0,
        }
    }

    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// One row of `size`-blocks starting at lattice row `z`.
    pub fn compile_row(&mut self, z: i32, size: i32) {
        let edge = self.points.edge() as i32;
        let mut x = 0;
        while x < edge {
            self.compile_block(x, z, size);
            x += size;
        }
    }

    /// Triangulate the square `[x, x+size] × [z, z+size]`.
    ///
    /// With an inactive center (or at unit size) the block is two triangles
    /// split along the diagonal through the parent block's center. Otherwise
    /// every edge contributes a fan triangle to the center, halved at an
    /// active midpoint, and quadrants whose two outer midpoints are active
    /// are compiled recursively instead.
    pub fn compile_block(&mut self, x: i32, z: i32, size: i32) {
        let (x2, z2) = (x + size, z + size);
        let half = size / 2;
        let c = (x + half, z + half);
        if size <= 1 || !self.points.is_active(c.0, c.1) {
            self.split(x, z, size);
            return;
        }

        let n = self.points.is_active(c.0, z);
        let s = self.points.is_active(c.0, z2);
        let w = self.points.is_active(x, c.1);
        let e = self.points.is_active(x2, c.1);

        // A quadrant is recursed when both of its outer midpoints are active.
        let q_nw = n && w;
        let q_ne = n && e;
        let q_sw = s && w;
        let q_se = s && e;

        self.edge((x, z), (x2, z), (c.0, z), n, q_nw, q_ne, c);
        self.edge((x2, z), (x2, z2), (x2, c.1), e, q_ne, q_se, c);
        self.edge((x2, z2), (x, z2), (c.0, z2), s, q_se, q_sw, c);
        self.edge((x, z2), (x, z), (x, c.1), w, q_sw, q_nw, c);

        if q_nw {
            self.compile_block(x, z, half);
        }
        if q_ne {
            self.compile_block(c.0, z, half);
        }
        if q_sw {
            self.compile_block(x, c.1, half);
        }
        if q_se {
            self.compile_block(c.0, c.1, half);
        }
    }

    /// Fan triangles between one block edge `a → b` and the center `c`.
    /// `first`/`second` say whether the quadrant touching each half is
    /// compiled recursively and so covers that half itself.
    #[allow(clippy::too_many_arguments)]
    fn edge(&mut self, a: P, b: P, mid: P, mid_active: bool, first: bool, second: bool, c: P) {
        if !mid_active {
            self.emit(a, b, c);
            return;
        }
        if !first {
            self.emit(a, mid, c);
        }
        if !second {
            self.emit(mid, b, c);
        }
    }

    fn split(&mut self, x: i32, z: i32, size: i32) {
        let (x2, z2) = (x + size, z + size);
        let parity = (x / size + z / size).rem_euclid(2);
        if parity == 0 {
            self.emit((x, z), (x2, z), (x2, z2));
            self.emit((x, z), (x2, z2), (x, z2));
        } else {
            self.emit((x, z), (x2, z), (x, z2));
            self.emit((x2, z), (x2, z2), (x, z2));
        }
    }

    fn emit(&mut self, a: P, b: P, c: P) {
        let (Some(ia), Some(ib), Some(ic)) = (
            self.index.get(a.0, a.1),
            self.index.get(b.0, b.1),
            self.index.get(c.0, c.1),
        ) else {
            self.skipped += 1;
            return;
        };
        // Wind so the face normal points up (+y).
        let e1 = (b.0 - a.0, b.1 - a.1);
        let e2 = (c.0 - a.0, c.1 - a.1);
        if e1.1 * e2.0 - e1.0 * e2.1 < 0 {
            self.mesh.push_triangle(ia, ic, ib);
        } else {
            self.mesh.push_triangle(ia, ib, ic);
        }
    }
}
