use strata_geom::Vec3;

/// CPU-side tile mesh in the layout render sinks upload directly.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct TerrainMesh {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u32>,
}

impl TerrainMesh {
    /// Clears all arrays but retains capacity for the next build.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.uv.clear();
        self.idx.clear();
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    pub fn push_vertex(&mut self, p: Vec3, n: Vec3, u: f32, v: f32) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&p.to_array());
        self.norm.extend_from_slice(&n.to_array());
        self.uv.extend_from_slice(&[u, v]);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    #[inline]
    pub fn position(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.pos[o], self.pos[o + 1], self.pos[o + 2])
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.idx.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Every index refers to an existing vertex and arrays agree in length.
    pub fn is_consistent(&self) -> bool {
        let n = self.vertex_count();
        self.pos.len() % 3 == 0
            && self.norm.len() == self.pos.len()
            && self.uv.len() == n * 2
            && self.idx.len() % 3 == 0
            && self.idx.iter().all(|&i| (i as usize) < n)
    }
}

const NO_INDEX: u32 = u32::MAX;

/// Lattice point to mesh vertex index, for the tile proper.
#[derive(Clone, Debug)]
pub struct IndexMap {
    side: usize,
    slots: Vec<u32>,
}

impl IndexMap {
    pub fn new(edge: usize) -> Self {
        let side = edge + 1;
        Self {
            side,
            slots: vec![NO_INDEX; side * side],
        }
    }

    #[inline]
    fn index(&self, x: i32, z: i32) -> Option<usize> {
        let n = self.side as i32;
        if x < 0 || z < 0 || x >= n || z >= n {
            return None;
        }
        Some(z as usize * self.side + x as usize)
    }

    #[inline]
    pub fn get(&self, x: i32, z: i32) -> Option<u32> {
        self.index(x, z)
            .map(|i| self.slots[i])
            .filter(|&v| v != NO_INDEX)
    }

    #[inline]
    pub fn set(&mut self, x: i32, z: i32, vertex: u32) {
        if let Some(i) = self.index(x, z) {
            self.slots[i] = vertex;
        }
    }

    pub fn clear(&mut self) {
        self.slots.fill(NO_INDEX);
    }

    pub fn clear_row(&mut self, z: usize) {
        self.slots[z * self.side..(z + 1) * self.side].fill(NO_INDEX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_and_triangles_stay_consistent() {
        let mut m = TerrainMesh::default();
        let a = m.push_vertex(Vec3::ZERO, Vec3::UP, 0.0, 0.0);
        let b = m.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec3::UP, 1.0, 0.0);
        let c = m.push_vertex(Vec3::new(0.0, 0.0, 1.0), Vec3::UP, 0.0, 1.0);
        m.push_triangle(a, c, b);
        assert!(m.is_consistent());
        assert_eq!(m.triangle_count(), 1);
        assert_eq!(m.position(b), Vec3::new(1.0, 0.0, 0.0));
        m.push_triangle(a, b, 7);
        assert!(!m.is_consistent());
        m.clear_keep_capacity();
        assert!(m.is_empty() && m.is_consistent());
    }

    #[test]
    fn index_map_unset_points_are_none() {
        let mut map = IndexMap::new(4);
        map.set(2, 3, 11);
        assert_eq!(map.get(2, 3), Some(11));
        assert_eq!(map.get(3, 2), None);
        assert_eq!(map.get(-1, 0), None);
        map.clear_row(3);
        assert_eq!(map.get(2, 3), None);
    }
}
