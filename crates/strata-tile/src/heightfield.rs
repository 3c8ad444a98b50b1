use strata_oracle::{Rgba, SurfaceKind};

/// Sampled elevations for a tile plus an apron of `apron` lattice rows on every
/// side, and per-point surface data for the tile proper.
///
/// Lattice coordinates are tile-local: `0..=edge` is the tile,
/// `-apron..0` and `edge+1..=edge+apron` are apron rows.
#[derive(Clone, Debug)]
pub struct Heightfield {
    edge: usize,
    apron: usize,
    side: usize,
    heights: Vec<f32>,
    kinds: Vec<SurfaceKind>,
    colors: Vec<Rgba>,
}

impl Heightfield {
    pub fn new(edge: usize, apron: usize) -> Self {
        let side = edge + 1 + 2 * apron;
        let inner = (edge + 1) * (edge + 1);
        Self {
            edge,
            apron,
            side,
            heights: vec![0.0; side * side],
            kinds: vec![SurfaceKind::default(); inner],
            colors: vec![Rgba::WHITE; inner],
        }
    }

    #[inline]
    pub fn apron(&self) -> usize {
        self.apron
    }

    /// Lowest and highest sampled coordinate on each axis.
    #[inline]
    pub fn range(&self) -> (i32, i32) {
        let a = self.apron as i32;
        (-a, self.edge as i32 + a)
    }

    #[inline]
    fn height_index(&self, x: i32, z: i32) -> usize {
        let (lo, hi) = self.range();
        let sx = (x.clamp(lo, hi) - lo) as usize;
        let sz = (z.clamp(lo, hi) - lo) as usize;
        sz * self.side + sx
    }

    #[inline]
    fn inner_index(&self, x: i32, z: i32) -> Option<usize> {
        let e = self.edge as i32;
        if x < 0 || z < 0 || x > e || z > e {
            return None;
        }
        Some(z as usize * (self.edge + 1) + x as usize)
    }

    /// Elevation at a lattice point; coordinates outside the apron clamp.
    #[inline]
    pub fn height(&self, x: i32, z: i32) -> f32 {
        self.heights[self.height_index(x, z)]
    }

    #[inline]
    pub fn set_height(&mut self, x: i32, z: i32, h: f32) {
        let i = self.height_index(x, z);
        self.heights[i] = h;
    }

    pub fn set_surface(&mut self, x: i32, z: i32, kind: SurfaceKind, color: Rgba) {
        if let Some(i) = self.inner_index(x, z) {
            self.kinds[i] = kind;
            self.colors[i] = color;
        }
    }

    #[inline]
    pub fn surface(&self, x: i32, z: i32) -> SurfaceKind {
        self.inner_index(x, z)
            .map(|i| self.kinds[i])
            .unwrap_or_default()
    }

    #[inline]
    pub fn color(&self, x: i32, z: i32) -> Rgba {
        self.inner_index(x, z)
            .map(|i| self.colors[i])
            .unwrap_or(Rgba::WHITE)
    }

    /// Distance between the elevation at `(x, z)` and the mean of the four
    /// diagonal neighbors `l` cells away.
    pub fn planarity_error(&self, x: i32, z: i32, l: i32) -> f32 {
        let mean = (self.height(x - l, z - l)
            + self.height(x + l, z - l)
            + self.height(x - l, z + l)
            + self.height(x + l, z + l))
            * 0.25;
        (mean - self.height(x, z)).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apron_is_addressable_and_outside_clamps() {
        let mut h = Heightfield::new(8, 2);
        assert_eq!(h.range(), (-2, 10));
        h.set_height(-2, 10, 5.0);
        assert_eq!(h.height(-2, 10), 5.0);
        assert_eq!(h.height(-7, 30), 5.0);
    }

    #[test]
    fn planarity_of_a_tilted_plane_is_zero() {
        let mut h = Heightfield::new(8, 2);
        for z in -2..=10 {
            for x in -2..=10 {
                h.set_height(x, z, 0.5 * x as f32 - 0.25 * z as f32);
            }
        }
        assert!(h.planarity_error(0, 3, 2) < 1e-6);
        h.set_height(0, 3, 4.0);
        assert!(h.planarity_error(0, 3, 2) > 1.0);
    }

    #[test]
    fn surfaces_only_cover_the_tile() {
        let mut h = Heightfield::new(4, 2);
        h.set_surface(4, 4, SurfaceKind::Rock, Rgba::rgb(1, 2, 3));
        h.set_surface(-1, 0, SurfaceKind::Snow, Rgba::rgb(9, 9, 9));
        assert_eq!(h.surface(4, 4), SurfaceKind::Rock);
        assert_eq!(h.color(4, 4), Rgba::rgb(1, 2, 3));
        assert_eq!(h.surface(-1, 0), SurfaceKind::Grass);
    }
}
