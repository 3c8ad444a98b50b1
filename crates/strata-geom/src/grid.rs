use serde::{Deserialize, Serialize};

/// Signed cell coordinate on the terrain grid.
///
/// Cells are addressed in world terms; a fixed `size×size` backing array is
/// indexed with [`GridCoord::slot`], which wraps ("rolls") so the same array
/// covers whatever window currently surrounds the viewer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct GridCoord {
    pub x: i32,
    pub z: i32,
}

impl GridCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Cell containing a world-space point, for cells `span` world units wide.
    #[inline]
    pub fn containing(wx: f32, wz: f32, span: f32) -> Self {
        Self {
            x: (wx / span).floor() as i32,
            z: (wz / span).floor() as i32,
        }
    }

    /// Rolling index into a `size×size` array.
    #[inline]
    pub fn slot(self, size: usize) -> (usize, usize) {
        let n = size as i32;
        (self.x.rem_euclid(n) as usize, self.z.rem_euclid(n) as usize)
    }

    /// Row-major form of [`GridCoord::slot`].
    #[inline]
    pub fn slot_index(self, size: usize) -> usize {
        let (sx, sz) = self.slot(size);
        sz * size + sx
    }

    /// Inverse of [`GridCoord::slot`] around `center`.
    ///
    /// Returns the unique cell whose slot is `(sx, sz)` and which lies within
    /// `[-size/2, size/2]` of `center` on each axis. `size` must be odd so the
    /// window holds exactly `size` cells per axis.
    #[inline]
    pub fn unwrap_near(slot: (usize, usize), center: GridCoord, size: usize) -> GridCoord {
        debug_assert!(size % 2 == 1, "rolling grid size must be odd");
        let n = size as i32;
        let half = n / 2;
        let fold = |s: usize, c: i32| -> i32 { c + (s as i32 - c + half).rem_euclid(n) - half };
        GridCoord {
            x: fold(slot.0, center.x),
            z: fold(slot.1, center.z),
        }
    }

    #[inline]
    pub fn distance(self, other: GridCoord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }
}

impl From<(i32, i32)> for GridCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}
