//! Minimal geometry types shared by the terrain crates (no renderer dependency).
#![forbid(unsafe_code)]

use core::ops::{Add, Div, Mul, Sub};

mod grid;

pub use grid::GridCoord;

/// World-space vector. `y` is up; terrain lattices live in the x/z plane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn cross(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; degenerate input falls back to `UP`
    /// since every consumer here treats it as a surface normal.
    #[inline]
    pub fn normalized_or_up(self) -> Vec3 {
        let len = self.length();
        if len > f32::EPSILON { self / len } else { Vec3::UP }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn div(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Axis-aligned rectangle, `min` inclusive and `max` exclusive.
///
/// Used both for normalized tile-uv regions (texture patches) and for texel
/// rectangles once scaled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    #[inline]
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Maps `other` into this rectangle's local [0,1]² frame.
    pub fn to_local(&self, other: &Rect) -> Rect {
        let w = self.width();
        let h = self.height();
        if w <= 0.0 || h <= 0.0 {
            return Rect::default();
        }
        Rect {
            min_x: (other.min_x - self.min_x) / w,
            min_y: (other.min_y - self.min_y) / h,
            max_x: (other.max_x - self.min_x) / w,
            max_y: (other.max_y - self.min_y) / h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalized_is_unit_or_up(x in -1e3f32..1e3, y in -1e3f32..1e3, z in -1e3f32..1e3) {
            let n = Vec3::new(x, y, z).normalized_or_up();
            prop_assert!((n.length() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn cross_of_lattice_axes_points_up() {
        let along_z = Vec3::new(0.0, 0.0, 1.0);
        let along_x = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(along_z.cross(along_x), Vec3::UP);
    }

    #[test]
    fn rect_to_local_maps_corners() {
        let outer = Rect::new(0.5, 0.0, 1.0, 0.5);
        let local = outer.to_local(&Rect::new(0.5, 0.25, 0.75, 0.5));
        assert_eq!(local, Rect::new(0.0, 0.5, 0.5, 1.0));
        assert!(outer.intersects(&Rect::new(0.9, 0.4, 2.0, 2.0)));
        assert!(!outer.intersects(&Rect::new(1.0, 0.0, 2.0, 0.5)));
    }
}
