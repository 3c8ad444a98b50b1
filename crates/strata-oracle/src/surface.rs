use serde::{Deserialize, Serialize};
use strata_geom::Vec3;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    #[default]
    Grass,
    Dirt,
    Rock,
    Sand,
    Snow,
}

impl SurfaceKind {
    pub const COUNT: usize = 5;
    pub const ALL: [SurfaceKind; SurfaceKind::COUNT] = [
        SurfaceKind::Grass,
        SurfaceKind::Dirt,
        SurfaceKind::Rock,
        SurfaceKind::Sand,
        SurfaceKind::Snow,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Flat albedo used when no detail texture exists for the kind.
    pub fn base_color(self) -> Rgba {
        match self {
            SurfaceKind::Grass => Rgba::rgb(86, 125, 58),
            SurfaceKind::Dirt => Rgba::rgb(120, 92, 64),
            SurfaceKind::Rock => Rgba::rgb(112, 108, 104),
            SurfaceKind::Sand => Rgba::rgb(206, 188, 140),
            SurfaceKind::Snow => Rgba::rgb(236, 240, 246),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Brightness scale, saturating per channel; alpha is kept.
    pub fn scaled(self, k: f32) -> Rgba {
        let s = |c: u8| -> u8 { (c as f32 * k).clamp(0.0, 255.0) as u8 };
        Rgba {
            r: s(self.r),
            g: s(self.g),
            b: s(self.b),
            a: self.a,
        }
    }

    #[inline]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Everything known about one world point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HeightSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub surface: SurfaceKind,
    pub color: Rgba,
}
