//! Height and surface oracles: the point-query contract the terrain builder
//! consumes, plus a page-cached reference implementation.
#![forbid(unsafe_code)]

use std::time::Instant;

use strata_geom::Vec3;

mod page_cache;
mod paged;
mod source;
mod surface;

pub use page_cache::{Page, PageCache, PageCacheStats, PageKey};
pub use paged::{PageConfig, PagedOracle};
pub use source::{HeightSource, NoiseSource, NoiseSourceParams, SourceSample};
pub use surface::{HeightSample, Rgba, SurfaceKind};

/// Elevation queries over world x/z coordinates.
///
/// Everything except [`HeightOracle::available`], [`HeightOracle::region_available`]
/// and [`HeightOracle::touch`] is only meaningful where `available` holds;
/// implementations return neutral values elsewhere instead of failing.
pub trait HeightOracle {
    fn available(&self, wx: f32, wz: f32) -> bool;

    /// Whether the rectangle `[x0, x1] × [z0, z1]` can be sampled.
    /// The default only checks the four corners.
    fn region_available(&self, x0: f32, z0: f32, x1: f32, z1: f32) -> bool {
        self.available(x0, z0)
            && self.available(x1, z0)
            && self.available(x0, z1)
            && self.available(x1, z1)
    }

    fn elevation(&self, wx: f32, wz: f32) -> f32;

    fn normal(&self, wx: f32, wz: f32) -> Vec3;

    /// Nudge background population around a point. Must return by `deadline`.
    fn touch(&self, wx: f32, wz: f32, deadline: Instant);

    /// Nudge population of the whole rectangle `[x0, x1] × [z0, z1]`.
    /// The default touches the center and the four corners.
    fn touch_region(&self, x0: f32, z0: f32, x1: f32, z1: f32, deadline: Instant) {
        self.touch((x0 + x1) * 0.5, (z0 + z1) * 0.5, deadline);
        for (x, z) in [(x0, z0), (x1, z0), (x0, z1), (x1, z1)] {
            self.touch(x, z, deadline);
        }
    }
}

pub trait SurfaceOracle {
    fn surface(&self, wx: f32, wz: f32) -> SurfaceKind;
    fn surface_color(&self, wx: f32, wz: f32) -> Rgba;
}

/// Everything a terrain tile needs to query.
pub trait TerrainOracle: HeightOracle + SurfaceOracle {
    fn sample(&self, wx: f32, wz: f32) -> HeightSample {
        HeightSample {
            position: Vec3::new(wx, self.elevation(wx, wz), wz),
            normal: self.normal(wx, wz),
            surface: self.surface(wx, wz),
            color: self.surface_color(wx, wz),
        }
    }
}

impl<T: HeightOracle + SurfaceOracle + ?Sized> TerrainOracle for T {}
