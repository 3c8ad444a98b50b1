use std::fmt;

use serde::Deserialize;

/// A tile mesh must stay addressable with `u16` indices.
pub const MAX_TILE_VERTICES: usize = u16::MAX as usize + 1;

/// Per-tile build parameters.
///
/// `edge`, `compile_grid` and `lattice_step` fix the tile layout and are set
/// once per tile. The rest are tunables a running tile adopts at its next
/// rebuild (see [`crate::Tile::set_tunables`]).
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TileConfig {
    /// Lattice cells per tile side. Power of two.
    #[serde(default = "default_edge")]
    pub edge: usize,
    /// Seed spacing and block size for triangulation. Power of two, divides `edge`.
    #[serde(default = "default_compile_grid")]
    pub compile_grid: usize,
    /// Planarity error above which a point is activated.
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    /// World units per lattice cell.
    #[serde(default = "default_lattice_step")]
    pub lattice_step: f32,
    /// Minimum time a finished tile waits before re-checking its neighbors.
    #[serde(default = "default_rebuild_interval_ms")]
    pub rebuild_interval_ms: u64,
    /// Width, in tiles, of each LOD ring around the viewer.
    #[serde(default = "default_lod_ring_width")]
    pub lod_ring_width: f32,
    #[serde(default = "default_max_lod")]
    pub max_lod: u32,
    #[serde(default = "default_min_texture_size")]
    pub min_texture_size: u32,
    #[serde(default = "default_max_texture_size")]
    pub max_texture_size: u32,
}
fn default_edge() -> usize {
    64
}
fn default_compile_grid() -> usize {
    4
}
fn default_tolerance() -> f32 {
    0.08
}
fn default_lattice_step() -> f32 {
    1.0
}
fn default_rebuild_interval_ms() -> u64 {
    1000
}
fn default_lod_ring_width() -> f32 {
    1.5
}
fn default_max_lod() -> u32 {
    4
}
fn default_min_texture_size() -> u32 {
    64
}
fn default_max_texture_size() -> u32 {
    512
}
impl Default for TileConfig {
    fn default() -> Self {
        Self {
            edge: default_edge(),
            compile_grid: default_compile_grid(),
            tolerance: default_tolerance(),
            lattice_step: default_lattice_step(),
            rebuild_interval_ms: default_rebuild_interval_ms(),
            lod_ring_width: default_lod_ring_width(),
            max_lod: default_max_lod(),
            min_texture_size: default_min_texture_size(),
            max_texture_size: default_max_texture_size(),
        }
    }
}

impl TileConfig {
    /// World units covered by one tile side.
    #[inline]
    pub fn span(&self) -> f32 {
        self.edge as f32 * self.lattice_step
    }

    /// Extra lattice rows sampled around the tile for border planarity tests.
    #[inline]
    pub fn apron(&self) -> usize {
        self.compile_grid / 2
    }

    pub fn lod_for(&self, distance: f32) -> u32 {
        if !(distance > 0.0) || self.lod_ring_width <= 0.0 {
            return 0;
        }
        ((distance / self.lod_ring_width).floor() as u32).min(self.max_lod)
    }

    pub fn texture_size_for(&self, lod: u32) -> u32 {
        self.max_texture_size
            .checked_shr(lod)
            .unwrap_or(0)
            .max(self.min_texture_size)
    }

    /// Vertices in a fully refined tile.
    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        (self.edge + 1) * (self.edge + 1)
    }

    /// Whether `other` can replace this config on a live tile.
    pub fn same_layout(&self, other: &TileConfig) -> bool {
        self.edge == other.edge
            && self.compile_grid == other.compile_grid
            && self.lattice_step == other.lattice_step
    }

    pub fn validate(&self) -> Result<(), TileConfigError> {
        if self.edge < 2 || !self.edge.is_power_of_two() {
            return Err(TileConfigError::Edge(self.edge));
        }
        if self.compile_grid < 2
            || !self.compile_grid.is_power_of_two()
            || self.compile_grid > self.edge
        {
            return Err(TileConfigError::CompileGrid {
                compile_grid: self.compile_grid,
                edge: self.edge,
            });
        }
        if self.vertex_capacity() > MAX_TILE_VERTICES {
            return Err(TileConfigError::TooManyVertices(self.edge));
        }
        if !(self.tolerance > 0.0) {
            return Err(TileConfigError::NotPositive("tolerance"));
        }
        if !(self.lattice_step > 0.0) {
            return Err(TileConfigError::NotPositive("lattice_step"));
        }
        if !(self.lod_ring_width > 0.0) {
            return Err(TileConfigError::NotPositive("lod_ring_width"));
        }
        if !self.min_texture_size.is_power_of_two()
            || !self.max_texture_size.is_power_of_two()
            || self.min_texture_size > self.max_texture_size
        {
            return Err(TileConfigError::TextureSizes {
                min: self.min_texture_size,
                max: self.max_texture_size,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileConfigError {
    Edge(usize),
    CompileGrid { compile_grid: usize, edge: usize },
    NotPositive(&'static str),
    TextureSizes { min: u32, max: u32 },
    TooManyVertices(usize),
}

impl fmt::Display for TileConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileConfigError::Edge(e) => write!(f, "tile edge {e} is not a power of two >= 2"),
            TileConfigError::CompileGrid { compile_grid, edge } => write!(
                f,
                "compile_grid {compile_grid} must be a power of two in [2, {edge}]"
            ),
            TileConfigError::NotPositive(name) => write!(f, "{name} must be positive"),
            TileConfigError::TooManyVertices(e) => write!(
                f,
                "tile edge {e} gives {} vertices, more than 16-bit indices address",
                (e + 1) * (e + 1)
            ),
            TileConfigError::TextureSizes { min, max } => {
                write!(f, "texture sizes must be powers of two with min ({min}) <= max ({max})")
            }
        }
    }
}

impl std::error::Error for TileConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lod_rings_and_texture_sizes() {
        let c = TileConfig::default();
        assert_eq!(c.lod_for(0.0), 0);
        assert_eq!(c.lod_for(1.4), 0);
        assert_eq!(c.lod_for(1.5), 1);
        assert_eq!(c.lod_for(100.0), c.max_lod);
        assert_eq!(c.texture_size_for(0), 512);
        assert_eq!(c.texture_size_for(2), 128);
        assert_eq!(c.texture_size_for(4), 64);
        assert_eq!(c.texture_size_for(40), 64);
    }

    #[test]
    fn rejects_bad_layouts() {
        let mut c = TileConfig::default();
        assert!(c.validate().is_ok());
        c.edge = 48;
        assert_eq!(c.validate(), Err(TileConfigError::Edge(48)));
        c.edge = 8;
        c.compile_grid = 16;
        assert!(matches!(c.validate(), Err(TileConfigError::CompileGrid { .. })));
        c.compile_grid = 4;
        c.lattice_step = 0.0;
        assert_eq!(c.validate(), Err(TileConfigError::NotPositive("lattice_step")));
    }

    #[test]
    fn rejects_tiles_past_u16_indices() {
        let mut c = TileConfig {
            edge: 128,
            ..TileConfig::default()
        };
        assert!(c.validate().is_ok());
        c.edge = 256;
        assert_eq!(c.vertex_capacity(), 66_049);
        assert_eq!(c.validate(), Err(TileConfigError::TooManyVertices(256)));
    }

    #[test]
    fn zero_tolerance_is_rejected() {
        let c = TileConfig {
            tolerance: 0.0,
            ..TileConfig::default()
        };
        assert_eq!(c.validate(), Err(TileConfigError::NotPositive("tolerance")));
    }
}
