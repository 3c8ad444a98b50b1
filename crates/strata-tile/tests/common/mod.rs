#![allow(dead_code)]

use std::cell::Cell;
use std::time::{Duration, Instant};

use strata_geom::{GridCoord, Vec3};
use strata_grid::{GridItem, Neighbors};
use strata_oracle::{HeightOracle, Rgba, SurfaceKind, SurfaceOracle};
use strata_tile::{MemorySink, Tile, TileConfig, TileEnv};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Oracle over a closure heightfield; availability can be toggled.
pub struct FnOracle<F> {
    height: F,
    pub available: Cell<bool>,
    pub touches: Cell<usize>,
}

impl<F: Fn(f32, f32) -> f32> FnOracle<F> {
    pub fn new(height: F) -> Self {
        Self {
            height,
            available: Cell::new(true),
            touches: Cell::new(0),
        }
    }
}

impl<F: Fn(f32, f32) -> f32> HeightOracle for FnOracle<F> {
    fn available(&self, _wx: f32, _wz: f32) -> bool {
        self.available.get()
    }

    fn elevation(&self, wx: f32, wz: f32) -> f32 {
        (self.height)(wx, wz)
    }

    fn normal(&self, wx: f32, wz: f32) -> Vec3 {
        let dx = self.elevation(wx - 1.0, wz) - self.elevation(wx + 1.0, wz);
        let dz = self.elevation(wx, wz - 1.0) - self.elevation(wx, wz + 1.0);
        Vec3::new(dx, 2.0, dz).normalized_or_up()
    }

    fn touch(&self, _wx: f32, _wz: f32, _deadline: Instant) {
        self.touches.set(self.touches.get() + 1);
    }
}

impl<F: Fn(f32, f32) -> f32> SurfaceOracle for FnOracle<F> {
    fn surface(&self, wx: f32, wz: f32) -> SurfaceKind {
        if self.elevation(wx, wz) > 5.0 {
            SurfaceKind::Rock
        } else {
            SurfaceKind::Grass
        }
    }

    fn surface_color(&self, wx: f32, wz: f32) -> Rgba {
        self.surface(wx, wz).base_color()
    }
}

/// Small tiles that rebuild-check on every visit.
pub fn small_config() -> TileConfig {
    TileConfig {
        edge: 16,
        compile_grid: 4,
        rebuild_interval_ms: 0,
        max_texture_size: 64,
        min_texture_size: 16,
        max_lod: 2,
        ..TileConfig::default()
    }
}

pub fn far() -> Instant {
    Instant::now() + Duration::from_secs(10)
}

pub fn tile_at(cfg: &TileConfig, x: i32, z: i32, distance: f32) -> Tile {
    let mut t = Tile::new(cfg.clone());
    t.set(GridCoord::new(x, z), distance);
    t
}

pub fn update(
    tile: &mut Tile,
    neighbors: &Neighbors<'_, Tile>,
    oracle: &dyn strata_oracle::TerrainOracle,
    sink: &mut MemorySink,
) {
    let mut env = TileEnv { oracle, sink };
    tile.update(neighbors, &mut env, far());
}
