use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_geom::{GridCoord, Vec3};
use strata_grid::{GridItem, GridScheduler};
use strata_oracle::{NoiseSource, PagedOracle, TerrainOracle};
use strata_tile::{RenderSink, Tile, TileConfig, TileEnv};

use crate::config::{ConfigError, TerrainConfig};

/// The rolling grid of tiles around a viewer plus the oracle feeding it.
pub struct TerrainSystem<O> {
    oracle: O,
    grid: GridScheduler<Tile>,
    tile_cfg: TileConfig,
    frame_budget: Duration,
}

impl TerrainSystem<PagedOracle> {
    /// Paged noise terrain, the default world for demos.
    pub fn with_noise(cfg: &TerrainConfig) -> Result<Self, ConfigError> {
        let source = Arc::new(NoiseSource::new(cfg.noise.clone()));
        Self::new(PagedOracle::new(source, cfg.pages.clone()), cfg)
    }
}

impl<O: TerrainOracle> TerrainSystem<O> {
    pub fn new(oracle: O, cfg: &TerrainConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let tile_cfg = cfg.tile.clone();
        let grid = GridScheduler::from_fn(cfg.grid.size, tile_cfg.span(), || {
            Tile::new(tile_cfg.clone())
        });
        log::info!(
            target: "terrain",
            "terrain grid {}x{} of {}-cell tiles ({} world units each)",
            cfg.grid.size,
            cfg.grid.size,
            tile_cfg.edge,
            tile_cfg.span()
        );
        Ok(Self {
            oracle,
            grid,
            tile_cfg,
            frame_budget: cfg.grid.frame_budget(),
        })
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn scheduler(&self) -> &GridScheduler<Tile> {
        &self.grid
    }

    pub fn tile_config(&self) -> &TileConfig {
        &self.tile_cfg
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Tile currently assigned to `cell`, if the grid holds it.
    pub fn tile_at(&self, cell: GridCoord) -> Option<&Tile> {
        self.grid
            .item_at(cell)
            .filter(|t| t.cell() == Some(cell))
    }

    pub fn ready_tiles(&self) -> usize {
        self.grid
            .items()
            .filter(|t| t.cell().is_some() && t.ready())
            .count()
    }

    /// Build tiles around `viewer` for at most one frame budget.
    pub fn frame(&mut self, viewer: Vec3, sink: &mut dyn RenderSink) -> usize {
        let deadline = Instant::now() + self.frame_budget;
        self.frame_until(viewer, sink, deadline)
    }

    /// Service cells nearest-first until the deadline passes, a tile stalls
    /// or one full sweep is done. Returns the number of cells serviced.
    pub fn frame_until(
        &mut self,
        viewer: Vec3,
        sink: &mut dyn RenderSink,
        deadline: Instant,
    ) -> usize {
        let mut env = TileEnv {
            oracle: &self.oracle,
            sink,
        };
        let sweeps = self.grid.sweeps();
        let mut serviced = 0;
        loop {
            let cursor = self.grid.cursor();
            let viewer_cell = self.grid.viewer_cell();
            if self.grid.update(viewer, &mut env, deadline).is_some() {
                serviced += 1;
            }
            // A call that only latched a new viewer cell did no work.
            let relatched = self.grid.viewer_cell() != viewer_cell;
            if (self.grid.cursor() == cursor && !relatched)
                || self.grid.sweeps() != sweeps
                || Instant::now() >= deadline
            {
                break;
            }
        }
        serviced
    }

    /// Queue every tile's current mesh for drawing.
    pub fn render(&self, sink: &mut dyn RenderSink) {
        for tile in self.grid.items() {
            tile.render(sink);
        }
    }

    /// Adopt reloaded settings. Tunables reach each tile at its next
    /// rebuild; layout and grid size changes need a new system and are
    /// ignored. Returns how many tiles accepted the new tunables.
    pub fn apply_config(&mut self, cfg: &TerrainConfig) -> Result<usize, ConfigError> {
        cfg.validate()?;
        if cfg.grid.size != self.grid.size() {
            log::warn!(
                target: "terrain",
                "grid size change {} -> {} needs a restart; ignored",
                self.grid.size(),
                cfg.grid.size
            );
        }
        self.frame_budget = cfg.grid.frame_budget();
        if !self.tile_cfg.same_layout(&cfg.tile) {
            log::warn!(target: "terrain", "tile layout change needs a restart; ignored");
            return Ok(0);
        }
        let mut accepted = 0;
        for tile in self.grid.items_mut() {
            if tile.set_tunables(&cfg.tile) {
                accepted += 1;
            }
        }
        self.tile_cfg = cfg.tile.clone();
        log::info!(target: "terrain", "terrain tunables applied to {} tiles", accepted);
        Ok(accepted)
    }

    /// Dispose every renderer resource held by the grid.
    pub fn release(&mut self, sink: &mut dyn RenderSink) {
        for tile in self.grid.items_mut() {
            tile.release(sink);
        }
    }
}
