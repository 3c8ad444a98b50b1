//! View-dependent terrain meshing over a rolling grid of tiles.
//!
//! [`TerrainSystem`] owns the tile grid and the height oracle; each frame it
//! advances the tiles nearest the viewer within a time budget and hands
//! finished meshes to a [`RenderSink`]. Settings come from TOML
//! ([`TerrainConfig`]) and can be hot-reloaded with [`ConfigWatcher`].

mod config;
mod system;
mod watch;

pub use config::{ConfigError, GridConfig, TerrainConfig, load_config_from_path};
pub use system::TerrainSystem;
pub use watch::ConfigWatcher;

pub use strata_geom::{GridCoord, Vec3};
pub use strata_oracle::{PageConfig, PagedOracle, TerrainOracle};
pub use strata_tile::{MemorySink, RenderSink, Tile, TileConfig};
