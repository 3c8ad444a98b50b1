use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use strata_oracle::{NoiseSourceParams, PageConfig};
use strata_tile::{TileConfig, TileConfigError};

/// Everything read from `terrain.toml`. Every section and field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub tile: TileConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub pages: PageConfig,
    #[serde(default)]
    pub noise: NoiseSourceParams,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GridConfig {
    /// Tiles per side of the rolling grid. Odd.
    #[serde(default = "default_size")]
    pub size: usize,
    /// Wall-clock time one frame may spend building tiles.
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: f32,
}
fn default_size() -> usize {
    9
}
fn default_frame_budget_ms() -> f32 {
    4.0
}
impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            frame_budget_ms: default_frame_budget_ms(),
        }
    }
}

impl GridConfig {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_micros((self.frame_budget_ms.max(0.0) * 1000.0).round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Tile(TileConfigError),
    GridSize(usize),
    FrameBudget(f32),
    Pages(&'static str),
    PageCapacity { capacity: usize, needed: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Tile(e) => write!(f, "[tile] {e}"),
            ConfigError::GridSize(n) => write!(f, "[grid] size {n} must be odd"),
            ConfigError::FrameBudget(ms) => {
                write!(f, "[grid] frame_budget_ms {ms} must be positive")
            }
            ConfigError::Pages(name) => write!(f, "[pages] {name} must be positive"),
            ConfigError::PageCapacity { capacity, needed } => write!(
                f,
                "[pages] capacity {capacity} cannot hold the {needed} pages one tile build touches"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Tile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TileConfigError> for ConfigError {
    fn from(e: TileConfigError) -> Self {
        ConfigError::Tile(e)
    }
}

impl TerrainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: TerrainConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tile.validate()?;
        if self.grid.size % 2 == 0 {
            return Err(ConfigError::GridSize(self.grid.size));
        }
        if !(self.grid.frame_budget_ms > 0.0) {
            return Err(ConfigError::FrameBudget(self.grid.frame_budget_ms));
        }
        if self.pages.page_size == 0 {
            return Err(ConfigError::Pages("page_size"));
        }
        if self.pages.capacity == 0 {
            return Err(ConfigError::Pages("capacity"));
        }
        if !(self.pages.sample_spacing > 0.0) {
            return Err(ConfigError::Pages("sample_spacing"));
        }
        let needed = self.pages_per_tile();
        if self.pages.capacity < needed {
            return Err(ConfigError::PageCapacity {
                capacity: self.pages.capacity,
                needed,
            });
        }
        Ok(())
    }

    /// Pages a single tile build keeps resident: its footprint with apron and
    /// sampling slack, plus the ring a touch requests around the center.
    pub fn pages_per_tile(&self) -> usize {
        let lattice = (self.tile.edge + 2 * self.tile.apron()) as f32;
        let width = lattice * self.tile.lattice_step / self.pages.sample_spacing;
        let samples = width.ceil() as usize + 3;
        let side = samples.div_ceil(self.pages.page_size) + 1;
        let ring = 2 * self.pages.touch_radius.max(0) as usize + 1;
        side * side + ring * ring
    }
}

pub fn load_config_from_path(path: &Path) -> Result<TerrainConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    TerrainConfig::from_toml_str(&s)
}
