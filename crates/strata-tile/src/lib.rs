//! Incremental, deadline-bounded construction of terrain tiles: adaptive
//! quadtree point selection, crack-free stitching against neighbors, block
//! triangulation and patch-wise texture baking.
#![forbid(unsafe_code)]

mod bake;
mod config;
mod heightfield;
mod levels;
mod mesh;
mod points;
pub mod sink;
mod stitch;
mod tile;
mod triangulate;

pub use bake::{BakePlan, paint_patch};
pub use config::{MAX_TILE_VERTICES, TileConfig, TileConfigError};
pub use heightfield::Heightfield;
pub use levels::QuadtreeLevels;
pub use mesh::{IndexMap, TerrainMesh};
pub use points::ActivePointSet;
pub use sink::{
    MemorySink, MemorySinkStats, MemoryTexture, MeshHandle, PaintLayer, PaintQuad, RenderSink,
    TexelRect, TextureHandle,
};
pub use stitch::{shared_edge, stitch_edge};
pub use tile::{BuildStage, Step, Tile, TileEnv, TileStats};
pub use triangulate::BlockCompiler;
