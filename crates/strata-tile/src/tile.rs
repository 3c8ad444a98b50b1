use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_geom::{GridCoord, Vec3};
use strata_grid::{Direction, GridItem, Neighbors};
use strata_oracle::{SurfaceKind, TerrainOracle};

use crate::bake::{BakePlan, paint_patch};
use crate::config::TileConfig;
use crate::heightfield::Heightfield;
use crate::levels::QuadtreeLevels;
use crate::mesh::{IndexMap, TerrainMesh};
use crate::points::ActivePointSet;
use crate::sink::{MeshHandle, RenderSink, TextureHandle};
use crate::stitch::stitch_edge;
use crate::triangulate::BlockCompiler;

/// Build pipeline of a tile, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildStage {
    Begin,
    ClearPoints,
    SeedQuadtree,
    Heightmap,
    Quadtree,
    Stitch,
    LoadBuffers,
    Triangulate,
    UploadBuffer,
    BakeTexture,
    FinalizeTexture,
    Done,
}

impl BuildStage {
    pub fn next(self) -> BuildStage {
        use BuildStage::*;
        match self {
            Begin => ClearPoints,
            ClearPoints => SeedQuadtree,
            SeedQuadtree => Heightmap,
            Heightmap => Quadtree,
            Quadtree => Stitch,
            Stitch => LoadBuffers,
            LoadBuffers => Triangulate,
            Triangulate => UploadBuffer,
            UploadBuffer => BakeTexture,
            BakeTexture => FinalizeTexture,
            FinalizeTexture => Done,
            Done => Done,
        }
    }
}

/// Outcome of one unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Progress within the current stage.
    Working,
    /// Moved to another stage.
    Advanced,
    /// Blocked on the oracle or the sink; try again next update.
    Yield,
    Done,
}

/// Services a tile needs while updating.
pub struct TileEnv<'c> {
    pub oracle: &'c dyn TerrainOracle,
    pub sink: &'c mut dyn RenderSink,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    pub builds: u64,
    pub restitches: u64,
    pub stalls: u64,
    pub upload_failures: u64,
    pub vertices: usize,
    pub triangles: usize,
    pub skipped_triangles: usize,
}

/// One square of terrain, built incrementally into a mesh and a texture.
///
/// Lattice coordinates are tile-local, `0..=edge` on both axes; lattice
/// point `(x, z)` of the tile at cell `c` sits at world
/// `((c.x * edge + x) * step, (c.z * edge + z) * step)`.
pub struct Tile {
    cfg: TileConfig,
    pending_cfg: Option<TileConfig>,
    levels: Arc<QuadtreeLevels>,

    cell: Option<GridCoord>,
    distance: f32,
    lod: u32,
    desired_texture: u32,

    stage: BuildStage,
    cursor: usize,
    settled: bool,
    build_started: Option<Instant>,
    rebuild_at: Option<Instant>,
    snapshot: [Option<usize>; 4],

    points: ActivePointSet,
    heights: Heightfield,
    surface_used: [bool; SurfaceKind::COUNT],
    index: IndexMap,
    mesh: TerrainMesh,
    stack: Vec<(i32, i32)>,

    mesh_handle: Option<MeshHandle>,
    texture: Option<TextureHandle>,
    texture_size: u32,
    staging: Option<(TextureHandle, u32)>,
    bake: Option<BakePlan>,
    retired_meshes: Vec<MeshHandle>,
    retired_textures: Vec<TextureHandle>,

    stats: TileStats,
}

impl Tile {
    /// `cfg` must pass [`TileConfig::validate`].
    pub fn new(cfg: TileConfig) -> Self {
        let edge = cfg.edge;
        let lod = cfg.max_lod;
        let desired_texture = cfg.texture_size_for(lod);
        Self {
            levels: QuadtreeLevels::shared(edge),
            points: ActivePointSet::new(edge),
            heights: Heightfield::new(edge, cfg.apron()),
            index: IndexMap::new(edge),
            cfg,
            pending_cfg: None,
            cell: None,
            distance: f32::INFINITY,
            lod,
            desired_texture,
            stage: BuildStage::Begin,
            cursor: 0,
            settled: false,
            build_started: None,
            rebuild_at: None,
            snapshot: [None; 4],
            surface_used: [false; SurfaceKind::COUNT],
            mesh: TerrainMesh::default(),
            stack: Vec::new(),
            mesh_handle: None,
            texture: None,
            texture_size: 0,
            staging: None,
            bake: None,
            retired_meshes: Vec::new(),
            retired_textures: Vec::new(),
            stats: TileStats::default(),
        }
    }

    pub fn config(&self) -> &TileConfig {
        &self.cfg
    }

    pub fn cell(&self) -> Option<GridCoord> {
        self.cell
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn lod(&self) -> u32 {
        self.lod
    }

    pub fn stats(&self) -> TileStats {
        self.stats
    }

    pub fn is_active(&self, x: i32, z: i32) -> bool {
        self.points.is_active(x, z)
    }

    pub fn active_count(&self) -> usize {
        self.points.count()
    }

    pub fn active_points(&self) -> &ActivePointSet {
        &self.points
    }

    /// Whether this tile's active points are final for its current cell.
    pub fn has_settled_points(&self) -> bool {
        self.settled
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    pub fn mesh_handle(&self) -> Option<MeshHandle> {
        self.mesh_handle
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    pub fn desired_texture_size(&self) -> u32 {
        self.desired_texture
    }

    /// Queue new tunables; they take effect at the next `Begin`.
    /// Configs with a different lattice layout are rejected.
    pub fn set_tunables(&mut self, cfg: &TileConfig) -> bool {
        if !self.cfg.same_layout(cfg) {
            log::warn!(
                target: "terrain",
                "ignoring tile config with different layout (edge {} grid {})",
                cfg.edge,
                cfg.compile_grid
            );
            return false;
        }
        self.pending_cfg = Some(cfg.clone());
        true
    }

    /// Draw the current mesh, if any, with whatever texture is visible.
    pub fn render(&self, sink: &mut dyn RenderSink) {
        if let Some(mesh) = self.mesh_handle {
            sink.render(mesh, self.texture);
        }
    }

    /// Dispose every renderer resource this tile holds.
    pub fn release(&mut self, sink: &mut dyn RenderSink) {
        self.retire_resources();
        self.release_retired(sink);
    }

    fn retire_resources(&mut self) {
        self.retired_meshes.extend(self.mesh_handle.take());
        self.retired_textures.extend(self.texture.take());
        self.retired_textures
            .extend(self.staging.take().map(|(t, _)| t));
        self.bake = None;
        self.texture_size = 0;
    }

    fn release_retired(&mut self, sink: &mut dyn RenderSink) {
        for mesh in self.retired_meshes.drain(..) {
            sink.dispose(mesh);
        }
        for tex in self.retired_textures.drain(..) {
            sink.dispose_texture(tex);
        }
    }

    #[inline]
    fn world(&self, x: i32, z: i32) -> (f32, f32) {
        let cell = self.cell.unwrap_or_default();
        let e = self.cfg.edge as i32;
        let step = self.cfg.lattice_step;
        (
            (cell.x * e + x) as f32 * step,
            (cell.z * e + z) as f32 * step,
        )
    }

    fn advance(&mut self) -> Step {
        self.stage = self.stage.next();
        self.cursor = 0;
        Step::Advanced
    }

    fn adopt_pending_config(&mut self) {
        if let Some(cfg) = self.pending_cfg.take() {
            self.cfg = cfg;
            self.lod = self.cfg.lod_for(self.distance);
            self.desired_texture = self.cfg.texture_size_for(self.lod);
        }
    }

    /// A neighbor whose points can be stitched against: it must represent the
    /// adjacent cell and have finished its quadtree pass.
    fn present_neighbor<'n>(
        &self,
        neighbors: &Neighbors<'n, Tile>,
        dir: Direction,
    ) -> Option<&'n Tile> {
        let cell = self.cell?;
        let (dx, dz) = dir.offset();
        neighbors.get(dir).filter(|n| {
            n.cell == Some(cell.offset(dx, dz))
                && n.settled
                && n.cfg.edge == self.cfg.edge
        })
    }

    fn neighbors_changed(&self, neighbors: &Neighbors<'_, Tile>) -> bool {
        Direction::ALL.into_iter().any(|dir| {
            let live = self
                .present_neighbor(neighbors, dir)
                .map(|n| n.points.count());
            live.is_some() && live != self.snapshot[dir.index()]
        })
    }

    /// Run one unit of work for the current stage.
    pub fn step(
        &mut self,
        neighbors: &Neighbors<'_, Tile>,
        env: &mut TileEnv<'_>,
        deadline: Instant,
    ) -> Step {
        if self.cell.is_none() {
            return Step::Yield;
        }
        if matches!(self.stage, BuildStage::Heightmap | BuildStage::LoadBuffers)
            && !self.footprint_available(env)
        {
            log::debug!(
                target: "terrain",
                "tile {:?}: samples left the oracle during {:?}, restarting",
                self.cell,
                self.stage
            );
            self.stats.stalls += 1;
            self.stage = BuildStage::Begin;
            self.cursor = 0;
            self.settled = false;
            return Step::Yield;
        }
        match self.stage {
            BuildStage::Begin => self.begin(env, deadline),
            BuildStage::ClearPoints => self.clear_points(),
            BuildStage::SeedQuadtree => self.seed_quadtree(),
            BuildStage::Heightmap => self.heightmap(env),
            BuildStage::Quadtree => self.quadtree(),
            BuildStage::Stitch => self.stitch(neighbors),
            BuildStage::LoadBuffers => self.load_buffers(env),
            BuildStage::Triangulate => self.triangulate(),
            BuildStage::UploadBuffer => self.upload(env),
            BuildStage::BakeTexture => self.bake_texture(env),
            BuildStage::FinalizeTexture => self.finalize_texture(env),
            BuildStage::Done => self.done(neighbors, env, deadline),
        }
    }

    /// World rectangle sampled by a build, apron included.
    fn footprint(&self) -> (f32, f32, f32, f32) {
        let a = self.cfg.apron() as i32;
        let e = self.cfg.edge as i32;
        let (x0, z0) = self.world(-a, -a);
        let (x1, z1) = self.world(e + a, e + a);
        (x0, z0, x1, z1)
    }

    fn footprint_available(&self, env: &TileEnv<'_>) -> bool {
        let (x0, z0, x1, z1) = self.footprint();
        env.oracle.region_available(x0, z0, x1, z1)
    }

    fn touch_footprint(&self, env: &TileEnv<'_>, deadline: Instant) {
        let (x0, z0, x1, z1) = self.footprint();
        env.oracle.touch_region(x0, z0, x1, z1, deadline);
    }

    fn begin(&mut self, env: &mut TileEnv<'_>, deadline: Instant) -> Step {
        if !self.footprint_available(env) {
            self.touch_footprint(env, deadline);
            self.stats.stalls += 1;
            return Step::Yield;
        }
        self.adopt_pending_config();
        self.surface_used = [false; SurfaceKind::COUNT];
        self.snapshot = [None; 4];
        self.rebuild_at = None;
        self.settled = false;
        self.build_started = Some(Instant::now());
        self.advance()
    }

    fn clear_points(&mut self) -> Step {
        let z = self.cursor;
        self.points.clear_row(z);
        self.index.clear_row(z);
        self.cursor += 1;
        if self.cursor > self.cfg.edge {
            return self.advance();
        }
        Step::Working
    }

    fn seed_quadtree(&mut self) -> Step {
        let g = self.cfg.compile_grid;
        let z = (self.cursor * g) as i32;
        for x in (0..=self.cfg.edge).step_by(g) {
            self.points.force(x as i32, z);
        }
        self.cursor += 1;
        if self.cursor * g > self.cfg.edge {
            return self.advance();
        }
        Step::Working
    }

    fn heightmap(&mut self, env: &mut TileEnv<'_>) -> Step {
        let (lo, hi) = self.heights.range();
        let e = self.cfg.edge as i32;
        let z = lo + self.cursor as i32;
        for x in lo..=hi {
            let (wx, wz) = self.world(x, z);
            self.heights.set_height(x, z, env.oracle.elevation(wx, wz));
            if (0..=e).contains(&x) && (0..=e).contains(&z) {
                let kind = env.oracle.surface(wx, wz);
                let color = env.oracle.surface_color(wx, wz);
                self.heights.set_surface(x, z, kind, color);
                self.surface_used[kind.index()] = true;
            }
        }
        self.cursor += 1;
        if z >= hi {
            return self.advance();
        }
        Step::Working
    }

    fn quadtree(&mut self) -> Step {
        let z = self.cursor as i32;
        let e = self.cfg.edge as i32;
        for x in 0..=e {
            if self.points.is_active(x, z) {
                continue;
            }
            let l = self.levels.point_level(x as usize, z as usize);
            if l >= self.cfg.compile_grid {
                continue;
            }
            if self.heights.planarity_error(x, z, l as i32) > self.cfg.tolerance {
                self.points.activate(x, z, &self.levels, &mut self.stack);
            }
        }
        self.cursor += 1;
        if self.cursor > self.cfg.edge {
            self.settled = true;
            return self.advance();
        }
        Step::Working
    }

    fn stitch(&mut self, neighbors: &Neighbors<'_, Tile>) -> Step {
        let mut snapshot = [None; 4];
        let mut added = 0;
        for dir in Direction::ALL {
            let Some(n) = self.present_neighbor(neighbors, dir) else {
                continue;
            };
            added += stitch_edge(&mut self.points, &n.points, dir, &self.levels, &mut self.stack);
            snapshot[dir.index()] = Some(n.points.count());
        }
        if added > 0 {
            log::trace!(
                target: "terrain",
                "tile {:?}: stitching added {} points",
                self.cell,
                added
            );
        }
        self.snapshot = snapshot;
        self.mesh.clear_keep_capacity();
        self.index.clear();
        self.advance()
    }

    fn load_buffers(&mut self, env: &mut TileEnv<'_>) -> Step {
        let z = self.cursor as i32;
        let e = self.cfg.edge as i32;
        let inv = 1.0 / e as f32;
        for x in 0..=e {
            if !self.points.is_active(x, z) {
                continue;
            }
            let (wx, wz) = self.world(x, z);
            let p = Vec3::new(wx, self.heights.height(x, z), wz);
            let n = env.oracle.normal(wx, wz);
            let v = self.mesh.push_vertex(p, n, x as f32 * inv, z as f32 * inv);
            self.index.set(x, z, v);
        }
        self.cursor += 1;
        if self.cursor > self.cfg.edge {
            return self.advance();
        }
        Step::Working
    }

    fn triangulate(&mut self) -> Step {
        if self.cursor == 0 {
            self.stats.skipped_triangles = 0;
        }
        let g = self.cfg.compile_grid as i32;
        let z = self.cursor as i32 * g;
        let mut compiler = BlockCompiler::new(&self.points, &self.index, &mut self.mesh);
        compiler.compile_row(z, g);
        self.stats.skipped_triangles += compiler.skipped();
        self.cursor += 1;
        if z + g >= self.cfg.edge as i32 {
            self.stats.vertices = self.mesh.vertex_count();
            self.stats.triangles = self.mesh.triangle_count();
            if self.stats.skipped_triangles > 0 {
                log::warn!(
                    target: "terrain",
                    "tile {:?}: {} triangles referenced unindexed points",
                    self.cell,
                    self.stats.skipped_triangles
                );
            }
            return self.advance();
        }
        Step::Working
    }

    fn upload(&mut self, env: &mut TileEnv<'_>) -> Step {
        let Some(handle) = env.sink.upload(&self.mesh) else {
            self.stats.upload_failures += 1;
            log::warn!(
                target: "terrain",
                "tile {:?}: mesh upload failed, keeping previous mesh",
                self.cell
            );
            return Step::Yield;
        };
        if let Some(old) = self.mesh_handle.replace(handle) {
            env.sink.dispose(old);
        }
        if self.texture.is_some() && self.texture_size == self.desired_texture {
            return self.finish_build();
        }
        self.advance()
    }

    fn bake_texture(&mut self, env: &mut TileEnv<'_>) -> Step {
        if self.staging.is_none() {
            let res = self.desired_texture;
            let Some(tex) = env.sink.create_texture(res) else {
                log::warn!(
                    target: "terrain",
                    "tile {:?}: could not create {}px texture",
                    self.cell,
                    res
                );
                return Step::Yield;
            };
            self.staging = Some((tex, res));
            self.bake = Some(BakePlan::new(res, env.sink.max_patch_size()));
            self.cursor = 0;
        }
        let (Some((tex, _)), Some(plan)) = (self.staging, self.bake) else {
            return Step::Yield;
        };
        let (bounds, texels) = plan.patch(self.cursor);
        let painted = paint_patch(
            &mut *env.sink,
            &self.heights,
            self.cfg.edge,
            &self.surface_used,
            bounds,
            texels,
            tex,
        );
        if !painted {
            return Step::Yield;
        }
        self.cursor += 1;
        if self.cursor >= plan.patch_count() {
            return self.advance();
        }
        Step::Working
    }

    fn finalize_texture(&mut self, env: &mut TileEnv<'_>) -> Step {
        if let Some((tex, res)) = self.staging.take() {
            if let Some(old) = self.texture.replace(tex) {
                env.sink.dispose_texture(old);
            }
            self.texture_size = res;
        }
        self.bake = None;
        self.finish_build()
    }

    fn finish_build(&mut self) -> Step {
        self.stage = BuildStage::Done;
        self.cursor = 0;
        self.rebuild_at =
            Some(Instant::now() + Duration::from_millis(self.cfg.rebuild_interval_ms));
        self.stats.builds += 1;
        if let Some(t0) = self.build_started.take() {
            log::debug!(
                target: "terrain",
                "tile {:?} built: {} verts {} tris lod {} tex {} in {}ms",
                self.cell,
                self.stats.vertices,
                self.stats.triangles,
                self.lod,
                self.texture_size,
                t0.elapsed().as_millis()
            );
        }
        Step::Done
    }

    fn done(
        &mut self,
        neighbors: &Neighbors<'_, Tile>,
        env: &mut TileEnv<'_>,
        deadline: Instant,
    ) -> Step {
        let now = Instant::now();
        if self.rebuild_at.is_some_and(|t| now < t) {
            return Step::Done;
        }
        self.touch_footprint(env, deadline);
        self.rebuild_at = Some(now + Duration::from_millis(self.cfg.rebuild_interval_ms));

        if self.lod == 0 && self.neighbors_changed(neighbors) {
            self.stats.restitches += 1;
            log::trace!(target: "terrain", "tile {:?}: neighbor points changed", self.cell);
            self.stage = BuildStage::Quadtree;
            self.cursor = 0;
            self.build_started = Some(now);
            return Step::Advanced;
        }
        if self.texture_size != self.desired_texture {
            self.stage = BuildStage::BakeTexture;
            self.cursor = 0;
            self.build_started = Some(now);
            return Step::Advanced;
        }
        Step::Done
    }
}

impl GridItem for Tile {
    type Context<'c> = TileEnv<'c>;

    /// Same cell: only the LOD (and so the desired texture size) changes.
    /// New cell: current resources are queued for disposal and the build
    /// restarts from `Begin`.
    fn set(&mut self, cell: GridCoord, distance: f32) {
        self.distance = distance;
        self.lod = self.cfg.lod_for(distance);
        self.desired_texture = self.cfg.texture_size_for(self.lod);
        if self.cell == Some(cell) {
            return;
        }
        self.retire_resources();
        self.cell = Some(cell);
        self.stage = BuildStage::Begin;
        self.cursor = 0;
        self.settled = false;
        self.snapshot = [None; 4];
        self.rebuild_at = None;
        self.mesh.clear_keep_capacity();
    }

    fn update<'c>(
        &mut self,
        neighbors: &Neighbors<'_, Self>,
        env: &mut TileEnv<'c>,
        deadline: Instant,
    ) {
        self.release_retired(&mut *env.sink);
        // At least one step per call, even past the deadline.
        loop {
            match self.step(neighbors, env, deadline) {
                Step::Yield | Step::Done => break,
                Step::Working | Step::Advanced => {}
            }
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    fn ready(&self) -> bool {
        self.stage == BuildStage::Done
    }
}
