//! The render-side contract a tile draws through, plus a recording
//! implementation for tests and headless runs.

use hashbrown::HashMap;
use strata_geom::Rect;
use strata_oracle::{Rgba, SurfaceKind};

use crate::mesh::TerrainMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// What a batch of paint quads represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaintLayer {
    /// Per-cell surface colors.
    Base,
    /// Detail overlay for one surface kind.
    Surface(SurfaceKind),
}

/// A colored rectangle in tile uv space (`[0,1]²`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintQuad {
    pub rect: Rect,
    pub color: Rgba,
}

/// Texel rectangle inside a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TexelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Everything a tile asks of the renderer.
///
/// Resource creation may fail (`None`/`false`); tiles retry on a later update
/// and keep whatever they were showing before.
pub trait RenderSink {
    fn upload(&mut self, mesh: &TerrainMesh) -> Option<MeshHandle>;
    fn render(&mut self, mesh: MeshHandle, texture: Option<TextureHandle>);
    fn dispose(&mut self, mesh: MeshHandle);

    fn create_texture(&mut self, resolution: u32) -> Option<TextureHandle>;
    fn dispose_texture(&mut self, texture: TextureHandle);

    /// Largest square patch, in texels, that can be painted offscreen at once.
    fn max_patch_size(&self) -> u32;
    /// Start painting the uv region `bounds` into a `resolution²` offscreen patch.
    fn begin_offscreen_patch(&mut self, bounds: Rect, resolution: u32) -> bool;
    fn paint(&mut self, layer: PaintLayer, quads: &[PaintQuad]);
    fn end_offscreen_patch(&mut self);
    /// Copy the last finished patch into `texture` at `rect`.
    fn copy_patch_into_texture(&mut self, texture: TextureHandle, rect: TexelRect);
}

#[derive(Clone, Debug, Default)]
pub struct MemoryTexture {
    pub resolution: u32,
    /// Patches copied in, in order.
    pub patches: Vec<TexelRect>,
    /// Layers painted across all copied patches.
    pub layers: Vec<PaintLayer>,
}

#[derive(Clone, Debug, Default)]
struct PatchRecord {
    bounds: Rect,
    resolution: u32,
    layers: Vec<PaintLayer>,
    quads: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemorySinkStats {
    pub uploads: u64,
    pub upload_failures: u64,
    pub disposed_meshes: u64,
    pub textures_created: u64,
    pub disposed_textures: u64,
    pub patches: u64,
    pub quads: u64,
}

/// [`RenderSink`] that keeps everything in memory.
///
/// Set `fail_uploads` / `fail_textures` to simulate a renderer that cannot
/// allocate.
#[derive(Debug)]
pub struct MemorySink {
    pub fail_uploads: bool,
    pub fail_textures: bool,
    max_patch: u32,
    next_id: u64,
    meshes: HashMap<MeshHandle, TerrainMesh>,
    textures: HashMap<TextureHandle, MemoryTexture>,
    open: Option<PatchRecord>,
    finished: Option<PatchRecord>,
    frame: Vec<(MeshHandle, Option<TextureHandle>)>,
    stats: MemorySinkStats,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemorySink {
    pub fn new(max_patch: u32) -> Self {
        Self {
            fail_uploads: false,
            fail_textures: false,
            max_patch: max_patch.max(1),
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            open: None,
            finished: None,
            frame: Vec::new(),
            stats: MemorySinkStats::default(),
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn stats(&self) -> MemorySinkStats {
        self.stats
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn mesh(&self, h: MeshHandle) -> Option<&TerrainMesh> {
        self.meshes.get(&h)
    }

    pub fn texture(&self, h: TextureHandle) -> Option<&MemoryTexture> {
        self.textures.get(&h)
    }

    /// Draw calls recorded since the last [`MemorySink::clear_frame`].
    pub fn rendered(&self) -> &[(MeshHandle, Option<TextureHandle>)] {
        &self.frame
    }

    pub fn clear_frame(&mut self) {
        self.frame.clear();
    }
}

impl RenderSink for MemorySink {
    fn upload(&mut self, mesh: &TerrainMesh) -> Option<MeshHandle> {
        if self.fail_uploads {
            self.stats.upload_failures += 1;
            return None;
        }
        let h = MeshHandle(self.next());
        self.meshes.insert(h, mesh.clone());
        self.stats.uploads += 1;
        Some(h)
    }

    fn render(&mut self, mesh: MeshHandle, texture: Option<TextureHandle>) {
        if self.meshes.contains_key(&mesh) {
            self.frame.push((mesh, texture));
        } else {
            log::warn!(target: "terrain", "render of unknown mesh {:?}", mesh);
        }
    }

    fn dispose(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_some() {
            self.stats.disposed_meshes += 1;
        }
    }

    fn create_texture(&mut self, resolution: u32) -> Option<TextureHandle> {
        if self.fail_textures || resolution == 0 {
            return None;
        }
        let h = TextureHandle(self.next());
        self.textures.insert(
            h,
            MemoryTexture {
                resolution,
                ..MemoryTexture::default()
            },
        );
        self.stats.textures_created += 1;
        Some(h)
    }

    fn dispose_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.stats.disposed_textures += 1;
        }
    }

    fn max_patch_size(&self) -> u32 {
        self.max_patch
    }

    fn begin_offscreen_patch(&mut self, bounds: Rect, resolution: u32) -> bool {
        if self.open.is_some() || resolution == 0 || resolution > self.max_patch {
            return false;
        }
        self.open = Some(PatchRecord {
            bounds,
            resolution,
            ..PatchRecord::default()
        });
        true
    }

    fn paint(&mut self, layer: PaintLayer, quads: &[PaintQuad]) {
        if let Some(patch) = self.open.as_mut() {
            patch.layers.push(layer);
            patch.quads += quads.len();
            self.stats.quads += quads.len() as u64;
        }
    }

    fn end_offscreen_patch(&mut self) {
        if let Some(patch) = self.open.take() {
            log::trace!(
                target: "terrain",
                "patch {:?} at {} texels: {} quads",
                patch.bounds,
                patch.resolution,
                patch.quads
            );
            self.finished = Some(patch);
            self.stats.patches += 1;
        }
    }

    fn copy_patch_into_texture(&mut self, texture: TextureHandle, rect: TexelRect) {
        let Some(patch) = self.finished.take() else {
            return;
        };
        if let Some(t) = self.textures.get_mut(&texture) {
            t.patches.push(rect);
            t.layers.extend(patch.layers);
        }
    }
}
