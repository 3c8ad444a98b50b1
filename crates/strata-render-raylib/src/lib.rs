//! Raylib-backed [`RenderSink`]: uploads tile meshes as models and bakes tile
//! textures through an offscreen render texture.
// Unsafe is required for Raylib mesh upload.

use std::collections::HashMap;

use raylib::prelude::*;
use raylib::prelude::RaylibModel;
use strata_geom::Rect;
use strata_tile::{
    MeshHandle, PaintLayer, PaintQuad, RenderSink, TerrainMesh, TexelRect, TextureHandle,
};

/// Raylib meshes index with `u16`.
pub fn indices_to_u16(idx: &[u32]) -> Option<Vec<u16>> {
    idx.iter().map(|&i| u16::try_from(i).ok()).collect()
}

/// Pixel rectangle of a uv-space quad inside a patch covering `bounds`.
pub fn quad_pixels(bounds: &Rect, quad: &Rect, resolution: u32) -> (f32, f32, f32, f32) {
    let local = bounds.to_local(quad);
    let r = resolution as f32;
    (
        local.min_x * r,
        local.min_y * r,
        local.width() * r,
        local.height() * r,
    )
}

fn rl_color(c: strata_oracle::Rgba) -> Color {
    Color::new(c.r, c.g, c.b, c.a)
}

/// GPU resources owned across frames. Borrow it into a [`RaylibSink`] while
/// updating tiles, then draw what was queued inside a 3D pass.
pub struct GpuTerrain {
    next_id: u64,
    max_patch: u32,
    models: HashMap<MeshHandle, Model>,
    textures: HashMap<TextureHandle, RenderTexture2D>,
    patch: Option<RenderTexture2D>,
    patch_bounds: Rect,
    patch_res: u32,
    painting: bool,
    queue: Vec<(MeshHandle, Option<TextureHandle>)>,
}

impl GpuTerrain {
    pub fn new(max_patch: u32) -> Self {
        Self {
            next_id: 1,
            max_patch: max_patch.max(1),
            models: HashMap::new(),
            textures: HashMap::new(),
            patch: None,
            patch_bounds: Rect::default(),
            patch_res: 0,
            painting: false,
            queue: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_models(&self) -> usize {
        self.models.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Draw every mesh queued by [`RenderSink::render`] since the last call.
    pub fn draw_queued<D: RaylibDraw3D>(&mut self, d3: &mut D) {
        for (mesh, tex) in self.queue.drain(..) {
            let Some(model) = self.models.get_mut(&mesh) else {
                continue;
            };
            if let Some(rt) = tex.and_then(|t| self.textures.get(&t)) {
                if let Some(mat) = model.materials_mut().get_mut(0) {
                    mat.set_material_texture(
                        raylib::consts::MaterialMapIndex::MATERIAL_MAP_ALBEDO,
                        rt.texture(),
                    );
                }
            }
            d3.draw_model(&*model, Vector3::zero(), 1.0, Color::WHITE);
        }
    }
}

pub struct RaylibSink<'a> {
    rl: &'a mut RaylibHandle,
    thread: &'a RaylibThread,
    gpu: &'a mut GpuTerrain,
}

impl<'a> RaylibSink<'a> {
    pub fn new(
        rl: &'a mut RaylibHandle,
        thread: &'a RaylibThread,
        gpu: &'a mut GpuTerrain,
    ) -> Self {
        Self { rl, thread, gpu }
    }

    fn build_model(&mut self, mesh: &TerrainMesh) -> Option<Model> {
        let v_count = mesh.vertex_count();
        if v_count == 0 || mesh.is_empty() {
            return None;
        }
        let Some(idx) = indices_to_u16(&mesh.idx) else {
            log::warn!(target: "terrain", "tile mesh has {} vertices, too many for u16 indices", v_count);
            return None;
        };
        let mut raw: raylib::ffi::Mesh = unsafe { std::mem::zeroed() };
        raw.vertexCount = v_count as i32;
        raw.triangleCount = mesh.triangle_count() as i32;
        unsafe {
            let vbytes = (v_count * 3 * std::mem::size_of::<f32>()) as u32;
            let tbytes = (v_count * 2 * std::mem::size_of::<f32>()) as u32;
            let ibytes = (idx.len() * std::mem::size_of::<u16>()) as u32;
            raw.vertices = raylib::ffi::MemAlloc(vbytes) as *mut f32;
            raw.normals = raylib::ffi::MemAlloc(vbytes) as *mut f32;
            raw.texcoords = raylib::ffi::MemAlloc(tbytes) as *mut f32;
            raw.indices = raylib::ffi::MemAlloc(ibytes) as *mut u16;
            std::ptr::copy_nonoverlapping(mesh.pos.as_ptr(), raw.vertices, v_count * 3);
            std::ptr::copy_nonoverlapping(mesh.norm.as_ptr(), raw.normals, v_count * 3);
            std::ptr::copy_nonoverlapping(mesh.uv.as_ptr(), raw.texcoords, v_count * 2);
            std::ptr::copy_nonoverlapping(idx.as_ptr(), raw.indices, idx.len());
        }
        let mut gpu_mesh = unsafe { raylib::core::models::Mesh::from_raw(raw) };
        unsafe {
            gpu_mesh.upload(false);
        }
        self.rl
            .load_model_from_mesh(self.thread, unsafe { gpu_mesh.make_weak() })
            .ok()
    }
}

impl RenderSink for RaylibSink<'_> {
    fn upload(&mut self, mesh: &TerrainMesh) -> Option<MeshHandle> {
        let model = self.build_model(mesh)?;
        let h = MeshHandle(self.gpu.next());
        self.gpu.models.insert(h, model);
        Some(h)
    }

    fn render(&mut self, mesh: MeshHandle, texture: Option<TextureHandle>) {
        self.gpu.queue.push((mesh, texture));
    }

    fn dispose(&mut self, mesh: MeshHandle) {
        self.gpu.models.remove(&mesh);
    }

    fn create_texture(&mut self, resolution: u32) -> Option<TextureHandle> {
        match self.rl.load_render_texture(self.thread, resolution, resolution) {
            Ok(rt) => {
                let h = TextureHandle(self.gpu.next());
                self.gpu.textures.insert(h, rt);
                Some(h)
            }
            Err(e) => {
                log::warn!(target: "terrain", "failed to allocate {}px tile texture: {}", resolution, e);
                None
            }
        }
    }

    fn dispose_texture(&mut self, texture: TextureHandle) {
        self.gpu.textures.remove(&texture);
    }

    fn max_patch_size(&self) -> u32 {
        self.gpu.max_patch
    }

    fn begin_offscreen_patch(&mut self, bounds: Rect, resolution: u32) -> bool {
        if self.gpu.painting || resolution == 0 || resolution > self.gpu.max_patch {
            return false;
        }
        if self.gpu.patch.is_none() {
            let side = self.gpu.max_patch;
            match self.rl.load_render_texture(self.thread, side, side) {
                Ok(rt) => self.gpu.patch = Some(rt),
                Err(e) => {
                    log::warn!(target: "terrain", "failed to allocate patch texture: {}", e);
                    return false;
                }
            }
        }
        let Some(rt) = self.gpu.patch.as_mut() else {
            return false;
        };
        {
            let mut td = self.rl.begin_texture_mode(self.thread, rt);
            td.clear_background(Color::new(0, 0, 0, 0));
        }
        self.gpu.patch_bounds = bounds;
        self.gpu.patch_res = resolution;
        self.gpu.painting = true;
        true
    }

    fn paint(&mut self, _layer: PaintLayer, quads: &[PaintQuad]) {
        if !self.gpu.painting {
            return;
        }
        let bounds = self.gpu.patch_bounds;
        let res = self.gpu.patch_res;
        let Some(rt) = self.gpu.patch.as_mut() else {
            return;
        };
        let mut td = self.rl.begin_texture_mode(self.thread, rt);
        for q in quads {
            let (x, y, w, h) = quad_pixels(&bounds, &q.rect, res);
            td.draw_rectangle_rec(Rectangle::new(x, y, w, h), rl_color(q.color));
        }
    }

    fn end_offscreen_patch(&mut self) {
        self.gpu.painting = false;
    }

    fn copy_patch_into_texture(&mut self, texture: TextureHandle, rect: TexelRect) {
        let res = self.gpu.patch_res as f32;
        let (Some(patch), Some(dest)) = (
            self.gpu.patch.as_ref(),
            self.gpu.textures.get_mut(&texture),
        ) else {
            return;
        };
        // Render textures are stored bottom-up; the painted region is the
        // top-left `res` square of the patch.
        let src_y = patch.height() as f32 - res;
        let mut td = self.rl.begin_texture_mode(self.thread, dest);
        td.draw_texture_pro(
            patch.texture(),
            Rectangle::new(0.0, src_y, res, -res),
            Rectangle::new(
                rect.x as f32,
                rect.y as f32,
                rect.width as f32,
                rect.height as f32,
            ),
            Vector2::zero(),
            0.0,
            Color::WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_fit_u16_or_fail() {
        assert_eq!(indices_to_u16(&[0, 1, 65535]), Some(vec![0, 1, 65535]));
        assert_eq!(indices_to_u16(&[0, 65536]), None);
    }

    #[test]
    fn quads_map_into_patch_pixels() {
        let bounds = Rect::new(0.5, 0.0, 1.0, 0.5);
        let quad = Rect::new(0.5, 0.25, 0.75, 0.5);
        assert_eq!(quad_pixels(&bounds, &quad, 128), (0.0, 64.0, 64.0, 64.0));
    }
}
