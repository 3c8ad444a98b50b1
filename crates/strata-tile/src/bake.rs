use strata_geom::Rect;
use strata_oracle::{Rgba, SurfaceKind};

use crate::heightfield::Heightfield;
use crate::sink::{PaintLayer, PaintQuad, RenderSink, TexelRect, TextureHandle};

/// How a `resolution²` tile texture is split into square patches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BakePlan {
    resolution: u32,
    patch: u32,
    per_side: u32,
}

impl BakePlan {
    pub fn new(resolution: u32, max_patch: u32) -> Self {
        let resolution = resolution.max(1);
        let patch = max_patch.clamp(1, resolution);
        Self {
            resolution,
            patch,
            per_side: resolution.div_ceil(patch),
        }
    }

    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[inline]
    pub fn patch_size(&self) -> u32 {
        self.patch
    }

    #[inline]
    pub fn patch_count(&self) -> usize {
        (self.per_side * self.per_side) as usize
    }

    /// Uv bounds and destination texels of patch `i`, row-major.
    pub fn patch(&self, i: usize) -> (Rect, TexelRect) {
        let i = i as u32;
        let x = (i % self.per_side) * self.patch;
        let y = (i / self.per_side) * self.patch;
        let texels = TexelRect {
            x,
            y,
            width: self.patch.min(self.resolution - x),
            height: self.patch.min(self.resolution - y),
        };
        let r = self.resolution as f32;
        let bounds = Rect::new(
            x as f32 / r,
            y as f32 / r,
            (x + texels.width) as f32 / r,
            (y + texels.height) as f32 / r,
        );
        (bounds, texels)
    }
}

fn average(colors: [Rgba; 4]) -> Rgba {
    let sum = |f: fn(&Rgba) -> u8| -> u8 {
        (colors.iter().map(|c| f(c) as u32).sum::<u32>() / 4) as u8
    };
    Rgba {
        r: sum(|c| c.r),
        g: sum(|c| c.g),
        b: sum(|c| c.b),
        a: sum(|c| c.a),
    }
}

/// Lattice cells overlapping `bounds`, as `(x0, z0, x1, z1)` exclusive.
fn cell_range(bounds: &Rect, edge: usize) -> (i32, i32, i32, i32) {
    let e = edge as f32;
    let lo = |v: f32| ((v * e).floor() as i32).clamp(0, edge as i32);
    let hi = |v: f32| ((v * e).ceil() as i32).clamp(0, edge as i32);
    (lo(bounds.min_x), lo(bounds.min_y), hi(bounds.max_x), hi(bounds.max_y))
}

/// Paint one patch of a tile texture: a base layer of per-cell colors, then
/// one overlay per surface kind present in `used`.
///
/// Returns false if the sink could not open an offscreen patch.
pub fn paint_patch(
    sink: &mut dyn RenderSink,
    field: &Heightfield,
    edge: usize,
    used: &[bool; SurfaceKind::COUNT],
    bounds: Rect,
    texels: TexelRect,
    texture: TextureHandle,
) -> bool {
    if !sink.begin_offscreen_patch(bounds, texels.width.max(texels.height)) {
        return false;
    }
    let (x0, z0, x1, z1) = cell_range(&bounds, edge);
    let e = edge as f32;
    let cell_rect = |x: i32, z: i32| {
        Rect::new(
            x as f32 / e,
            z as f32 / e,
            (x + 1) as f32 / e,
            (z + 1) as f32 / e,
        )
    };

    let mut quads = Vec::with_capacity(((x1 - x0) * (z1 - z0)).max(0) as usize);
    for z in z0..z1 {
        for x in x0..x1 {
            let color = average([
                field.color(x, z),
                field.color(x + 1, z),
                field.color(x, z + 1),
                field.color(x + 1, z + 1),
            ]);
            quads.push(PaintQuad {
                rect: cell_rect(x, z),
                color,
            });
        }
    }
    sink.paint(PaintLayer::Base, &quads);

    for kind in SurfaceKind::ALL {
        if !used[kind.index()] {
            continue;
        }
        quads.clear();
        let tint = Rgba {
            a: 96,
            ..kind.base_color()
        };
        for z in z0..z1 {
            for x in x0..x1 {
                if field.surface(x, z) == kind {
                    quads.push(PaintQuad {
                        rect: cell_rect(x, z),
                        color: tint,
                    });
                }
            }
        }
        sink.paint(PaintLayer::Surface(kind), &quads);
    }

    sink.end_offscreen_patch();
    sink.copy_patch_into_texture(texture, texels);
    true
}
