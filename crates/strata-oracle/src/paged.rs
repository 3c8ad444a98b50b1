use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashSet;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Deserialize;
use strata_geom::Vec3;

use crate::page_cache::{Page, PageCache, PageCacheStats, PageKey};
use crate::source::{HeightSource, SourceSample};
use crate::surface::{Rgba, SurfaceKind};
use crate::{HeightOracle, SurfaceOracle};

#[derive(Clone, Debug, Deserialize)]
pub struct PageConfig {
    /// Samples per page edge.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// World units between adjacent samples.
    #[serde(default = "default_sample_spacing")]
    pub sample_spacing: f32,
    /// Maximum resident pages.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Pages around a touched point that get requested.
    #[serde(default = "default_touch_radius")]
    pub touch_radius: i32,
    /// Background workers; 0 picks from available parallelism.
    #[serde(default)]
    pub workers: usize,
}
fn default_page_size() -> usize {
    64
}
fn default_sample_spacing() -> f32 {
    1.0
}
fn default_capacity() -> usize {
    256
}
fn default_touch_radius() -> i32 {
    1
}
impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sample_spacing: default_sample_spacing(),
            capacity: default_capacity(),
            touch_radius: default_touch_radius(),
            workers: 0,
        }
    }
}

fn build_page(source: &dyn HeightSource, key: PageKey, size: usize) -> Arc<Page> {
    let n = size as i32;
    let (x0, z0) = (key.px * n, key.pz * n);
    let mut samples = Vec::with_capacity(size * size);
    for dz in 0..n {
        for dx in 0..n {
            samples.push(source.sample(x0 + dx, z0 + dz));
        }
    }
    Page::new(key, size, samples)
}

/// Oracle backed by pages that background workers fill on demand.
///
/// Nothing here ever blocks the caller: `touch` only enqueues requests and
/// `available` reports whether the needed pages have landed.
pub struct PagedOracle {
    cfg: PageConfig,
    cache: Arc<PageCache>,
    pending: Arc<Mutex<HashSet<PageKey>>>,
    job_tx: Sender<PageKey>,
    inflight: Arc<AtomicUsize>,
    _pool: Arc<ThreadPool>,
}

impl PagedOracle {
    pub fn new(source: Arc<dyn HeightSource>, cfg: PageConfig) -> Self {
        let workers = if cfg.workers > 0 {
            cfg.workers
        } else {
            thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(2)
        };
        let cache = Arc::new(PageCache::new(cfg.capacity));
        let pending: Arc<Mutex<HashSet<PageKey>>> = Arc::new(Mutex::new(HashSet::new()));
        let inflight = Arc::new(AtomicUsize::new(0));
        let (job_tx, job_rx) = unbounded::<PageKey>();
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("strata-pages-{i}"))
                .build()
                .expect("page pool"),
        );
        for _ in 0..workers {
            Self::spawn_worker(
                &pool,
                job_rx.clone(),
                source.clone(),
                cache.clone(),
                pending.clone(),
                inflight.clone(),
                cfg.page_size,
            );
        }
        log::debug!(
            target: "pages",
            "paged oracle: {} workers, page_size={} capacity={}",
            workers,
            cfg.page_size,
            cfg.capacity
        );
        Self {
            cfg,
            cache,
            pending,
            job_tx,
            inflight,
            _pool: pool,
        }
    }

    fn spawn_worker(
        pool: &ThreadPool,
        rx: Receiver<PageKey>,
        source: Arc<dyn HeightSource>,
        cache: Arc<PageCache>,
        pending: Arc<Mutex<HashSet<PageKey>>>,
        inflight: Arc<AtomicUsize>,
        page_size: usize,
    ) {
        pool.spawn(move || {
            while let Ok(key) = rx.recv() {
                inflight.fetch_add(1, Ordering::Relaxed);
                let t0 = Instant::now();
                let page = build_page(source.as_ref(), key, page_size);
                cache.insert(page);
                if let Ok(mut p) = pending.lock() {
                    p.remove(&key);
                }
                inflight.fetch_sub(1, Ordering::Relaxed);
                log::trace!(
                    target: "pages",
                    "page ({}, {}) ready in {}us",
                    key.px,
                    key.pz,
                    t0.elapsed().as_micros()
                );
            }
        });
    }

    pub fn config(&self) -> &PageConfig {
        &self.cfg
    }

    pub fn stats(&self) -> PageCacheStats {
        self.cache.snapshot()
    }

    /// Requests queued or being built.
    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Drop every page; subsequent queries report unavailable until re-touched.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Queue a page unless it is resident or already requested.
    pub fn request(&self, key: PageKey) -> bool {
        if self.cache.contains(&key) {
            return false;
        }
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        if !pending.insert(key) {
            return false;
        }
        if self.job_tx.send(key).is_err() {
            pending.remove(&key);
            return false;
        }
        true
    }

    #[inline]
    fn to_sample_space(&self, w: f32) -> f32 {
        w / self.cfg.sample_spacing
    }

    #[inline]
    fn page_of(&self, ix: i32, iz: i32) -> PageKey {
        PageKey::containing(ix, iz, self.cfg.page_size)
    }

    fn raw(&self, ix: i32, iz: i32) -> Option<SourceSample> {
        self.cache
            .peek(&self.page_of(ix, iz))
            .and_then(|page| page.get(ix, iz))
    }

    /// Pages holding samples `[ix0, ix1] × [iz0, iz1]`.
    fn pages_between(
        &self,
        ix0: i32,
        iz0: i32,
        ix1: i32,
        iz1: i32,
    ) -> impl Iterator<Item = PageKey> + use<> {
        let a = self.page_of(ix0, iz0);
        let b = self.page_of(ix1, iz1);
        (a.pz..=b.pz).flat_map(move |pz| (a.px..=b.px).map(move |px| PageKey::new(px, pz)))
    }

    fn pages_cover(&self, ix0: i32, iz0: i32, ix1: i32, iz1: i32) -> bool {
        self.pages_between(ix0, iz0, ix1, iz1)
            .all(|key| self.cache.contains(&key))
    }

    /// Sample bounds of a world rectangle, with one sample of slack for
    /// bilinear taps and normals.
    fn region_samples(&self, x0: f32, z0: f32, x1: f32, z1: f32) -> (i32, i32, i32, i32) {
        let ix0 = self.to_sample_space(x0.min(x1)).floor() as i32;
        let iz0 = self.to_sample_space(z0.min(z1)).floor() as i32;
        let ix1 = self.to_sample_space(x0.max(x1)).ceil() as i32;
        let iz1 = self.to_sample_space(z0.max(z1)).ceil() as i32;
        (ix0 - 1, iz0 - 1, ix1 + 1, iz1 + 1)
    }

    fn nearest(&self, wx: f32, wz: f32) -> Option<SourceSample> {
        let ix = self.to_sample_space(wx).round() as i32;
        let iz = self.to_sample_space(wz).round() as i32;
        self.raw(ix, iz)
    }

    fn bilinear(&self, wx: f32, wz: f32) -> f32 {
        let fx = self.to_sample_space(wx);
        let fz = self.to_sample_space(wz);
        let (x0, z0) = (fx.floor(), fz.floor());
        let (tx, tz) = (fx - x0, fz - z0);
        let (ix, iz) = (x0 as i32, z0 as i32);
        let h = |x: i32, z: i32| self.raw(x, z).map(|s| s.elevation).unwrap_or(0.0);
        if tx == 0.0 && tz == 0.0 {
            return h(ix, iz);
        }
        let top = h(ix, iz) * (1.0 - tx) + h(ix + 1, iz) * tx;
        let bottom = h(ix, iz + 1) * (1.0 - tx) + h(ix + 1, iz + 1) * tx;
        top * (1.0 - tz) + bottom * tz
    }
}

impl HeightOracle for PagedOracle {
    fn available(&self, wx: f32, wz: f32) -> bool {
        let ix = self.to_sample_space(wx).floor() as i32;
        let iz = self.to_sample_space(wz).floor() as i32;
        // One sample of slack on each side for bilinear taps and normals.
        self.pages_cover(ix - 1, iz - 1, ix + 2, iz + 2)
    }

    /// Also refreshes the LRU position of every covered page, so a region
    /// that is being built stays resident.
    fn region_available(&self, x0: f32, z0: f32, x1: f32, z1: f32) -> bool {
        let (ix0, iz0, ix1, iz1) = self.region_samples(x0, z0, x1, z1);
        let mut all = true;
        for key in self.pages_between(ix0, iz0, ix1, iz1) {
            all &= self.cache.refresh(&key);
        }
        all
    }

    fn elevation(&self, wx: f32, wz: f32) -> f32 {
        self.bilinear(wx, wz)
    }

    fn normal(&self, wx: f32, wz: f32) -> Vec3 {
        let s = self.cfg.sample_spacing;
        let dx = self.bilinear(wx - s, wz) - self.bilinear(wx + s, wz);
        let dz = self.bilinear(wx, wz - s) - self.bilinear(wx, wz + s);
        Vec3::new(dx, 2.0 * s, dz).normalized_or_up()
    }

    fn touch(&self, wx: f32, wz: f32, deadline: Instant) {
        let ix = self.to_sample_space(wx).floor() as i32;
        let iz = self.to_sample_space(wz).floor() as i32;
        let center = self.page_of(ix, iz);
        let r = self.cfg.touch_radius.max(0);
        // Nearest rings first so an early deadline still covers the center.
        for ring in 0..=r {
            for dz in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dz.abs() != ring {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return;
                    }
                    let key = PageKey::new(center.px + dx, center.pz + dz);
                    if self.cache.get(&key).is_none() && self.request(key) {
                        log::trace!(target: "pages", "requested page ({}, {})", key.px, key.pz);
                    }
                }
            }
        }
    }

    /// Requests every page the rectangle needs, then the usual ring around
    /// its center.
    fn touch_region(&self, x0: f32, z0: f32, x1: f32, z1: f32, deadline: Instant) {
        let (ix0, iz0, ix1, iz1) = self.region_samples(x0, z0, x1, z1);
        for key in self.pages_between(ix0, iz0, ix1, iz1) {
            if Instant::now() >= deadline {
                return;
            }
            if self.request(key) {
                log::trace!(target: "pages", "requested page ({}, {})", key.px, key.pz);
            }
        }
        self.touch((x0 + x1) * 0.5, (z0 + z1) * 0.5, deadline);
    }
}

impl SurfaceOracle for PagedOracle {
    fn surface(&self, wx: f32, wz: f32) -> SurfaceKind {
        self.nearest(wx, wz).map(|s| s.surface).unwrap_or_default()
    }

    fn surface_color(&self, wx: f32, wz: f32) -> Rgba {
        self.nearest(wx, wz)
            .map(|s| s.color)
            .unwrap_or(Rgba::WHITE)
    }
}
