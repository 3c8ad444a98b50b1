use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_oracle::{
    HeightOracle, PageConfig, PageKey, PagedOracle, SourceSample, SurfaceKind, SurfaceOracle,
    TerrainOracle,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ramp(ix: i32, iz: i32) -> SourceSample {
    SourceSample {
        elevation: ix as f32 * 0.5,
        surface: if iz < 0 {
            SurfaceKind::Sand
        } else {
            SurfaceKind::Grass
        },
        ..SourceSample::default()
    }
}

fn oracle(page_size: usize, capacity: usize) -> PagedOracle {
    let cfg = PageConfig {
        page_size,
        capacity,
        touch_radius: 1,
        workers: 2,
        ..PageConfig::default()
    };
    PagedOracle::new(Arc::new(ramp), cfg)
}

fn far() -> Instant {
    Instant::now() + Duration::from_secs(1)
}

fn wait_until(mut f: impl FnMut() -> bool) -> bool {
    let t0 = Instant::now();
    while t0.elapsed() < Duration::from_secs(10) {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn unavailable_until_touched_then_populated() {
    init_logs();
    let o = oracle(16, 64);
    assert!(!o.available(4.0, 4.0));
    o.touch(4.0, 4.0, far());
    assert!(wait_until(|| o.available(4.0, 4.0) && o.available(4.0, -3.0)));
    assert_eq!(o.elevation(4.0, 4.0), 2.0);
    assert_eq!(o.surface(4.0, -3.0), SurfaceKind::Sand);
    assert_eq!(o.surface(4.0, 3.0), SurfaceKind::Grass);
}

#[test]
fn elevation_interpolates_between_samples() {
    init_logs();
    let o = oracle(8, 64);
    o.touch(3.0, 3.0, far());
    assert!(wait_until(|| o.available(3.5, 3.0)));
    assert!((o.elevation(3.5, 3.0) - 1.75).abs() < 1e-5);
    let n = o.sample(3.0, 3.0).normal;
    // Elevation rises along +x, so the normal leans towards -x.
    assert!(n.x < 0.0 && n.y > 0.0 && n.z.abs() < 1e-5);
}

#[test]
fn region_availability_requires_every_covered_page() {
    init_logs();
    let o = oracle(8, 64);
    o.request(PageKey::new(0, 0));
    assert!(wait_until(|| o.stats().entries == 1));
    // Corners alone would be satisfied by neighbours, the region check is not.
    assert!(!o.region_available(1.0, 1.0, 30.0, 30.0));
    o.touch(16.0, 16.0, far());
    for pz in -1..=4 {
        for px in -1..=4 {
            o.request(PageKey::new(px, pz));
        }
    }
    assert!(wait_until(|| o.region_available(1.0, 1.0, 30.0, 30.0)));
}

#[test]
fn requests_are_deduplicated() {
    init_logs();
    let o = oracle(8, 64);
    let key = PageKey::new(5, 5);
    let first = o.request(key);
    assert!(first);
    assert!(wait_until(|| o.pending() == 0));
    assert!(!o.request(key), "resident pages are not re-requested");
}

#[test]
fn capacity_bounds_resident_pages() {
    init_logs();
    let o = oracle(4, 3);
    for px in 0..8 {
        o.request(PageKey::new(px, 0));
    }
    assert!(wait_until(|| o.pending() == 0 && o.inflight() == 0));
    let stats = o.stats();
    assert!(stats.entries <= 3);
    assert!(stats.evictions >= 5);
}

#[test]
fn touching_a_region_requests_every_covered_page() {
    init_logs();
    let o = oracle(8, 256);
    // Far wider than the ring a single touch covers.
    assert!(!o.region_available(0.0, 0.0, 100.0, 100.0));
    o.touch_region(0.0, 0.0, 100.0, 100.0, far());
    assert!(wait_until(|| o.region_available(0.0, 0.0, 100.0, 100.0)));
}

#[test]
fn region_checks_keep_pages_resident() {
    init_logs();
    let o = oracle(8, 2);
    o.request(PageKey::new(0, 0));
    assert!(wait_until(|| o.pending() == 0));
    o.request(PageKey::new(1, 0));
    assert!(wait_until(|| o.pending() == 0));

    // Page (0, 0) is the oldest insert but was just used.
    assert!(o.region_available(1.0, 1.0, 2.0, 2.0));
    o.request(PageKey::new(2, 0));
    assert!(wait_until(|| o.pending() == 0));

    assert!(o.region_available(1.0, 1.0, 2.0, 2.0));
    assert!(!o.region_available(9.0, 1.0, 10.0, 2.0));
    assert_eq!(o.stats().evictions, 1);
}
