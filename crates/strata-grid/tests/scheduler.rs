use std::time::{Duration, Instant};

use proptest::prelude::*;
use strata_geom::{GridCoord, Vec3};
use strata_grid::{Direction, GridItem, GridScheduler, Neighbors, RingSchedule};

/// Becomes ready after `work` updates on the same cell.
struct Probe {
    cell: Option<GridCoord>,
    work: usize,
    done: usize,
}

#[derive(Default)]
struct Log {
    updates: Vec<GridCoord>,
    seen: Vec<(GridCoord, Vec<(Direction, Option<GridCoord>)>)>,
}

impl GridItem for Probe {
    type Context<'c> = Log;

    fn set(&mut self, cell: GridCoord, _distance: f32) {
        if self.cell != Some(cell) {
            self.cell = Some(cell);
            self.done = 0;
        }
    }

    fn update<'c>(&mut self, neighbors: &Neighbors<'_, Self>, log: &mut Log, _deadline: Instant) {
        let Some(cell) = self.cell else { return };
        self.done += 1;
        log.updates.push(cell);
        let seen = Direction::ALL
            .into_iter()
            .map(|d| (d, neighbors.get(d).and_then(|n| n.cell)))
            .collect();
        log.seen.push((cell, seen));
    }

    fn ready(&self) -> bool {
        self.done >= self.work
    }
}

fn grid(size: usize, work: usize) -> GridScheduler<Probe> {
    GridScheduler::from_fn(size, 10.0, || Probe {
        cell: None,
        work,
        done: 0,
    })
}

fn far() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[test]
fn first_update_only_latches_the_viewer() {
    let mut g = grid(5, 1);
    let mut log = Log::default();
    assert_eq!(g.update(Vec3::new(15.0, 0.0, -5.0), &mut log, far()), None);
    assert_eq!(g.viewer_cell(), Some(GridCoord::new(1, -1)));
    assert_eq!(g.cursor(), 0);
    assert!(log.updates.is_empty());
}

#[test]
fn sweep_visits_circle_nearest_first_then_wraps() {
    let mut g = grid(5, 1);
    let mut log = Log::default();
    let viewer = Vec3::new(5.0, 0.0, 5.0);
    g.update(viewer, &mut log, far());
    for _ in 0..13 {
        g.update(viewer, &mut log, far());
    }
    assert_eq!(g.cursor(), 0);
    assert_eq!(g.sweeps(), 1);
    assert_eq!(log.updates.len(), 13);
    assert_eq!(log.updates[0], GridCoord::new(0, 0));
    for cell in &log.updates {
        assert!(cell.distance(GridCoord::new(0, 0)) <= 2.0);
    }
    // Next call restarts at the center.
    g.update(viewer, &mut log, far());
    assert_eq!(log.updates[13], GridCoord::new(0, 0));
}

#[test]
fn cursor_waits_for_ready() {
    let mut g = grid(3, 3);
    let mut log = Log::default();
    let viewer = Vec3::new(1.0, 0.0, 1.0);
    g.update(viewer, &mut log, far());
    for _ in 0..3 {
        g.update(viewer, &mut log, far());
    }
    assert_eq!(log.updates, vec![GridCoord::new(0, 0); 3]);
    assert_eq!(g.cursor(), 1);
}

#[test]
fn moving_viewer_resets_cursor() {
    let mut g = grid(5, 1);
    let mut log = Log::default();
    g.update(Vec3::new(1.0, 0.0, 1.0), &mut log, far());
    for _ in 0..4 {
        g.update(Vec3::new(1.0, 0.0, 1.0), &mut log, far());
    }
    assert_eq!(g.cursor(), 4);
    assert_eq!(g.update(Vec3::new(11.0, 0.0, 1.0), &mut log, far()), None);
    assert_eq!(g.cursor(), 0);
    assert_eq!(
        g.update(Vec3::new(11.0, 0.0, 1.0), &mut log, far()),
        Some(GridCoord::new(1, 0))
    );
}

#[test]
fn updates_see_cardinal_neighbors() {
    let mut g = grid(5, 1);
    let mut log = Log::default();
    let viewer = Vec3::new(1.0, 0.0, 1.0);
    g.update(viewer, &mut log, far());
    for _ in 0..14 {
        g.update(viewer, &mut log, far());
    }
    let (cell, seen) = log.seen.last().cloned().unwrap();
    assert_eq!(cell, GridCoord::new(0, 0));
    assert_eq!(
        seen,
        vec![
            (Direction::West, Some(GridCoord::new(-1, 0))),
            (Direction::East, Some(GridCoord::new(1, 0))),
            (Direction::North, Some(GridCoord::new(0, -1))),
            (Direction::South, Some(GridCoord::new(0, 1))),
        ]
    );
}

#[test]
fn every_slot_holds_at_most_one_swept_cell() {
    let mut g = grid(5, 1);
    let mut log = Log::default();
    let viewer = Vec3::new(-31.0, 0.0, 44.0);
    g.update(viewer, &mut log, far());
    for _ in 0..13 {
        g.update(viewer, &mut log, far());
    }
    let mut slots: Vec<usize> = log.updates.iter().map(|c| c.slot_index(5)).collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 13);
    let center = g.viewer_cell().unwrap();
    for item in g.items() {
        if let Some(cell) = item.cell {
            assert_eq!(g.item_at(cell).and_then(|i| i.cell), Some(cell));
            assert!(cell.distance(center) <= 2.0);
        }
    }
}

proptest! {
    #[test]
    fn ring_distance_never_decreases(half in 0usize..8) {
        let ring = RingSchedule::new(2 * half + 1);
        prop_assert_eq!(ring.len(), (2 * half + 1) * (2 * half + 1));
        for pair in ring.entries().windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
    }
}
