//! Rolling grid of tiles around a moving viewer, serviced one cell at a time
//! in nearest-first order.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use strata_geom::{GridCoord, Vec3};

mod ring;

pub use ring::{RingEntry, RingSchedule};

/// Cardinal neighbor of a cell. North is `-z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    West,
    East,
    North,
    South,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::West,
        Direction::East,
        Direction::North,
        Direction::South,
    ];

    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::North => (0, -1),
            Direction::South => (0, 1),
        }
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Read-only view of the four items around the one being updated.
///
/// An entry is whatever occupies the neighbor's slot; items must check the
/// cell it reports before trusting its contents.
pub struct Neighbors<'a, T> {
    slots: [Option<&'a T>; 4],
}

impl<T> Clone for Neighbors<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Neighbors<'_, T> {}

impl<T> Default for Neighbors<'_, T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<'a, T> Neighbors<'a, T> {
    pub fn none() -> Self {
        Self { slots: [None; 4] }
    }

    pub fn with(mut self, dir: Direction, item: &'a T) -> Self {
        self.slots[dir.index()] = Some(item);
        self
    }

    #[inline]
    pub fn get(&self, dir: Direction) -> Option<&'a T> {
        self.slots[dir.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &'a T)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.get(d).map(|item| (d, item)))
    }
}

/// Something the scheduler can place and advance incrementally.
pub trait GridItem: Sized {
    /// Shared services threaded through every update (oracle, render sink...).
    type Context<'c>;

    /// Assign the cell this item should represent and its distance from the
    /// viewer, in cells. Re-assigning the same cell only refreshes distance.
    fn set(&mut self, cell: GridCoord, distance: f32);

    /// Advance as far as possible before `deadline`.
    fn update<'c>(
        &mut self,
        neighbors: &Neighbors<'_, Self>,
        ctx: &mut Self::Context<'c>,
        deadline: Instant,
    );

    fn ready(&self) -> bool;
}

/// Fixed `size×size` array of items addressed by rolling slot index.
///
/// Each `update` services exactly one cell: the one at the current cursor of
/// the shared [`RingSchedule`]. The cursor only moves past a cell once its item
/// reports ready, and wraps to the center after the last entry within the
/// sweep radius, so cells near the viewer are always serviced first.
pub struct GridScheduler<T: GridItem> {
    slots: Vec<Option<T>>,
    size: usize,
    tile_span: f32,
    ring: Arc<RingSchedule>,
    cursor: usize,
    viewer_cell: Option<GridCoord>,
    sweeps: u64,
}

impl<T: GridItem> GridScheduler<T> {
    /// `items.len()` must be `size * size` and `size` odd.
    pub fn new(items: Vec<T>, size: usize, tile_span: f32) -> Self {
        assert!(size % 2 == 1, "grid size must be odd, got {size}");
        assert_eq!(items.len(), size * size, "grid needs size² items");
        Self {
            slots: items.into_iter().map(Some).collect(),
            size,
            tile_span,
            ring: RingSchedule::shared(size),
            cursor: 0,
            viewer_cell: None,
            sweeps: 0,
        }
    }

    /// Build every item with `make`.
    pub fn from_fn(size: usize, tile_span: f32, mut make: impl FnMut() -> T) -> Self {
        let items = (0..size * size).map(|_| make()).collect();
        Self::new(items, size, tile_span)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn tile_span(&self) -> f32 {
        self.tile_span
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn viewer_cell(&self) -> Option<GridCoord> {
        self.viewer_cell
    }

    /// Completed passes over the sweep circle.
    #[inline]
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn ring(&self) -> &RingSchedule {
        &self.ring
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().flatten()
    }

    /// Item occupying the slot `cell` maps to; it may represent another cell.
    pub fn item_at(&self, cell: GridCoord) -> Option<&T> {
        self.slots
            .get(cell.slot_index(self.size))
            .and_then(|s| s.as_ref())
    }

    /// Service one cell. Returns the cell updated, if any.
    ///
    /// A viewer that changed cells (or the first call) only resets the sweep.
    pub fn update<'c>(
        &mut self,
        viewer: Vec3,
        ctx: &mut T::Context<'c>,
        deadline: Instant,
    ) -> Option<GridCoord> {
        let cell = GridCoord::containing(viewer.x, viewer.z, self.tile_span);
        if self.viewer_cell != Some(cell) {
            log::trace!(target: "terrain", "viewer entered cell ({}, {})", cell.x, cell.z);
            self.viewer_cell = Some(cell);
            self.cursor = 0;
            return None;
        }

        let Some(entry) = self.ring.get(self.cursor).copied() else {
            self.cursor = 0;
            return None;
        };
        let target = cell.offset(entry.offset.x, entry.offset.z);
        debug_assert_eq!(
            GridCoord::unwrap_near(target.slot(self.size), cell, self.size),
            target
        );
        let idx = target.slot_index(self.size);
        let mut item = self.slots[idx].take()?;

        item.set(target, entry.distance);
        let neighbors = self.neighbors_of(target);
        item.update(&neighbors, ctx, deadline);
        let ready = item.ready();
        self.slots[idx] = Some(item);

        if ready {
            self.advance();
        }
        Some(target)
    }

    fn neighbors_of(&self, cell: GridCoord) -> Neighbors<'_, T> {
        let mut out = Neighbors::none();
        for dir in Direction::ALL {
            let (dx, dz) = dir.offset();
            if let Some(Some(item)) = self.slots.get(cell.offset(dx, dz).slot_index(self.size)) {
                out = out.with(dir, item);
            }
        }
        out
    }

    fn advance(&mut self) {
        self.cursor += 1;
        let past_radius = self
            .ring
            .get(self.cursor)
            .is_none_or(|e| e.distance > self.ring.radius());
        if past_radius {
            self.cursor = 0;
            self.sweeps += 1;
        }
    }
}
