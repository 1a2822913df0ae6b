/*
 * Spatial Grid Module
 *
 * This module defines the SpatialGrid struct for efficient neighbor lookups.
 * It divides the world into a uniform grid of fixed-capacity cells, so a
 * neighbor query only visits the 3x3 block of cells around a position
 * instead of every boid.
 *
 * Each cell owns an atomic counter and a pre-sized run of slots:
 * - `clear` zeroes the counters (needs `&mut self`, so it can never overlap
 *   with insertion or queries)
 * - `insert` bumps the counter with `fetch_add` and writes the slot it
 *   claimed; boids past the cell capacity are dropped for this tick
 * - queries read `min(count, capacity)` slots per cell
 *
 * Nothing is allocated per tick.
 */

use glam::Vec2;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::boid::WorldBounds;
use crate::error::ConfigError;
use crate::params::GridConfig;

pub struct SpatialGrid {
    pub cell_size: f32,
    pub cells_x: usize,
    pub cells_y: usize,
    pub max_boids_per_cell: usize,
    half_extents: Vec2,
    // Live count per cell; may exceed capacity when a cell overflowed
    counts: Vec<AtomicUsize>,
    // cells_x * cells_y * max_boids_per_cell boid indices
    slots: Vec<AtomicU32>,
    dropped: AtomicUsize,
}

impl SpatialGrid {
    pub fn new(config: &GridConfig, world: &WorldBounds) -> Result<Self, ConfigError> {
        config.validate()?;
        world.validate()?;

        let (cells_x, cells_y) = config.dimensions(world);
        let capacity = config.max_boids_per_cell;
        let (cell_count, slot_count) = config.slot_count(world)?;
        let too_large = || ConfigError::GridTooLarge {
            cells: cell_count,
            capacity,
        };

        let mut counts = Vec::new();
        counts.try_reserve_exact(cell_count).map_err(|_| too_large())?;
        counts.extend((0..cell_count).map(|_| AtomicUsize::new(0)));
        let mut slots = Vec::new();
        slots.try_reserve_exact(slot_count).map_err(|_| too_large())?;
        slots.extend((0..slot_count).map(|_| AtomicU32::new(0)));

        Ok(Self {
            cell_size: config.cell_size,
            cells_x,
            cells_y,
            max_boids_per_cell: capacity,
            half_extents: world.half_extents(),
            counts,
            slots,
            dropped: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    // Convert world coordinates to grid cell coordinates, clamped to the grid
    #[inline]
    pub fn cell_index_of(&self, position: Vec2) -> (usize, usize) {
        let grid = ((position + self.half_extents) / self.cell_size).floor();
        // `as` saturates, NaN maps to 0
        let cx = (grid.x.max(0.0) as usize).min(self.cells_x - 1);
        let cy = (grid.y.max(0.0) as usize).min(self.cells_y - 1);
        (cx, cy)
    }

    #[inline]
    fn flat_index(&self, cx: usize, cy: usize) -> usize {
        cy * self.cells_x + cx
    }

    // Reset every cell's live count to zero
    pub fn clear(&mut self) {
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
        *self.dropped.get_mut() = 0;
    }

    // Same as `clear`, one unit of work per cell
    pub fn par_clear(&mut self) {
        self.counts
            .par_iter_mut()
            .for_each(|count| *count.get_mut() = 0);
        *self.dropped.get_mut() = 0;
    }

    // Insert a boid into the cell containing `position`.
    // Returns false when the cell was already full and the boid was dropped.
    #[inline]
    pub fn insert(&self, boid_index: usize, position: Vec2) -> bool {
        let (cx, cy) = self.cell_index_of(position);
        let cell = self.flat_index(cx, cy);

        let slot = self.counts[cell].fetch_add(1, Ordering::Relaxed);
        if slot < self.max_boids_per_cell {
            self.slots[cell * self.max_boids_per_cell + slot]
                .store(boid_index as u32, Ordering::Relaxed);
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    // Number of retrievable boids in a cell
    #[inline]
    pub fn cell_len(&self, cx: usize, cy: usize) -> usize {
        self.counts[self.flat_index(cx, cy)]
            .load(Ordering::Relaxed)
            .min(self.max_boids_per_cell)
    }

    // Boids dropped by full cells since the last clear
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn max_occupancy(&self) -> usize {
        self.counts
            .iter()
            .map(|count| count.load(Ordering::Relaxed).min(self.max_boids_per_cell))
            .max()
            .unwrap_or(0)
    }

    // Visit the stored boids of one cell
    #[inline]
    pub fn for_each_in_cell(&self, cx: usize, cy: usize, mut visitor: impl FnMut(usize)) {
        let cell = self.flat_index(cx, cy);
        let len = self.cell_len(cx, cy);
        let start = cell * self.max_boids_per_cell;
        for slot in &self.slots[start..start + len] {
            visitor(slot.load(Ordering::Relaxed) as usize);
        }
    }

    // Visit every boid stored in the 3x3 block of cells around `position`.
    // The block is a superset of the true neighbors (callers filter by
    // distance) and only guarantees coverage for radii up to one cell.
    pub fn for_each_neighbor(&self, position: Vec2, mut visitor: impl FnMut(usize)) {
        let (cx, cy) = self.cell_index_of(position);

        let x_start = cx.saturating_sub(1);
        let x_end = (cx + 1).min(self.cells_x - 1);
        let y_start = cy.saturating_sub(1);
        let y_end = (cy + 1).min(self.cells_y - 1);

        for check_y in y_start..=y_end {
            for check_x in x_start..=x_end {
                self.for_each_in_cell(check_x, check_y, &mut visitor);
            }
        }
    }

    // Collecting form of `for_each_neighbor`
    pub fn neighbors_of(&self, position: Vec2) -> Vec<usize> {
        // Pre-allocate for a typical 3x3 block
        let mut result = Vec::with_capacity(9 * 10);
        self.for_each_neighbor(position, |index| result.push(index));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cell_size: f32, capacity: usize, world: WorldBounds) -> SpatialGrid {
        let config = GridConfig {
            cell_size,
            max_boids_per_cell: capacity,
        };
        SpatialGrid::new(&config, &world).unwrap()
    }

    #[test]
    fn cell_index_floors_and_clamps() {
        let grid = grid(2.0, 4, WorldBounds::new(16.0, 9.0));
        assert_eq!((grid.cells_x, grid.cells_y), (16, 9));
        assert_eq!(grid.cell_count(), 144);

        assert_eq!(grid.cell_index_of(Vec2::new(-16.0, -9.0)), (0, 0));
        assert_eq!(grid.cell_index_of(Vec2::new(0.0, 0.0)), (8, 4));
        assert_eq!(grid.cell_index_of(Vec2::new(-0.1, 0.9)), (7, 4));
        assert_eq!(grid.cell_index_of(Vec2::new(16.0, 9.0)), (15, 8));
        assert_eq!(grid.cell_index_of(Vec2::new(100.0, -100.0)), (15, 0));
        assert_eq!(grid.cell_index_of(Vec2::new(f32::NAN, 0.0)).0, 0);
    }

    #[test]
    fn clear_twice_equals_clear_once() {
        let mut grid = grid(1.0, 4, WorldBounds::new(2.0, 2.0));
        grid.insert(0, Vec2::ZERO);
        grid.insert(1, Vec2::new(1.5, 1.5));

        grid.clear();
        let once: Vec<usize> = (0..grid.cells_y)
            .flat_map(|y| (0..grid.cells_x).map(move |x| (x, y)))
            .map(|(x, y)| grid.cell_len(x, y))
            .collect();
        grid.clear();
        let twice: Vec<usize> = (0..grid.cells_y)
            .flat_map(|y| (0..grid.cells_x).map(move |x| (x, y)))
            .map(|(x, y)| grid.cell_len(x, y))
            .collect();

        assert_eq!(once, twice);
        assert!(once.iter().all(|&n| n == 0));
        assert_eq!(grid.dropped(), 0);
        assert!(grid.neighbors_of(Vec2::ZERO).is_empty());
    }

    #[test]
    fn overflow_keeps_capacity_and_spares_other_cells() {
        let mut grid = grid(1.0, 3, WorldBounds::new(2.0, 2.0));
        grid.clear();
        grid.insert(100, Vec2::new(-1.5, -1.5));

        let inserted: Vec<bool> = (0..4).map(|i| grid.insert(i, Vec2::new(0.5, 0.5))).collect();
        assert_eq!(inserted, vec![true, true, true, false]);

        let (cx, cy) = grid.cell_index_of(Vec2::new(0.5, 0.5));
        assert_eq!(grid.cell_len(cx, cy), 3);
        let mut stored = Vec::new();
        grid.for_each_in_cell(cx, cy, |i| stored.push(i));
        assert_eq!(stored, vec![0, 1, 2]);

        assert_eq!(grid.cell_len(0, 0), 1);
        assert_eq!(grid.dropped(), 1);
        assert_eq!(grid.max_occupancy(), 3);
    }

    #[test]
    fn parallel_inserts_fill_exactly_to_capacity() {
        let mut grid = grid(1.0, 50, WorldBounds::new(1.0, 1.0));
        grid.par_clear();
        (0..200usize).into_par_iter().for_each(|i| {
            grid.insert(i, Vec2::new(0.25, 0.25));
        });

        let (cx, cy) = grid.cell_index_of(Vec2::new(0.25, 0.25));
        let mut stored = Vec::new();
        grid.for_each_in_cell(cx, cy, |i| stored.push(i));
        stored.sort_unstable();
        stored.dedup();

        assert_eq!(stored.len(), 50);
        assert_eq!(grid.dropped(), 150);
    }

    #[test]
    fn neighbors_cover_three_by_three_block() {
        let mut grid = grid(1.0, 4, WorldBounds::new(3.0, 3.0));
        grid.clear();
        // One boid at the centre of every cell of the 6x6 grid
        let mut index = 0;
        for cy in 0..6 {
            for cx in 0..6 {
                let p = Vec2::new(cx as f32 - 2.5, cy as f32 - 2.5);
                assert!(grid.insert(index, p));
                index += 1;
            }
        }

        let mut centre = grid.neighbors_of(Vec2::new(0.5, 0.5));
        centre.sort_unstable();
        // Cell (3, 3) and its eight neighbours
        assert_eq!(centre, vec![14, 15, 16, 20, 21, 22, 26, 27, 28]);

        let mut corner = grid.neighbors_of(Vec2::new(-2.9, -2.9));
        corner.sort_unstable();
        assert_eq!(corner, vec![0, 1, 6, 7]);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let config = GridConfig {
            cell_size: 1e-6,
            max_boids_per_cell: usize::MAX / 2,
        };
        assert!(matches!(
            SpatialGrid::new(&config, &WorldBounds::new(1.0, 1.0)),
            Err(ConfigError::GridTooLarge { .. })
        ));

        // Valid on its own, but 576M cells of 64 slots
        let tiny_cells = GridConfig {
            cell_size: 1e-3,
            max_boids_per_cell: 64,
        };
        assert!(tiny_cells.validate().is_ok());
        assert!(matches!(
            SpatialGrid::new(&tiny_cells, &WorldBounds::default()),
            Err(ConfigError::GridTooLarge { capacity: 64, .. })
        ));
    }
}
