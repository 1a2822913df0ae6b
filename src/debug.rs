/*
 * Debug Information Module
 *
 * This module defines the TickStats struct: diagnostics gathered while a
 * tick runs, for hosts that want to show them next to the simulation.
 *
 * Includes metrics for:
 * - Ticks run by the last frame
 * - Boids dropped by full grid cells
 * - Fullest cell and total neighbor interactions
 */

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks executed by the last `advance` call.
    pub physics_updates_per_frame: usize,
    /// Boids left out of the grid because their cell was full.
    pub dropped: usize,
    /// Stored boids in the fullest cell.
    pub max_cell_occupancy: usize,
    /// Sum over boids of neighbors found within the radius.
    pub neighbor_interactions: usize,
    /// Boids per rayon work chunk, 0 when running sequentially.
    pub chunk_size: usize,
}

impl TickStats {
    // Average neighbors per boid for the last tick
    pub fn mean_neighbors(&self, boid_count: usize) -> f32 {
        if boid_count == 0 {
            0.0
        } else {
            self.neighbor_interactions as f32 / boid_count as f32
        }
    }
}
