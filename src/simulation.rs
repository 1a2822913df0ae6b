/*
 * Simulation Module
 *
 * This module defines the Simulation struct that owns the boid store, the
 * spatial grid and the current configuration, and runs one tick as three
 * ordered phases:
 *
 * 1. clear every grid cell
 * 2. insert every boid at its tick-start position
 * 3. evaluate flocking + external influence and integrate, writing into the
 *    store's secondary buffer, then swap
 *
 * Each phase is a complete rayon parallel-for (or a plain loop), so a phase
 * never starts before the previous one has finished.
 *
 * Hosts either call `tick` with their own delta time or feed wall-clock
 * frame time to `advance`, which runs fixed-size ticks from an accumulator.
 */

use glam::Vec2;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::Duration;

use crate::boid::{validate_count, Boid, BoidStore};
use crate::debug::TickStats;
use crate::error::ConfigError;
use crate::influence::ExternalInfluence;
use crate::params::{ParamChanges, SimulationConfig, SimulationParams};
use crate::physics::{NeighborSearch, StepContext};
use crate::spatial_grid::SpatialGrid;

/// Upper bound on ticks run by a single `advance` call.
pub const MAX_STEPS_PER_FRAME: usize = 8;

pub struct Simulation {
    store: BoidStore,
    grid: SpatialGrid,
    config: SimulationConfig,
    influence: ExternalInfluence,
    rng: StdRng,
    stats: TickStats,
    // Fixed timestep physics variables
    physics_accumulator: Duration,
    physics_step_size: Duration,
    paused: bool,
}

impl Simulation {
    // Validate the configuration and seed `config.count` boids at random
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let store = BoidStore::initialize(config.count, &config.world, &mut rng)?;
        Self::assemble(config, store, rng)
    }

    // Start from caller-placed boids; `config.count` is replaced by their number
    pub fn with_boids(
        mut config: SimulationConfig,
        boids: Vec<Boid>,
    ) -> Result<Self, ConfigError> {
        config.count = boids.len();
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::assemble(config, BoidStore::from_boids(boids), rng)
    }

    fn assemble(
        config: SimulationConfig,
        store: BoidStore,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        let physics_step_size = config.fixed_step()?;
        let grid = SpatialGrid::new(&config.grid, &config.world)?;
        info!(
            "boid simulation: {} boids, world {}x{}, grid {}x{} cells of {} (capacity {})",
            store.len(),
            config.world.size_x * 2.0,
            config.world.size_y * 2.0,
            grid.cells_x,
            grid.cells_y,
            grid.cell_size,
            grid.max_boids_per_cell
        );

        Ok(Self {
            store,
            grid,
            config,
            influence: ExternalInfluence::inactive(),
            rng,
            stats: TickStats::default(),
            physics_accumulator: Duration::ZERO,
            physics_step_size,
            paused: false,
        })
    }

    // Run one tick of `delta_time` seconds.
    // Negative or non-finite delta times are treated as zero.
    pub fn tick(&mut self, delta_time: f32) {
        let delta_time = if delta_time.is_finite() && delta_time > 0.0 {
            delta_time
        } else {
            0.0
        };

        let parallel = self.config.enable_parallel;
        let use_grid = self.config.enable_spatial_grid;
        let count = self.store.len();

        if use_grid {
            // Phase 1: clear
            if parallel {
                self.grid.par_clear();
            } else {
                self.grid.clear();
            }

            // Phase 2: assign boids to cells
            let boids = self.store.as_slice();
            let grid = &self.grid;
            if parallel {
                boids.par_iter().enumerate().for_each(|(i, boid)| {
                    grid.insert(i, boid.position);
                });
            } else {
                for (i, boid) in boids.iter().enumerate() {
                    grid.insert(i, boid.position);
                }
            }
        }

        // Phase 3: forces and integration into the secondary buffer
        let search = if use_grid {
            NeighborSearch::Grid(&self.grid)
        } else {
            NeighborSearch::BruteForce
        };
        let (current, next) = self.store.split();
        let ctx = StepContext {
            boids: current,
            search,
            params: &self.config.params,
            influence: &self.influence,
            bounds: &self.config.world,
            boundary: self.config.boundary,
            delta_time,
        };

        let (neighbor_interactions, chunk_size) = if parallel {
            // Chunks instead of per-boid tasks to cut scheduling overhead
            let chunk_size = std::cmp::max(count / rayon::current_num_threads(), 1);
            let seen = next
                .par_chunks_mut(chunk_size)
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    let mut seen = 0;
                    for (i_in_chunk, out) in chunk.iter_mut().enumerate() {
                        let (boid, neighbors) = ctx.step(chunk_idx * chunk_size + i_in_chunk);
                        *out = boid;
                        seen += neighbors;
                    }
                    seen
                })
                .sum::<usize>();
            (seen, chunk_size)
        } else {
            let mut seen = 0;
            for (i, out) in next.iter_mut().enumerate() {
                let (boid, neighbors) = ctx.step(i);
                *out = boid;
                seen += neighbors;
            }
            (seen, 0)
        };

        self.store.swap();

        let (dropped, max_cell_occupancy) = if use_grid {
            (self.grid.dropped(), self.grid.max_occupancy())
        } else {
            (0, 0)
        };
        if dropped > 0 {
            warn!(
                "{} of {} boids dropped from full grid cells (capacity {}); \
                 they are invisible to neighbors this tick",
                dropped,
                count,
                self.grid.max_boids_per_cell
            );
        }

        self.stats = TickStats {
            physics_updates_per_frame: self.stats.physics_updates_per_frame,
            dropped,
            max_cell_occupancy,
            neighbor_interactions,
            chunk_size,
        };
        trace!(
            "tick dt={} neighbors={} dropped={}",
            delta_time,
            neighbor_interactions,
            dropped
        );
    }

    // Feed elapsed wall-clock time; runs as many fixed ticks as fit.
    // Returns the number of ticks run.
    pub fn advance(&mut self, frame_time: Duration) -> usize {
        if self.paused {
            self.stats.physics_updates_per_frame = 0;
            return 0;
        }

        self.physics_accumulator += frame_time;

        let step = self.config.fixed_timestep;
        let mut steps = 0;
        while self.physics_accumulator >= self.physics_step_size && steps < MAX_STEPS_PER_FRAME {
            self.tick(step);
            self.physics_accumulator -= self.physics_step_size;
            steps += 1;
        }

        // Falling too far behind: drop the backlog instead of spiralling
        if self.physics_accumulator >= self.physics_step_size {
            debug!(
                "dropping {:?} of simulation backlog after {} steps",
                self.physics_accumulator, steps
            );
            self.physics_accumulator = Duration::ZERO;
        }

        self.stats.physics_updates_per_frame = steps;
        steps
    }

    // Replace the tunables between ticks
    pub fn set_params(&mut self, params: SimulationParams) -> Result<ParamChanges, ConfigError> {
        params.validate()?;
        let changes = params.diff(&self.config.params);
        if changes.radius_changed && self.config.enable_spatial_grid {
            self.config.grid.check_radius(params.neighbor_radius);
        }
        if changes.any_changed {
            debug!("simulation params updated: {:?}", params);
        }
        self.config.params = params;
        Ok(changes)
    }

    #[inline]
    pub fn params(&self) -> &SimulationParams {
        &self.config.params
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_influence(&mut self, influence: ExternalInfluence) {
        self.influence = influence;
    }

    // Set the influence from trigger state, using the current strength and distance
    pub fn set_trigger(&mut self, attract_down: bool, repel_down: bool, position: Vec2) {
        let params = &self.config.params;
        self.influence =
            ExternalInfluence::from_trigger(attract_down, repel_down, position, params);
    }

    #[inline]
    pub fn influence(&self) -> &ExternalInfluence {
        &self.influence
    }

    // Re-seed every boid with a random position and velocity
    pub fn reset(&mut self) {
        let count = self.store.len();
        if let Err(err) = self.store.reseed(count, &self.config.world, &mut self.rng) {
            // Count and bounds were validated at construction
            warn!("reset failed: {}", err);
        }
        self.physics_accumulator = Duration::ZERO;
    }

    // Re-seed with a different number of boids
    pub fn reset_with_count(&mut self, count: usize) -> Result<(), ConfigError> {
        validate_count(count)?;
        self.store.reseed(count, &self.config.world, &mut self.rng)?;
        self.config.count = count;
        self.physics_accumulator = Duration::ZERO;
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // Current state, for renderers
    #[inline]
    pub fn boids(&self) -> &[Boid] {
        self.store.as_slice()
    }

    #[inline]
    pub fn store(&self) -> &BoidStore {
        &self.store
    }

    // Direct write access between ticks
    #[inline]
    pub fn store_mut(&mut self) -> &mut BoidStore {
        &mut self.store
    }

    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    #[inline]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}
