/*
 * Simulation Parameters Module
 *
 * This module defines the SimulationParams struct that contains all the
 * tunables read by a tick (radius, speeds, weights, influence settings), and
 * the startup-only configuration: agent count, world bounds, grid layout,
 * boundary policy and execution switches.
 *
 * Tunables may be replaced between ticks; they are never read mid-tick from
 * shared state, each tick receives them by reference.
 */

use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::boid::{validate_count, WorldBounds};
use crate::error::ConfigError;

// Parameters for the flocking rules; may change between ticks
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub neighbor_radius: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub separation_distance: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    // External influence settings
    pub influence_strength: f32,
    pub influence_distance: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            neighbor_radius: 2.0,
            min_speed: 0.5,
            max_speed: 1.0,
            separation_distance: 0.1,
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            influence_strength: 50.0,
            influence_distance: 5.0,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_speed.is_finite() && self.max_speed.is_finite())
            || self.min_speed < 0.0
            || self.min_speed > self.max_speed
        {
            return Err(ConfigError::InvalidSpeedRange {
                min: self.min_speed,
                max: self.max_speed,
            });
        }

        non_negative("neighbor_radius", self.neighbor_radius)?;
        non_negative("separation_distance", self.separation_distance)?;
        non_negative("influence_distance", self.influence_distance)?;

        // Weights may be negative (e.g. anti-cohesion) but must be finite
        finite("separation_weight", self.separation_weight)?;
        finite("alignment_weight", self.alignment_weight)?;
        finite("cohesion_weight", self.cohesion_weight)?;
        finite("influence_strength", self.influence_strength)?;

        Ok(())
    }

    // Detect which parts of the parameter set changed since `previous`
    pub fn diff(&self, previous: &SimulationParams) -> ParamChanges {
        ParamChanges {
            radius_changed: self.neighbor_radius != previous.neighbor_radius,
            any_changed: self != previous,
        }
    }
}

/// Result of comparing two parameter sets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParamChanges {
    pub radius_changed: bool,
    pub any_changed: bool,
}

fn finite(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

/// Upper bound on `cells * max_boids_per_cell` (256 MiB of slot indices).
pub const MAX_GRID_SLOTS: usize = 1 << 26;

// Uniform grid layout
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_size: f32,
    pub max_boids_per_cell: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            // Matches the default neighbor radius so the 3x3 block covers it
            cell_size: 2.0,
            max_boids_per_cell: 64,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        if self.max_boids_per_cell == 0 {
            return Err(ConfigError::InvalidCellCapacity);
        }
        Ok(())
    }

    // Number of cells along each axis needed to cover the world
    pub fn dimensions(&self, world: &WorldBounds) -> (usize, usize) {
        let extents = world.extents();
        let cells_x = (extents.x / self.cell_size).ceil().max(1.0) as usize;
        let cells_y = (extents.y / self.cell_size).ceil().max(1.0) as usize;
        (cells_x, cells_y)
    }

    // Total (cells, slots) for `world`, rejecting grids past MAX_GRID_SLOTS
    pub fn slot_count(&self, world: &WorldBounds) -> Result<(usize, usize), ConfigError> {
        let (cells_x, cells_y) = self.dimensions(world);
        let capacity = self.max_boids_per_cell;
        let too_large = |cells| ConfigError::GridTooLarge { cells, capacity };

        let cells = cells_x.checked_mul(cells_y).ok_or(too_large(usize::MAX))?;
        let slots = cells
            .checked_mul(capacity)
            .filter(|&n| n <= MAX_GRID_SLOTS)
            .ok_or(too_large(cells))?;
        Ok((cells, slots))
    }

    // Whether a 3x3 block of cells is guaranteed to contain every neighbor within `radius`
    #[inline]
    pub fn covers_radius(&self, radius: f32) -> bool {
        radius <= self.cell_size
    }

    // Log when the neighbor search will silently miss boids
    pub fn check_radius(&self, radius: f32) -> bool {
        let covered = self.covers_radius(radius);
        if !covered {
            warn!(
                "neighbor radius {} exceeds grid cell size {}; \
                 neighbors beyond the 3x3 cell block will be missed",
                radius,
                self.cell_size
            );
        }
        covered
    }
}

/// What happens to boids that cross the world edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Toroidal world: leaving one edge re-enters at the opposite edge.
    #[default]
    Wrap,
    /// Mirror the position back inside and flip the velocity component.
    Reflect,
}

// Startup configuration for a simulation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub count: usize,
    pub world: WorldBounds,
    pub grid: GridConfig,
    pub boundary: BoundaryPolicy,
    pub seed: Option<u64>,
    // Performance settings
    pub enable_parallel: bool,
    pub enable_spatial_grid: bool,
    pub fixed_timestep: f32,
    pub params: SimulationParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            count: 1024,
            world: WorldBounds::default(),
            grid: GridConfig::default(),
            boundary: BoundaryPolicy::default(),
            seed: None,
            enable_parallel: true,
            enable_spatial_grid: true,
            fixed_timestep: 1.0 / 60.0,
            params: SimulationParams::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_count(self.count)?;
        self.world.validate()?;
        self.grid.validate()?;
        self.params.validate()?;

        self.fixed_step()?;
        self.grid.slot_count(&self.world)?;

        if self.enable_spatial_grid {
            self.grid.check_radius(self.params.neighbor_radius);
        }
        Ok(())
    }

    // `fixed_timestep` as a Duration; must be representable and non-zero
    pub fn fixed_step(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f32(self.fixed_timestep) {
            Ok(step) if !step.is_zero() => Ok(step),
            _ => Err(ConfigError::InvalidTimestep(self.fixed_timestep)),
        }
    }
}
