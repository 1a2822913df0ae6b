/*
 * Error Module
 *
 * Configuration errors reported when a simulation is created or its
 * parameters are replaced. Nothing in the steady-state tick loop fails;
 * grid overflow and degenerate vectors are handled in place.
 */

use thiserror::Error;

/// Errors raised while validating simulation configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Agent count must be positive and addressable by a 32-bit slot.
    #[error("invalid boid count {0}: must be between 1 and u32::MAX")]
    InvalidCount(usize),
    /// World half extents must be positive and finite.
    #[error("invalid world bounds ({x}, {y}): half extents must be positive and finite")]
    InvalidWorldBounds { x: f32, y: f32 },
    /// Grid cell edge length must be positive and finite.
    #[error("invalid cell size {0}: must be positive and finite")]
    InvalidCellSize(f32),
    /// Every cell needs room for at least one boid.
    #[error("max_boids_per_cell must be at least 1")]
    InvalidCellCapacity,
    /// Speed clamp bounds are reversed or out of range.
    #[error("invalid speed range [{min}, {max}]: need 0 <= min <= max, both finite")]
    InvalidSpeedRange { min: f32, max: f32 },
    /// A tunable that must be finite (and, for distances, non-negative) is not.
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    /// Fixed timestep must be positive and finite.
    #[error("invalid fixed timestep {0}: must be positive and finite")]
    InvalidTimestep(f32),
    /// Cell count or slot storage would not fit in memory.
    #[error("grid of {cells} cells x {capacity} slots is too large")]
    GridTooLarge { cells: usize, capacity: usize },
}
