/*
 * Boid Flocking Simulation - Module Definitions
 *
 * This file defines the module structure for the grid-accelerated boid core.
 * A host application creates a Simulation, calls `tick` (or `advance`) once
 * per frame and reads the packed boid array back for rendering.
 */

// Re-export key components for easier access
pub use boid::{Boid, BoidStore, WorldBounds};
pub use debug::TickStats;
pub use error::ConfigError;
pub use influence::{ExternalInfluence, InfluenceSign};
pub use params::{
    BoundaryPolicy, GridConfig, ParamChanges, SimulationConfig, SimulationParams, MAX_GRID_SLOTS,
};
pub use physics::{FlockingDelta, NeighborSearch};
pub use simulation::{Simulation, MAX_STEPS_PER_FRAME};
pub use spatial_grid::SpatialGrid;

// Define modules
pub mod boid;
pub mod debug;
pub mod error;
pub mod influence;
pub mod params;
pub mod physics;
pub mod simulation;
pub mod spatial_grid;
