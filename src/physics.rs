/*
 * Physics Module
 *
 * This module holds the per-boid math of a tick:
 * - the flocking force model (separation, alignment, cohesion) evaluated
 *   against a neighbor source, either the spatial grid or a brute-force scan
 * - the integration step: speed clamping, position advance and boundary
 *   resolution
 *
 * Every function here reads only the tick-start snapshot and returns a new
 * value, so boids can be evaluated in any order or in parallel.
 *
 * Optimized for performance by:
 * - Accumulating all three rules in a single pass over the neighbors
 * - Using squared distances, taking a square root only for separation
 */

use glam::Vec2;

use crate::boid::{Boid, WorldBounds};
use crate::influence::ExternalInfluence;
use crate::params::{BoundaryPolicy, SimulationParams};
use crate::spatial_grid::SpatialGrid;

/// Where candidate neighbors come from.
#[derive(Clone, Copy)]
pub enum NeighborSearch<'a> {
    /// 3x3 cell block around the boid.
    Grid(&'a SpatialGrid),
    /// Every boid in the store (O(n²), reference behaviour).
    BruteForce,
}

impl NeighborSearch<'_> {
    #[inline]
    pub fn for_each_candidate(
        &self,
        position: Vec2,
        boid_count: usize,
        mut visitor: impl FnMut(usize),
    ) {
        match self {
            NeighborSearch::Grid(grid) => grid.for_each_neighbor(position, visitor),
            NeighborSearch::BruteForce => (0..boid_count).for_each(&mut visitor),
        }
    }
}

// Running sums for the three rules
#[derive(Clone, Copy, Debug, Default)]
struct NeighborSums {
    separation: Vec2,
    alignment: Vec2,
    cohesion: Vec2,
    count: usize,
}

/// Velocity change produced by flocking for one boid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlockingDelta {
    pub delta: Vec2,
    pub neighbors: usize,
}

// Flocking velocity delta for boid `index` against the tick-start snapshot
pub fn velocity_delta(
    index: usize,
    boids: &[Boid],
    search: NeighborSearch<'_>,
    params: &SimulationParams,
) -> FlockingDelta {
    let me = boids[index];
    let radius_sq = params.neighbor_radius * params.neighbor_radius;
    let separation_sq = params.separation_distance * params.separation_distance;

    let mut sums = NeighborSums::default();
    search.for_each_candidate(me.position, boids.len(), |other_idx| {
        if other_idx == index {
            return;
        }
        let other = &boids[other_idx];
        let offset = me.position - other.position;
        let d_squared = offset.length_squared();
        if d_squared.is_nan() || d_squared > radius_sq {
            return;
        }

        // Unit vector away from the neighbor; undefined when coincident
        if d_squared < separation_sq && d_squared > 0.0 {
            sums.separation += offset / d_squared.sqrt();
        }
        sums.alignment += other.velocity;
        sums.cohesion += other.position;
        sums.count += 1;
    });

    if sums.count == 0 {
        return FlockingDelta::default();
    }

    let n = sums.count as f32;
    let separation = sums.separation;
    let alignment = sums.alignment / n - me.velocity;
    let cohesion = sums.cohesion / n - me.position;

    FlockingDelta {
        delta: separation * params.separation_weight
            + alignment * params.alignment_weight
            + cohesion * params.cohesion_weight,
        neighbors: sums.count,
    }
}

// Rescale `velocity` so its magnitude lies in [min_speed, max_speed].
// A zero (or non-finite) velocity keeps the direction of `previous`, or +X
// when that is zero too.
pub fn clamp_speed(velocity: Vec2, previous: Vec2, min_speed: f32, max_speed: f32) -> Vec2 {
    let candidate = if velocity.is_finite() { velocity } else { previous };

    // Normalise by the largest component first so tiny or huge vectors keep their direction
    let scale = candidate.abs().max_element();
    let (direction, speed) = if scale > 0.0 && scale.is_finite() {
        let unit = candidate / scale;
        let length = unit.length();
        (unit / length, scale * length)
    } else {
        (previous.try_normalize().unwrap_or(Vec2::X), 0.0)
    };

    direction * speed.clamp(min_speed, max_speed)
}

// Bring a boid that left the world back inside it
pub fn resolve_boundary(boid: &mut Boid, bounds: &WorldBounds, policy: BoundaryPolicy) {
    match policy {
        BoundaryPolicy::Wrap => {
            boid.position.x = wrap_axis(boid.position.x, bounds.size_x);
            boid.position.y = wrap_axis(boid.position.y, bounds.size_y);
        }
        BoundaryPolicy::Reflect => {
            (boid.position.x, boid.velocity.x) =
                reflect_axis(boid.position.x, boid.velocity.x, bounds.size_x);
            (boid.position.y, boid.velocity.y) =
                reflect_axis(boid.position.y, boid.velocity.y, bounds.size_y);
        }
    }
}

#[inline]
fn wrap_axis(value: f32, half: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    if (-half..=half).contains(&value) {
        return value;
    }
    (value + half).rem_euclid(2.0 * half) - half
}

#[inline]
fn reflect_axis(value: f32, velocity: f32, half: f32) -> (f32, f32) {
    if !value.is_finite() {
        return (0.0, velocity);
    }
    // A single mirror; clamp covers steps longer than the world
    if value > half {
        ((2.0 * half - value).clamp(-half, half), -velocity.abs())
    } else if value < -half {
        ((-2.0 * half - value).clamp(-half, half), velocity.abs())
    } else {
        (value, velocity)
    }
}

// Apply a velocity delta, clamp the speed, advance and resolve the boundary
pub fn integrate(
    boid: &Boid,
    delta: Vec2,
    params: &SimulationParams,
    bounds: &WorldBounds,
    policy: BoundaryPolicy,
    delta_time: f32,
) -> Boid {
    let velocity = clamp_speed(
        boid.velocity + delta,
        boid.velocity,
        params.min_speed,
        params.max_speed,
    );
    let mut next = Boid::new(boid.position + velocity * delta_time, velocity);
    resolve_boundary(&mut next, bounds, policy);
    next
}

/// Everything phase 3 of a tick reads, frozen for the whole phase.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub boids: &'a [Boid],
    pub search: NeighborSearch<'a>,
    pub params: &'a SimulationParams,
    pub influence: &'a ExternalInfluence,
    pub bounds: &'a WorldBounds,
    pub boundary: BoundaryPolicy,
    pub delta_time: f32,
}

impl StepContext<'_> {
    // New state for one boid, plus the number of neighbors it saw
    #[inline]
    pub fn step(&self, index: usize) -> (Boid, usize) {
        let boid = &self.boids[index];
        let flocking = velocity_delta(index, self.boids, self.search, self.params);
        let delta =
            flocking.delta + self.influence.velocity_contribution(boid.position, self.delta_time);
        let next = integrate(boid, delta, self.params, self.bounds, self.boundary, self.delta_time);
        (next, flocking.neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GridConfig;

    fn separation_only() -> SimulationParams {
        SimulationParams {
            separation_distance: 0.1,
            separation_weight: 1.0,
            alignment_weight: 0.0,
            cohesion_weight: 0.0,
            ..Default::default()
        }
    }

    fn grid_for(boids: &[Boid], bounds: &WorldBounds) -> SpatialGrid {
        let mut grid = SpatialGrid::new(&GridConfig::default(), bounds).unwrap();
        grid.clear();
        for (i, boid) in boids.iter().enumerate() {
            grid.insert(i, boid.position);
        }
        grid
    }

    #[test]
    fn close_pair_separates_along_x() {
        let boids = vec![
            Boid::new(Vec2::new(0.0, 0.0), Vec2::ZERO),
            Boid::new(Vec2::new(0.01, 0.0), Vec2::ZERO),
        ];
        let grid = grid_for(&boids, &WorldBounds::default());
        let params = separation_only();

        let a = velocity_delta(0, &boids, NeighborSearch::Grid(&grid), &params);
        let b = velocity_delta(1, &boids, NeighborSearch::Grid(&grid), &params);

        assert_eq!(a.neighbors, 1);
        assert!(a.delta.x < 0.0 && a.delta.y.abs() < 1e-6, "{:?}", a.delta);
        assert!(b.delta.x > 0.0 && b.delta.y.abs() < 1e-6, "{:?}", b.delta);
        assert!((a.delta.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn coincident_boids_skip_separation() {
        let boids = vec![Boid::new(Vec2::ONE, Vec2::X), Boid::new(Vec2::ONE, Vec2::Y)];
        let params = separation_only();
        let result = velocity_delta(0, &boids, NeighborSearch::BruteForce, &params);
        assert_eq!(result.neighbors, 1);
        assert_eq!(result.delta, Vec2::ZERO);
    }

    #[test]
    fn lonely_boid_gets_no_force() {
        let boids = vec![
            Boid::new(Vec2::ZERO, Vec2::X),
            Boid::new(Vec2::new(5.0, 5.0), Vec2::Y),
        ];
        let params = SimulationParams::default();
        let result = velocity_delta(0, &boids, NeighborSearch::BruteForce, &params);
        assert_eq!(result, FlockingDelta::default());
    }

    #[test]
    fn nan_position_is_never_a_neighbor() {
        let boids = vec![
            Boid::new(Vec2::ZERO, Vec2::X),
            Boid::new(Vec2::new(f32::NAN, 0.0), Vec2::Y),
            Boid::new(Vec2::new(0.5, 0.0), Vec2::X),
        ];
        let params = SimulationParams::default();
        let result = velocity_delta(0, &boids, NeighborSearch::BruteForce, &params);
        assert_eq!(result.neighbors, 1);
        assert!(result.delta.is_finite());

        let poisoned = velocity_delta(1, &boids, NeighborSearch::BruteForce, &params);
        assert_eq!(poisoned, FlockingDelta::default());
    }

    #[test]
    fn alignment_and_cohesion_average_neighbors() {
        let boids = vec![
            Boid::new(Vec2::ZERO, Vec2::ZERO),
            Boid::new(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0)),
            Boid::new(Vec2::new(0.0, 1.0), Vec2::new(0.0, 1.0)),
        ];
        let alignment = SimulationParams {
            separation_weight: 0.0,
            alignment_weight: 1.0,
            cohesion_weight: 0.0,
            ..Default::default()
        };
        let cohesion = SimulationParams {
            separation_weight: 0.0,
            alignment_weight: 0.0,
            cohesion_weight: 1.0,
            ..Default::default()
        };

        let a = velocity_delta(0, &boids, NeighborSearch::BruteForce, &alignment);
        assert!((a.delta - Vec2::new(0.5, 0.5)).length() < 1e-6);
        let c = velocity_delta(0, &boids, NeighborSearch::BruteForce, &cohesion);
        assert!((c.delta - Vec2::new(0.5, 0.5)).length() < 1e-6);
        assert_eq!(c.neighbors, 2);
    }

    #[test]
    fn neighbor_at_exact_radius_counts() {
        let params = SimulationParams::default();
        let boids = vec![
            Boid::new(Vec2::ZERO, Vec2::X),
            Boid::new(Vec2::new(params.neighbor_radius, 0.0), Vec2::X),
        ];
        let result = velocity_delta(0, &boids, NeighborSearch::BruteForce, &params);
        assert_eq!(result.neighbors, 1);
    }

    #[test]
    fn clamp_speed_rescales_into_range() {
        let slow = clamp_speed(Vec2::new(0.1, 0.0), Vec2::X, 0.5, 1.0);
        assert!((slow - Vec2::new(0.5, 0.0)).length() < 1e-6);

        let fast = clamp_speed(Vec2::new(0.0, -3.0), Vec2::X, 0.5, 1.0);
        assert!((fast - Vec2::new(0.0, -1.0)).length() < 1e-6);

        let fine = clamp_speed(Vec2::new(0.6, 0.0), Vec2::X, 0.5, 1.0);
        assert!((fine - Vec2::new(0.6, 0.0)).length() < 1e-6);
    }

    #[test]
    fn clamp_speed_zero_keeps_previous_direction() {
        let v = clamp_speed(Vec2::ZERO, Vec2::new(0.0, 2.0), 0.5, 1.0);
        assert!((v - Vec2::new(0.0, 0.5)).length() < 1e-6);

        let v = clamp_speed(Vec2::ZERO, Vec2::ZERO, 0.5, 1.0);
        assert!(v.is_finite());
        assert!((v.length() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn clamp_speed_handles_extreme_vectors() {
        let huge = clamp_speed(Vec2::new(f32::MAX, f32::MAX), Vec2::X, 0.5, 1.0);
        assert!(huge.is_finite() && (huge.length() - 1.0).abs() < 1e-5);

        let nan = clamp_speed(Vec2::new(f32::NAN, 0.0), Vec2::new(0.0, 0.7), 0.5, 1.0);
        assert!((nan - Vec2::new(0.0, 0.7)).length() < 1e-6);

        let tiny = clamp_speed(Vec2::new(1e-30, 0.0), Vec2::Y, 0.5, 1.0);
        assert!((tiny - Vec2::new(0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn wrap_moves_to_opposite_edge() {
        let bounds = WorldBounds::new(16.0, 9.0);
        let mut boid = Boid::new(Vec2::new(16.5, -9.25), Vec2::X);
        resolve_boundary(&mut boid, &bounds, BoundaryPolicy::Wrap);
        assert!((boid.position - Vec2::new(-15.5, 8.75)).length() < 1e-5);
        assert_eq!(boid.velocity, Vec2::X);

        let mut inside = Boid::new(Vec2::new(3.0, 4.0), Vec2::X);
        resolve_boundary(&mut inside, &bounds, BoundaryPolicy::Wrap);
        assert_eq!(inside.position, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn reflect_mirrors_position_and_velocity() {
        let bounds = WorldBounds::new(16.0, 9.0);
        let mut boid = Boid::new(Vec2::new(16.5, -9.25), Vec2::new(1.0, -1.0));
        resolve_boundary(&mut boid, &bounds, BoundaryPolicy::Reflect);
        assert!((boid.position - Vec2::new(15.5, -8.75)).length() < 1e-5);
        assert_eq!(boid.velocity, Vec2::new(-1.0, 1.0));

        let mut far = Boid::new(Vec2::new(100.0, 0.0), Vec2::X);
        resolve_boundary(&mut far, &bounds, BoundaryPolicy::Reflect);
        assert!(bounds.contains(far.position));
    }

    #[test]
    fn integrate_advances_by_velocity_times_dt() {
        let params = SimulationParams::default();
        let boid = Boid::new(Vec2::new(1.0, 1.0), Vec2::new(0.6, 0.0));
        let bounds = WorldBounds::default();
        let next = integrate(&boid, Vec2::ZERO, &params, &bounds, BoundaryPolicy::Wrap, 0.5);
        assert!((next.velocity - Vec2::new(0.6, 0.0)).length() < 1e-6);
        assert!((next.position - Vec2::new(1.3, 1.0)).length() < 1e-6);
    }
}
