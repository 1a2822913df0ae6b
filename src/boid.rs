/*
 * Boid Module
 *
 * This module defines the Boid record, the world bounds it lives in and the
 * BoidStore that owns every boid for the lifetime of a run.
 *
 * The store keeps two buffers: `current` holds the state at the start of a
 * tick and is only read while forces are evaluated, `next` receives the new
 * state. The buffers are swapped once every boid has been written, so no boid
 * ever observes another boid's half-finished update.
 */

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::error::ConfigError;

/// One simulated agent. Layout is four tightly packed `f32`s
/// (x, y, vx, vy) so the whole store can be bulk-copied to a GPU buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Boid {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Boid {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    // Random boid: uniform position inside the bounds, velocity uniform over the unit disk
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bounds: &WorldBounds) -> Self {
        let x = rng.gen_range(-bounds.size_x..bounds.size_x);
        let y = rng.gen_range(-bounds.size_y..bounds.size_y);

        // sqrt keeps the density uniform over the disk area
        let angle = rng.gen_range(0.0..TAU);
        let radius = rng.gen::<f32>().sqrt();
        let velocity = Vec2::from_angle(angle) * radius;

        Self::new(Vec2::new(x, y), velocity)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Axis-aligned world rectangle centred on the origin. `size_x` and `size_y`
/// are half extents: the world spans `[-size_x, size_x] x [-size_y, size_y]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    pub size_x: f32,
    pub size_y: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            size_x: 16.0,
            size_y: 9.0,
        }
    }
}

impl WorldBounds {
    pub fn new(size_x: f32, size_y: f32) -> Self {
        Self { size_x, size_y }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(self.size_x) && ok(self.size_y) {
            Ok(())
        } else {
            Err(ConfigError::InvalidWorldBounds {
                x: self.size_x,
                y: self.size_y,
            })
        }
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.size_x, self.size_y)
    }

    // Full width and height of the world
    #[inline]
    pub fn extents(&self) -> Vec2 {
        self.half_extents() * 2.0
    }

    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= -self.size_x
            && position.x <= self.size_x
            && position.y >= -self.size_y
            && position.y <= self.size_y
    }
}

/// Flat, index-addressed storage for every boid in the run.
pub struct BoidStore {
    current: Vec<Boid>,
    next: Vec<Boid>,
}

impl BoidStore {
    // Seed `count` boids at random inside the bounds
    pub fn initialize<R: Rng + ?Sized>(
        count: usize,
        bounds: &WorldBounds,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        validate_count(count)?;
        bounds.validate()?;

        let current: Vec<Boid> = (0..count).map(|_| Boid::random(rng, bounds)).collect();
        Ok(Self::from_boids(current))
    }

    // Wrap an existing set of boids; used by hosts that place boids themselves
    pub fn from_boids(boids: Vec<Boid>) -> Self {
        let next = vec![Boid::zeroed(); boids.len()];
        Self {
            current: boids,
            next,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    // Panics if `index` is out of range
    #[inline]
    pub fn get(&self, index: usize) -> Boid {
        self.current[index]
    }

    // Panics if `index` is out of range
    #[inline]
    pub fn set(&mut self, index: usize, boid: Boid) {
        self.current[index] = boid;
    }

    #[inline]
    pub fn as_slice(&self) -> &[Boid] {
        &self.current
    }

    // Packed (x, y, vx, vy) records for bulk upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.current)
    }

    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.current)
    }

    // Read the tick-start state while writing the new one
    pub(crate) fn split(&mut self) -> (&[Boid], &mut [Boid]) {
        (&self.current, &mut self.next)
    }

    // Publish the buffer written by the last tick
    pub(crate) fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    // Re-seed every boid, resizing the store to `count`
    pub(crate) fn reseed<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        bounds: &WorldBounds,
        rng: &mut R,
    ) -> Result<(), ConfigError> {
        *self = Self::initialize(count, bounds, rng)?;
        Ok(())
    }
}

pub(crate) fn validate_count(count: usize) -> Result<(), ConfigError> {
    if count == 0 || count > u32::MAX as usize {
        return Err(ConfigError::InvalidCount(count));
    }
    Ok(())
}
