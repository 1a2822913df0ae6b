/*
 * External Influence Module
 *
 * A single "super boid": a point that attracts or repels boids within a
 * distance threshold while an external trigger is held. It does not flock
 * and is not stored in the grid. The host decides the trigger state and the
 * world-space position each tick; this module only turns that into a
 * velocity contribution.
 */

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::params::SimulationParams;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceSign {
    Attract,
    Repel,
    #[default]
    Inactive,
}

impl InfluenceSign {
    #[inline]
    pub fn value(self) -> f32 {
        match self {
            InfluenceSign::Attract => 1.0,
            InfluenceSign::Repel => -1.0,
            InfluenceSign::Inactive => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalInfluence {
    pub position: Vec2,
    pub sign: InfluenceSign,
    pub strength: f32,
    pub effective_distance: f32,
}

impl ExternalInfluence {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn new(
        position: Vec2,
        sign: InfluenceSign,
        strength: f32,
        effective_distance: f32,
    ) -> Self {
        Self {
            position,
            sign,
            strength,
            effective_distance,
        }
    }

    // Map pointer-style trigger state to an influence; attract wins if both are held
    pub fn from_trigger(
        attract_down: bool,
        repel_down: bool,
        position: Vec2,
        params: &SimulationParams,
    ) -> Self {
        let sign = if attract_down {
            InfluenceSign::Attract
        } else if repel_down {
            InfluenceSign::Repel
        } else {
            InfluenceSign::Inactive
        };
        Self::new(position, sign, params.influence_strength, params.influence_distance)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.sign != InfluenceSign::Inactive
    }

    // Velocity added to a boid at `position` over `delta_time`.
    // Falls off linearly from full strength at the source to zero at
    // `effective_distance`; a boid exactly on the source has no direction
    // and is left alone.
    #[inline]
    pub fn velocity_contribution(&self, position: Vec2, delta_time: f32) -> Vec2 {
        if !self.is_active() || self.effective_distance <= 0.0 {
            return Vec2::ZERO;
        }

        let offset = self.position - position;
        let distance = offset.length();
        if distance >= self.effective_distance || distance <= f32::EPSILON {
            return Vec2::ZERO;
        }

        let falloff = 1.0 - distance / self.effective_distance;
        let toward = offset / distance;
        toward * (self.sign.value() * self.strength * falloff * delta_time)
    }
}
