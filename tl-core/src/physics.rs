//! The ball integration law.
//!
//! One law drives both the live predicted state and every trajectory
//! preview, so a preview and the state it previews never disagree.
//!
//! ## Step
//!
//! ```text
//! 1. v *= damping^(dt * 60)           frame-rate independent damping
//! 2. v.y -= g * dt                     only while above ground height
//! 3. x += v * dt                       semi-implicit Euler
//! 4. ground: clamp y, reflect v.y * e, keep friction share of v.xz
//! 5. walls:  clamp x/z, reflect v.x / v.z * e_wall
//! ```

use crate::profiles::PhysicsConfig;
use crate::types::{constants, tick_at, PredictionState, Vec3};

/// Ball physics with a fixed configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BallPhysics {
    pub config: PhysicsConfig,
}

impl Default for BallPhysics {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl BallPhysics {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn radius(&self) -> f64 {
        self.config.ball_radius
    }

    pub fn gravity(&self) -> f64 {
        self.config.gravity
    }

    /// Whether gravity acts at this height. The ball resting on the ground
    /// does not accelerate, so a ball at rest never drifts.
    pub fn is_airborne(&self, position: &Vec3) -> bool {
        position.y > self.config.ball_radius + constants::EPSILON
    }

    /// Advance a state by `dt` seconds, returning the new state.
    ///
    /// Non-positive or non-finite `dt` returns the state unchanged.
    pub fn step(&self, state: &PredictionState, dt: f64) -> PredictionState {
        if !(dt > 0.0) || !dt.is_finite() {
            return *state;
        }

        let damping = self.config.linear_damping.powf(dt * constants::TICK_RATE);
        let mut velocity = state.velocity * damping;
        if self.is_airborne(&state.position) {
            velocity.y -= self.config.gravity * dt;
        }

        let position = state.position + velocity * dt;
        let (position, velocity) = self.resolve_ground(position, velocity);
        let (position, velocity) = self.resolve_walls(position, velocity);

        let timestamp = state.timestamp + dt * 1000.0;
        PredictionState {
            position,
            velocity,
            angular_velocity: state.angular_velocity,
            timestamp,
            tick: tick_at(timestamp),
        }
    }

    /// Ground contact: clamp to resting height and bounce downward motion.
    pub fn resolve_ground(&self, mut position: Vec3, mut velocity: Vec3) -> (Vec3, Vec3) {
        let radius = self.config.ball_radius;
        if position.y < radius {
            position.y = radius;
            if velocity.y < 0.0 {
                velocity.y = -velocity.y * self.config.ground_restitution;
                if velocity.y < self.config.rest_velocity {
                    velocity.y = 0.0;
                }
                velocity.x *= self.config.ground_friction;
                velocity.z *= self.config.ground_friction;
            }
        }
        (position, velocity)
    }

    /// Axis-aligned arena walls on X and Z.
    pub fn resolve_walls(&self, mut position: Vec3, mut velocity: Vec3) -> (Vec3, Vec3) {
        let radius = self.config.ball_radius;
        let restitution = self.config.wall_restitution;

        let max_x = self.config.arena_half_x - radius;
        if position.x > max_x {
            position.x = max_x;
            if velocity.x > 0.0 {
                velocity.x = -velocity.x * restitution;
            }
        } else if position.x < -max_x {
            position.x = -max_x;
            if velocity.x < 0.0 {
                velocity.x = -velocity.x * restitution;
            }
        }

        let max_z = self.config.arena_half_z - radius;
        if position.z > max_z {
            position.z = max_z;
            if velocity.z > 0.0 {
                velocity.z = -velocity.z * restitution;
            }
        } else if position.z < -max_z {
            position.z = -max_z;
            if velocity.z < 0.0 {
                velocity.z = -velocity.z * restitution;
            }
        }

        (position, velocity)
    }

    /// Whether a ballistic extrapolation from this state should include gravity:
    /// the ball is airborne or leaving the ground.
    pub fn under_gravity(&self, position: &Vec3, velocity: &Vec3) -> bool {
        self.is_airborne(position) || velocity.y > 0.0
    }

    /// Closed-form projectile position after `t` seconds, without damping.
    ///
    /// A ball rolling along the ground does not fall; the result never sinks
    /// below resting height.
    pub fn ballistic_position(&self, position: Vec3, velocity: Vec3, t: f64) -> Vec3 {
        let mut out = position + velocity * t;
        if self.under_gravity(&position, &velocity) {
            out.y -= 0.5 * self.config.gravity * t * t;
        }
        out.y = out.y.max(self.config.ball_radius);
        out
    }

    /// Projectile velocity after `t` seconds, the counterpart of [`Self::ballistic_position`].
    pub fn ballistic_velocity(&self, position: Vec3, velocity: Vec3, t: f64) -> Vec3 {
        let mut out = velocity;
        if self.under_gravity(&position, &velocity) {
            out.y -= self.config.gravity * t;
        }
        out
    }

    /// Lift a position to resting height if it sank below.
    pub fn clamp_to_ground(&self, mut position: Vec3) -> Vec3 {
        position.y = position.y.max(self.config.ball_radius);
        position
    }
}

// =============================================================================
// Tests
// =============================================================================
