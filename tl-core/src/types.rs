//! Core types for the prediction engine.
//!
//! Units follow the game server:
//! - Position: world units
//! - Velocity: units per second
//! - Timestamps: milliseconds on the caller's clock
//! - Durations passed to `update()`: seconds

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Vec3 - 3D Vector
// =============================================================================

/// A 3D vector used for positions, velocities and impulses.
///
/// Coordinate system:
/// - X: horizontal, along the pitch length
/// - Y: vertical (positive upward, ground at y = 0)
/// - Z: horizontal, along the pitch width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared magnitude (avoids sqrt for comparisons)
    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Length of the XZ projection.
    pub fn horizontal_magnitude(&self) -> f64 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    /// Returns a unit vector in the same direction, or zero if magnitude is zero
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < constants::EPSILON {
            Self::ZERO
        } else {
            *self / mag
        }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).magnitude()
    }

    /// Unclamped linear interpolation. See [`crate::spline::lerp`] for the clamped form.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        *self + (*other - *self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
            z: self.z / scalar,
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

// =============================================================================
// Prediction State
// =============================================================================

/// The engine's live belief about the ball.
///
/// Treated as a value: every prediction step derives a new copy instead of
/// patching fields in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Option<Vec3>,
    /// Milliseconds, caller clock
    pub timestamp: f64,
    pub tick: u64,
}

impl PredictionState {
    pub fn new(position: Vec3, velocity: Vec3, timestamp: f64) -> Self {
        Self {
            position,
            velocity,
            angular_velocity: None,
            timestamp,
            tick: tick_at(timestamp),
        }
    }

    /// Ball at rest at a given position
    pub fn at_rest(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO, 0.0)
    }

    pub fn with_position(self, position: Vec3) -> Self {
        Self { position, ..self }
    }

    pub fn with_velocity(self, velocity: Vec3) -> Self {
        Self { velocity, ..self }
    }

    /// Re-stamp the state at `now_ms`, recomputing its tick.
    pub fn stamped(self, now_ms: f64) -> Self {
        Self {
            timestamp: now_ms,
            tick: tick_at(now_ms),
            ..self
        }
    }
}

impl Default for PredictionState {
    fn default() -> Self {
        Self::at_rest(Vec3::new(0.0, constants::BALL_RADIUS, 0.0))
    }
}

// =============================================================================
// Server Input
// =============================================================================

/// Raw authoritative update as delivered by the network layer.
///
/// Velocity fields are optional on the wire and default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub vx: Option<f64>,
    #[serde(default)]
    pub vy: Option<f64>,
    #[serde(default)]
    pub vz: Option<f64>,
    pub tick: u64,
}

impl ServerUpdate {
    pub fn into_snapshot(self, received_at: f64) -> ServerSnapshot {
        ServerSnapshot {
            position: Vec3::new(self.x, self.y, self.z),
            velocity: Vec3::new(
                self.vx.unwrap_or(0.0),
                self.vy.unwrap_or(0.0),
                self.vz.unwrap_or(0.0),
            ),
            tick: self.tick,
            received_at,
        }
    }
}

/// Immutable authoritative snapshot, stamped with its local arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub tick: u64,
    /// Milliseconds, caller clock
    pub received_at: f64,
}

// =============================================================================
// Player Input
// =============================================================================

/// A player body the ball may collide with, refreshed every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub session_id: String,
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    /// Non-positive means "use the configured default radius"
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub giant: bool,
}

impl PlayerInfo {
    pub fn new(session_id: impl Into<String>, position: Vec3, velocity: Vec3, radius: f64) -> Self {
        Self {
            session_id: session_id.into(),
            position,
            velocity,
            radius,
            giant: false,
        }
    }

    /// Mark the player as giant-sized.
    pub fn with_giant(self, giant: bool) -> Self {
        Self { giant, ..self }
    }

    /// Collision radius, falling back to `default_radius` (scaled for giants).
    pub fn effective_radius(&self, default_radius: f64, giant_scale: f64) -> f64 {
        if self.radius > 0.0 {
            self.radius
        } else if self.giant {
            default_radius * giant_scale
        } else {
            default_radius
        }
    }
}

// =============================================================================
// Collision Types
// =============================================================================

/// A sphere moving in a straight line (plus gravity, for the ball).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingSphere {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
}

impl MovingSphere {
    pub fn new(position: Vec3, velocity: Vec3, radius: f64) -> Self {
        Self {
            position,
            velocity,
            radius,
        }
    }
}

/// The best collision candidate of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPrediction {
    pub player_id: String,
    /// Seconds until contact
    pub time_to_collision: f64,
    pub score: f64,
    pub player_pos: Vec3,
    pub player_vel: Vec3,
    pub player_radius: f64,
    pub is_local_player: bool,
}

/// Simulation tick for a timestamp: `floor(now_ms / (1000 / 60))`.
pub fn tick_at(now_ms: f64) -> u64 {
    if now_ms <= 0.0 || !now_ms.is_finite() {
        return 0;
    }
    (now_ms / constants::FRAME_MS).floor() as u64
}

// =============================================================================
// Constants
// =============================================================================

pub mod constants {
    /// Ball radius in world units; also the resting height of its center
    pub const BALL_RADIUS: f64 = 0.22;

    /// Nominal simulation rate (Hz)
    pub const TICK_RATE: f64 = 60.0;

    /// One simulation frame in milliseconds
    pub const FRAME_MS: f64 = 1000.0 / TICK_RATE;

    /// Small value for floating-point comparisons
    pub const EPSILON: f64 = 1e-10;
}

// =============================================================================
// Tests
// =============================================================================
