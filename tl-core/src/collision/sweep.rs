//! Swept sphere tests.

use crate::physics::BallPhysics;
use crate::types::{constants, MovingSphere, Vec3};

/// Default number of linear sub-segments per sweep.
pub const DEFAULT_SWEEP_STEPS: usize = 8;

/// Earliest parametric `t` in [0, 1] at which a sphere moving from `start` to
/// `end` touches a static sphere at `other`.
///
/// Solves `|start + d·t - other|² = (r1 + r2)²` for its smaller root.
/// Returns `Some(0.0)` when the spheres already overlap at `start`, and
/// `None` when the path never comes within `r1 + r2`.
pub fn sphere_sweep_test(start: Vec3, end: Vec3, other: Vec3, r1: f64, r2: f64) -> Option<f64> {
    let combined = r1 + r2;
    let d = end - start;
    let f = start - other;

    let c = f.dot(&f) - combined * combined;
    if c < 0.0 {
        return Some(0.0);
    }

    let a = d.dot(&d);
    if a < constants::EPSILON {
        // No displacement: only a static contact counts
        return if c <= 0.0 { Some(0.0) } else { None };
    }

    let b = 2.0 * f.dot(&d);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

/// Sub-stepped sweep of the ball against a moving sphere over `dt` seconds.
///
/// Both bodies advance along their velocities each sub-step; the ball also
/// falls under gravity while airborne. Each sub-segment is swept in the
/// other body's frame. Returns the earliest hit as a fraction of `dt`.
pub fn multi_step_sweep_test(
    ball: &MovingSphere,
    other: &MovingSphere,
    dt: f64,
    steps: usize,
    physics: &BallPhysics,
) -> Option<f64> {
    if !(dt > 0.0) || !dt.is_finite() {
        return sphere_sweep_test(
            ball.position,
            ball.position,
            other.position,
            ball.radius,
            other.radius,
        );
    }

    let steps = steps.max(1);
    let sub_dt = dt / steps as f64;

    let mut ball_pos = ball.position;
    let mut ball_vel = ball.velocity;
    let mut other_pos = other.position;

    for i in 0..steps {
        if physics.is_airborne(&ball_pos) {
            ball_vel.y -= physics.gravity() * sub_dt;
        }
        let next_ball = physics.clamp_to_ground(ball_pos + ball_vel * sub_dt);
        let next_other = other_pos + other.velocity * sub_dt;

        let rel_start = ball_pos - other_pos;
        let rel_end = next_ball - next_other;
        if let Some(t) = sphere_sweep_test(rel_start, rel_end, Vec3::ZERO, ball.radius, other.radius) {
            return Some((i as f64 + t) / steps as f64);
        }

        ball_pos = next_ball;
        other_pos = next_other;
    }

    None
}

// =============================================================================
// Tests
// =============================================================================
