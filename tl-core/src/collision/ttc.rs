//! Time-to-collision search.
//!
//! A coarse scan of the lookahead window under projectile motion, refined
//! by bisection once the first overlapping sample is found. Accurate to
//! `max_time / (frames * 2^iterations)` without solving the
//! quadratic-under-gravity system analytically.

use crate::physics::BallPhysics;
use crate::types::MovingSphere;

/// Sample counts for the TTC search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtcSearch {
    /// Coarse samples across `max_time`
    pub frames: usize,
    /// Bisection steps once overlap is found
    pub refine_iterations: usize,
}

impl Default for TtcSearch {
    fn default() -> Self {
        Self {
            frames: 8,
            refine_iterations: 8,
        }
    }
}

/// Seconds until the ball and a player first overlap, within `max_time`.
///
/// The ball follows [`BallPhysics::ballistic_position`]; the player moves
/// in a straight line. Returns `Some(0.0)` when already overlapping.
pub fn calculate_time_to_collision(
    ball: &MovingSphere,
    player: &MovingSphere,
    max_time: f64,
    physics: &BallPhysics,
    search: &TtcSearch,
) -> Option<f64> {
    let combined = ball.radius + player.radius;
    let overlaps_at = |t: f64| {
        let ball_at = physics.ballistic_position(ball.position, ball.velocity, t);
        let player_at = player.position + player.velocity * t;
        ball_at.distance(&player_at) <= combined
    };

    if overlaps_at(0.0) {
        return Some(0.0);
    }
    if !(max_time > 0.0) || !max_time.is_finite() {
        return None;
    }

    let frames = search.frames.max(1);
    let step = max_time / frames as f64;
    let mut previous = 0.0;

    for i in 1..=frames {
        let t = step * i as f64;
        if overlaps_at(t) {
            let (mut lo, mut hi) = (previous, t);
            for _ in 0..search.refine_iterations {
                let mid = 0.5 * (lo + hi);
                if overlaps_at(mid) {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            return Some(hi);
        }
        previous = t;
    }

    None
}
