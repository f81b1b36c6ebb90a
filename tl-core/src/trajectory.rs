//! Forward trajectory preview.
//!
//! The trajectory is a timestamped run of future samples produced by the
//! same [`BallPhysics`] law as the live state. It is always recomputed
//! wholesale (on collision, kick or hard reconciliation), never patched.

use serde::{Deserialize, Serialize};

use crate::physics::BallPhysics;
use crate::spline;
use crate::types::{PredictionState, Vec3};

pub const DEFAULT_TRAJECTORY_STEPS: usize = 16;
pub const DEFAULT_TRAJECTORY_DT: f64 = 1.0 / 60.0;

/// One future sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Milliseconds, caller clock
    pub timestamp: f64,
}

/// Ordered samples starting at the state the preview was computed from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Seconds covered from the first to the last sample.
    pub fn horizon(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp) / 1000.0,
            _ => 0.0,
        }
    }

    /// Point on a Catmull-Rom curve through the sample positions, `u` in [0, 1].
    ///
    /// Meant for drawing the predicted path; timing-accurate lookups go
    /// through [`sample_trajectory`].
    pub fn path_point(&self, u: f64) -> Vec3 {
        let positions: Vec<Vec3> = self.points.iter().map(|p| p.position).collect();
        spline::catmull_rom(&positions, u)
    }
}

/// Simulate `steps` frames of `dt` seconds ahead of `state`.
///
/// The first sample is `state` itself, so the result holds `steps + 1`
/// points (~267ms ahead with the defaults).
pub fn predict_trajectory(
    state: &PredictionState,
    steps: usize,
    dt: f64,
    physics: &BallPhysics,
) -> Trajectory {
    let mut points = Vec::with_capacity(steps + 1);
    points.push(TrajectoryPoint {
        position: state.position,
        velocity: state.velocity,
        timestamp: state.timestamp,
    });

    let mut current = *state;
    for _ in 0..steps {
        current = physics.step(&current, dt);
        points.push(TrajectoryPoint {
            position: current.position,
            velocity: current.velocity,
            timestamp: current.timestamp,
        });
    }

    Trajectory { points }
}

/// Interpolated sample `t` seconds after the trajectory's first point.
///
/// Position is Hermite-interpolated using the bracketing velocities as
/// tangents; velocity is interpolated linearly. `t` outside the horizon
/// clamps to the first or last sample.
pub fn sample_trajectory(trajectory: &Trajectory, t: f64) -> Option<TrajectoryPoint> {
    let points = trajectory.points();
    let first = *points.first()?;
    if points.len() == 1 || !(t > 0.0) {
        return Some(first);
    }

    let target = first.timestamp + t * 1000.0;
    let upper = match points.iter().position(|p| p.timestamp >= target) {
        Some(0) => return Some(first),
        Some(index) => index,
        None => return points.last().copied(),
    };

    let p0 = points[upper - 1];
    let p1 = points[upper];
    let segment = (p1.timestamp - p0.timestamp) / 1000.0;
    if segment <= 0.0 {
        return Some(p1);
    }

    let local = (target - p0.timestamp) / 1000.0 / segment;
    Some(TrajectoryPoint {
        position: spline::hermite_samples(
            p0.position,
            p0.velocity,
            p1.position,
            p1.velocity,
            segment,
            local,
        ),
        velocity: spline::lerp(p0.velocity, p1.velocity, local),
        timestamp: target,
    })
}

// =============================================================================
// Tests
// =============================================================================
