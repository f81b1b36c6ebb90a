//! Vector helpers and spline interpolation.
//!
//! All functions are total: zero-length vectors normalize to zero, `t` is
//! clamped, and short point lists degrade to simpler curves.

use crate::types::Vec3;

/// Cardinal spline tension giving the Catmull-Rom curve.
pub const CATMULL_ROM_TENSION: f64 = 0.5;

pub fn distance(a: Vec3, b: Vec3) -> f64 {
    a.distance(&b)
}

pub fn normalize(v: Vec3) -> Vec3 {
    v.normalized()
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a.dot(&b)
}

/// Linear interpolation with `t` clamped to [0, 1].
pub fn lerp(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    a.lerp(&b, clamp_unit(t))
}

/// Scalar counterpart of [`lerp`].
pub fn lerp_scalar(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * clamp_unit(t)
}

/// Cubic Hermite interpolation between `p0` and `p1` with tangents `m0`, `m1`.
///
/// ```text
/// h00 =  2t³ - 3t² + 1      h10 = t³ - 2t² + t
/// h01 = -2t³ + 3t²          h11 = t³ - t²
/// ```
pub fn hermite(p0: Vec3, m0: Vec3, p1: Vec3, m1: Vec3, t: f64) -> Vec3 {
    let t = clamp_unit(t);
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    p0 * h00 + m0 * h10 + p1 * h01 + m1 * h11
}

/// Hermite interpolation between two timed samples.
///
/// Velocities are per second; they are scaled by the segment duration `dt`
/// so the tangents live in the curve's unit parameter space.
pub fn hermite_samples(p0: Vec3, v0: Vec3, p1: Vec3, v1: Vec3, dt: f64, t: f64) -> Vec3 {
    hermite(p0, v0 * dt, p1, v1 * dt, t)
}

/// Catmull-Rom curve through `points`, with `t` in [0, 1] spanning the whole list.
///
/// Exactly two points give a straight line; one point is returned as-is and
/// an empty list yields zero.
pub fn catmull_rom(points: &[Vec3], t: f64) -> Vec3 {
    match points.len() {
        0 => Vec3::ZERO,
        1 => points[0],
        2 => lerp(points[0], points[1], t),
        n => {
            let segments = (n - 1) as f64;
            let scaled = clamp_unit(t) * segments;
            let seg = (scaled.floor() as usize).min(n - 2);
            let u = scaled - seg as f64;

            let p1 = points[seg];
            let p2 = points[seg + 1];
            let p0 = if seg == 0 { p1 } else { points[seg - 1] };
            let p3 = if seg + 2 < n { points[seg + 2] } else { p2 };

            let m1 = (p2 - p0) * CATMULL_ROM_TENSION;
            let m2 = (p3 - p1) * CATMULL_ROM_TENSION;
            hermite(p1, m1, p2, m2, u)
        }
    }
}

fn clamp_unit(t: f64) -> f64 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
