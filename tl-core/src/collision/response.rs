//! Pre-applied collision response.
//!
//! When a contact is predicted within half the TTC threshold, the ball's
//! velocity is changed locally before the server reports the touch.
//!
//! ## Model
//!
//! - **Player as a moving wall**: the player's velocity is not changed;
//!   only the ball responds.
//! - **Partial response**: the impulse is scaled by confidence and by how
//!   close in time the contact is, so an uncertain prediction nudges the
//!   ball rather than committing to a full bounce.
//!
//! ```text
//! impulse  = restitution * approach_speed * transfer * confidence [* first_touch]
//! Δv       = n * impulse * ramp * response
//!          + up * pop
//!          + v_player * player_momentum_transfer * transfer
//! ```

use crate::profiles::CollisionConfig;
use crate::types::{CollisionPrediction, PredictionState, Vec3};

/// Outcome of a pre-applied collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactResponse {
    pub state: PredictionState,
    /// Contact normal, pointing from the player toward the ball
    pub normal: Vec3,
    pub impulse: f64,
}

/// Compute the ball's post-contact state for a predicted collision.
///
/// Returns `None` when the bodies are separating at the predicted contact
/// or the contact normal is degenerate.
pub fn collision_response(
    ball: &PredictionState,
    prediction: &CollisionPrediction,
    confidence: f64,
    first_touch: bool,
    config: &CollisionConfig,
) -> Option<ContactResponse> {
    let ttc = prediction.time_to_collision.max(0.0);
    let ball_at = ball.position + ball.velocity * ttc;
    let player_at = prediction.player_pos + prediction.player_vel * ttc;

    let normal = (ball_at - player_at).normalized();
    if normal == Vec3::ZERO {
        return None;
    }

    let relative = ball.velocity - prediction.player_vel;
    let approach_speed = -relative.dot(&normal);
    if approach_speed <= 0.0 {
        return None;
    }

    let transfer = if prediction.player_vel.magnitude() > config.momentum_transfer_speed {
        1.0
    } else {
        config.reduced_momentum_transfer
    };

    let mut impulse = config.restitution * approach_speed * transfer * confidence;
    if first_touch {
        impulse *= config.first_touch_multiplier;
    }

    let ramp = if config.ttc_threshold > 0.0 {
        (1.0 - ttc / config.ttc_threshold).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let response = if first_touch {
        config.first_touch_response
    } else {
        config.response
    };

    let delta_v = normal * (impulse * ramp * response)
        + Vec3::UP * config.pop_velocity
        + prediction.player_vel * (config.player_momentum_transfer * transfer);

    Some(ContactResponse {
        state: ball.with_velocity(ball.velocity + delta_v),
        normal,
        impulse,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(player_pos: Vec3, player_vel: Vec3, ttc: f64) -> CollisionPrediction {
        CollisionPrediction {
            player_id: "p1".to_string(),
            time_to_collision: ttc,
            score: 0.0,
            player_pos,
            player_vel,
            player_radius: 0.5,
            is_local_player: true,
        }
    }

    fn rolling_ball(vx: f64) -> PredictionState {
        PredictionState::new(Vec3::new(-1.0, 0.22, 0.0), Vec3::new(vx, 0.0, 0.0), 0.0)
    }

    #[test]
    fn test_response_pushes_ball_back_and_up() {
        let config = CollisionConfig::default();
        let ball = rolling_ball(10.0);
        let pred = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::ZERO, 0.02);

        let result = collision_response(&ball, &pred, 1.0, false, &config).unwrap();

        assert!(result.state.velocity.x < ball.velocity.x, "should slow the approach");
        assert!((result.state.velocity.y - config.pop_velocity).abs() < 1e-9);
        assert!((result.normal.x + 1.0).abs() < 1e-9);
        // Stationary player: reduced transfer
        let expected_impulse = config.restitution * 10.0 * config.reduced_momentum_transfer;
        assert!((result.impulse - expected_impulse).abs() < 1e-9);
    }

    #[test]
    fn test_separating_bodies_abort() {
        let config = CollisionConfig::default();
        let ball = rolling_ball(-10.0);
        let pred = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::ZERO, 0.02);
        assert!(collision_response(&ball, &pred, 1.0, false, &config).is_none());
    }

    #[test]
    fn test_coincident_centers_abort() {
        let config = CollisionConfig::default();
        let ball = PredictionState::at_rest(Vec3::new(0.0, 0.22, 0.0));
        let pred = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::ZERO, 0.0);
        assert!(collision_response(&ball, &pred, 1.0, false, &config).is_none());
    }

    #[test]
    fn test_first_touch_hits_harder() {
        let config = CollisionConfig::default();
        let ball = rolling_ball(10.0);
        let pred = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::ZERO, 0.02);

        let normal = collision_response(&ball, &pred, 1.0, false, &config).unwrap();
        let first = collision_response(&ball, &pred, 1.0, true, &config).unwrap();

        assert!(first.impulse > normal.impulse);
        assert!(first.state.velocity.x < normal.state.velocity.x);
    }

    #[test]
    fn test_fast_player_transfers_momentum() {
        let config = CollisionConfig::default();
        let ball = PredictionState::at_rest(Vec3::new(0.6, 0.22, 0.0));
        let slow = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::new(2.0, 0.0, 0.0), 0.01);
        let fast = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::new(8.0, 0.0, 0.0), 0.01);

        let slow_result = collision_response(&ball, &slow, 1.0, false, &config).unwrap();
        let fast_result = collision_response(&ball, &fast, 1.0, false, &config).unwrap();

        assert!(fast_result.state.velocity.x > slow_result.state.velocity.x);
        assert!(slow_result.state.velocity.x > 0.0);
    }

    #[test]
    fn test_low_confidence_softens_impulse() {
        let config = CollisionConfig::default();
        let ball = rolling_ball(10.0);
        let pred = prediction(Vec3::new(0.0, 0.22, 0.0), Vec3::ZERO, 0.02);

        let sure = collision_response(&ball, &pred, 1.0, false, &config).unwrap();
        let unsure = collision_response(&ball, &pred, 0.3, false, &config).unwrap();
        assert!((unsure.impulse - 0.3 * sure.impulse).abs() < 1e-9);
    }
}
