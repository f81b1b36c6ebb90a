//! Prediction engine: owns the live predicted state of one ball.
//!
//! ## Frame flow
//!
//! ```text
//! update(dt, now, players)
//!   ├─ decay cooldown and confidence, expire stale contact
//!   ├─ integrate physics                     (BallPhysics::step)
//!   ├─ predict_collision ─▶ pre_apply_collision
//!   ├─ record prediction                     (RollbackBuffer::push)
//!   └─ update_visual                         (render-facing smoothing)
//!
//! on_server_update(snapshot, now)            (whenever a packet arrives)
//!   └─ needs_rollback ? reconcile : blend_to_server
//! ```
//!
//! All entry points take the caller's `now_ms`, so tests drive virtual time.
//! The engine is single-writer: a host that receives snapshots on another
//! thread must hand them over before the next `update()`.

use tracing::{debug, trace};

use crate::collision::{
    calculate_time_to_collision, collision_response, multi_step_sweep_test, TtcSearch,
};
use crate::confidence::ConfidenceScore;
use crate::contact::{ContactPhase, ContactTracker};
use crate::jitter::JitterBuffer;
use crate::latency::{adaptive_lookahead, PingMetrics};
use crate::physics::BallPhysics;
use crate::profiles::PredictionConfig;
use crate::rollback::{RollbackBuffer, RollbackThresholds};
use crate::trajectory::{
    predict_trajectory, Trajectory, DEFAULT_TRAJECTORY_DT, DEFAULT_TRAJECTORY_STEPS,
};
use crate::types::{
    CollisionPrediction, MovingSphere, PlayerInfo, PredictionState, ServerSnapshot, ServerUpdate,
    Vec3,
};

/// Which reconciliation path a server snapshot took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Prediction diverged past the rollback thresholds
    Hard,
    /// Prediction agreed closely enough to blend
    Soft,
}

/// EMA-filtered view of the latency-compensated server state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ServerFilter {
    position: Vec3,
    velocity: Vec3,
}

impl ServerFilter {
    fn advance(self, position: Vec3, velocity: Vec3, alpha_pos: f64, alpha_vel: f64) -> Self {
        Self {
            position: self.position + (position - self.position) * alpha_pos,
            velocity: self.velocity + (velocity - self.velocity) * alpha_vel,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionEngine {
    config: PredictionConfig,
    physics: BallPhysics,
    state: PredictionState,
    visual_position: Vec3,
    visual_velocity: Vec3,
    confidence: ConfidenceScore,
    contact: ContactTracker,
    /// Seconds until collision prediction resumes
    collision_cooldown: f64,
    rollback: RollbackBuffer,
    jitter: JitterBuffer,
    latency: PingMetrics,
    /// Seconds
    adaptive_lookahead: f64,
    server_filter: Option<ServerFilter>,
    trajectory: Trajectory,
    last_collision: Option<CollisionPrediction>,
    now_ms: f64,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl PredictionEngine {
    /// Engine with the shipped tuning, ball at rest at `position`.
    pub fn new(position: Vec3) -> Self {
        Self::with_config(PredictionConfig::default(), position)
    }

    pub fn with_config(config: PredictionConfig, position: Vec3) -> Self {
        let physics = BallPhysics::new(config.physics.clone());
        let state = PredictionState::at_rest(physics.clamp_to_ground(position));
        let rollback = RollbackBuffer::new(
            config.reconcile.rollback_capacity,
            RollbackThresholds {
                position: config.reconcile.rollback_threshold,
                velocity: config.reconcile.rollback_velocity_threshold,
            },
        );
        let latency = PingMetrics::new(config.latency.history_len);
        let adaptive_lookahead = adaptive_lookahead(latency.ping, &config.latency);

        let mut engine = Self {
            confidence: ConfidenceScore::new(&config.confidence),
            contact: ContactTracker::new(&config.collision),
            jitter: JitterBuffer::new(config.reconcile.jitter_buffer_len),
            visual_position: state.position,
            visual_velocity: Vec3::ZERO,
            collision_cooldown: 0.0,
            server_filter: None,
            trajectory: Trajectory::default(),
            last_collision: None,
            now_ms: 0.0,
            config,
            physics,
            state,
            rollback,
            latency,
            adaptive_lookahead,
        };
        engine.recompute_trajectory();
        engine
    }

    // =========================================================================
    // Frame update
    // =========================================================================

    /// Advance one render frame of `dt` seconds ending at `now_ms`.
    pub fn update(
        &mut self,
        dt: f64,
        now_ms: f64,
        players: &[PlayerInfo],
        local_player_id: Option<&str>,
    ) {
        let dt = if dt > 0.0 && dt.is_finite() { dt } else { 0.0 };
        self.now_ms = now_ms;

        self.collision_cooldown = (self.collision_cooldown - dt).max(0.0);
        self.confidence.decay(dt);
        self.contact.expire(now_ms);

        self.state = self.physics.step(&self.state, dt).stamped(now_ms);

        self.predict_collision(players, local_player_id);
        self.rollback.push(&self.state);
        self.update_visual(dt);
    }

    /// Find the most urgent player contact and pre-apply it when imminent.
    ///
    /// Skipped while the post-collision cooldown runs. Returns the best
    /// candidate under the TTC threshold, if any.
    pub fn predict_collision(
        &mut self,
        players: &[PlayerInfo],
        local_player_id: Option<&str>,
    ) -> Option<CollisionPrediction> {
        if self.collision_cooldown > 0.0 {
            trace!(cooldown = self.collision_cooldown, "collision prediction on cooldown");
            return None;
        }

        let cfg = &self.config.collision;
        let ball = MovingSphere::new(
            self.state.position,
            self.state.velocity,
            self.physics.radius(),
        );
        let search = TtcSearch {
            frames: cfg.lookahead_frames,
            refine_iterations: cfg.refine_iterations,
        };
        let lookahead = self.adaptive_lookahead;

        let mut best: Option<CollisionPrediction> = None;
        for player in players {
            let radius = player.effective_radius(cfg.player_radius, cfg.giant_radius_scale);
            let body = MovingSphere::new(player.position, player.velocity, radius);

            let ttc = calculate_time_to_collision(&ball, &body, lookahead, &self.physics, &search)
                .or_else(|| {
                    let relative_speed = (ball.velocity - body.velocity).magnitude();
                    if relative_speed > cfg.fast_ball_speed {
                        multi_step_sweep_test(
                            &ball,
                            &body,
                            lookahead,
                            cfg.sweep_steps,
                            &self.physics,
                        )
                        .map(|fraction| fraction * lookahead)
                    } else {
                        None
                    }
                });
            let Some(ttc) = ttc else {
                continue;
            };
            if ttc >= cfg.ttc_threshold {
                continue;
            }

            let is_local = local_player_id == Some(player.session_id.as_str());
            let priority = if is_local {
                cfg.local_priority
            } else {
                cfg.remote_priority
            };
            let score = (cfg.ttc_threshold - ttc) * priority;

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(CollisionPrediction {
                    player_id: player.session_id.clone(),
                    time_to_collision: ttc,
                    score,
                    player_pos: player.position,
                    player_vel: player.velocity,
                    player_radius: radius,
                    is_local_player: is_local,
                });
            }
        }

        let best = best?;
        self.last_collision = Some(best.clone());

        if best.time_to_collision < self.config.collision.ttc_threshold * 0.5 {
            let first_touch = self.contact.on_contact(self.now_ms);
            if first_touch {
                debug!(
                    player = %best.player_id,
                    ttc = best.time_to_collision,
                    local = best.is_local_player,
                    "first touch"
                );
            }
            self.pre_apply_collision(&best, first_touch);
        }

        Some(best)
    }

    /// Apply a predicted contact's response ahead of the server.
    ///
    /// Returns `false` (and changes nothing) when the bodies are separating.
    pub fn pre_apply_collision(&mut self, prediction: &CollisionPrediction, first_touch: bool) -> bool {
        let cfg = &self.config.collision;
        let Some(response) = collision_response(
            &self.state,
            prediction,
            self.confidence.value(),
            first_touch,
            cfg,
        ) else {
            trace!(player = %prediction.player_id, "predicted contact is separating");
            return false;
        };

        self.state = response.state;
        let cooldown_ms = if first_touch {
            cfg.first_touch_cooldown_ms
        } else {
            cfg.cooldown_ms
        };
        self.collision_cooldown = cooldown_ms / 1000.0;
        if prediction.is_local_player {
            self.confidence.boost(cfg.local_confidence_boost);
        }

        debug!(
            player = %prediction.player_id,
            ttc = prediction.time_to_collision,
            impulse = response.impulse,
            first_touch,
            "pre-applied collision"
        );
        self.recompute_trajectory();
        true
    }

    // =========================================================================
    // Server reconciliation
    // =========================================================================

    /// Ingest an authoritative update that arrived at `now_ms`.
    pub fn on_server_update(&mut self, update: ServerUpdate, now_ms: f64) -> ReconcileOutcome {
        self.apply_server_snapshot(update.into_snapshot(now_ms))
    }

    /// Choose hard or soft reconciliation for a snapshot. Snapshots are never
    /// rejected, even when stale or reordered.
    pub fn apply_server_snapshot(&mut self, snapshot: ServerSnapshot) -> ReconcileOutcome {
        if !self.jitter.push(snapshot) {
            trace!(tick = snapshot.tick, "out-of-order server snapshot");
        }

        if self.rollback.needs_rollback(&snapshot) {
            self.reconcile(&snapshot);
            ReconcileOutcome::Hard
        } else {
            self.blend_to_server(&snapshot);
            ReconcileOutcome::Soft
        }
    }

    /// Hard correction toward a diverged server state.
    ///
    /// Position moves `min(1, 2 / blend_frames)` of the way, velocity a fixed
    /// share; later snapshots finish the correction.
    pub fn reconcile(&mut self, snapshot: &ServerSnapshot) {
        let cfg = &self.config.reconcile;
        if let Some(entry) = self.rollback.get_at_tick(snapshot.tick) {
            debug!(
                tick = snapshot.tick,
                position_error = entry.position.distance(&snapshot.position),
                velocity_error = entry.velocity.distance(&snapshot.velocity),
                "hard reconcile"
            );
        }

        let position = self.physics.clamp_to_ground(
            self.state
                .position
                .lerp(&snapshot.position, cfg.hard_position_blend()),
        );
        let velocity = self
            .state
            .velocity
            .lerp(&snapshot.velocity, cfg.hard_velocity_blend);

        self.state = self.state.with_position(position).with_velocity(velocity);
        self.confidence.scale(cfg.hard_confidence_scale);
        self.server_filter = Some(ServerFilter {
            position: snapshot.position,
            velocity: snapshot.velocity,
        });
        self.recompute_trajectory();
    }

    /// Soft, latency-compensated, EMA-filtered blend toward the server.
    pub fn blend_to_server(&mut self, snapshot: &ServerSnapshot) {
        let cfg = &self.config.reconcile;
        let ping = self.latency.ping;
        let rate = cfg.blend_rate(ping);

        // The snapshot describes the ball half a round trip ago
        let lead = (ping / 2.0 / 1000.0).max(0.0);
        let compensated_position =
            self.physics
                .ballistic_position(snapshot.position, snapshot.velocity, lead);
        let compensated_velocity =
            self.physics
                .ballistic_velocity(snapshot.position, snapshot.velocity, lead);

        let filter = match self.server_filter {
            Some(filter) => filter.advance(
                compensated_position,
                compensated_velocity,
                cfg.position_ema_alpha,
                cfg.velocity_ema_alpha,
            ),
            None => ServerFilter {
                position: compensated_position,
                velocity: compensated_velocity,
            },
        };
        self.server_filter = Some(filter);

        let position_delta = filter.position - self.state.position;
        let velocity_delta = filter.velocity - self.state.velocity;

        let mut next = self.state;
        if position_delta.magnitude() > cfg.micro_jitter_filter {
            next.position = self
                .physics
                .clamp_to_ground(self.state.position + position_delta * rate);
        }
        if velocity_delta.magnitude() > cfg.micro_jitter_filter {
            next.velocity = self.state.velocity + velocity_delta * rate;
        }
        trace!(
            delta = position_delta.magnitude(),
            rate,
            "soft blend toward server"
        );

        self.state = next;
        self.confidence.boost(cfg.clean_update_boost);
    }

    /// Record a ping/jitter report and refresh the adaptive lookahead.
    pub fn update_latency(&mut self, ping_ms: f64, jitter_ms: f64) {
        self.latency.record(ping_ms, jitter_ms);
        self.adaptive_lookahead = adaptive_lookahead(self.latency.ping, &self.config.latency);
        trace!(
            ping = self.latency.ping,
            jitter = self.latency.jitter,
            lookahead = self.adaptive_lookahead,
            "latency updated"
        );
    }

    // =========================================================================
    // Local input
    // =========================================================================

    /// Apply a local kick immediately, ahead of any server confirmation.
    ///
    /// When the input's timestamp is known, the time since the input (capped)
    /// is re-integrated so the ball is where it would be had the kick
    /// applied on time. The visual position snaps to the result.
    pub fn apply_kick_prediction(&mut self, impulse: Vec3, input_timestamp: Option<f64>, now_ms: f64) {
        let mut position = self.state.position;
        let mut velocity = self.state.velocity + impulse;

        if let Some(input_ms) = input_timestamp {
            let max_elapsed = self.config.latency.kick_compensation_max_ms / 1000.0;
            let elapsed = ((now_ms - input_ms) / 1000.0).clamp(0.0, max_elapsed);
            if elapsed > 0.0 {
                let launch = position;
                position = self.physics.ballistic_position(launch, velocity, elapsed);
                velocity = self.physics.ballistic_velocity(launch, velocity, elapsed);
            }
        }

        let position = self.physics.clamp_to_ground(position);
        self.now_ms = now_ms;
        self.state = self
            .state
            .with_position(position)
            .with_velocity(velocity)
            .stamped(now_ms);
        self.confidence.set_full();
        self.contact.on_kick(now_ms);
        self.visual_position = position;
        self.visual_velocity = velocity;

        debug!(
            impulse_x = impulse.x,
            impulse_y = impulse.y,
            impulse_z = impulse.z,
            "kick predicted"
        );
        self.recompute_trajectory();
    }

    // =========================================================================
    // Visual smoothing
    // =========================================================================

    fn update_visual(&mut self, dt: f64) {
        let smoothing = &self.config.smoothing;
        let previous = self.visual_position;
        let target = self.state.position;
        let collision_active = self.contact.is_collision_active();

        let alpha = if self.contact.take_visual_snap() {
            smoothing.first_touch_blend
        } else if collision_active {
            smoothing.collision_blend
        } else {
            let base = self.base_smoothness();
            1.0 - (-smoothing.smoothing_rate * dt * (1.0 - base)).exp()
        };

        let mut next = previous.lerp(&target, alpha);

        if dt > 0.0 {
            let step = next - previous;
            let implied_speed = step.magnitude() / dt;
            if implied_speed > smoothing.visual_velocity_cap {
                next = previous + step * (smoothing.visual_velocity_cap / implied_speed);
            }
        }

        if !collision_active
            && (next - previous).magnitude() < self.config.reconcile.micro_jitter_filter
        {
            trace!("visual micro-jitter suppressed");
            next = previous;
        }

        next = self.physics.clamp_to_ground(next);
        self.visual_velocity = if dt > 0.0 {
            (next - previous) / dt
        } else {
            Vec3::ZERO
        };
        self.visual_position = next;
    }

    /// Smoothing strength by ping tier: low ping follows tightly.
    fn base_smoothness(&self) -> f64 {
        let smoothing = &self.config.smoothing;
        let reconcile = &self.config.reconcile;
        let ping = self.latency.ping;
        if ping < reconcile.low_ping_ms {
            smoothing.smoothness_low_ping
        } else if ping < reconcile.high_ping_ms {
            smoothing.smoothness_mid_ping
        } else {
            smoothing.smoothness_high_ping
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reinitialize for a goal or respawn: ball at rest at `position`.
    ///
    /// Every ball-related field is reinitialized. Ping history and the
    /// adaptive lookahead are not: they describe the connection, and a
    /// caller that wants them cleared must build a new engine.
    pub fn reset(&mut self, position: Vec3) {
        let position = self.physics.clamp_to_ground(position);
        self.state = PredictionState::at_rest(position).stamped(self.now_ms);
        self.visual_position = position;
        self.visual_velocity = Vec3::ZERO;
        self.confidence = ConfidenceScore::new(&self.config.confidence);
        self.contact.reset();
        self.collision_cooldown = 0.0;
        self.rollback.clear();
        self.jitter.clear();
        self.server_filter = None;
        self.last_collision = None;
        self.recompute_trajectory();
        debug!(x = position.x, y = position.y, z = position.z, "prediction reset");
    }

    fn recompute_trajectory(&mut self) {
        self.trajectory = predict_trajectory(
            &self.state,
            DEFAULT_TRAJECTORY_STEPS,
            DEFAULT_TRAJECTORY_DT,
            &self.physics,
        );
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn visual_position(&self) -> Vec3 {
        self.visual_position
    }

    pub fn visual_velocity(&self) -> Vec3 {
        self.visual_velocity
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence.value()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn is_in_first_touch(&self) -> bool {
        self.contact.is_in_first_touch()
    }

    /// Seconds
    pub fn adaptive_lookahead(&self) -> f64 {
        self.adaptive_lookahead
    }

    pub fn predicted_state(&self) -> &PredictionState {
        &self.state
    }

    pub fn phase(&self) -> ContactPhase {
        self.contact.phase()
    }

    pub fn last_collision(&self) -> Option<&CollisionPrediction> {
        self.last_collision.as_ref()
    }

    pub fn ping_metrics(&self) -> &PingMetrics {
        &self.latency
    }

    pub fn rollback(&self) -> &RollbackBuffer {
        &self.rollback
    }

    pub fn rollback_len(&self) -> usize {
        self.rollback.len()
    }

    pub fn jitter_buffer(&self) -> &JitterBuffer {
        &self.jitter
    }

    /// Seconds
    pub fn collision_cooldown(&self) -> f64 {
        self.collision_cooldown
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f64 = 1.0 / 60.0;
    const RADIUS: f64 = 0.22;

    fn resting_engine() -> PredictionEngine {
        PredictionEngine::new(Vec3::new(0.0, RADIUS, 0.0))
    }

    fn server(x: f64, y: f64, z: f64, tick: u64) -> ServerUpdate {
        ServerUpdate {
            x,
            y,
            z,
            vx: None,
            vy: None,
            vz: None,
            tick,
        }
    }

    fn player(id: &str, position: Vec3, velocity: Vec3) -> PlayerInfo {
        PlayerInfo::new(id, position, velocity, 0.5)
    }

    #[test]
    fn test_kick_snaps_visual_and_maxes_confidence() {
        let mut engine = resting_engine();
        engine.update(DT, 1000.0, &[], None);
        engine.update(DT, 1016.0, &[], None);
        assert!(engine.confidence() < 1.0);

        engine.apply_kick_prediction(Vec3::new(10.0, 5.0, 0.0), None, 1020.0);

        assert_eq!(engine.confidence(), 1.0);
        assert_eq!(engine.velocity(), Vec3::new(10.0, 5.0, 0.0));
        assert_eq!(engine.visual_position(), engine.predicted_state().position);
        assert_eq!(engine.phase(), ContactPhase::ContinuousCollision);
    }

    #[test]
    fn test_kick_compensates_elapsed_time() {
        let mut engine = resting_engine();
        engine.apply_kick_prediction(Vec3::new(10.0, 5.0, 0.0), Some(950.0), 1000.0);

        // 50ms of flight: x = 0.5, y = r + 5 * 0.05 - 0.5 * 20 * 0.05²
        let position = engine.predicted_state().position;
        assert!((position.x - 0.5).abs() < 1e-9);
        assert!((position.y - (RADIUS + 0.25 - 0.025)).abs() < 1e-9);
        assert!((engine.velocity().y - 4.0).abs() < 1e-9);
        assert_eq!(engine.visual_position(), position);
    }

    #[test]
    fn test_kick_compensation_is_capped() {
        let mut engine = resting_engine();
        engine.apply_kick_prediction(Vec3::new(10.0, 0.0, 0.0), Some(0.0), 5000.0);
        assert!((engine.predicted_state().position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hard_reconcile_on_large_divergence() {
        let mut engine = resting_engine();
        engine.update(DT, 1000.0, &[], None);
        let tick = engine.predicted_state().tick;
        let confidence_before = engine.confidence();

        let outcome = engine.on_server_update(server(0.6, RADIUS, 0.0, tick), 1010.0);

        assert_eq!(outcome, ReconcileOutcome::Hard);
        assert!((engine.predicted_state().position.x - 0.2).abs() < 1e-9);
        assert!((engine.confidence() - confidence_before * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_soft_blend_on_small_divergence() {
        let mut engine = resting_engine();
        engine.update(DT, 1000.0, &[], None);
        let tick = engine.predicted_state().tick;

        let outcome = engine.on_server_update(server(0.1, RADIUS, 0.0, tick), 1010.0);

        assert_eq!(outcome, ReconcileOutcome::Soft);
        // Low-ping tier blends 8% of the way
        assert!((engine.predicted_state().position.x - 0.008).abs() < 1e-9);
        assert_eq!(engine.confidence(), 1.0);
    }

    #[test]
    fn test_soft_blend_compensates_latency() {
        let mut engine = resting_engine();
        engine.update_latency(100.0, 5.0);

        let snapshot = ServerSnapshot {
            position: Vec3::new(0.0, RADIUS, 0.0),
            velocity: Vec3::new(10.0, 0.0, 0.0),
            tick: 0,
            received_at: 0.0,
        };
        engine.blend_to_server(&snapshot);

        // Server position led by 50ms (0.5 units), blended at the mid tier
        assert!((engine.predicted_state().position.x - 0.5 * 0.18).abs() < 1e-9);
        assert!((engine.velocity().x - 10.0 * 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_soft_blend_converges_monotonically() {
        let mut engine = resting_engine();
        let target = Vec3::new(3.0, 1.0, 2.0);
        let snapshot = ServerSnapshot {
            position: target,
            velocity: Vec3::ZERO,
            tick: 0,
            received_at: 0.0,
        };

        let mut distance = engine.predicted_state().position.distance(&target);
        for _ in 0..100 {
            engine.blend_to_server(&snapshot);
            let next = engine.predicted_state().position.distance(&target);
            assert!(next <= distance + 1e-12, "{} > {}", next, distance);
            distance = next;
        }
        assert!(distance < 0.01);
    }

    #[test]
    fn test_stale_snapshot_is_still_applied() {
        let mut engine = resting_engine();
        engine.on_server_update(server(1.0, RADIUS, 0.0, 50), 0.0);
        let x_after_first = engine.predicted_state().position.x;

        engine.on_server_update(server(1.0, RADIUS, 0.0, 10), 20.0);
        assert!(engine.predicted_state().position.x > x_after_first);
        assert_eq!(engine.jitter_buffer().len(), 2);
    }

    #[test]
    fn test_first_touch_pre_applies_collision() {
        let mut engine = PredictionEngine::new(Vec3::new(-1.0, RADIUS, 0.0));
        engine.apply_kick_prediction(Vec3::new(10.0, 0.0, 0.0), None, 0.0);
        // Let the kick's contact memory lapse
        engine.update(DT, 300.0, &[], None);
        assert_eq!(engine.phase(), ContactPhase::Free);
        let speed_before = engine.velocity().x;

        let players = [player("remote", Vec3::new(0.0, RADIUS, 0.0), Vec3::ZERO)];
        engine.update(DT, 316.0, &players, None);

        assert!(engine.is_in_first_touch());
        assert!(engine.velocity().x < speed_before * 0.985);
        assert!(engine.velocity().y > 0.0, "pop lifts the ball");
        assert!((engine.collision_cooldown() - 0.03).abs() < 1e-12);
        assert_eq!(engine.last_collision().unwrap().player_id, "remote");
    }

    #[test]
    fn test_cooldown_holds_for_30ms() {
        let mut engine = PredictionEngine::new(Vec3::new(-1.0, RADIUS, 0.0));
        engine.apply_kick_prediction(Vec3::new(10.0, 0.0, 0.0), None, 0.0);
        engine.update(DT, 300.0, &[], None);
        let players = [player("remote", Vec3::new(0.0, RADIUS, 0.0), Vec3::ZERO)];
        engine.update(DT, 316.0, &players, None);

        // One 16.7ms frame later 13.3ms remain: prediction is skipped
        engine.update(DT, 333.0, &[], None);
        assert!((engine.collision_cooldown() - (0.03 - DT)).abs() < 1e-12);
        assert!(engine.predict_collision(&players, None).is_none());

        // Two frames exhaust it
        engine.update(DT, 350.0, &[], None);
        assert_eq!(engine.collision_cooldown(), 0.0);
    }

    #[test]
    fn test_local_player_outranks_closer_remote() {
        let mut engine = resting_engine();
        let players = [
            player("remote", Vec3::new(0.0, RADIUS, 0.9), Vec3::new(0.0, 0.0, -5.0)),
            player("local", Vec3::new(0.95, RADIUS, 0.0), Vec3::new(-5.0, 0.0, 0.0)),
        ];

        let best = engine.predict_collision(&players, Some("local")).unwrap();
        assert_eq!(best.player_id, "local");
        assert!(best.is_local_player);
    }

    #[test]
    fn test_fast_ball_caught_between_coarse_samples() {
        // Grazing contact at x ~0.75 falls between the 6.25ms coarse samples
        let mut engine = resting_engine();
        engine.apply_kick_prediction(Vec3::new(100.0, 0.0, 0.0), None, 0.0);
        let players = [PlayerInfo::new("thin", Vec3::new(1.0, RADIUS, 0.2), Vec3::ZERO, 0.1)];

        let ball = MovingSphere::new(engine.predicted_state().position, engine.velocity(), RADIUS);
        let body = MovingSphere::new(players[0].position, Vec3::ZERO, 0.1);
        let coarse = calculate_time_to_collision(
            &ball,
            &body,
            engine.adaptive_lookahead(),
            &BallPhysics::default(),
            &TtcSearch::default(),
        );
        assert!(coarse.is_none());

        let best = engine
            .predict_collision(&players, None)
            .expect("sub-stepped sweep should find the contact");
        assert_eq!(best.player_id, "thin");
        assert!((best.time_to_collision - 0.0075).abs() < 1e-3);
    }

    #[test]
    fn test_sweep_fallback_only_above_fast_ball_speed() {
        let mut config = PredictionConfig::default();
        config.collision.fast_ball_speed = 150.0;
        let mut engine = PredictionEngine::with_config(config, Vec3::new(0.0, RADIUS, 0.0));
        engine.apply_kick_prediction(Vec3::new(100.0, 0.0, 0.0), None, 0.0);
        let players = [PlayerInfo::new("thin", Vec3::new(1.0, RADIUS, 0.2), Vec3::ZERO, 0.1)];

        assert!(engine.predict_collision(&players, None).is_none());
    }

    #[test]
    fn test_giant_player_uses_scaled_default_radius() {
        let mut engine = resting_engine();
        // 1.1 away: outside 0.22 + 0.5, inside 0.22 + 0.5 * 2
        let normal = PlayerInfo::new("p", Vec3::new(1.1, RADIUS, 0.0), Vec3::ZERO, 0.0);
        assert!(engine.predict_collision(&[normal.clone()], None).is_none());

        let giant = normal.with_giant(true);
        let best = engine.predict_collision(&[giant], None).unwrap();
        assert_eq!(best.player_radius, 1.0);
        assert_eq!(best.time_to_collision, 0.0);
    }

    #[test]
    fn test_contact_memory_expires_to_free() {
        let mut engine = resting_engine();
        engine.apply_kick_prediction(Vec3::new(1.0, 0.0, 0.0), None, 1000.0);
        engine.update(DT, 1100.0, &[], None);
        assert_eq!(engine.phase(), ContactPhase::ContinuousCollision);
        engine.update(DT, 1250.0, &[], None);
        assert_eq!(engine.phase(), ContactPhase::Free);
    }

    #[test]
    fn test_lookahead_follows_ping() {
        let mut engine = resting_engine();
        assert!((engine.adaptive_lookahead() - 0.05).abs() < 1e-12);

        engine.update_latency(100.0, 10.0);
        assert!((engine.adaptive_lookahead() - 0.15).abs() < 1e-12);

        for _ in 0..10 {
            engine.update_latency(900.0, 10.0);
        }
        assert!((engine.adaptive_lookahead() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_visual_velocity_is_capped() {
        let mut engine = resting_engine();
        engine.update(DT, 1000.0, &[], None);
        let tick = engine.predicted_state().tick;
        engine.on_server_update(server(25.0, RADIUS, 0.0, tick), 1005.0);

        let before = engine.visual_position();
        engine.update(DT, 1016.0, &[], None);
        let moved = engine.visual_position().distance(&before);

        let cap = engine.config().smoothing.visual_velocity_cap;
        assert!(moved <= cap * DT + 1e-9, "moved {} in one frame", moved);
        assert!(moved > 0.0);
    }

    #[test]
    fn test_micro_jitter_is_suppressed() {
        let mut engine = resting_engine();
        let snapshot = ServerSnapshot {
            position: Vec3::new(0.125, RADIUS, 0.0),
            velocity: Vec3::ZERO,
            tick: 0,
            received_at: 0.0,
        };
        engine.blend_to_server(&snapshot);
        assert!((engine.predicted_state().position.x - 0.01).abs() < 1e-12);

        engine.update(DT, 1000.0, &[], None);
        assert_eq!(engine.visual_position().x, 0.0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut engine = resting_engine();
        engine.update_latency(80.0, 4.0);
        engine.apply_kick_prediction(Vec3::new(5.0, 8.0, 1.0), None, 100.0);
        for i in 1..10 {
            engine.update(DT, 100.0 + i as f64 * 16.0, &[], None);
        }

        let spawn = Vec3::new(0.0, 3.0, 0.0);
        engine.reset(spawn);
        let once = engine.clone();
        engine.reset(spawn);

        assert_eq!(engine, once);
        assert_eq!(engine.rollback_len(), 0);
        assert_eq!(engine.confidence(), 1.0);
        assert_eq!(engine.visual_position(), spawn);
        assert_eq!(engine.ping_metrics().sample_count(), 1);
    }

    #[test]
    fn test_reset_lifts_sunken_spawn() {
        let mut engine = resting_engine();
        engine.reset(Vec3::new(1.0, -2.0, 1.0));
        assert_eq!(engine.predicted_state().position.y, RADIUS);
    }

    #[test]
    fn test_trajectory_recomputed_on_kick() {
        let mut engine = resting_engine();
        assert!(engine
            .trajectory()
            .points()
            .iter()
            .all(|p| p.position == engine.predicted_state().position));

        engine.apply_kick_prediction(Vec3::new(0.0, 6.0, 0.0), None, 0.0);
        let first = engine.trajectory().points()[0];
        let last = *engine.trajectory().points().last().unwrap();
        assert_eq!(first.position, engine.predicted_state().position);
        assert!(last.position.y > first.position.y);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Update { dt: f64, players: Vec<(f64, f64, f64, f64)> },
        Server { dx: f64, dy: f64, vx: f64 },
        Kick { x: f64, y: f64, z: f64 },
        Latency { ping: f64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (
                0.0f64..0.1,
                prop::collection::vec(
                    (-2.0f64..2.0, 0.0f64..2.0, -2.0f64..2.0, -20.0f64..20.0),
                    0..3
                )
            )
                .prop_map(|(dt, players)| Op::Update { dt, players }),
            (-3.0f64..3.0, -3.0f64..3.0, -20.0f64..20.0)
                .prop_map(|(dx, dy, vx)| Op::Server { dx, dy, vx }),
            (-30.0f64..30.0, -30.0f64..30.0, -30.0f64..30.0)
                .prop_map(|(x, y, z)| Op::Kick { x, y, z }),
            (0.0f64..500.0).prop_map(|ping| Op::Latency { ping }),
        ]
    }

    proptest! {
        #[test]
        fn engine_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut engine = resting_engine();
            let config = engine.config().clone();
            let mut now = 0.0;

            for op in ops {
                match op {
                    Op::Update { dt, players } => {
                        now += dt * 1000.0;
                        let ball = engine.predicted_state().position;
                        let players: Vec<PlayerInfo> = players
                            .iter()
                            .enumerate()
                            .map(|(i, &(dx, y, dz, v))| {
                                player(
                                    &format!("p{}", i),
                                    Vec3::new(ball.x + dx, y, ball.z + dz),
                                    Vec3::new(v, 0.0, -v),
                                )
                            })
                            .collect();
                        engine.update(dt, now, &players, Some("p0"));

                        prop_assert!(engine.predicted_state().position.y >= RADIUS);
                        prop_assert!(engine.visual_position().y >= RADIUS);
                    }
                    Op::Server { dx, dy, vx } => {
                        let p = engine.predicted_state().position;
                        let tick = engine.predicted_state().tick;
                        let update = ServerUpdate {
                            x: p.x + dx,
                            y: p.y + dy,
                            z: p.z,
                            vx: Some(vx),
                            vy: None,
                            vz: None,
                            tick,
                        };
                        engine.on_server_update(update, now);
                        prop_assert!(engine.predicted_state().position.y >= RADIUS);
                    }
                    Op::Kick { x, y, z } => {
                        engine.apply_kick_prediction(Vec3::new(x, y, z), Some(now - 20.0), now);
                        prop_assert_eq!(engine.confidence(), 1.0);
                    }
                    Op::Latency { ping } => engine.update_latency(ping, 2.0),
                }

                prop_assert!(engine.confidence() >= config.confidence.min);
                prop_assert!(engine.confidence() <= 1.0);
                prop_assert!(engine.rollback_len() <= config.reconcile.rollback_capacity);
                prop_assert!(engine.adaptive_lookahead() >= config.latency.lookahead_min_ms / 1000.0);
                prop_assert!(engine.adaptive_lookahead() <= config.latency.lookahead_max_ms / 1000.0);
            }
        }
    }
}
