//! Tuning profiles.
//!
//! Every tuned constant of the engine lives in [`PredictionConfig`]. The
//! `Default` impl carries the shipped values; YAML profiles override any
//! subset of them.
//!
//! ## Directory Structure
//!
//! ```text
//! profiles/
//! ├── default.yaml
//! └── high_latency.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::constants;

/// Error type for profile loading operations.
#[derive(Debug)]
pub enum ProfileError {
    IoError(std::io::Error),
    ParseError(serde_yaml::Error),
    NotFound(String),
    Invalid(String),
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileError::IoError(e) => write!(f, "IO error: {}", e),
            ProfileError::ParseError(e) => write!(f, "YAML parse error: {}", e),
            ProfileError::NotFound(name) => write!(f, "Profile not found: {}", name),
            ProfileError::Invalid(reason) => write!(f, "Invalid profile: {}", reason),
        }
    }
}

impl std::error::Error for ProfileError {}

impl From<std::io::Error> for ProfileError {
    fn from(err: std::io::Error) -> Self {
        ProfileError::IoError(err)
    }
}

impl From<serde_yaml::Error> for ProfileError {
    fn from(err: serde_yaml::Error) -> Self {
        ProfileError::ParseError(err)
    }
}

// =============================================================================
// Configuration sections
// =============================================================================

/// Ball integration law, shared by the live state and trajectory previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub ball_radius: f64,
    /// Downward acceleration (units/s²)
    pub gravity: f64,
    /// Velocity retained per 60Hz frame
    pub linear_damping: f64,
    pub ground_restitution: f64,
    /// Horizontal velocity retained on each ground impact
    pub ground_friction: f64,
    /// Post-bounce vertical speed below which the ball settles
    pub rest_velocity: f64,
    pub wall_restitution: f64,
    pub arena_half_x: f64,
    pub arena_half_z: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            ball_radius: constants::BALL_RADIUS,
            gravity: 20.0,
            linear_damping: 0.985,
            ground_restitution: 0.7,
            ground_friction: 0.9,
            rest_velocity: 0.5,
            wall_restitution: 0.8,
            arena_half_x: 30.0,
            arena_half_z: 20.0,
        }
    }
}

/// Collision prediction and the pre-applied response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Seconds; candidates beyond this are ignored
    pub ttc_threshold: f64,
    pub lookahead_frames: usize,
    pub refine_iterations: usize,
    pub sweep_steps: usize,
    pub first_touch_window_ms: f64,
    pub touch_memory_ms: f64,
    pub first_touch_cooldown_ms: f64,
    pub cooldown_ms: f64,
    pub restitution: f64,
    pub first_touch_multiplier: f64,
    pub first_touch_response: f64,
    pub response: f64,
    /// Player speed above which momentum transfers in full
    pub momentum_transfer_speed: f64,
    pub reduced_momentum_transfer: f64,
    pub pop_velocity: f64,
    pub player_momentum_transfer: f64,
    pub local_priority: f64,
    pub remote_priority: f64,
    pub local_confidence_boost: f64,
    pub player_radius: f64,
    pub giant_radius_scale: f64,
    /// Relative speed above which the sub-stepped sweep backs up the TTC scan
    pub fast_ball_speed: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            ttc_threshold: 0.1,
            lookahead_frames: 8,
            refine_iterations: 8,
            sweep_steps: 8,
            first_touch_window_ms: 100.0,
            touch_memory_ms: 200.0,
            first_touch_cooldown_ms: 30.0,
            cooldown_ms: 50.0,
            restitution: 1.6,
            first_touch_multiplier: 1.2,
            first_touch_response: 0.98,
            response: 0.95,
            momentum_transfer_speed: 3.0,
            reduced_momentum_transfer: 0.5,
            pop_velocity: 1.5,
            player_momentum_transfer: 0.3,
            local_priority: 1.5,
            remote_priority: 1.0,
            local_confidence_boost: 0.1,
            player_radius: 0.5,
            giant_radius_scale: 2.0,
            fast_ball_speed: 25.0,
        }
    }
}

/// Server reconciliation (hard rollback and soft blending).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub rollback_capacity: usize,
    pub rollback_threshold: f64,
    pub rollback_velocity_threshold: f64,
    pub rollback_blend_frames: f64,
    pub hard_velocity_blend: f64,
    pub hard_confidence_scale: f64,
    pub blend_rate_low_ping: f64,
    pub blend_rate_mid_ping: f64,
    pub blend_rate_high_ping: f64,
    pub low_ping_ms: f64,
    pub high_ping_ms: f64,
    pub position_ema_alpha: f64,
    pub velocity_ema_alpha: f64,
    pub micro_jitter_filter: f64,
    pub clean_update_boost: f64,
    pub jitter_buffer_len: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            rollback_capacity: 12,
            rollback_threshold: 0.5,
            rollback_velocity_threshold: 5.0,
            rollback_blend_frames: 6.0,
            hard_velocity_blend: 0.6,
            hard_confidence_scale: 0.8,
            blend_rate_low_ping: 0.08,
            blend_rate_mid_ping: 0.18,
            blend_rate_high_ping: 0.32,
            low_ping_ms: 50.0,
            high_ping_ms: 150.0,
            position_ema_alpha: 0.15,
            velocity_ema_alpha: 0.25,
            micro_jitter_filter: 0.005,
            clean_update_boost: 0.05,
            jitter_buffer_len: 3,
        }
    }
}

impl ReconcileConfig {
    /// Hard-reconcile position blend: `min(1, 2 / rollback_blend_frames)`.
    pub fn hard_position_blend(&self) -> f64 {
        (2.0 / self.rollback_blend_frames).min(1.0)
    }

    /// Soft blend rate by ping tier.
    pub fn blend_rate(&self, ping_ms: f64) -> f64 {
        if ping_ms < self.low_ping_ms {
            self.blend_rate_low_ping
        } else if ping_ms < self.high_ping_ms {
            self.blend_rate_mid_ping
        } else {
            self.blend_rate_high_ping
        }
    }
}

/// Render-facing smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub first_touch_blend: f64,
    pub collision_blend: f64,
    pub smoothing_rate: f64,
    pub smoothness_low_ping: f64,
    pub smoothness_mid_ping: f64,
    pub smoothness_high_ping: f64,
    pub visual_velocity_cap: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            first_touch_blend: 0.98,
            collision_blend: 0.95,
            smoothing_rate: 30.0,
            smoothness_low_ping: 0.1,
            smoothness_mid_ping: 0.25,
            smoothness_high_ping: 0.4,
            visual_velocity_cap: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub history_len: usize,
    pub lookahead_min_ms: f64,
    pub lookahead_max_ms: f64,
    pub lookahead_ping_scale: f64,
    pub kick_compensation_max_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            history_len: 10,
            lookahead_min_ms: 50.0,
            lookahead_max_ms: 200.0,
            lookahead_ping_scale: 1.5,
            kick_compensation_max_ms: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub min: f64,
    /// Retained per 60Hz frame
    pub decay_rate: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min: 0.3,
            decay_rate: 0.995,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub physics: PhysicsConfig,
    pub collision: CollisionConfig,
    pub reconcile: ReconcileConfig,
    pub smoothing: SmoothingConfig,
    pub latency: LatencyConfig,
    pub confidence: ConfidenceConfig,
}

impl PredictionConfig {
    /// Parse a profile from YAML, then validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        let config: PredictionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break engine invariants.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let invalid = |reason: &str| Err(ProfileError::Invalid(reason.to_string()));

        if self.physics.ball_radius <= 0.0 {
            return invalid("physics.ball_radius must be positive");
        }
        if self.physics.arena_half_x <= self.physics.ball_radius
            || self.physics.arena_half_z <= self.physics.ball_radius
        {
            return invalid("arena half extents must exceed the ball radius");
        }
        if !(self.confidence.min > 0.0 && self.confidence.min <= 1.0) {
            return invalid("confidence.min must be in (0, 1]");
        }
        if !(self.confidence.decay_rate > 0.0 && self.confidence.decay_rate <= 1.0) {
            return invalid("confidence.decay_rate must be in (0, 1]");
        }
        if self.latency.lookahead_min_ms > self.latency.lookahead_max_ms {
            return invalid("latency.lookahead_min_ms exceeds lookahead_max_ms");
        }
        if self.latency.history_len == 0 {
            return invalid("latency.history_len must be at least 1");
        }
        if self.reconcile.rollback_capacity == 0 {
            return invalid("reconcile.rollback_capacity must be at least 1");
        }
        if self.reconcile.rollback_blend_frames <= 0.0 {
            return invalid("reconcile.rollback_blend_frames must be positive");
        }
        for (name, alpha) in [
            ("position_ema_alpha", self.reconcile.position_ema_alpha),
            ("velocity_ema_alpha", self.reconcile.velocity_ema_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ProfileError::Invalid(format!(
                    "reconcile.{} must be in (0, 1]",
                    name
                )));
            }
        }
        if self.collision.lookahead_frames == 0 || self.collision.sweep_steps == 0 {
            return invalid("collision sample counts must be at least 1");
        }
        Ok(())
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Profile loader with configurable base directory.
pub struct ProfileLoader {
    base_path: PathBuf,
}

impl ProfileLoader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Load a profile by name (without .yaml extension).
    ///
    /// # Example
    /// ```ignore
    /// let loader = ProfileLoader::new("profiles");
    /// let config = loader.load("high_latency")?;
    /// ```
    pub fn load(&self, name: &str) -> Result<PredictionConfig, ProfileError> {
        let path = self.base_path.join(format!("{}.yaml", name));
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        PredictionConfig::from_yaml_str(&contents)
    }

    /// List all available profiles, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.ends_with(".yaml") {
                names.push(name.trim_end_matches(".yaml").to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================
