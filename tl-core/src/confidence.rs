//! Trust in the current prediction.
//!
//! Decays every frame, is boosted by local actions and clean server
//! agreement, and always stays within `[min, 1]`.

use crate::profiles::ConfidenceConfig;
use crate::types::constants;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    value: f64,
    min: f64,
    decay_rate: f64,
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::new(&ConfidenceConfig::default())
    }
}

impl ConfidenceScore {
    /// Starts fully confident.
    pub fn new(config: &ConfidenceConfig) -> Self {
        Self {
            value: 1.0,
            min: config.min.clamp(constants::EPSILON, 1.0),
            decay_rate: config.decay_rate,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    /// `value *= decay_rate^(dt * 60)`, floored at the minimum.
    pub fn decay(&mut self, dt: f64) {
        if dt > 0.0 && dt.is_finite() {
            self.set(self.value * self.decay_rate.powf(dt * constants::TICK_RATE));
        }
    }

    pub fn boost(&mut self, amount: f64) {
        self.set(self.value + amount);
    }

    pub fn scale(&mut self, factor: f64) {
        self.set(self.value * factor);
    }

    pub fn set_full(&mut self) {
        self.value = 1.0;
    }

    fn set(&mut self, value: f64) {
        self.value = if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, 1.0)
        };
    }
}
