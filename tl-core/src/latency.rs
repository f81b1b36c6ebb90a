//! Ping tracking and the ping-adaptive collision lookahead.
//!
//! A high-latency client must commit to a collision response before it can
//! hear back from the server, so it predicts further ahead.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::profiles::LatencyConfig;

/// Rolling ping statistics fed by the connection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingMetrics {
    /// Mean of the retained samples (ms)
    pub ping: f64,
    /// Latest reported jitter (ms)
    pub jitter: f64,
    history: VecDeque<f64>,
    history_len: usize,
}

impl Default for PingMetrics {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PingMetrics {
    pub fn new(history_len: usize) -> Self {
        let history_len = history_len.max(1);
        Self {
            ping: 0.0,
            jitter: 0.0,
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    /// Record a ping/jitter report. Negative or non-finite samples are ignored.
    pub fn record(&mut self, ping_ms: f64, jitter_ms: f64) {
        if ping_ms.is_finite() && ping_ms >= 0.0 {
            self.history.push_back(ping_ms);
            while self.history.len() > self.history_len {
                self.history.pop_front();
            }
            self.ping = self.history.iter().sum::<f64>() / self.history.len() as f64;
        }
        if jitter_ms.is_finite() && jitter_ms >= 0.0 {
            self.jitter = jitter_ms;
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &f64> {
        self.history.iter()
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }
}

/// Collision lookahead in seconds:
/// `clamp(ping / 1000 * scale, min_ms / 1000, max_ms / 1000)`.
pub fn adaptive_lookahead(ping_ms: f64, config: &LatencyConfig) -> f64 {
    let min = config.lookahead_min_ms / 1000.0;
    let max = config.lookahead_max_ms / 1000.0;
    let raw = ping_ms / 1000.0 * config.lookahead_ping_scale;
    if raw.is_nan() {
        return min;
    }
    raw.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_history_is_bounded() {
        let mut metrics = PingMetrics::new(10);
        for i in 0..25 {
            metrics.record(i as f64, 1.0);
        }
        assert_eq!(metrics.sample_count(), 10);
        // Mean of 15..=24
        assert!((metrics.ping - 19.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_samples_ignored() {
        let mut metrics = PingMetrics::default();
        metrics.record(80.0, 5.0);
        metrics.record(-1.0, f64::NAN);
        assert_eq!(metrics.ping, 80.0);
        assert_eq!(metrics.jitter, 5.0);
        assert_eq!(metrics.sample_count(), 1);
    }

    #[test]
    fn test_lookahead_scales_with_ping() {
        let config = LatencyConfig::default();
        assert!((adaptive_lookahead(0.0, &config) - 0.05).abs() < 1e-12);
        assert!((adaptive_lookahead(100.0, &config) - 0.15).abs() < 1e-12);
        assert!((adaptive_lookahead(1000.0, &config) - 0.2).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn lookahead_within_bounds(ping in -1000.0f64..10_000.0) {
            let config = LatencyConfig::default();
            let lookahead = adaptive_lookahead(ping, &config);
            prop_assert!(lookahead >= config.lookahead_min_ms / 1000.0);
            prop_assert!(lookahead <= config.lookahead_max_ms / 1000.0);
        }
    }
}
