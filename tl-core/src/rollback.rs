//! Bounded history of the engine's own predictions.
//!
//! Entries are inserted at the front and evicted from the back, so the
//! buffer is always ordered newest-first. Server snapshots are compared
//! against the entry recorded for the same tick.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::spline;
use crate::types::{PredictionState, ServerSnapshot, Vec3};

pub const DEFAULT_ROLLBACK_CAPACITY: usize = 12;

/// A recorded prediction, value-copied from the live state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub position: Vec3,
    pub velocity: Vec3,
    pub tick: u64,
    /// Milliseconds, caller clock
    pub timestamp: f64,
}

impl From<&PredictionState> for RollbackEntry {
    fn from(state: &PredictionState) -> Self {
        Self {
            position: state.position,
            velocity: state.velocity,
            tick: state.tick,
            timestamp: state.timestamp,
        }
    }
}

/// Thresholds separating hard rollback from soft blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollbackThresholds {
    pub position: f64,
    pub velocity: f64,
}

impl Default for RollbackThresholds {
    fn default() -> Self {
        Self {
            position: 0.5,
            velocity: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollbackBuffer {
    entries: VecDeque<RollbackEntry>,
    capacity: usize,
    thresholds: RollbackThresholds,
}

impl Default for RollbackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLBACK_CAPACITY, RollbackThresholds::default())
    }
}

impl RollbackBuffer {
    pub fn new(capacity: usize, thresholds: RollbackThresholds) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            thresholds,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest-first view of the history.
    pub fn entries(&self) -> impl Iterator<Item = &RollbackEntry> {
        self.entries.iter()
    }

    /// Record a prediction, evicting the oldest entry past capacity.
    pub fn push(&mut self, state: &PredictionState) {
        self.entries.push_front(RollbackEntry::from(state));
        self.entries.truncate(self.capacity);
    }

    /// The entry recorded at `tick`, or the most recent one if none matches.
    pub fn get_at_tick(&self, tick: u64) -> Option<&RollbackEntry> {
        self.entries
            .iter()
            .find(|entry| entry.tick == tick)
            .or_else(|| self.entries.front())
    }

    /// Interpolated entry at `timestamp`, for when ticks don't line up.
    ///
    /// Timestamps newer than the newest entry return the newest; older than
    /// the oldest return the oldest.
    pub fn get_at_time(&self, timestamp: f64) -> Option<RollbackEntry> {
        let newest = *self.entries.front()?;
        if timestamp >= newest.timestamp {
            return Some(newest);
        }

        for (&newer, &older) in self.entries.iter().zip(self.entries.iter().skip(1)) {
            if timestamp >= older.timestamp && timestamp <= newer.timestamp {
                let span = newer.timestamp - older.timestamp;
                if span <= 0.0 {
                    return Some(newer);
                }
                let t = (timestamp - older.timestamp) / span;
                return Some(RollbackEntry {
                    position: spline::lerp(older.position, newer.position, t),
                    velocity: spline::lerp(older.velocity, newer.velocity, t),
                    tick: if t < 0.5 { older.tick } else { newer.tick },
                    timestamp,
                });
            }
        }

        self.entries.back().copied()
    }

    /// Whether a server snapshot disagrees with our recorded prediction for
    /// its tick by more than the hard-rollback thresholds.
    ///
    /// With no history there is nothing to roll back to.
    pub fn needs_rollback(&self, server: &ServerSnapshot) -> bool {
        match self.get_at_tick(server.tick) {
            Some(entry) => {
                let position_error = entry.position.distance(&server.position);
                let velocity_error = entry.velocity.distance(&server.velocity);
                position_error > self.thresholds.position
                    || velocity_error > self.thresholds.velocity
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
