//! Small buffer of recent server snapshots.
//!
//! Snapshots are never rejected for arriving late or out of order; the
//! buffer only records them and measures how irregularly they arrive.

use std::collections::VecDeque;

use crate::types::ServerSnapshot;

pub const DEFAULT_JITTER_BUFFER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct JitterBuffer {
    snapshots: VecDeque<ServerSnapshot>,
    capacity: usize,
    newest_tick: Option<u64>,
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_BUFFER_LEN)
    }
}

impl JitterBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity,
            newest_tick: None,
        }
    }

    /// Store a snapshot. Returns `false` when it is older than the newest
    /// tick already seen (it is stored regardless).
    pub fn push(&mut self, snapshot: ServerSnapshot) -> bool {
        let in_order = self.newest_tick.map_or(true, |newest| snapshot.tick >= newest);
        if in_order {
            self.newest_tick = Some(snapshot.tick);
        }

        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        in_order
    }

    pub fn latest(&self) -> Option<&ServerSnapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Mean absolute deviation of arrival intervals (ms).
    pub fn arrival_jitter(&self) -> f64 {
        let intervals: Vec<f64> = self
            .snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .map(|(a, b)| b.received_at - a.received_at)
            .collect();
        if intervals.len() < 2 {
            return 0.0;
        }

        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        intervals.iter().map(|i| (i - mean).abs()).sum::<f64>() / intervals.len() as f64
    }

    /// Highest tick pushed since the last clear.
    pub fn newest_tick(&self) -> Option<u64> {
        self.newest_tick
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.newest_tick = None;
    }
}
