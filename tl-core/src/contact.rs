//! Contact state machine.
//!
//! ```text
//!            contact (quiet > window)            contact (recent)
//!   Free ───────────────────────────▶ FirstTouch ───────────────▶ ContinuousCollision
//!    ▲                                    │                              │
//!    └──────── no contact for touch_memory ┴──────────────────────────────┘
//! ```
//!
//! A local kick always enters `ContinuousCollision`.

use crate::profiles::CollisionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactPhase {
    #[default]
    Free,
    /// First frame(s) of a new contact; the instant visual snap is consumed once.
    FirstTouch { visual_snap_pending: bool },
    ContinuousCollision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactTracker {
    phase: ContactPhase,
    last_contact_ms: Option<f64>,
    first_touch_window_ms: f64,
    touch_memory_ms: f64,
}

impl Default for ContactTracker {
    fn default() -> Self {
        Self::new(&CollisionConfig::default())
    }
}

impl ContactTracker {
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            phase: ContactPhase::Free,
            last_contact_ms: None,
            first_touch_window_ms: config.first_touch_window_ms,
            touch_memory_ms: config.touch_memory_ms,
        }
    }

    pub fn phase(&self) -> ContactPhase {
        self.phase
    }

    pub fn last_contact_ms(&self) -> Option<f64> {
        self.last_contact_ms
    }

    /// A contact now would be a first touch (no contact within the window).
    pub fn would_be_first_touch(&self, now_ms: f64) -> bool {
        self.last_contact_ms
            .map_or(true, |last| now_ms - last > self.first_touch_window_ms)
    }

    /// Register a predicted contact. Returns whether it is a first touch.
    pub fn on_contact(&mut self, now_ms: f64) -> bool {
        let first_touch = self.would_be_first_touch(now_ms);
        self.phase = if first_touch {
            ContactPhase::FirstTouch {
                visual_snap_pending: true,
            }
        } else {
            ContactPhase::ContinuousCollision
        };
        self.last_contact_ms = Some(now_ms);
        first_touch
    }

    pub fn on_kick(&mut self, now_ms: f64) {
        self.phase = ContactPhase::ContinuousCollision;
        self.last_contact_ms = Some(now_ms);
    }

    /// Fall back to `Free` once no contact has happened for the touch memory.
    pub fn expire(&mut self, now_ms: f64) {
        if self.phase == ContactPhase::Free {
            return;
        }
        let stale = self
            .last_contact_ms
            .map_or(true, |last| now_ms - last > self.touch_memory_ms);
        if stale {
            self.phase = ContactPhase::Free;
        }
    }

    /// Consume the pending first-touch snap, if any.
    pub fn take_visual_snap(&mut self) -> bool {
        if let ContactPhase::FirstTouch {
            visual_snap_pending: true,
        } = self.phase
        {
            self.phase = ContactPhase::FirstTouch {
                visual_snap_pending: false,
            };
            return true;
        }
        false
    }

    pub fn is_in_first_touch(&self) -> bool {
        matches!(self.phase, ContactPhase::FirstTouch { .. })
    }

    pub fn is_collision_active(&self) -> bool {
        self.phase != ContactPhase::Free
    }

    pub fn reset(&mut self) {
        self.phase = ContactPhase::Free;
        self.last_contact_ms = None;
    }
}
