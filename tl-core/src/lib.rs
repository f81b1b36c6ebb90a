//! # TL Core
//!
//! Client-side ball prediction and server reconciliation for a networked
//! ball game.
//!
//! ## Architecture
//!
//! - `types`: Core data structures (Vec3, prediction state, server and player inputs)
//! - `spline`: Vector helpers and Hermite / Catmull-Rom interpolation
//! - `physics`: The single ball integration law (damping, gravity, bounces)
//! - `collision`: Swept-sphere CCD, time-to-collision search, pre-applied response
//! - `trajectory`: Short-horizon trajectory preview and sampling
//! - `rollback`: Bounded history of predictions for divergence checks
//! - `latency`: Ping tracking and adaptive collision lookahead
//! - `jitter`: Recent server snapshots and arrival jitter
//! - `confidence`: Decaying trust score
//! - `contact`: First-touch / continuous-collision state machine
//! - `profiles`: YAML tuning profiles
//! - `engine`: Main orchestrator

pub mod collision;
pub mod confidence;
pub mod contact;
pub mod engine;
pub mod jitter;
pub mod latency;
pub mod physics;
pub mod profiles;
pub mod rollback;
pub mod spline;
pub mod trajectory;
pub mod types;

pub use engine::{PredictionEngine, ReconcileOutcome};
pub use profiles::{PredictionConfig, ProfileError, ProfileLoader};
pub use types::{PlayerInfo, ServerUpdate, Vec3};
