//! Collision prediction between the ball and player bodies.
//!
//! This module handles:
//! - **Sweep**: continuous collision detection along a frame's displacement
//! - **TTC**: time-to-collision search over the lookahead window
//! - **Response**: the velocity change applied before the server confirms
//!
//! ## Swept Sphere Algorithm
//!
//! Instead of checking whether the ball overlaps a player at frame
//! endpoints (which fails at high speeds), we check whether the ball's
//! path intersects the player's sphere during the frame.
//!
//! ```text
//! Time t=0              Time t=1
//!    ●──────────────────────●
//!    Ball      ╭───╮        Ball
//!    start    │  ● │        end
//!              ╰───╯
//!              Player (r1 + r2)
//! ```
//!
//! Curved (gravity-affected) paths are approximated by several linear
//! sub-sweeps.

pub mod response;
pub mod sweep;
pub mod ttc;

pub use response::*;
pub use sweep::*;
pub use ttc::*;
