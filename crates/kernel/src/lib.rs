//! Arbor Kernel: priority-ordered system scheduling and the engine loop.
//!
//! # Invariants
//! - Systems run in descending priority every tick; ties keep insertion order.
//! - One system's error never prevents the remaining systems from running.
//! - Only the error handler decides whether the engine stops.

mod clock;
mod engine;
mod system;
mod world;

pub use clock::FrameClock;
pub use engine::{Engine, EngineConfig, RunSummary};
pub use system::{System, SystemError, Tick};
pub use world::{Disposition, ErrorHandler, World};

pub fn crate_info() -> &'static str {
    "arbor-kernel v0.1.0"
}
