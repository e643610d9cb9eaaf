//! Arbor Common: shared value types for the scene graph runtime.
//!
//! # Invariants
//! - Entity ids are allocated monotonically by their owning generator and never reused.
//! - Transform math is column-major and right-handed, matching `glam`.

pub mod transform;
pub mod types;

pub use transform::{Transform, compose, decompose, rotation_from_matrix};
pub use types::{Color, EntityId, EntityIds, LightCounts, LightKind, ParseError};

pub fn crate_info() -> &'static str {
    "arbor-common v0.1.0"
}
