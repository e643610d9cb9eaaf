//! Arbor Render: forward renderer and drawables over the device abstraction.
//!
//! # Invariants
//! - A draw always runs with the program resolved for its material's profile.
//! - Indexed draws address `u32` indices; group starts become byte offsets.
//! - `end_frame` leaves no program bound.

mod drawable;
mod error;
mod renderer;

pub use drawable::{DrawGroup, Drawable};
pub use error::RenderError;
pub use renderer::{FrameStats, LightEnvironment, RenderSettings, Renderer};

pub fn crate_info() -> &'static str {
    "arbor-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
