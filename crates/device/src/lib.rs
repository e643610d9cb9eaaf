//! Arbor Device: the graphics-device abstraction the scene graph renders through.
//!
//! # Invariants
//! - Every device call is synchronous and side-effect-only.
//! - Handles are never reused by a device once deleted.
//!
//! # Workaround
//! `RecordingDevice` is a headless backend that records calls instead of
//! talking to a driver. The trait is stable; a GL backend can implement it
//! without changing consumers.

mod device;
mod recording;

pub use device::*;
pub use recording::{DrawRecord, RecordingDevice, ReleaseCounts, UniformValue};

pub fn crate_info() -> &'static str {
    "arbor-device v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("device"));
    }

    #[test]
    fn device_is_object_safe() {
        let mut dev = RecordingDevice::new();
        let dyn_dev: &mut dyn GraphicsDevice = &mut dev;
        dyn_dev.enable(Capability::DepthTest);
        assert!(dev.is_enabled(Capability::DepthTest));
    }
}
