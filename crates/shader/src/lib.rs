//! Arbor Shader: template-driven GLSL programs cached by material profile.
//!
//! # Invariants
//! - Profiles that match share one linked program; a match never recompiles.
//! - Compile and link failures carry the device info log and are never retried.
//! - Failed builds leave no shader or program objects behind.

pub mod cache;
pub mod error;
pub mod profile;
pub mod templates;

pub use cache::ShaderCache;
pub use error::ShaderError;
pub use profile::{DEFAULT_VERSION, Profile, ProgramSource, ShaderSources};
pub use templates::{DEFAULT_EXTENSIONS, TemplateContext, Templates};

pub fn crate_info() -> &'static str {
    "arbor-shader v0.1.0"
}
