//! Arbor Resource: reference-counted GPU resources shared between drawables.
//!
//! # Invariants
//! - A new resource has one reference; counts never go below zero.
//! - Device handles are released exactly once, when the last reference closes.
//! - A released resource leaves the pool; its key is stale from then on.

pub mod error;
pub mod generators;
pub mod geometry;
pub mod material;
pub mod pool;
pub mod refcount;
pub mod texture;

pub use error::ResourceError;
pub use generators::SphereParams;
pub use geometry::{Attribute, Geometry, Group, VertexBuffer};
pub use material::{Blending, CustomBlend, Material, Side, Surface, UseLights};
pub use pool::{GeometryKey, MaterialKey, ResourcePool, TextureKey};
pub use refcount::{RefCount, Resource};
pub use texture::Texture;

pub fn crate_info() -> &'static str {
    "arbor-resource v0.1.0"
}
