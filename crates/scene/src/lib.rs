//! Arbor Scene: node graph, traversal, cameras, lights and the script surface.
//!
//! # Invariants
//! - Every child edge has a matching parent edge.
//! - World matrices are recomputed on every visit and passed down explicitly.
//! - Visit counters start fresh on every traversal pass.
//! - A traversal never stops for a node failure; failures land in the report.

mod bindings;
mod camera;
mod description;
mod error;
mod graph;
mod light;
mod node;
mod scene;
mod system;
mod traversal;

pub use bindings::Value;
pub use camera::{Camera, CameraError, Plane, Projection};
pub use description::{ArgValue, NodeSpec, SceneDescription};
pub use error::{BindingError, GraphError, SceneError};
pub use graph::Graph;
pub use light::{Light, LightSlots};
pub use node::{
    Capabilities, MeshNode, MeshShape, Node, NodeClass, NodeId, NodeKind, Recursion, Relation,
    RemovalPolicy, ReplacePolicy,
};
pub use scene::Scene;
pub use system::{FrameFailed, FrameObserver, SceneSystem};
pub use traversal::{FrameReport, VisitError};

pub fn crate_info() -> &'static str {
    "arbor-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
