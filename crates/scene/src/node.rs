use std::fmt;
use std::str::FromStr;

use arbor_common::{EntityId, Transform};
use arbor_render::Drawable;
use bitflags::bitflags;
use slotmap::new_key_type;

use crate::camera::Camera;
use crate::error::GraphError;
use crate::light::Light;

new_key_type! {
    /// Arena key of a node. Node equality is key equality.
    pub struct NodeId;
}

/// Edge direction of a node relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Parents.
    In,
    /// Children.
    Out,
}

impl Relation {
    /// Parse `in`/`out` in either case, naming `operation` in the error.
    pub fn parse(direction: &str, operation: &str) -> Result<Self, GraphError> {
        match direction {
            "in" | "IN" => Ok(Relation::In),
            "out" | "OUT" => Ok(Relation::Out),
            _ => Err(GraphError::NotARelation {
                direction: direction.to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}

impl FromStr for Relation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::parse(s, "parse")
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::In => "in",
            Relation::Out => "out",
        })
    }
}

/// What destruction does with resources the node owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    #[default]
    ReleaseOwned,
    KeepResources,
}

/// How [`crate::Graph::replace`] treats the replaced node's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacePolicy {
    #[default]
    SwapEdges,
    AdoptChildren,
}

bitflags! {
    /// Property groups a node kind answers to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const TRANSFORM = 1 << 0;
        const CAMERA = 1 << 1;
        const LIGHT = 1 << 2;
        const MESH = 1 << 3;
    }
}

/// Script-visible class of a node, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeClass {
    pub name: &'static str,
    pub capabilities: Capabilities,
}

/// Shape a mesh node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshShape {
    Mesh,
    Sphere,
    Axis,
}

#[derive(Debug, PartialEq)]
pub struct MeshNode {
    pub shape: MeshShape,
    pub drawable: Drawable,
}

/// The per-visit behavior of a node.
#[derive(Debug)]
pub enum NodeKind {
    Dummy,
    Root,
    Group,
    Translate(Transform),
    Scale(Transform),
    Rotate(Transform),
    Position(Transform),
    Camera(Box<Camera>),
    Light(Light),
    Mesh(MeshNode),
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        let (name, capabilities) = match self {
            NodeKind::Dummy => ("dummy", Capabilities::empty()),
            NodeKind::Root => ("root", Capabilities::empty()),
            NodeKind::Group => ("group", Capabilities::empty()),
            NodeKind::Translate(_) => ("translate", Capabilities::TRANSFORM),
            NodeKind::Scale(_) => ("scale", Capabilities::TRANSFORM),
            NodeKind::Rotate(_) => ("rotate", Capabilities::TRANSFORM),
            NodeKind::Position(_) => ("position", Capabilities::TRANSFORM),
            NodeKind::Camera(_) => ("camera", Capabilities::TRANSFORM | Capabilities::CAMERA),
            NodeKind::Light(l) => (l.kind().name(), Capabilities::LIGHT),
            NodeKind::Mesh(m) => match m.shape {
                MeshShape::Mesh => ("mesh", Capabilities::MESH),
                MeshShape::Sphere => ("sphere", Capabilities::MESH),
                MeshShape::Axis => ("axis", Capabilities::MESH),
            },
        };
        NodeClass { name, capabilities }
    }

    pub fn transform(&self) -> Option<&Transform> {
        match self {
            NodeKind::Translate(t)
            | NodeKind::Scale(t)
            | NodeKind::Rotate(t)
            | NodeKind::Position(t) => Some(t),
            NodeKind::Camera(c) => Some(&c.transform),
            _ => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        match self {
            NodeKind::Translate(t)
            | NodeKind::Scale(t)
            | NodeKind::Rotate(t)
            | NodeKind::Position(t) => Some(t),
            NodeKind::Camera(c) => Some(&mut c.transform),
            _ => None,
        }
    }

    pub fn drawable(&self) -> Option<&Drawable> {
        match self {
            NodeKind::Mesh(m) => Some(&m.drawable),
            _ => None,
        }
    }
}

/// Per-pass visit bookkeeping. A limit of 0 is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recursion {
    pub limit: u32,
    visits: u32,
    pass: u64,
}

impl Recursion {
    /// True once the node used up its visits in `pass`. Counters from an
    /// earlier pass are dropped first.
    pub fn exhausted(&mut self, pass: u64) -> bool {
        if self.pass != pass {
            self.pass = pass;
            self.visits = 0;
        }
        self.limit != 0 && self.visits >= self.limit
    }

    pub fn record(&mut self) {
        self.visits += 1;
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }
}

/// A vertex of the scene graph.
#[derive(Debug)]
pub struct Node {
    entity: EntityId,
    class: NodeClass,
    pub tag: String,
    pub hidden: bool,
    /// Freeze the local matrix; the world matrix still follows the parent.
    pub paused: bool,
    /// Visit the node but never its children.
    pub terminal: bool,
    pub recursion: Recursion,
    pub removal: RemovalPolicy,
    pub replace: ReplacePolicy,
    pub kind: NodeKind,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) outputs: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(entity: EntityId, tag: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            entity,
            class: kind.class(),
            tag: tag.into(),
            hidden: false,
            paused: false,
            terminal: false,
            recursion: Recursion::default(),
            removal: RemovalPolicy::default(),
            replace: ReplacePolicy::default(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn class(&self) -> NodeClass {
        self.class
    }

    pub fn edges(&self, relation: Relation) -> &[NodeId] {
        match relation {
            Relation::In => &self.inputs,
            Relation::Out => &self.outputs,
        }
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn children(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn is_leaf(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn relation_parses_both_cases() {
        assert_eq!(Relation::parse("in", "append"), Ok(Relation::In));
        assert_eq!(Relation::parse("OUT", "append"), Ok(Relation::Out));
    }

    #[test]
    fn bad_relation_names_direction_and_operation() {
        let err = Relation::parse("sideways", "prepend").unwrap_err();
        assert_eq!(
            err.to_string(),
            "`sideways` is not a direction for node relation `prepend`"
        );
    }

    #[test]
    fn recursion_resets_each_pass() {
        let mut r = Recursion {
            limit: 1,
            ..Recursion::default()
        };
        assert!(!r.exhausted(1));
        r.record();
        assert!(r.exhausted(1));
        assert!(!r.exhausted(2));
    }

    #[test]
    fn unlimited_recursion_never_exhausts() {
        let mut r = Recursion::default();
        for _ in 0..100 {
            assert!(!r.exhausted(1));
            r.record();
        }
        assert_eq!(r.visits(), 100);
    }

    #[test]
    fn class_resolved_from_kind() {
        let n = Node::new(
            EntityId(1),
            "t",
            NodeKind::Translate(Transform::from_translation(Vec3::X)),
        );
        assert_eq!(n.class().name, "translate");
        assert!(n.class().capabilities.contains(Capabilities::TRANSFORM));
        assert!(!n.class().capabilities.contains(Capabilities::CAMERA));

        let cam = NodeKind::Camera(Box::new(Camera::default_orthographic()));
        assert_eq!(
            cam.class().capabilities,
            Capabilities::TRANSFORM | Capabilities::CAMERA
        );
    }
}
