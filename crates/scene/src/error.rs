use arbor_resource::ResourceError;

use crate::camera::CameraError;
use crate::node::NodeId;

/// Structural failures of the node graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),
    #[error("`{direction}` is not a direction for node relation `{operation}`")]
    NotARelation { direction: String, operation: String },
    #[error("no node tagged {tag:?} below {node:?}")]
    TagNotFound { node: NodeId, tag: String },
    #[error("node {child:?} is not below {node:?}")]
    NotADescendant { node: NodeId, child: NodeId },
    #[error("traversal depth {depth} exceeded at node {node:?}")]
    DepthExceeded { node: NodeId, depth: usize },
}

/// Failures raised through the scripting surface.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("unknown node kind {0:?}")]
    UnknownKind(String),
    #[error("{class} has no property {property:?}")]
    UnknownProperty { class: &'static str, property: String },
    #[error("{class} has no method {method:?}")]
    UnknownMethod { class: &'static str, method: String },
    #[error("property {0:?} is read-only")]
    ReadOnly(String),
    #[error("argument {position}: expected {expected}, found {found}")]
    Argument {
        position: usize,
        expected: &'static str,
        found: String,
    },
    #[error("argument {position}: missing {expected}")]
    MissingArgument {
        position: usize,
        expected: &'static str,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Failures loading or applying a scene description, or tearing nodes down.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to read scene description {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML scene description: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON scene description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported scene description format {0:?}")]
    Format(String),
    #[error("in node {path}: {source}")]
    Node {
        path: String,
        #[source]
        source: BindingError,
    },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
