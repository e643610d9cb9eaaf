use arbor_common::Transform;
use arbor_device::GraphicsDevice;
use arbor_render::{RenderError, Renderer};
use arbor_resource::ResourcePool;
use glam::Mat4;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind};

/// A node visit that failed during a pass.
#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("node {node:?} ({tag:?}) failed to render: {source}")]
    Render {
        node: NodeId,
        tag: String,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Outcome of one traversal pass.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    /// Nodes whose callback ran, in visit order.
    pub visited: Vec<NodeId>,
    pub draw_calls: usize,
    pub programs_compiled: usize,
    pub errors: Vec<VisitError>,
}

impl FrameReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Depth-first, pre-order walk of one pass. The accumulated world matrix
/// travels down as an argument.
pub(crate) struct Traversal<'a, D: GraphicsDevice> {
    pub graph: &'a mut Graph,
    pub renderer: &'a mut Renderer<D>,
    pub pool: &'a mut ResourcePool,
    pub pass: u64,
    pub report: FrameReport,
}

impl<D: GraphicsDevice> Traversal<'_, D> {
    pub fn visit(&mut self, id: NodeId, parent: &Mat4, depth: usize) {
        if depth > self.renderer.settings().max_depth {
            tracing::warn!(?id, depth, "traversal too deep, skipping subtree");
            self.report
                .errors
                .push(GraphError::DepthExceeded { node: id, depth }.into());
            return;
        }
        let node = match self.graph.get_mut(id) {
            Ok(node) => node,
            Err(e) => {
                self.report.errors.push(e.into());
                return;
            }
        };
        if node.recursion.exhausted(self.pass) {
            return;
        }

        let world = if node.hidden {
            *parent
        } else {
            node.recursion.record();
            self.report.visited.push(id);
            match execute(node, parent, self.renderer, self.pool) {
                Ok(world) => world,
                Err(source) => {
                    tracing::error!(?id, tag = %node.tag, error = %source, "draw failed");
                    self.report.errors.push(VisitError::Render {
                        node: id,
                        tag: node.tag.clone(),
                        source,
                    });
                    *parent
                }
            }
        };

        if node.terminal {
            return;
        }
        let children = node.outputs.clone();
        for child in children {
            self.visit(child, &world, depth + 1);
        }
    }
}

fn place(t: &mut Transform, parent: &Mat4, paused: bool) -> Mat4 {
    if paused {
        t.compose_world(parent)
    } else {
        t.update_matrix_world(parent)
    }
}

/// Run a node's callback. Returns the world matrix its children inherit.
fn execute<D: GraphicsDevice>(
    node: &mut Node,
    parent: &Mat4,
    renderer: &mut Renderer<D>,
    pool: &mut ResourcePool,
) -> Result<Mat4, RenderError> {
    let paused = node.paused;
    match &mut node.kind {
        NodeKind::Dummy | NodeKind::Root | NodeKind::Group => Ok(*parent),
        NodeKind::Translate(t)
        | NodeKind::Scale(t)
        | NodeKind::Rotate(t)
        | NodeKind::Position(t) => Ok(place(t, parent, paused)),
        NodeKind::Camera(camera) => {
            let world = place(&mut camera.transform, parent, paused);
            renderer.set_view(camera.view_matrix(), camera.transform.world_translation());
            renderer.set_projection(camera.projection_matrix());
            Ok(world)
        }
        NodeKind::Light(light) => {
            renderer.set_light(light.kind(), light.slot(), &light.uniform_block(parent));
            Ok(*parent)
        }
        NodeKind::Mesh(mesh) => {
            mesh.drawable.draw(renderer, pool, parent)?;
            Ok(*parent)
        }
    }
}
