use std::fmt::Write as _;

use arbor_common::{Color, EntityId, LightKind, Transform};
use arbor_device::{DrawMode, GraphicsDevice};
use arbor_render::{Drawable, RenderSettings, Renderer};
use arbor_resource::{Material, ResourcePool, SphereParams, generators};
use arbor_shader::ShaderCache;
use glam::{Mat4, Quat, Vec3};

use crate::camera::Camera;
use crate::error::{GraphError, SceneError};
use crate::graph::Graph;
use crate::light::{Light, LightSlots};
use crate::node::{MeshNode, MeshShape, NodeId, NodeKind, Relation, RemovalPolicy};
use crate::traversal::{FrameReport, Traversal};

/// Root container: attached top-level nodes, the renderer, shared resources
/// and light slots.
#[derive(Debug)]
pub struct Scene<D: GraphicsDevice> {
    graph: Graph,
    resources: ResourcePool,
    renderer: Renderer<D>,
    roots: Vec<NodeId>,
    lights: LightSlots,
    pass: u64,
    dirty: bool,
    initialized: bool,
}

impl<D: GraphicsDevice> Scene<D> {
    pub fn new(renderer: Renderer<D>) -> Self {
        Self {
            graph: Graph::new(),
            resources: ResourcePool::new(),
            renderer,
            roots: Vec::new(),
            lights: LightSlots::default(),
            pass: 0,
            dirty: false,
            initialized: false,
        }
    }

    /// Scene over `device` with built-in shaders and default settings.
    pub fn with_device(device: D) -> Self {
        Self::new(Renderer::new(
            device,
            ShaderCache::default(),
            RenderSettings::default(),
        ))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        self.dirty = true;
        &mut self.graph
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourcePool {
        &mut self.resources
    }

    pub fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<D> {
        &mut self.renderer
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Structure changed since the last render.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add(&mut self, tag: impl Into<String>, kind: NodeKind) -> NodeId {
        self.graph.insert(tag, kind)
    }

    pub fn dummy(&mut self, tag: &str) -> NodeId {
        self.add(tag, NodeKind::Dummy)
    }

    pub fn root(&mut self, tag: &str) -> NodeId {
        self.add(tag, NodeKind::Root)
    }

    pub fn group(&mut self, tag: &str, children: &[NodeId]) -> Result<NodeId, GraphError> {
        self.graph.check_all(children)?;
        let id = self.add(tag, NodeKind::Group);
        self.graph.append(id, Relation::Out, children)?;
        Ok(id)
    }

    pub fn translate(&mut self, tag: &str, v: Vec3) -> NodeId {
        self.add(tag, NodeKind::Translate(Transform::from_translation(v)))
    }

    pub fn scale(&mut self, tag: &str, v: Vec3) -> NodeId {
        self.add(tag, NodeKind::Scale(Transform::from_scale(v)))
    }

    pub fn rotate(&mut self, tag: &str, q: Quat) -> NodeId {
        self.add(tag, NodeKind::Rotate(Transform::from_rotation(q)))
    }

    pub fn position(&mut self, tag: &str, transform: Transform) -> NodeId {
        self.add(tag, NodeKind::Position(transform))
    }

    pub fn camera(&mut self, tag: &str, camera: Camera) -> NodeId {
        self.add(tag, NodeKind::Camera(Box::new(camera)))
    }

    /// Light node in the next free slot of its kind.
    pub fn light(&mut self, tag: &str, kind: LightKind, color: Color, intensity: f32) -> NodeId {
        let slot = self.lights.allocate(kind);
        self.dirty = true;
        self.add(tag, NodeKind::Light(Light::new(kind, slot, color, intensity)))
    }

    pub fn mesh(&mut self, tag: &str, drawable: Drawable) -> NodeId {
        self.add(
            tag,
            NodeKind::Mesh(MeshNode {
                shape: MeshShape::Mesh,
                drawable,
            }),
        )
    }

    pub fn sphere(&mut self, tag: &str, params: &SphereParams, material: Material) -> NodeId {
        let geometry = self.resources.add_geometry(generators::sphere(params));
        let material = self.resources.add_material(material);
        let drawable = Drawable::new(geometry, Some(material), DrawMode::Triangles);
        self.add(
            tag,
            NodeKind::Mesh(MeshNode {
                shape: MeshShape::Sphere,
                drawable,
            }),
        )
    }

    pub fn axis(&mut self, tag: &str, size: f32) -> NodeId {
        let geometry = self.resources.add_geometry(generators::axis(size));
        let material = self.resources.add_material(Material::basic());
        let drawable = Drawable::new(geometry, Some(material), DrawMode::Lines);
        self.add(
            tag,
            NodeKind::Mesh(MeshNode {
                shape: MeshShape::Axis,
                drawable,
            }),
        )
    }

    /// Append top-level nodes. Nothing is attached if any node is unknown.
    pub fn attach(&mut self, nodes: &[NodeId]) -> Result<(), GraphError> {
        self.graph.check_all(nodes)?;
        self.roots.extend_from_slice(nodes);
        self.dirty = true;
        tracing::debug!(count = nodes.len(), roots = self.roots.len(), "attached");
        Ok(())
    }

    /// Drop top-level nodes. The nodes themselves stay alive.
    pub fn detach(&mut self, nodes: &[NodeId]) {
        self.roots.retain(|r| !nodes.contains(r));
        self.dirty = true;
        tracing::debug!(count = nodes.len(), roots = self.roots.len(), "detached");
    }

    /// Detach every top-level node and free all light slots.
    pub fn clear(&mut self) {
        self.roots.clear();
        self.lights.reset();
        self.renderer.clear_lights();
        self.dirty = true;
    }

    /// Leaves reachable from the attached nodes.
    pub fn count(&self) -> usize {
        self.roots
            .iter()
            .map(|r| self.graph.count_leaves(*r))
            .sum()
    }

    /// Distinct nodes reachable from the attached nodes.
    pub fn node_count(&self) -> usize {
        self.graph.reachable(&self.roots).len()
    }

    /// Detach and free a node, closing its resources unless its removal
    /// policy keeps them.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), SceneError> {
        let mut node = self.graph.destroy(id)?;
        self.roots.retain(|r| *r != id);
        self.dirty = true;
        if let NodeKind::Light(light) = &node.kind {
            self.lights.release(light.kind(), light.slot());
        }
        if node.removal == RemovalPolicy::ReleaseOwned {
            if let NodeKind::Mesh(mesh) = &mut node.kind {
                mesh.drawable
                    .close(self.renderer.device_mut(), &mut self.resources)?;
            }
        }
        Ok(())
    }

    /// Destroy the node carrying `entity`. Returns false when none does.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<bool, SceneError> {
        match self.graph.find_entity(entity) {
            Some(id) => self.destroy(id).map(|()| true),
            None => Ok(false),
        }
    }

    /// Run one traversal pass over the attached nodes and draw them.
    pub fn render(&mut self) -> FrameReport {
        let _span = tracing::info_span!("render_pass", pass = self.pass + 1).entered();
        if !self.initialized {
            self.renderer.initialize();
            self.initialized = true;
        }
        self.pass += 1;
        let compiled = self.renderer.shaders().generated();
        self.renderer.set_light_counts(self.lights.counts());
        self.renderer.begin_frame();

        let mut traversal = Traversal {
            graph: &mut self.graph,
            renderer: &mut self.renderer,
            pool: &mut self.resources,
            pass: self.pass,
            report: FrameReport::default(),
        };
        for root in &self.roots {
            traversal.visit(*root, &Mat4::IDENTITY, 0);
        }
        let mut report = traversal.report;

        let stats = self.renderer.end_frame();
        report.frame = stats.frame;
        report.draw_calls = stats.draw_calls;
        report.programs_compiled = self.renderer.shaders().generated() - compiled;
        self.dirty = false;
        tracing::debug!(
            frame = report.frame,
            visited = report.visited.len(),
            draws = report.draw_calls,
            compiled = report.programs_compiled,
            errors = report.errors.len(),
            "pass complete"
        );
        report
    }

    /// Indented outline of the attached forest, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            let mut path = Vec::new();
            self.outline_node(*root, 0, &mut path, &mut out);
        }
        out
    }

    fn outline_node(&self, id: NodeId, depth: usize, path: &mut Vec<NodeId>, out: &mut String) {
        let Ok(node) = self.graph.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let mut flags = String::new();
        if node.hidden {
            flags.push_str(" hidden");
        }
        if node.terminal {
            flags.push_str(" terminal");
        }
        if node.recursion.limit != 0 {
            let _ = write!(flags, " limit={}", node.recursion.limit);
        }
        if path.contains(&id) {
            let _ = writeln!(out, "{indent}{} {:?} {} (cycle)", node.class().name, node.tag, node.entity());
            return;
        }
        let _ = writeln!(
            out,
            "{indent}{} {:?} {}{flags}",
            node.class().name,
            node.tag,
            node.entity()
        );
        path.push(id);
        for child in node.children() {
            self.outline_node(*child, depth + 1, path, out);
        }
        path.pop();
    }
}
