use std::collections::BTreeSet;
use std::ops::ControlFlow;

use arbor_common::{EntityId, EntityIds};
use slotmap::SlotMap;

use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeKind, Relation, ReplacePolicy};

/// Arena of nodes connected by symmetric parent/child edges.
///
/// Every child edge `a -> b` has a matching parent edge on `b`. Cycles and
/// shared children are allowed; walks guard against revisiting the current
/// path.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    ids: EntityIds,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, kind: NodeKind) -> NodeId {
        let node = Node::new(self.ids.next(), tag, kind);
        let id = self.nodes.insert(node);
        tracing::trace!(?id, "node created");
        id
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find_entity(&self, entity: EntityId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.entity() == entity)
            .map(|(id, _)| id)
    }

    pub(crate) fn check_all(&self, ids: &[NodeId]) -> Result<(), GraphError> {
        match ids.iter().find(|id| !self.nodes.contains_key(**id)) {
            Some(missing) => Err(GraphError::NodeNotFound(*missing)),
            None => Ok(()),
        }
    }

    /// Add `others` after the existing edges. Out edges also register `id`
    /// as a parent of each added child.
    pub fn append(
        &mut self,
        id: NodeId,
        relation: Relation,
        others: &[NodeId],
    ) -> Result<(), GraphError> {
        self.link(id, relation, others, false)
    }

    /// Like [`Graph::append`] but places `others`, in order, before the
    /// existing edges.
    pub fn prepend(
        &mut self,
        id: NodeId,
        relation: Relation,
        others: &[NodeId],
    ) -> Result<(), GraphError> {
        self.link(id, relation, others, true)
    }

    fn link(
        &mut self,
        id: NodeId,
        relation: Relation,
        others: &[NodeId],
        front: bool,
    ) -> Result<(), GraphError> {
        self.get(id)?;
        self.check_all(others)?;

        let node = self.get_mut(id)?;
        let edges = match relation {
            Relation::In => &mut node.inputs,
            Relation::Out => &mut node.outputs,
        };
        if front {
            edges.splice(0..0, others.iter().copied());
        } else {
            edges.extend_from_slice(others);
        }

        if relation == Relation::Out {
            for other in others {
                self.get_mut(*other)?.inputs.push(id);
            }
        }
        tracing::debug!(?id, %relation, count = others.len(), front, "nodes linked");
        Ok(())
    }

    /// Detach `id` from every parent. Its own children stay attached to it.
    pub fn remove(&mut self, id: NodeId) -> Result<(), GraphError> {
        let parents = std::mem::take(&mut self.get_mut(id)?.inputs);
        for parent in parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.outputs.retain(|c| *c != id);
            }
        }
        tracing::debug!(?id, "node detached");
        Ok(())
    }

    /// Put `with` in `id`'s place under every parent of `id`.
    pub fn replace(&mut self, id: NodeId, with: NodeId) -> Result<(), GraphError> {
        self.get(with)?;
        if id == with {
            self.get(id)?;
            return Ok(());
        }
        let node = self.get_mut(id)?;
        let parents = std::mem::take(&mut node.inputs);
        let adopt = node.replace == ReplacePolicy::AdoptChildren;
        let children = if adopt {
            std::mem::take(&mut node.outputs)
        } else {
            Vec::new()
        };

        let mut adopted_parents = Vec::new();
        for parent in parents {
            let Some(p) = self.nodes.get_mut(parent) else {
                continue;
            };
            for edge in p.outputs.iter_mut().filter(|c| **c == id) {
                *edge = with;
                adopted_parents.push(parent);
            }
        }
        let target = self.get_mut(with)?;
        target.inputs.extend(adopted_parents);
        target.outputs.extend_from_slice(&children);

        for child in children {
            if let Some(c) = self.nodes.get_mut(child) {
                for edge in c.inputs.iter_mut().filter(|p| **p == id) {
                    *edge = with;
                }
            }
        }
        tracing::debug!(?id, ?with, adopt, "node replaced");
        Ok(())
    }

    /// Pre-order walk from `id` along `relation`, `id` included. A node
    /// already on the current path is skipped, so shared children are seen
    /// once per path and cycles end.
    pub fn iter<F>(&self, id: NodeId, relation: Relation, mut visit: F) -> Result<(), GraphError>
    where
        F: FnMut(NodeId, &Node) -> ControlFlow<()>,
    {
        self.get(id)?;
        let mut path = Vec::new();
        let _ = self.walk(id, relation, &mut path, &mut visit);
        Ok(())
    }

    fn walk<F>(
        &self,
        id: NodeId,
        relation: Relation,
        path: &mut Vec<NodeId>,
        visit: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &Node) -> ControlFlow<()>,
    {
        if path.contains(&id) {
            return ControlFlow::Continue(());
        }
        let Some(node) = self.nodes.get(id) else {
            return ControlFlow::Continue(());
        };
        if visit(id, node).is_break() {
            return ControlFlow::Break(());
        }
        path.push(id);
        for next in node.edges(relation) {
            if self.walk(*next, relation, path, visit).is_break() {
                path.pop();
                return ControlFlow::Break(());
            }
        }
        path.pop();
        ControlFlow::Continue(())
    }

    /// First node below `id` tagged `tag`, `id` itself excluded.
    pub fn find_by_tag(&self, id: NodeId, tag: &str) -> Result<NodeId, GraphError> {
        let mut found = None;
        self.iter(id, Relation::Out, |n, node| {
            if n != id && node.tag == tag {
                found = Some(n);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        found.ok_or_else(|| GraphError::TagNotFound {
            node: id,
            tag: tag.to_string(),
        })
    }

    /// Detach the first node below `id` tagged `tag` and return it.
    pub fn remove_by_tag(&mut self, id: NodeId, tag: &str) -> Result<NodeId, GraphError> {
        let found = self.find_by_tag(id, tag)?;
        self.remove(found)?;
        Ok(found)
    }

    /// Detach `child` if it lies below `id`.
    pub fn remove_descendant(&mut self, id: NodeId, child: NodeId) -> Result<(), GraphError> {
        let mut below = false;
        self.iter(id, Relation::Out, |n, _| {
            if n == child && n != id {
                below = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        if !below {
            return Err(GraphError::NotADescendant { node: id, child });
        }
        self.remove(child)
    }

    /// Leaves reachable through child edges, counted once per path.
    pub fn count_leaves(&self, id: NodeId) -> usize {
        let mut path = Vec::new();
        self.leaves(id, &mut path)
    }

    fn leaves(&self, id: NodeId, path: &mut Vec<NodeId>) -> usize {
        if path.contains(&id) {
            return 0;
        }
        let Some(node) = self.nodes.get(id) else {
            return 0;
        };
        if node.is_leaf() {
            return 1;
        }
        path.push(id);
        let total = node.outputs.iter().map(|c| self.leaves(*c, path)).sum();
        path.pop();
        total
    }

    /// Distinct nodes reachable from `roots` through child edges.
    pub fn reachable(&self, roots: &[NodeId]) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.outputs.iter().copied());
            }
        }
        seen.retain(|id| self.nodes.contains_key(*id));
        seen
    }

    /// Detach `id` from parents and children and free its slot. The node is
    /// handed back so the caller can close what it owns.
    pub fn destroy(&mut self, id: NodeId) -> Result<Node, GraphError> {
        self.remove(id)?;
        let node = self.nodes.remove(id).ok_or(GraphError::NodeNotFound(id))?;
        for child in &node.outputs {
            if let Some(c) = self.nodes.get_mut(*child) {
                c.inputs.retain(|p| *p != id);
            }
        }
        tracing::debug!(?id, tag = %node.tag, "node destroyed");
        Ok(node)
    }
}
