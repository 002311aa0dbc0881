//! Node operations over a [`NodeStore`].
//!
//! A node is addressed by its id and materialized from the store on every
//! access; [`NodeArena`] is the only place that relinks parent, sibling and
//! child ids. Children form a singly linked chain starting at the parent's
//! `child` link, and new children are prepended.

use std::sync::Arc;

use crate::calculator::{union_all, GeometryCalculator};
use crate::envelope::Envelope;
use crate::store::NodeStore;

use super::rtree_types::{
    ChildLink, ElementId, NodeId, NodeRecord, TreeError, TreeResult, NO_NODE,
};

/// Shape of a record as seen by the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A node without children.
    Empty,
    /// A node whose children are element records.
    Leaf,
    /// A node whose children are nodes.
    Internal,
    /// A stored element.
    Element,
}

/// Node graph held in a store, with the calculator used to maintain
/// boundaries.
#[derive(Debug)]
pub struct NodeArena<S: NodeStore> {
    store: S,
    calculator: Arc<dyn GeometryCalculator>,
}

impl<S: NodeStore> NodeArena<S> {
    pub fn new(store: S, calculator: Arc<dyn GeometryCalculator>) -> Self {
        Self { store, calculator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn calculator(&self) -> &dyn GeometryCalculator {
        self.calculator.as_ref()
    }

    pub(crate) fn set_calculator(&mut self, calculator: Arc<dyn GeometryCalculator>) {
        self.calculator = calculator;
    }

    pub fn max_elements(&self) -> usize {
        self.store.max_elements()
    }

    pub fn read(&mut self, id: NodeId) -> TreeResult<NodeRecord> {
        self.store.read_node(id)
    }

    pub fn write(&mut self, id: NodeId, record: &NodeRecord) -> TreeResult<()> {
        self.store.write_node(id, record)
    }

    /// Stores a new detached, childless node.
    pub fn create_node(&mut self) -> TreeResult<NodeId> {
        self.store.create_node(NodeRecord::empty())
    }

    pub fn delete(&mut self, id: NodeId) -> TreeResult<()> {
        self.store.delete_node(id)
    }

    pub fn kind(&mut self, id: NodeId) -> TreeResult<NodeKind> {
        let record = self.read(id)?;
        self.kind_of(&record)
    }

    fn kind_of(&mut self, record: &NodeRecord) -> TreeResult<NodeKind> {
        match record.child {
            ChildLink::Element(_) => Ok(NodeKind::Element),
            ChildLink::None => Ok(NodeKind::Empty),
            ChildLink::Node(first) => {
                if self.read(first)?.is_element() {
                    Ok(NodeKind::Leaf)
                } else {
                    Ok(NodeKind::Internal)
                }
            }
        }
    }

    pub fn is_leaf(&mut self, id: NodeId) -> TreeResult<bool> {
        Ok(self.kind(id)? == NodeKind::Leaf)
    }

    pub fn is_empty(&mut self, id: NodeId) -> TreeResult<bool> {
        Ok(self.read(id)?.child_count == 0)
    }

    /// Whether the node holds `max_elements` children or more.
    pub fn is_full(&mut self, id: NodeId) -> TreeResult<bool> {
        Ok(self.read(id)?.child_count as usize >= self.max_elements())
    }

    pub fn child_count(&mut self, id: NodeId) -> TreeResult<usize> {
        Ok(self.read(id)?.child_count as usize)
    }

    pub fn parent(&mut self, id: NodeId) -> TreeResult<NodeId> {
        Ok(self.read(id)?.parent)
    }

    /// Child ids in chain order.
    pub fn children(&mut self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let record = self.read(id)?;
        let mut children = Vec::with_capacity(record.child_count as usize);
        let mut next = record.first_child().unwrap_or(NO_NODE);
        while next != NO_NODE {
            if children.len() >= record.child_count as usize {
                return Err(TreeError::InvalidState(format!(
                    "sibling chain of node {} is longer than its child count {}",
                    id, record.child_count
                )));
            }
            children.push(next);
            next = self.read(next)?.sibling;
        }
        Ok(children)
    }

    /// The `index`-th child in chain order.
    pub fn child_at(&mut self, id: NodeId, index: usize) -> TreeResult<NodeId> {
        let count = self.read(id)?.child_count as usize;
        if index >= count {
            return Err(TreeError::OutOfRange { index, count });
        }
        self.children(id)?
            .get(index)
            .copied()
            .ok_or(TreeError::OutOfRange { index, count })
    }

    /// Element entries of a leaf: element record id, element id, envelope.
    pub fn elements(&mut self, id: NodeId) -> TreeResult<Vec<(NodeId, ElementId, Envelope)>> {
        let mut entries = Vec::new();
        for child in self.children(id)? {
            let record = self.read(child)?;
            match (record.element_id(), record.boundary) {
                (Some(element), Some(env)) => entries.push((child, element, env)),
                _ => {
                    return Err(TreeError::InvalidState(format!(
                        "node {} is not a leaf",
                        id
                    )))
                }
            }
        }
        Ok(entries)
    }

    /// Covering envelope of the node. An unset boundary is rebuilt from the
    /// children and stored again before it is returned. `None` only for an
    /// empty node.
    pub fn boundary(&mut self, id: NodeId) -> TreeResult<Option<Envelope>> {
        let record = self.read(id)?;
        if record.boundary.is_some() {
            return Ok(record.boundary);
        }
        if record.is_element() {
            return Err(TreeError::InvalidState(format!(
                "element record {} has no envelope",
                id
            )));
        }
        if record.child_count == 0 {
            return Ok(None);
        }
        self.recompute_boundary(id)
    }

    /// Replaces the node's boundary. Unsetting it invalidates every ancestor,
    /// whose boundaries are rebuilt on their next read.
    pub fn set_bound(&mut self, id: NodeId, bound: Option<Envelope>) -> TreeResult<()> {
        let mut record = self.read(id)?;
        let unset = bound.is_none();
        record.boundary = bound;
        self.write(id, &record)?;
        if unset {
            self.invalidate_upward(record.parent)?;
        }
        Ok(())
    }

    /// Clears the cached boundary of `id` and of its ancestors, stopping at
    /// the first one already unset.
    pub fn invalidate_upward(&mut self, id: NodeId) -> TreeResult<()> {
        let mut current = id;
        while current != NO_NODE {
            let mut record = self.read(current)?;
            if record.boundary.is_none() {
                break;
            }
            record.boundary = None;
            self.write(current, &record)?;
            current = record.parent;
        }
        Ok(())
    }

    /// Rebuilds the boundary of `id` from its children and stores it.
    pub fn recompute_boundary(&mut self, id: NodeId) -> TreeResult<Option<Envelope>> {
        let mut bounds = Vec::new();
        for child in self.children(id)? {
            if let Some(env) = self.boundary(child)? {
                bounds.push(env);
            }
        }
        let boundary = union_all(self.calculator(), &bounds);
        let mut record = self.read(id)?;
        if record.boundary != boundary {
            record.boundary = boundary.clone();
            self.write(id, &record)?;
        }
        Ok(boundary)
    }

    /// Grows the boundary of `id` to cover `env`.
    pub fn extend_boundary(&mut self, id: NodeId, env: &Envelope) -> TreeResult<()> {
        let current = self.boundary(id)?;
        let grown = match &current {
            Some(b) => self.calculator.union(b, env),
            None => env.clone(),
        };
        if current.as_ref() != Some(&grown) {
            let mut record = self.read(id)?;
            record.boundary = Some(grown);
            self.write(id, &record)?;
        }
        Ok(())
    }

    /// Links the detached node `child` under `parent`.
    ///
    /// Fails with `InvalidState` when `parent` is an element, when `child` is
    /// already attached, or when the child would mix element records and
    /// nodes under one parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> TreeResult<()> {
        let mut parent_record = self.read(parent)?;
        let mut child_record = self.read(child)?;
        if parent == child {
            return Err(TreeError::InvalidState(format!(
                "node {} cannot be its own child",
                parent
            )));
        }
        if child_record.parent != NO_NODE {
            return Err(TreeError::InvalidState(format!(
                "node {} is already a child of node {}",
                child, child_record.parent
            )));
        }
        self.check_content(parent, &parent_record, child_record.is_element())?;

        let was_empty = parent_record.child_count == 0;
        child_record.parent = parent;
        child_record.sibling = parent_record.first_child().unwrap_or(NO_NODE);
        parent_record.child = ChildLink::Node(child);
        parent_record.child_count += 1;
        parent_record.boundary = match (&parent_record.boundary, &child_record.boundary) {
            (Some(b), Some(c)) => Some(self.calculator.union(b, c)),
            (None, Some(c)) if was_empty => Some(c.clone()),
            (current, _) => current.clone(),
        };

        self.write(child, &child_record)?;
        self.write(parent, &parent_record)
    }

    /// Stores a new element record under `leaf`, returning the record id.
    pub fn add_element(
        &mut self,
        leaf: NodeId,
        element: ElementId,
        env: Envelope,
    ) -> TreeResult<NodeId> {
        let record = self.read(leaf)?;
        self.check_content(leaf, &record, true)?;
        let id = self.store.create_node(NodeRecord::element(element, env))?;
        self.add_child(leaf, id)?;
        Ok(id)
    }

    fn check_content(
        &mut self,
        id: NodeId,
        record: &NodeRecord,
        adding_element: bool,
    ) -> TreeResult<()> {
        match self.kind_of(record)? {
            NodeKind::Element => Err(TreeError::InvalidState(format!(
                "element record {} cannot hold children",
                id
            ))),
            NodeKind::Leaf if !adding_element => Err(TreeError::InvalidState(format!(
                "node {} holds elements and cannot take a child node",
                id
            ))),
            NodeKind::Internal if adding_element => Err(TreeError::InvalidState(format!(
                "node {} holds child nodes and cannot take an element",
                id
            ))),
            _ => Ok(()),
        }
    }

    /// Unlinks `child` from `parent` and rebuilds the parent's boundary from
    /// the remaining children. Returns the detached record.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> TreeResult<NodeRecord> {
        let detached = self.unlink(parent, child)?;
        self.recompute_boundary(parent)?;
        Ok(detached)
    }

    /// Removes the `index`-th element of `leaf` and deletes its record.
    pub fn remove_object(
        &mut self,
        leaf: NodeId,
        index: usize,
    ) -> TreeResult<(ElementId, Envelope)> {
        let child = self.child_at(leaf, index)?;
        let record = self.read(child)?;
        let (element, env) = match (record.element_id(), record.boundary) {
            (Some(element), Some(env)) => (element, env),
            _ => {
                return Err(TreeError::InvalidState(format!(
                    "node {} holds child nodes, not elements",
                    leaf
                )))
            }
        };
        self.remove_child(leaf, child)?;
        self.delete(child)?;
        Ok((element, env))
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) -> TreeResult<NodeRecord> {
        let mut parent_record = self.read(parent)?;
        let mut child_record = self.read(child)?;
        if child_record.parent != parent {
            return Err(TreeError::InvalidState(format!(
                "node {} is not a child of node {}",
                child, parent
            )));
        }

        if parent_record.first_child() == Some(child) {
            parent_record.child = if child_record.sibling == NO_NODE {
                ChildLink::None
            } else {
                ChildLink::Node(child_record.sibling)
            };
        } else {
            let mut previous = parent_record.first_child().unwrap_or(NO_NODE);
            loop {
                if previous == NO_NODE {
                    return Err(TreeError::InvalidState(format!(
                        "node {} is missing from the chain of node {}",
                        child, parent
                    )));
                }
                let mut previous_record = self.read(previous)?;
                if previous_record.sibling == child {
                    previous_record.sibling = child_record.sibling;
                    self.write(previous, &previous_record)?;
                    break;
                }
                previous = previous_record.sibling;
            }
        }
        parent_record.child_count = parent_record.child_count.saturating_sub(1);
        self.write(parent, &parent_record)?;

        child_record.parent = NO_NODE;
        child_record.sibling = NO_NODE;
        self.write(child, &child_record)?;
        Ok(child_record)
    }

    /// Detaches every child of `id` at once, leaving it empty with an unset
    /// boundary. Returns the former children in chain order.
    pub fn detach_all(&mut self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let children = self.children(id)?;
        for &child in &children {
            let mut record = self.read(child)?;
            record.parent = NO_NODE;
            record.sibling = NO_NODE;
            self.write(child, &record)?;
        }
        let mut record = self.read(id)?;
        record.child = ChildLink::None;
        record.child_count = 0;
        record.boundary = None;
        self.write(id, &record)?;
        Ok(children)
    }
}
