//! Lazy depth-first search.

use crate::envelope::Envelope;
use crate::store::NodeStore;

use super::node::NodeArena;
use super::rtree_types::{ElementId, NodeId, TreeResult};

/// Pull-based traversal yielding the ids of stored elements whose envelope
/// intersects the query (edge-inclusive).
///
/// The pending path lives on an explicit stack, so consumption can stop and
/// resume at any point. Subtrees whose boundary misses the query are never
/// read. The first store error is yielded once and ends the iteration.
pub struct SearchIter<'a, S: NodeStore> {
    arena: &'a mut NodeArena<S>,
    query: Envelope,
    stack: Vec<NodeId>,
    failed: bool,
}

impl<'a, S: NodeStore> SearchIter<'a, S> {
    pub(crate) fn new(arena: &'a mut NodeArena<S>, query: Envelope, root: Option<NodeId>) -> Self {
        Self {
            arena,
            query,
            stack: root.into_iter().collect(),
            failed: false,
        }
    }

    pub fn query(&self) -> &Envelope {
        &self.query
    }

    /// Next matching element with its stored envelope.
    pub fn next_entry(&mut self) -> Option<TreeResult<(ElementId, Envelope)>> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(found) => found.map(Ok),
            Err(e) => {
                self.failed = true;
                self.stack.clear();
                Some(Err(e))
            }
        }
    }

    fn advance(&mut self) -> TreeResult<Option<(ElementId, Envelope)>> {
        while let Some(id) = self.stack.pop() {
            let boundary = match self.arena.boundary(id)? {
                Some(boundary) => boundary,
                None => continue,
            };
            if !self.arena.calculator().intersects(&boundary, &self.query, true) {
                continue;
            }

            let record = self.arena.read(id)?;
            if let Some(element) = record.element_id() {
                return Ok(Some((element, boundary)));
            }
            self.stack.extend(self.arena.children(id)?);
        }
        Ok(None)
    }
}

impl<S: NodeStore> Iterator for SearchIter<'_, S> {
    type Item = TreeResult<ElementId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|entry| entry.map(|(id, _)| id))
    }
}
