//! Object-level index: a tree paired with a [`TreeElementMapper`].

use std::marker::PhantomData;

use log::debug;

use crate::envelope::Envelope;
use crate::filter::SpatialPredicate;
use crate::mapper::TreeElementMapper;
use crate::store::NodeStore;
use crate::tree::rtree_impl::RTree;
use crate::tree::rtree_types::{ElementId, TreeError, TreeResult};

/// Indexes caller objects by envelope. Identifiers and envelopes come from
/// the mapper; the tree only ever sees ids.
pub struct ElementIndex<E, M, S>
where
    M: TreeElementMapper<E>,
    S: NodeStore,
{
    tree: RTree<S>,
    mapper: M,
    _element: PhantomData<fn() -> E>,
}

impl<E, M, S> ElementIndex<E, M, S>
where
    M: TreeElementMapper<E>,
    S: NodeStore,
{
    pub fn new(tree: RTree<S>, mapper: M) -> Self {
        Self {
            tree,
            mapper,
            _element: PhantomData,
        }
    }

    pub fn tree(&self) -> &RTree<S> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut RTree<S> {
        &mut self.tree
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn insert(&mut self, element: &E) -> TreeResult<()> {
        let id = self.mapper.tree_identifier(element)?;
        let envelope = self.mapper.envelope(element)?;
        self.tree.insert(id, envelope)
    }

    /// Inserts in order, stopping at the first failure.
    pub fn insert_all<'e, I>(&mut self, elements: I) -> TreeResult<usize>
    where
        E: 'e,
        I: IntoIterator<Item = &'e E>,
    {
        let mut inserted = 0;
        for element in elements {
            self.insert(element)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Removes `element`, returning false when it was not indexed.
    pub fn remove(&mut self, element: &E) -> TreeResult<bool> {
        let id = match self.mapper.existing_identifier(element)? {
            Some(id) => id,
            None => return Ok(false),
        };
        let envelope = self.mapper.envelope(element)?;
        if !self.tree.remove(id, &envelope)? {
            return Ok(false);
        }
        // the same object may have been inserted more than once
        if !self.tree.search(&envelope)?.contains(&id) {
            self.mapper.remove_tree_identifier(element)?;
        }
        Ok(true)
    }

    /// Objects whose envelope intersects `query`.
    pub fn search(&mut self, query: &Envelope) -> TreeResult<Vec<E>> {
        let ids = self.tree.search(query)?;
        self.resolve(ids)
    }

    /// Objects satisfying `predicate` against `query`, refined on the
    /// envelopes the mapper reports.
    pub fn search_with(
        &mut self,
        predicate: SpatialPredicate,
        query: &Envelope,
    ) -> TreeResult<Vec<E>> {
        let mapper = &self.mapper;
        let ids = self.tree.search_predicate_with(predicate, query, |id| {
            match mapper.object_from_tree_identifier(id)? {
                Some(element) => mapper.envelope(&element).map(Some),
                None => Ok(None),
            }
        })?;
        self.resolve(ids)
    }

    fn resolve(&self, ids: Vec<ElementId>) -> TreeResult<Vec<E>> {
        ids.into_iter()
            .map(|id| {
                self.mapper
                    .object_from_tree_identifier(id)?
                    .ok_or_else(|| TreeError::Mapper(format!("no object bound to id {}", id)))
            })
            .collect()
    }

    /// Empties both the tree and the mapper.
    pub fn clear(&mut self) -> TreeResult<()> {
        self.tree.clear()?;
        self.mapper.clear()?;
        debug!("Cleared element index");
        Ok(())
    }

    pub fn close(&mut self) -> TreeResult<()> {
        self.tree.close()?;
        self.mapper.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tree.is_closed()
    }
}
