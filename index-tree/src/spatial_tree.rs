//! Thread-shareable tree interface.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::envelope::Envelope;
use crate::filter::SpatialPredicate;
use crate::store::NodeStore;
use crate::tree::rtree_impl::RTree;
use crate::tree::rtree_types::{ElementId, TreeResult, TreeStats};

/// Spatial index operations through a shared reference.
pub trait SpatialTree: Send + Sync {
    /// Adds a key to the tree.
    fn add(&self, key: &Envelope, id: ElementId) -> TreeResult<()>;

    /// Removes a key from the tree.
    fn remove(&self, key: &Envelope, id: ElementId) -> TreeResult<bool>;

    /// Ids whose envelope intersects the key.
    fn find_intersecting_keys(&self, key: &Envelope) -> TreeResult<Vec<ElementId>>;

    /// Ids whose envelope lies inside the key.
    fn find_contained_keys(&self, key: &Envelope) -> TreeResult<Vec<ElementId>> {
        self.find_matching_keys(SpatialPredicate::Within, key)
    }

    /// Ids whose envelope satisfies `predicate` against the key.
    fn find_matching_keys(
        &self,
        predicate: SpatialPredicate,
        key: &Envelope,
    ) -> TreeResult<Vec<ElementId>>;

    /// Number of stored elements.
    fn size(&self) -> u64;

    fn extent(&self) -> TreeResult<Option<Envelope>>;

    /// Closes the tree, flushing all pending changes.
    fn close(&self) -> TreeResult<()>;

    /// Removes every element.
    fn clear(&self) -> TreeResult<()>;
}

/// An [`RTree`] behind a mutex. Clones share the same tree; every call holds
/// the lock for its whole duration.
pub struct SharedRTree<S: NodeStore> {
    inner: Arc<Mutex<RTree<S>>>,
}

impl<S: NodeStore> Clone for SharedRTree<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: NodeStore> SharedRTree<S> {
    pub fn new(tree: RTree<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    /// Runs `f` with exclusive access to the tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&mut RTree<S>) -> R) -> R {
        let mut tree = self.inner.lock();
        f(&mut tree)
    }

    pub fn stats(&self) -> TreeResult<TreeStats> {
        self.inner.lock().stats()
    }

    pub fn flush(&self) -> TreeResult<()> {
        self.inner.lock().flush()
    }
}

impl<S: NodeStore + Send> SpatialTree for SharedRTree<S> {
    fn add(&self, key: &Envelope, id: ElementId) -> TreeResult<()> {
        self.inner.lock().insert(id, key.clone())
    }

    fn remove(&self, key: &Envelope, id: ElementId) -> TreeResult<bool> {
        self.inner.lock().remove(id, key)
    }

    fn find_intersecting_keys(&self, key: &Envelope) -> TreeResult<Vec<ElementId>> {
        self.inner.lock().search(key)
    }

    fn find_matching_keys(
        &self,
        predicate: SpatialPredicate,
        key: &Envelope,
    ) -> TreeResult<Vec<ElementId>> {
        self.inner.lock().search_predicate(predicate, key)
    }

    fn size(&self) -> u64 {
        self.inner.lock().len()
    }

    fn extent(&self) -> TreeResult<Option<Envelope>> {
        self.inner.lock().extent()
    }

    fn close(&self) -> TreeResult<()> {
        self.inner.lock().close()
    }

    fn clear(&self) -> TreeResult<()> {
        self.inner.lock().clear()
    }
}
