//! Node storage backends for the R-tree.
//!
//! The tree engine never touches node memory directly: every vertex lives as
//! a [`NodeRecord`] in a [`NodeStore`] and is addressed by its integer id.
//! Two stores are provided:
//! - [`MemoryNodeStore`]: a growable vector arena
//! - [`FileNodeStore`]: fixed-size records in a file, read and written
//!   through a single buffered window

pub mod file;
pub mod memory;
pub mod page_buffer;

pub use file::FileNodeStore;
pub use memory::MemoryNodeStore;
pub use page_buffer::PageBuffer;

use crate::envelope::CoordinateSystem;
use crate::tree::rtree_types::{NodeId, NodeRecord, StoreStats, TreeResult};

/// Storage capability for node records.
///
/// Ids are 1-based and stable until the record is deleted. Reading an id that
/// was never allocated, or that has been deleted, fails with
/// [`TreeError::UnknownNode`](crate::TreeError::UnknownNode).
pub trait NodeStore {
    /// Fanout the tree was created with.
    fn max_elements(&self) -> usize;

    /// Coordinate space of the stored envelopes.
    fn coordinate_system(&self) -> &CoordinateSystem;

    fn dimension(&self) -> usize {
        self.coordinate_system().dimension()
    }

    /// Allocates an id for `record` and stores it.
    fn create_node(&mut self, record: NodeRecord) -> TreeResult<NodeId>;

    fn read_node(&mut self, id: NodeId) -> TreeResult<NodeRecord>;

    fn write_node(&mut self, id: NodeId, record: &NodeRecord) -> TreeResult<()>;

    /// Releases `id` for recycling. The record content is left in place.
    fn delete_node(&mut self, id: NodeId) -> TreeResult<()>;

    /// One past the highest id ever allocated since the last rewind.
    fn next_id(&self) -> NodeId;

    /// Whether `id` is allocated and not deleted.
    fn is_live(&self, id: NodeId) -> bool;

    /// Forgets every record: the id counter restarts at 1 and the free list
    /// is cleared. Prior records are abandoned, not erased.
    fn rewind(&mut self) -> TreeResult<()>;

    /// Writes pending changes to the backing medium.
    fn flush(&mut self) -> TreeResult<()>;

    /// Flushes and releases the store. Later calls fail with `Closed`.
    fn close(&mut self) -> TreeResult<()>;

    fn is_closed(&self) -> bool;

    fn stats(&self) -> StoreStats;
}
