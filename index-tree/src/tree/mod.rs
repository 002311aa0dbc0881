//! R-tree engine over pluggable node storage.
//!
//! The tree keeps no node objects of its own: every vertex is a record in a
//! [`NodeStore`](crate::store::NodeStore), addressed by id and linked to its
//! parent, next sibling and first child by id. This gives:
//! - One engine for in-memory and file-backed trees
//! - Lazy loading of paged nodes (only the visited path is read)
//! - Guttman insertion with linear or quadratic splits
//! - Deletion with condensation and forced reinsertion

pub mod node;
pub mod persistence;
pub mod rtree_constants;
pub mod rtree_impl;
pub mod rtree_types;
pub mod search;
pub mod split;

pub use node::{NodeArena, NodeKind};
pub use persistence::{FreeList, IntegrityReport};
pub use rtree_constants::{DEFAULT_BUFFER_BYTES, DEFAULT_MAX_ELEMENTS};
pub use rtree_impl::RTree;
pub use rtree_types::{
    ByteOrder, ChildLink, ElementId, FileHeader, NodeId, NodeRecord, StoreStats, TreeError,
    TreeResult, TreeStats,
};
pub use search::SearchIter;
pub use split::SplitPolicy;
