//! # Index Tree - n-dimensional R-tree
//!
//! This crate provides an R-tree over axis-aligned envelopes with two node
//! storage backends: a vector arena in memory and a fixed-record paged file
//! read through a buffered window.
//!
//! ## Features
//!
//! - **Generic Dimension**: any number of axes, fixed per tree
//! - **Paged Storage**: fixed-size node records, loaded on demand
//! - **Split Policies**: linear and quadratic (Guttman)
//! - **Condensation**: underfull leaves are dissolved and their entries reinserted
//! - **Two-Phase Search**: MBR scan followed by exact predicate refinement
//! - **Integrity Checks**: full structural verification on demand or after every mutation
//!
//! ## Quick Start
//!
//! ```rust
//! use index_tree::{Envelope, RTree, TreeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = RTree::in_memory(TreeConfig::new().with_max_elements(4))?;
//!
//! tree.insert(1, Envelope::from_2d(0.0, 0.0, 10.0, 10.0)?)?;
//! tree.insert(2, Envelope::from_2d(20.0, 20.0, 30.0, 30.0)?)?;
//!
//! let hits = tree.search(&Envelope::from_2d(5.0, 5.0, 15.0, 15.0)?)?;
//! assert_eq!(hits, vec![1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Paged Trees
//!
//! ```rust,no_run
//! use index_tree::{Envelope, RTree, TreeConfig};
//! use tempfile::NamedTempFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let temp_file = NamedTempFile::new()?;
//! let mut tree = RTree::create(temp_file.path(), TreeConfig::default())?;
//! tree.insert(7, Envelope::point(&[1.5, 2.5])?)?;
//! tree.close()?;
//!
//! let mut tree = RTree::open(temp_file.path(), TreeConfig::default())?;
//! assert_eq!(tree.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod calculator;
pub mod config;
pub mod envelope;
pub mod filter;
pub mod index;
pub mod mapper;
pub mod spatial_tree;
pub mod store;
pub mod tree;

pub use calculator::{DefaultCalculator, GeometryCalculator};
pub use config::{ByteOrder, TreeConfig};
pub use envelope::{CoordinateSystem, Envelope};
pub use filter::SpatialPredicate;
pub use index::ElementIndex;
pub use mapper::{MemoryElementMapper, TreeElementMapper};
pub use spatial_tree::{SharedRTree, SpatialTree};
pub use store::{FileNodeStore, MemoryNodeStore, NodeStore};
pub use tree::{
    ElementId, IntegrityReport, NodeId, RTree, SearchIter, SplitPolicy, StoreStats, TreeError,
    TreeResult, TreeStats,
};
