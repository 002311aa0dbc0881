//! Core types shared by the tree engine and its node stores.
//!
//! This module defines:
//! - Error types and result types
//! - Node identifiers and the fixed-shape node record
//! - Statistics structures
//! - The paged file header

use std::io;

use thiserror::Error;

use crate::envelope::{CoordinateSystem, Envelope};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in tree and store operations
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Store I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Index {index} out of range for count {count}")]
    OutOfRange { index: usize, count: usize },

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Element mapper error: {0}")]
    Mapper(String),

    #[error("Tree is closed")]
    Closed,
}

impl TreeError {
    /// Wraps an I/O failure with the store operation that caused it.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        TreeError::Io {
            context: context.into(),
            source,
        }
    }

    /// I/O-class errors: real I/O failures and dangling node ids, which
    /// signal a corrupted store rather than a normal "absent" case.
    pub fn is_io(&self) -> bool {
        matches!(self, TreeError::Io { .. } | TreeError::UnknownNode(_))
    }
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Node id - 1-based slot of a node record in its store. 0 means "no node".
pub type NodeId = u32;

/// Identifier of a stored element, supplied by the caller or its mapper.
/// Valid ids are `1..=i32::MAX` so that the paged store can encode them as a
/// negative child id.
pub type ElementId = u32;

/// Reserved "no node" id.
pub const NO_NODE: NodeId = 0;

/// Largest element id the paged encoding can hold.
pub const MAX_ELEMENT_ID: ElementId = i32::MAX as ElementId;

// ============================================================================
// Node Records
// ============================================================================

/// What a record's child field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildLink {
    /// No children (empty node).
    #[default]
    None,
    /// First child in the sibling chain.
    Node(NodeId),
    /// This record is a stored element, not a node.
    Element(ElementId),
}

impl ChildLink {
    /// On-disk encoding: 0, a positive node id, or `-element_id`.
    pub fn to_raw(self) -> i32 {
        match self {
            ChildLink::None => 0,
            ChildLink::Node(id) => id as i32,
            ChildLink::Element(id) => -(id as i32),
        }
    }

    pub fn from_raw(raw: i32) -> ChildLink {
        match raw {
            0 => ChildLink::None,
            r if r > 0 => ChildLink::Node(r as NodeId),
            r => ChildLink::Element(r.unsigned_abs()),
        }
    }
}

/// Fixed-shape node record held by every [`NodeStore`](crate::store::NodeStore).
///
/// A node's children form a singly linked list: `child` points at the first
/// child and each child's `sibling` at the next one. An element record has
/// `child == ChildLink::Element(id)`, no children and its entry envelope as
/// boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRecord {
    /// Covering envelope, `None` when it must be recomputed from children.
    pub boundary: Option<Envelope>,
    pub parent: NodeId,
    pub sibling: NodeId,
    pub child: ChildLink,
    pub child_count: u32,
}

impl NodeRecord {
    /// A detached, childless node.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A detached element record.
    pub fn element(id: ElementId, envelope: Envelope) -> Self {
        Self {
            boundary: Some(envelope),
            parent: NO_NODE,
            sibling: NO_NODE,
            child: ChildLink::Element(id),
            child_count: 0,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.child, ChildLink::Element(_))
    }

    pub fn element_id(&self) -> Option<ElementId> {
        match self.child {
            ChildLink::Element(id) => Some(id),
            _ => None,
        }
    }

    pub fn first_child(&self) -> Option<NodeId> {
        match self.child {
            ChildLink::Node(id) => Some(id),
            _ => None,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// I/O counters kept by a node store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Records currently allocated (created and not deleted)
    pub live_records: u64,
    pub record_reads: u64,
    pub record_writes: u64,
    /// Times the buffer window was loaded from disk
    pub buffer_loads: u64,
    /// Times a dirty window was written back
    pub buffer_flushes: u64,
}

/// Statistics about the tree
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    pub total_elements: u64,
    /// Internal and leaf nodes, element records excluded
    pub node_count: u64,
    pub tree_height: u32,
    pub store: StoreStats,
}

// ============================================================================
// File Header
// ============================================================================

/// Byte order of a paged tree file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Header stored once at the beginning of a paged tree file
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub magic: i32,
    pub byte_order: ByteOrder,
    pub version: f64,
    pub max_elements: u32,
    pub dimension: u32,
    pub coordinate_system: CoordinateSystem,
}

impl FileHeader {
    pub fn new(
        byte_order: ByteOrder,
        max_elements: u32,
        coordinate_system: CoordinateSystem,
    ) -> Self {
        Self {
            magic: super::rtree_constants::MAGIC,
            byte_order,
            version: super::rtree_constants::VERSION,
            max_elements,
            dimension: coordinate_system.dimension() as u32,
            coordinate_system,
        }
    }

    pub fn validate(&self) -> TreeResult<()> {
        if self.magic != super::rtree_constants::MAGIC {
            return Err(TreeError::Format("bad magic number".into()));
        }
        if self.version != super::rtree_constants::VERSION {
            return Err(TreeError::Format(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.max_elements < 2 {
            return Err(TreeError::Format(format!(
                "max elements {} is below 2",
                self.max_elements
            )));
        }
        if self.dimension as usize != self.coordinate_system.dimension() {
            return Err(TreeError::Format(format!(
                "dimension {} does not match coordinate system with {} axes",
                self.dimension,
                self.coordinate_system.dimension()
            )));
        }
        Ok(())
    }

    /// Size in bytes of one node record: the boundary doubles plus
    /// parent, sibling, child and child count.
    pub fn record_size(&self) -> usize {
        self.dimension as usize * 2 * 8 + 4 * 4
    }
}
