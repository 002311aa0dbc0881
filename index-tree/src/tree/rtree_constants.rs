//! Constants for the R-tree and its paged file format.

/// Default fanout of a node
pub const DEFAULT_MAX_ELEMENTS: usize = 8;

/// Default page budget of the file buffer window (8 KiB)
pub const DEFAULT_BUFFER_BYTES: usize = 8192;

/// Magic number for file format identification
pub const MAGIC: i32 = 0x4958_5452; // "IXTR"

/// File format version
pub const VERSION: f64 = 1.0;

/// Id of the root node in a non-empty tree
pub const ROOT_ID: u32 = 1;
