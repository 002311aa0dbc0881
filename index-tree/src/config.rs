//! Tree configuration.

use crate::envelope::CoordinateSystem;
use crate::tree::rtree_constants::{DEFAULT_BUFFER_BYTES, DEFAULT_MAX_ELEMENTS};
use crate::tree::rtree_types::{TreeError, TreeResult};
use crate::tree::split::SplitPolicy;

pub use crate::tree::rtree_types::ByteOrder;

/// Construction parameters for an [`RTree`](crate::RTree).
///
/// Defaults: fanout 8, quadratic split, 2-D Cartesian space, 8 KiB buffer
/// window, little-endian files, id recycling on, invariant checks off.
///
/// When a paged tree is opened, fanout and coordinate system come from the
/// file header and the corresponding fields here are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    max_elements: usize,
    split_policy: SplitPolicy,
    coordinate_system: CoordinateSystem,
    buffer_bytes: usize,
    byte_order: ByteOrder,
    recycle_ids: bool,
    verify_invariants: bool,
}

impl TreeConfig {
    pub fn new() -> TreeConfig {
        TreeConfig {
            max_elements: DEFAULT_MAX_ELEMENTS,
            split_policy: SplitPolicy::default(),
            coordinate_system: CoordinateSystem::default(),
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            byte_order: ByteOrder::default(),
            recycle_ids: true,
            verify_invariants: false,
        }
    }

    /// Maximum children per node, at least 2.
    #[inline]
    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    #[inline]
    pub fn with_split_policy(mut self, split_policy: SplitPolicy) -> Self {
        self.split_policy = split_policy;
        self
    }

    /// Coordinate space of new trees; its axis count is the tree dimension.
    #[inline]
    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }

    /// Byte budget of the paged store's buffer window.
    #[inline]
    pub fn with_buffer_bytes(mut self, buffer_bytes: usize) -> Self {
        self.buffer_bytes = buffer_bytes;
        self
    }

    /// Byte order of newly created files.
    #[inline]
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Whether deleted node ids are handed out again.
    #[inline]
    pub fn with_recycle_ids(mut self, recycle_ids: bool) -> Self {
        self.recycle_ids = recycle_ids;
        self
    }

    /// Check every structural invariant after each mutation and panic on a
    /// violation.
    #[inline]
    pub fn with_verify_invariants(mut self, verify_invariants: bool) -> Self {
        self.verify_invariants = verify_invariants;
        self
    }

    #[inline]
    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    #[inline]
    pub fn split_policy(&self) -> SplitPolicy {
        self.split_policy
    }

    #[inline]
    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    #[inline]
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[inline]
    pub fn recycle_ids(&self) -> bool {
        self.recycle_ids
    }

    #[inline]
    pub fn verify_invariants(&self) -> bool {
        self.verify_invariants
    }

    /// Rejects settings no tree can be built with.
    pub fn validate(&self) -> TreeResult<()> {
        if self.max_elements < 2 {
            return Err(TreeError::InvalidArgument(format!(
                "max elements must be at least 2, got {}",
                self.max_elements
            )));
        }
        if self.max_elements > i32::MAX as usize {
            return Err(TreeError::InvalidArgument(format!(
                "max elements {} is too large",
                self.max_elements
            )));
        }
        if self.buffer_bytes == 0 {
            return Err(TreeError::InvalidArgument("buffer size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.max_elements(), 8);
        assert_eq!(config.split_policy(), SplitPolicy::Quadratic);
        assert_eq!(config.coordinate_system().dimension(), 2);
        assert_eq!(config.buffer_bytes(), 8192);
        assert_eq!(config.byte_order(), ByteOrder::LittleEndian);
        assert!(config.recycle_ids());
        assert!(!config.verify_invariants());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chained_setters() {
        let config = TreeConfig::new()
            .with_max_elements(3)
            .with_split_policy(SplitPolicy::Linear)
            .with_coordinate_system(CoordinateSystem::cartesian(3).unwrap())
            .with_buffer_bytes(512)
            .with_byte_order(ByteOrder::BigEndian)
            .with_recycle_ids(false)
            .with_verify_invariants(true);
        assert_eq!(config.max_elements(), 3);
        assert_eq!(config.split_policy(), SplitPolicy::Linear);
        assert_eq!(config.coordinate_system().dimension(), 3);
        assert_eq!(config.buffer_bytes(), 512);
        assert_eq!(config.byte_order(), ByteOrder::BigEndian);
        assert!(!config.recycle_ids());
        assert!(config.verify_invariants());
    }

    #[test]
    fn test_validate_rejects_small_fanout() {
        let config = TreeConfig::new().with_max_elements(1);
        assert!(matches!(config.validate(), Err(TreeError::InvalidArgument(_))));
        let config = TreeConfig::new().with_buffer_bytes(0);
        assert!(config.validate().is_err());
    }
}
