//! Reliability helpers shared by the node stores and the tree engine.
//!
//! This module provides:
//! - Integrity reporting for the structural invariants of a tree
//! - Free list management for node id reuse

use std::collections::HashSet;

use super::rtree_types::NodeId;

// ============================================================================
// Integrity Checking
// ============================================================================

/// Result of a structural integrity check
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Records visited from the root (nodes and elements)
    pub records_checked: u64,
    /// Nodes whose stored boundary differs from the union of their children
    pub boundary_mismatches: Vec<NodeId>,
    /// Children whose parent id does not point at the node that links them
    pub parent_mismatches: Vec<NodeId>,
    /// Nodes whose child count differs from the length of their sibling chain
    pub count_mismatches: Vec<NodeId>,
    /// Nodes holding zero children or more than the maximum
    pub fanout_violations: Vec<NodeId>,
    /// Nodes mixing element records and child nodes
    pub mixed_nodes: Vec<NodeId>,
    /// Live records not reachable from the root
    pub unreachable_records: Vec<NodeId>,
    /// Elements found under the root
    pub elements_found: u64,
    /// Element count kept by the tree
    pub elements_expected: u64,
    /// Summary of findings
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            records_checked: 0,
            boundary_mismatches: Vec::new(),
            parent_mismatches: Vec::new(),
            count_mismatches: Vec::new(),
            fanout_violations: Vec::new(),
            mixed_nodes: Vec::new(),
            unreachable_records: Vec::new(),
            elements_found: 0,
            elements_expected: 0,
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Free List Management
// ============================================================================

/// Recycled node ids waiting to be handed out again.
///
/// Ids are re-dispensed last-in first-out when recycling is enabled; with
/// recycling disabled they are only collected, and their slots stay unused
/// until the store is rewound.
#[derive(Debug, Clone)]
pub struct FreeList {
    ids: Vec<NodeId>,
    members: HashSet<NodeId>,
    recycle: bool,
}

impl FreeList {
    pub fn new(recycle: bool) -> Self {
        Self {
            ids: Vec::new(),
            members: HashSet::new(),
            recycle,
        }
    }

    /// Records a deleted id. Returns false if it was already free.
    pub fn release(&mut self, id: NodeId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Next id to reuse, if recycling is enabled and one is available.
    pub fn acquire(&mut self) -> Option<NodeId> {
        if !self.recycle {
            return None;
        }
        let id = self.ids.pop()?;
        self.members.remove(&id);
        Some(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.members.clear();
    }
}
