//! RTree engine.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace};

use crate::calculator::{union_all, DefaultCalculator, GeometryCalculator};
use crate::config::TreeConfig;
use crate::envelope::{CoordinateSystem, Envelope};
use crate::filter::{self, SpatialPredicate};
use crate::store::{FileNodeStore, MemoryNodeStore, NodeStore};

use super::node::{NodeArena, NodeKind};
use super::persistence::IntegrityReport;
use super::rtree_constants::ROOT_ID;
use super::rtree_types::{
    ElementId, NodeId, TreeError, TreeResult, TreeStats, MAX_ELEMENT_ID, NO_NODE,
};
use super::search::SearchIter;
use super::split::SplitPolicy;

/// An R-tree of element ids keyed by envelope, generic over where its nodes
/// live.
///
/// A non-empty tree always has an internal root with a stable id; leaves
/// hold element records. A tree instance is single-writer: wrap it in
/// [`SharedRTree`](crate::SharedRTree) to share it between threads.
#[derive(Debug)]
pub struct RTree<S: NodeStore> {
    arena: NodeArena<S>,
    split_policy: SplitPolicy,
    root: Option<NodeId>,
    element_count: u64,
    verify_invariants: bool,
}

impl RTree<MemoryNodeStore> {
    /// Creates an empty tree whose nodes live in memory.
    pub fn in_memory(config: TreeConfig) -> TreeResult<Self> {
        config.validate()?;
        let store = MemoryNodeStore::new(
            config.max_elements(),
            config.coordinate_system().clone(),
            config.recycle_ids(),
        );
        Self::with_store(store, &config)
    }
}

impl RTree<FileNodeStore> {
    /// Creates an empty paged tree at `path`, replacing any existing file.
    pub fn create(path: impl AsRef<Path>, config: TreeConfig) -> TreeResult<Self> {
        config.validate()?;
        let store = FileNodeStore::create(
            path.as_ref(),
            config.max_elements(),
            config.coordinate_system().clone(),
            config.byte_order(),
            config.buffer_bytes(),
            config.recycle_ids(),
        )?;
        Self::with_store(store, &config)
    }

    /// Opens a paged tree written by [`RTree::create`].
    ///
    /// Fanout and coordinate system come from the file; the other settings
    /// from `config`.
    pub fn open(path: impl AsRef<Path>, config: TreeConfig) -> TreeResult<Self> {
        config.validate()?;
        let store = FileNodeStore::open(path.as_ref(), config.buffer_bytes(), config.recycle_ids())?;
        Self::with_store(store, &config)
    }

    pub fn path(&self) -> &Path {
        self.arena.store().path()
    }
}

impl<S: NodeStore> RTree<S> {
    /// Builds a tree over `store`. A store that already holds records is
    /// expected to have its root at id 1; its element count is rebuilt and
    /// records not reachable from the root are released.
    pub fn with_store(store: S, config: &TreeConfig) -> TreeResult<Self> {
        if store.max_elements() < 2 {
            return Err(TreeError::InvalidArgument(format!(
                "max elements must be at least 2, got {}",
                store.max_elements()
            )));
        }
        let mut tree = Self {
            arena: NodeArena::new(store, Arc::new(DefaultCalculator)),
            split_policy: config.split_policy(),
            root: None,
            element_count: 0,
            verify_invariants: config.verify_invariants(),
        };
        tree.recover()?;
        debug!(
            "RTree ready: {} elements, max elements {}, dimension {}",
            tree.element_count,
            tree.max_elements(),
            tree.dimension()
        );
        Ok(tree)
    }

    /// Replaces the geometry calculator.
    pub fn with_calculator(mut self, calculator: Arc<dyn GeometryCalculator>) -> Self {
        self.arena.set_calculator(calculator);
        self
    }

    fn recover(&mut self) -> TreeResult<()> {
        let next_id = self.arena.store().next_id();
        if next_id <= ROOT_ID {
            return Ok(());
        }
        if !self.arena.store().is_live(ROOT_ID) {
            return Err(TreeError::Format("root record is missing".into()));
        }
        let root = self.arena.read(ROOT_ID)?;
        if root.parent != NO_NODE || root.is_element() {
            return Err(TreeError::Format("record 1 is not a root node".into()));
        }

        let mut visited = HashSet::new();
        let mut elements = 0u64;
        let mut stack = vec![ROOT_ID];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(TreeError::Format(format!("node {} is linked twice", id)));
            }
            let record = self.arena.read(id)?;
            if record.is_element() {
                elements += 1;
            } else {
                stack.extend(self.arena.children(id)?);
            }
        }

        let mut released = 0;
        for id in 1..next_id {
            if self.arena.store().is_live(id) && !visited.contains(&id) {
                self.arena.delete(id)?;
                released += 1;
            }
        }
        if released > 0 {
            debug!("Released {} unreachable node records", released);
        }

        if root.child_count == 0 {
            // an empty root never outlives a mutation; treat it as an empty tree
            self.arena.store_mut().rewind()?;
            return Ok(());
        }
        self.root = Some(ROOT_ID);
        self.element_count = elements;
        Ok(())
    }

    /// Number of stored elements.
    pub fn len(&self) -> u64 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    pub fn max_elements(&self) -> usize {
        self.arena.max_elements()
    }

    pub fn dimension(&self) -> usize {
        self.arena.store().dimension()
    }

    pub fn coordinate_system(&self) -> &CoordinateSystem {
        self.arena.store().coordinate_system()
    }

    pub fn split_policy(&self) -> SplitPolicy {
        self.split_policy
    }

    pub fn calculator(&self) -> &dyn GeometryCalculator {
        self.arena.calculator()
    }

    pub fn store(&self) -> &S {
        self.arena.store()
    }

    pub fn is_closed(&self) -> bool {
        self.arena.store().is_closed()
    }

    #[cfg(test)]
    pub(crate) fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    #[cfg(test)]
    pub(crate) fn arena_mut(&mut self) -> &mut NodeArena<S> {
        &mut self.arena
    }

    /// Envelope covering every stored element, `None` for an empty tree.
    pub fn extent(&mut self) -> TreeResult<Option<Envelope>> {
        self.check_open()?;
        match self.root {
            Some(root) => self.arena.boundary(root),
            None => Ok(None),
        }
    }

    fn check_open(&self) -> TreeResult<()> {
        if self.is_closed() {
            Err(TreeError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_envelope(&self, envelope: &Envelope) -> TreeResult<()> {
        if envelope.dimension() != self.dimension() {
            return Err(TreeError::InvalidArgument(format!(
                "envelope has dimension {}, tree has {}",
                envelope.dimension(),
                self.dimension()
            )));
        }
        Ok(())
    }

    fn check_element(&self, id: ElementId, envelope: &Envelope) -> TreeResult<()> {
        if id == 0 || id > MAX_ELEMENT_ID {
            return Err(TreeError::InvalidArgument(format!(
                "element id {} is outside 1..={}",
                id, MAX_ELEMENT_ID
            )));
        }
        self.check_envelope(envelope)
    }

    /// Stores element `id` under `envelope`.
    pub fn insert(&mut self, id: ElementId, envelope: Envelope) -> TreeResult<()> {
        self.check_open()?;
        self.check_element(id, &envelope)?;
        self.insert_entry(id, envelope)?;
        self.element_count += 1;
        self.after_mutation()
    }

    /// Stores element `id` under raw coordinates
    /// `[min_0..min_{d-1}, max_0..max_{d-1}]`. NaN or inverted coordinates
    /// are rejected before the tree is touched.
    pub fn insert_coords(&mut self, id: ElementId, coords: &[f64]) -> TreeResult<()> {
        let envelope = Envelope::new(coords.to_vec())?;
        self.insert(id, envelope)
    }

    /// Inserts every entry in order, stopping at the first failure. Entries
    /// inserted before the failure stay in the tree.
    pub fn insert_all<I>(&mut self, entries: I) -> TreeResult<usize>
    where
        I: IntoIterator<Item = (ElementId, Envelope)>,
    {
        let mut inserted = 0;
        for (id, envelope) in entries {
            self.insert(id, envelope)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn insert_entry(&mut self, id: ElementId, envelope: Envelope) -> TreeResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => return self.plant(id, envelope),
        };

        let leaf = self.choose_leaf(root, &envelope)?;
        self.arena.add_element(leaf, id, envelope.clone())?;

        let max = self.max_elements();
        let mut node = leaf;
        loop {
            let split_off = if self.arena.child_count(node)? > max {
                self.split(node)?
            } else {
                None
            };
            let parent = self.arena.parent(node)?;
            if parent == NO_NODE {
                break;
            }
            if let Some(sibling) = split_off {
                self.arena.add_child(parent, sibling)?;
            }
            self.arena.extend_boundary(parent, &envelope)?;
            node = parent;
        }
        Ok(())
    }

    /// First entry of an empty tree: a root holding one leaf.
    fn plant(&mut self, id: ElementId, envelope: Envelope) -> TreeResult<()> {
        let root = self.arena.create_node()?;
        if root != ROOT_ID {
            return Err(TreeError::InvalidState(format!(
                "empty tree allocated root {} instead of {}",
                root, ROOT_ID
            )));
        }
        let leaf = self.arena.create_node()?;
        self.arena.add_element(leaf, id, envelope)?;
        self.arena.add_child(root, leaf)?;
        self.root = Some(root);
        debug!("Planted root {} with leaf {}", root, leaf);
        Ok(())
    }

    fn choose_leaf(&mut self, root: NodeId, envelope: &Envelope) -> TreeResult<NodeId> {
        let mut node = root;
        loop {
            match self.arena.kind(node)? {
                NodeKind::Leaf | NodeKind::Empty => return Ok(node),
                NodeKind::Internal => node = self.choose_subtree(node, envelope)?,
                NodeKind::Element => {
                    return Err(TreeError::InvalidState(format!(
                        "descent reached element record {}",
                        node
                    )))
                }
            }
        }
    }

    /// The child already covering `envelope`, or else the one growing least,
    /// fewest children first on a tie.
    fn choose_subtree(&mut self, node: NodeId, envelope: &Envelope) -> TreeResult<NodeId> {
        let mut candidates = Vec::new();
        for child in self.arena.children(node)? {
            let boundary = self.arena.boundary(child)?;
            let count = self.arena.child_count(child)?;
            candidates.push((child, boundary, count));
        }

        let calculator = self.arena.calculator();
        for (child, boundary, _) in &candidates {
            if let Some(boundary) = boundary {
                if calculator.contains(boundary, envelope, true) {
                    return Ok(*child);
                }
            }
        }

        let mut best: Option<(NodeId, f64, usize)> = None;
        for (child, boundary, count) in &candidates {
            let growth = match boundary {
                Some(boundary) => calculator.enlargement(boundary, envelope),
                None => 0.0,
            };
            let better = match best {
                None => true,
                Some((_, best_growth, best_count)) => {
                    growth < best_growth || (growth == best_growth && *count < best_count)
                }
            };
            if better {
                best = Some((*child, growth, *count));
            }
        }
        best.map(|(child, _, _)| child)
            .ok_or_else(|| TreeError::InvalidState(format!("internal node {} has no children", node)))
    }

    /// Splits an overflowing node. A non-root node keeps the first group and
    /// returns a new detached sibling holding the second; the root hands both
    /// groups to two new children and returns `None`.
    fn split(&mut self, node: NodeId) -> TreeResult<Option<NodeId>> {
        let children = self.arena.children(node)?;
        let mut envelopes = Vec::with_capacity(children.len());
        for &child in &children {
            let boundary = self.arena.boundary(child)?.ok_or_else(|| {
                TreeError::InvalidState(format!("child {} of node {} has no boundary", child, node))
            })?;
            envelopes.push(boundary);
        }

        let min_fill = SplitPolicy::min_fill(self.max_elements());
        let (group_a, group_b) =
            self.split_policy
                .split(self.arena.calculator(), &envelopes, min_fill);
        self.arena.detach_all(node)?;

        if self.root == Some(node) {
            let first = self.arena.create_node()?;
            let second = self.arena.create_node()?;
            self.attach_group(first, &children, &group_a)?;
            self.attach_group(second, &children, &group_b)?;
            self.arena.add_child(node, first)?;
            self.arena.add_child(node, second)?;
            debug!(
                "Split root {} into nodes {} and {} ({} / {})",
                node,
                first,
                second,
                group_a.len(),
                group_b.len()
            );
            Ok(None)
        } else {
            self.attach_group(node, &children, &group_a)?;
            let sibling = self.arena.create_node()?;
            self.attach_group(sibling, &children, &group_b)?;
            trace!(
                "Split node {} into {} and {} ({} / {})",
                node,
                node,
                sibling,
                group_a.len(),
                group_b.len()
            );
            Ok(Some(sibling))
        }
    }

    fn attach_group(&mut self, parent: NodeId, children: &[NodeId], group: &[usize]) -> TreeResult<()> {
        for &index in group {
            self.arena.add_child(parent, children[index])?;
        }
        Ok(())
    }

    /// Removes the entry stored for `id` under exactly `envelope`. Returns
    /// false when no such entry exists.
    pub fn remove(&mut self, id: ElementId, envelope: &Envelope) -> TreeResult<bool> {
        self.check_open()?;
        self.check_element(id, envelope)?;
        let root = match self.root {
            Some(root) => root,
            None => return Ok(false),
        };
        let (leaf, index) = match self.find_entry(root, id, envelope)? {
            Some(found) => found,
            None => return Ok(false),
        };

        self.arena.remove_object(leaf, index)?;
        self.element_count -= 1;
        self.condense(leaf)?;
        self.after_mutation()?;
        Ok(true)
    }

    /// Removes every entry in order, returning how many were found.
    pub fn remove_all<'e, I>(&mut self, entries: I) -> TreeResult<usize>
    where
        I: IntoIterator<Item = (ElementId, &'e Envelope)>,
    {
        let mut removed = 0;
        for (id, envelope) in entries {
            if self.remove(id, envelope)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Leaf and chain index of the entry, descending only into nodes whose
    /// boundary touches `envelope`.
    fn find_entry(
        &mut self,
        root: NodeId,
        id: ElementId,
        envelope: &Envelope,
    ) -> TreeResult<Option<(NodeId, usize)>> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let boundary = match self.arena.boundary(node)? {
                Some(boundary) => boundary,
                None => continue,
            };
            if !self.arena.calculator().intersects(&boundary, envelope, true) {
                continue;
            }
            match self.arena.kind(node)? {
                NodeKind::Leaf => {
                    let entries = self.arena.elements(node)?;
                    let calculator = self.arena.calculator();
                    let found = entries.iter().position(|(_, element, stored)| {
                        *element == id && calculator.equals(stored, envelope)
                    });
                    if let Some(index) = found {
                        return Ok(Some((node, index)));
                    }
                }
                NodeKind::Internal => stack.extend(self.arena.children(node)?),
                NodeKind::Empty | NodeKind::Element => {}
            }
        }
        Ok(None)
    }

    /// Trims the tree from the parent of `leaf` up to the root, then
    /// reinserts the entries of dissolved leaves.
    fn condense(&mut self, leaf: NodeId) -> TreeResult<()> {
        let threshold = self.max_elements() / 3;
        let mut orphans = Vec::new();

        let mut node = self.arena.parent(leaf)?;
        while node != NO_NODE {
            for child in self.arena.children(node)? {
                let count = self.arena.child_count(child)?;
                match self.arena.kind(child)? {
                    NodeKind::Empty => {
                        self.arena.remove_child(node, child)?;
                        self.arena.delete(child)?;
                    }
                    NodeKind::Leaf if count < threshold => {
                        for (record, element, envelope) in self.arena.elements(child)? {
                            self.arena.delete(record)?;
                            orphans.push((element, envelope));
                        }
                        self.arena.remove_child(node, child)?;
                        self.arena.delete(child)?;
                    }
                    NodeKind::Internal if count == 1 => {
                        let grandchild = self.arena.child_at(child, 0)?;
                        self.arena.remove_child(child, grandchild)?;
                        self.arena.remove_child(node, child)?;
                        self.arena.delete(child)?;
                        self.arena.add_child(node, grandchild)?;
                    }
                    _ => {}
                }
            }
            self.arena.recompute_boundary(node)?;
            node = self.arena.parent(node)?;
        }

        if let Some(root) = self.root {
            if self.arena.is_empty(root)? {
                self.arena.delete(root)?;
                self.root = None;
                self.arena.store_mut().rewind()?;
                debug!("Tree emptied, node store rewound");
            }
        }

        if !orphans.is_empty() {
            trace!("Reinserting {} entries of dissolved leaves", orphans.len());
        }
        for (element, envelope) in orphans {
            self.insert_entry(element, envelope)?;
        }
        Ok(())
    }

    /// Drops every element and rewinds the node store.
    pub fn clear(&mut self) -> TreeResult<()> {
        self.check_open()?;
        self.arena.store_mut().rewind()?;
        self.root = None;
        self.element_count = 0;
        debug!("Cleared tree");
        Ok(())
    }

    /// Ids of every element whose envelope intersects `query`
    /// (edge-inclusive).
    pub fn search(&mut self, query: &Envelope) -> TreeResult<Vec<ElementId>> {
        self.search_iter(query)?.collect()
    }

    /// Lazy form of [`RTree::search`].
    pub fn search_iter(&mut self, query: &Envelope) -> TreeResult<SearchIter<'_, S>> {
        self.check_open()?;
        self.check_envelope(query)?;
        Ok(SearchIter::new(&mut self.arena, query.clone(), self.root))
    }

    /// Matching elements with the envelope they were stored under.
    pub fn search_entries(&mut self, query: &Envelope) -> TreeResult<Vec<(ElementId, Envelope)>> {
        let mut iter = self.search_iter(query)?;
        let mut entries = Vec::new();
        while let Some(entry) = iter.next_entry() {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Calls `visitor` for each match until it breaks or fails. A visitor
    /// error stops the traversal and is returned.
    pub fn search_visit<F>(&mut self, query: &Envelope, mut visitor: F) -> TreeResult<()>
    where
        F: FnMut(ElementId) -> TreeResult<ControlFlow<()>>,
    {
        for id in self.search_iter(query)? {
            if visitor(id?)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Elements satisfying `predicate` against `query`, judged on the
    /// envelopes stored in the tree.
    pub fn search_predicate(
        &mut self,
        predicate: SpatialPredicate,
        query: &Envelope,
    ) -> TreeResult<Vec<ElementId>> {
        if predicate == SpatialPredicate::Disjoint {
            return self.search_disjoint(query);
        }
        let entries = self.search_entries(query)?;
        Ok(filter::refine_entries(predicate, self.calculator(), query, entries))
    }

    /// Elements satisfying `predicate` against `query`, judged on the
    /// envelopes `envelope_of` returns. Ids it has no envelope for are
    /// dropped.
    pub fn search_predicate_with<F>(
        &mut self,
        predicate: SpatialPredicate,
        query: &Envelope,
        envelope_of: F,
    ) -> TreeResult<Vec<ElementId>>
    where
        F: FnMut(ElementId) -> TreeResult<Option<Envelope>>,
    {
        if predicate == SpatialPredicate::Disjoint {
            return self.search_disjoint(query);
        }
        let candidates = self.search(query)?;
        filter::refine(predicate, self.calculator(), query, candidates, envelope_of)
    }

    /// Everything under the extent minus everything the query touches.
    fn search_disjoint(&mut self, query: &Envelope) -> TreeResult<Vec<ElementId>> {
        self.check_envelope(query)?;
        let extent = match self.extent()? {
            Some(extent) => extent,
            None => return Ok(Vec::new()),
        };
        let touched: HashSet<ElementId> = self.search(query)?.into_iter().collect();
        Ok(self
            .search(&extent)?
            .into_iter()
            .filter(|id| !touched.contains(id))
            .collect())
    }

    /// Node levels from the root down to the deepest leaf, 0 when empty.
    pub fn height(&mut self) -> TreeResult<u32> {
        self.check_open()?;
        let root = match self.root {
            Some(root) => root,
            None => return Ok(0),
        };
        let mut height = 0;
        let mut stack = vec![(root, 1u32)];
        while let Some((node, depth)) = stack.pop() {
            match self.arena.kind(node)? {
                NodeKind::Internal => {
                    for child in self.arena.children(node)? {
                        stack.push((child, depth + 1));
                    }
                }
                _ => height = height.max(depth),
            }
        }
        Ok(height)
    }

    /// Internal and leaf nodes, element records excluded.
    pub fn node_count(&self) -> u64 {
        self.arena
            .store()
            .stats()
            .live_records
            .saturating_sub(self.element_count)
    }

    pub fn stats(&mut self) -> TreeResult<TreeStats> {
        Ok(TreeStats {
            total_elements: self.element_count,
            node_count: self.node_count(),
            tree_height: self.height()?,
            store: self.arena.store().stats(),
        })
    }

    /// Walks the whole graph and reports every broken structural invariant.
    /// Store I/O failures are returned as errors; everything else is a
    /// finding in the report.
    pub fn check_integrity(&mut self) -> TreeResult<IntegrityReport> {
        self.check_open()?;
        let mut report = IntegrityReport::new();
        report.elements_expected = self.element_count;
        let max = self.max_elements();
        let mut visited = HashSet::new();

        if let Some(root) = self.root {
            let root_record = self.arena.read(root)?;
            if root_record.parent != NO_NODE {
                report.parent_mismatches.push(root);
                report.fail(format!("root {} has parent {}", root, root_record.parent));
            }

            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    report.fail(format!("node {} is reachable twice", id));
                    continue;
                }
                report.records_checked += 1;
                let record = self.arena.read(id)?;

                if record.is_element() {
                    report.elements_found += 1;
                    if record.boundary.is_none() {
                        report.fail(format!("element record {} has no envelope", id));
                    }
                    continue;
                }

                let children = match self.arena.children(id) {
                    Ok(children) => children,
                    Err(e @ TreeError::Io { .. }) => return Err(e),
                    Err(e) => {
                        report.count_mismatches.push(id);
                        report.fail(format!("node {}: broken child chain: {}", id, e));
                        continue;
                    }
                };
                if children.len() != record.child_count as usize {
                    report.count_mismatches.push(id);
                    report.fail(format!(
                        "node {}: child count {} but {} linked",
                        id,
                        record.child_count,
                        children.len()
                    ));
                }
                if children.is_empty() || children.len() > max {
                    report.fanout_violations.push(id);
                    report.fail(format!("node {}: {} children", id, children.len()));
                }

                let mut bounds = Vec::with_capacity(children.len());
                let mut element_children = 0;
                for &child in &children {
                    let child_record = self.arena.read(child)?;
                    if child_record.parent != id {
                        report.parent_mismatches.push(child);
                        report.fail(format!(
                            "node {}: parent is {} but linked under {}",
                            child, child_record.parent, id
                        ));
                    }
                    if child_record.is_element() {
                        element_children += 1;
                    }
                    if let Some(boundary) = child_record.boundary {
                        bounds.push(boundary);
                    }
                    stack.push(child);
                }
                if element_children != 0 && element_children != children.len() {
                    report.mixed_nodes.push(id);
                    report.fail(format!("node {} mixes elements and nodes", id));
                }

                let expected = union_all(self.arena.calculator(), &bounds);
                if record.boundary.is_none() || record.boundary != expected {
                    report.boundary_mismatches.push(id);
                    report.fail(format!(
                        "node {}: boundary {:?} differs from union of children {:?}",
                        id, record.boundary, expected
                    ));
                }
            }
        }

        if report.elements_found != report.elements_expected {
            report.fail(format!(
                "found {} elements, tree counts {}",
                report.elements_found, report.elements_expected
            ));
        }

        let next_id = self.arena.store().next_id();
        for id in 1..next_id {
            if self.arena.store().is_live(id) && !visited.contains(&id) {
                report.unreachable_records.push(id);
                report.fail(format!("record {} is not reachable from the root", id));
            }
        }
        Ok(report)
    }

    /// Panics when [`RTree::check_integrity`] finds a violation.
    pub fn assert_invariants(&mut self) -> TreeResult<()> {
        let report = self.check_integrity()?;
        assert!(
            report.is_valid,
            "R-tree invariants violated: {}",
            report.errors.join("; ")
        );
        Ok(())
    }

    fn after_mutation(&mut self) -> TreeResult<()> {
        if self.verify_invariants {
            self.assert_invariants()?;
        }
        Ok(())
    }

    /// Writes pending node changes to the backing store.
    pub fn flush(&mut self) -> TreeResult<()> {
        self.check_open()?;
        self.arena.store_mut().flush()
    }

    /// Flushes and closes the store. Further operations fail with `Closed`.
    pub fn close(&mut self) -> TreeResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.arena.store_mut().close()?;
        debug!("Closed tree with {} elements", self.element_count);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
