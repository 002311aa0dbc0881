//! Vector-backed node store.

use crate::envelope::CoordinateSystem;
use crate::tree::persistence::FreeList;
use crate::tree::rtree_types::{
    NodeId, NodeRecord, StoreStats, TreeError, TreeResult, NO_NODE,
};

use super::NodeStore;

/// Keeps every node record in a growable arena indexed by `id - 1`.
///
/// Deleted slots hold `None` until their id is handed out again.
#[derive(Debug)]
pub struct MemoryNodeStore {
    records: Vec<Option<NodeRecord>>,
    free: FreeList,
    max_elements: usize,
    coordinate_system: CoordinateSystem,
    closed: bool,
    stats: StoreStats,
}

impl MemoryNodeStore {
    pub fn new(
        max_elements: usize,
        coordinate_system: CoordinateSystem,
        recycle_ids: bool,
    ) -> Self {
        Self {
            records: Vec::new(),
            free: FreeList::new(recycle_ids),
            max_elements,
            coordinate_system,
            closed: false,
            stats: StoreStats::default(),
        }
    }

    fn check_closed(&self) -> TreeResult<()> {
        if self.closed {
            Err(TreeError::Closed)
        } else {
            Ok(())
        }
    }

    fn slot(&self, id: NodeId) -> TreeResult<usize> {
        if id == NO_NODE || !self.is_live(id) {
            return Err(TreeError::UnknownNode(id));
        }
        Ok(id as usize - 1)
    }
}

impl NodeStore for MemoryNodeStore {
    fn max_elements(&self) -> usize {
        self.max_elements
    }

    fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    fn create_node(&mut self, record: NodeRecord) -> TreeResult<NodeId> {
        self.check_closed()?;
        let id = match self.free.acquire() {
            Some(id) => {
                self.records[id as usize - 1] = Some(record);
                id
            }
            None => {
                if self.records.len() >= i32::MAX as usize {
                    return Err(TreeError::InvalidState("node id space exhausted".into()));
                }
                self.records.push(Some(record));
                self.records.len() as NodeId
            }
        };
        self.stats.live_records += 1;
        self.stats.record_writes += 1;
        Ok(id)
    }

    fn read_node(&mut self, id: NodeId) -> TreeResult<NodeRecord> {
        self.check_closed()?;
        let slot = self.slot(id)?;
        self.stats.record_reads += 1;
        self.records[slot]
            .clone()
            .ok_or(TreeError::UnknownNode(id))
    }

    fn write_node(&mut self, id: NodeId, record: &NodeRecord) -> TreeResult<()> {
        self.check_closed()?;
        let slot = self.slot(id)?;
        self.records[slot] = Some(record.clone());
        self.stats.record_writes += 1;
        Ok(())
    }

    fn delete_node(&mut self, id: NodeId) -> TreeResult<()> {
        self.check_closed()?;
        let slot = self.slot(id)?;
        self.records[slot] = None;
        self.free.release(id);
        self.stats.live_records = self.stats.live_records.saturating_sub(1);
        Ok(())
    }

    fn next_id(&self) -> NodeId {
        self.records.len() as NodeId + 1
    }

    fn is_live(&self, id: NodeId) -> bool {
        id != NO_NODE
            && (id as usize) <= self.records.len()
            && self.records[id as usize - 1].is_some()
    }

    fn rewind(&mut self) -> TreeResult<()> {
        self.check_closed()?;
        self.records.clear();
        self.free.clear();
        self.stats.live_records = 0;
        Ok(())
    }

    fn flush(&mut self) -> TreeResult<()> {
        self.check_closed()
    }

    fn close(&mut self) -> TreeResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stats(&self) -> StoreStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::tree::rtree_types::ChildLink;

    fn store(recycle: bool) -> MemoryNodeStore {
        MemoryNodeStore::new(4, CoordinateSystem::default(), recycle)
    }

    #[test]
    fn test_create_read_write() {
        let mut store = store(true);
        let id = store.create_node(NodeRecord::empty()).unwrap();
        assert_eq!(id, 1);

        let mut record = store.read_node(id).unwrap();
        record.boundary = Some(Envelope::from_2d(0.0, 0.0, 1.0, 1.0).unwrap());
        record.child = ChildLink::Node(5);
        record.child_count = 1;
        store.write_node(id, &record).unwrap();

        assert_eq!(store.read_node(id).unwrap(), record);
    }

    #[test]
    fn test_unknown_node() {
        let mut store = store(true);
        assert!(matches!(store.read_node(0), Err(TreeError::UnknownNode(0))));
        assert!(matches!(store.read_node(3), Err(TreeError::UnknownNode(3))));
    }

    #[test]
    fn test_delete_and_recycle() {
        let mut store = store(true);
        let a = store.create_node(NodeRecord::empty()).unwrap();
        let b = store.create_node(NodeRecord::empty()).unwrap();
        store.delete_node(a).unwrap();
        assert!(!store.is_live(a));
        assert!(matches!(store.read_node(a), Err(TreeError::UnknownNode(_))));
        assert_eq!(store.stats().live_records, 1);

        let c = store.create_node(NodeRecord::empty()).unwrap();
        assert_eq!(c, a);
        assert!(store.is_live(b));
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_delete_without_recycle() {
        let mut store = store(false);
        let a = store.create_node(NodeRecord::empty()).unwrap();
        store.delete_node(a).unwrap();
        let b = store.create_node(NodeRecord::empty()).unwrap();
        assert_eq!(b, 2);
    }

    #[test]
    fn test_rewind() {
        let mut store = store(true);
        store.create_node(NodeRecord::empty()).unwrap();
        store.create_node(NodeRecord::empty()).unwrap();
        store.rewind().unwrap();
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.create_node(NodeRecord::empty()).unwrap(), 1);
    }

    #[test]
    fn test_closed() {
        let mut store = store(true);
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(
            store.create_node(NodeRecord::empty()),
            Err(TreeError::Closed)
        ));
    }
}
