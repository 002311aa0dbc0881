//! Buffered window over the node records of a paged file.
//!
//! The window covers a run of consecutive record ids aligned to its capacity,
//! so id `n` always falls in the window starting at
//! `((n - 1) / capacity) * capacity + 1`. The buffer only tracks bytes and the
//! dirty flag; the file store performs the actual reads and writes.

use crate::tree::rtree_types::NodeId;

/// In-process byte window over fixed-size records
#[derive(Debug)]
pub struct PageBuffer {
    bytes: Vec<u8>,
    record_size: usize,
    capacity: usize,
    /// Id of the first record in the window, 0 when no window is loaded
    first_id: NodeId,
    /// Records in the window that hold real data (loaded or written)
    valid: usize,
    dirty: bool,
}

impl PageBuffer {
    /// Creates a buffer holding as many whole records as fit in
    /// `buffer_bytes`, and at least one.
    pub fn new(record_size: usize, buffer_bytes: usize) -> Self {
        let capacity = (buffer_bytes / record_size).max(1);
        Self {
            bytes: vec![0u8; capacity * record_size],
            record_size,
            capacity,
            first_id: 0,
            valid: 0,
            dirty: false,
        }
    }

    /// Number of records the window holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// First id of the window that covers `id`.
    pub fn window_start(&self, id: NodeId) -> NodeId {
        let index = (id as usize - 1) / self.capacity;
        (index * self.capacity + 1) as NodeId
    }

    /// Whether the loaded window covers `id`.
    pub fn contains(&self, id: NodeId) -> bool {
        self.first_id != 0
            && id >= self.first_id
            && ((id - self.first_id) as usize) < self.capacity
    }

    pub fn first_id(&self) -> NodeId {
        self.first_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bytes of record `id`, if the window holds data for it.
    pub fn record(&self, id: NodeId) -> Option<&[u8]> {
        if !self.contains(id) {
            return None;
        }
        let index = (id - self.first_id) as usize;
        if index >= self.valid {
            return None;
        }
        let start = index * self.record_size;
        Some(&self.bytes[start..start + self.record_size])
    }

    /// Mutable bytes of record `id`; marks the window dirty. `id` must be
    /// inside the loaded window.
    pub fn record_mut(&mut self, id: NodeId) -> Option<&mut [u8]> {
        if !self.contains(id) {
            return None;
        }
        let index = (id - self.first_id) as usize;
        self.valid = self.valid.max(index + 1);
        self.dirty = true;
        let start = index * self.record_size;
        Some(&mut self.bytes[start..start + self.record_size])
    }

    /// Replaces the window with `data` read from disk for the window starting
    /// at `first_id`. `data` may be shorter than the window (end of file).
    pub fn load(&mut self, first_id: NodeId, data: &[u8]) {
        debug_assert_eq!(first_id, self.window_start(first_id));
        let len = data.len().min(self.bytes.len());
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.bytes[len..].fill(0);
        self.first_id = first_id;
        self.valid = len / self.record_size;
        self.dirty = false;
    }

    /// The bytes that must be written back, with the id of their first record.
    pub fn dirty_span(&self) -> Option<(NodeId, &[u8])> {
        if !self.dirty || self.first_id == 0 {
            return None;
        }
        Some((self.first_id, &self.bytes[..self.valid * self.record_size]))
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Drops the window without writing it back.
    pub fn invalidate(&mut self) {
        self.first_id = 0;
        self.valid = 0;
        self.dirty = false;
        self.bytes.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_budget() {
        let buffer = PageBuffer::new(48, 8192);
        assert_eq!(buffer.capacity(), 170);
        let tiny = PageBuffer::new(48, 10);
        assert_eq!(tiny.capacity(), 1);
    }

    #[test]
    fn test_window_alignment() {
        let buffer = PageBuffer::new(10, 40);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.window_start(1), 1);
        assert_eq!(buffer.window_start(4), 1);
        assert_eq!(buffer.window_start(5), 5);
        assert_eq!(buffer.window_start(11), 9);
    }

    #[test]
    fn test_empty_buffer_contains_nothing() {
        let buffer = PageBuffer::new(10, 40);
        assert!(!buffer.contains(1));
        assert!(buffer.record(1).is_none());
        assert!(buffer.dirty_span().is_none());
    }

    #[test]
    fn test_load_and_read() {
        let mut buffer = PageBuffer::new(2, 8);
        buffer.load(5, &[1, 2, 3, 4]);
        assert!(buffer.contains(5));
        assert!(buffer.contains(8));
        assert!(!buffer.contains(9));
        assert_eq!(buffer.record(5).unwrap(), &[1, 2]);
        assert_eq!(buffer.record(6).unwrap(), &[3, 4]);
        // loaded but past end of data
        assert!(buffer.record(7).is_none());
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_write_extends_valid_and_dirties() {
        let mut buffer = PageBuffer::new(2, 8);
        buffer.load(1, &[]);
        buffer.record_mut(2).unwrap().copy_from_slice(&[7, 7]);
        assert!(buffer.is_dirty());
        let (first, bytes) = buffer.dirty_span().unwrap();
        assert_eq!(first, 1);
        assert_eq!(bytes, &[0, 0, 7, 7]);

        buffer.mark_clean();
        assert!(buffer.dirty_span().is_none());
        assert_eq!(buffer.record(2).unwrap(), &[7, 7]);
    }

    #[test]
    fn test_invalidate() {
        let mut buffer = PageBuffer::new(2, 8);
        buffer.load(1, &[1, 1]);
        buffer.record_mut(1).unwrap()[0] = 9;
        buffer.invalidate();
        assert!(!buffer.contains(1));
        assert!(!buffer.is_dirty());
    }
}
