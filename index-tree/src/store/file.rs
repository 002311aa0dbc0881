//! File-backed node store.
//!
//! Layout, written once when the file is created:
//!
//! ```text
//! i32  magic number
//! u8   byte order flag (1 = little endian)
//! f64  format version
//! i32  max elements
//! i32  dimension
//! i32  coordinate system blob length
//! [u8] coordinate system blob (bincode)
//! ```
//!
//! followed by fixed-size node records. Record `n` (1-based) starts at
//! `header_len + (n - 1) * record_size` and holds `2 * dimension` doubles of
//! boundary (all NaN when unset) and four i32: parent, sibling, child, child
//! count. A negative child is the element id of an element record.
//!
//! Every read and write goes through [`PageBuffer`]: when the requested id
//! falls outside the buffered window, the dirty window is written back and
//! the window covering the id is loaded.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use crate::envelope::{CoordinateSystem, Envelope};
use crate::tree::persistence::FreeList;
use crate::tree::rtree_types::{
    ByteOrder, ChildLink, FileHeader, NodeId, NodeRecord, StoreStats, TreeError, TreeResult,
    NO_NODE,
};

use super::page_buffer::PageBuffer;
use super::NodeStore;

/// Bytes before the coordinate system blob.
const FIXED_HEADER_LEN: usize = 4 + 1 + 8 + 4 + 4 + 4;

/// Node store over a file of fixed-size records.
///
/// Reads and writes one buffered window at a time; nothing else of the file
/// is held in memory.
#[derive(Debug)]
pub struct FileNodeStore {
    file: File,
    path: PathBuf,
    header: FileHeader,
    header_len: u64,
    buffer: PageBuffer,
    next_id: NodeId,
    /// Records physically present in the file
    records_on_disk: u64,
    free: FreeList,
    live: u64,
    closed: bool,
    stats: StoreStats,
}

impl FileNodeStore {
    /// Creates (or truncates) the file at `path` and writes its header.
    pub fn create(
        path: &Path,
        max_elements: usize,
        coordinate_system: CoordinateSystem,
        byte_order: ByteOrder,
        buffer_bytes: usize,
        recycle_ids: bool,
    ) -> TreeResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| TreeError::io(format!("creating {}", path.display()), e))?;

        let header = FileHeader::new(byte_order, max_elements as u32, coordinate_system);
        header.validate()?;
        let bytes = encode_header(&header)?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| TreeError::io("writing header", e))?;

        debug!(
            "Created node store at {:?} (dimension {}, max elements {})",
            path, header.dimension, header.max_elements
        );

        let record_size = header.record_size();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            header,
            header_len: bytes.len() as u64,
            buffer: PageBuffer::new(record_size, buffer_bytes),
            next_id: 1,
            records_on_disk: 0,
            free: FreeList::new(recycle_ids),
            live: 0,
            closed: false,
            stats: StoreStats::default(),
        })
    }

    /// Opens an existing file. Only the header is read.
    pub fn open(path: &Path, buffer_bytes: usize, recycle_ids: bool) -> TreeResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| TreeError::io(format!("opening {}", path.display()), e))?;

        let (header, header_len) = read_header(&mut file)?;
        header.validate()?;

        let file_len = file
            .metadata()
            .map_err(|e| TreeError::io("reading file length", e))?
            .len();
        let record_size = header.record_size() as u64;
        let records_on_disk = file_len.saturating_sub(header_len) / record_size;
        if records_on_disk >= i32::MAX as u64 {
            return Err(TreeError::Format(format!(
                "{} records exceed the id space",
                records_on_disk
            )));
        }

        debug!(
            "Opened node store at {:?} with {} records (version {})",
            path, records_on_disk, header.version
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            buffer: PageBuffer::new(header.record_size(), buffer_bytes),
            header,
            header_len,
            next_id: records_on_disk as NodeId + 1,
            records_on_disk,
            free: FreeList::new(recycle_ids),
            live: records_on_disk,
            closed: false,
            stats: StoreStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Byte offset where the first node record starts.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Records the buffer window holds.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn check_closed(&self) -> TreeResult<()> {
        if self.closed {
            Err(TreeError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_live(&self, id: NodeId) -> TreeResult<()> {
        if self.is_live(id) {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id))
        }
    }

    fn record_offset(&self, id: NodeId) -> u64 {
        self.header_len + (id as u64 - 1) * self.header.record_size() as u64
    }

    /// Makes sure the window covers `id`, writing back the current window
    /// first if it is dirty.
    fn adjust_buffer(&mut self, id: NodeId) -> TreeResult<()> {
        if self.buffer.contains(id) {
            return Ok(());
        }
        self.flush_window()?;

        let start = self.buffer.window_start(id);
        let available = self
            .records_on_disk
            .saturating_sub(start as u64 - 1)
            .min(self.buffer.capacity() as u64) as usize;
        let mut data = vec![0u8; available * self.buffer.record_size()];
        if available > 0 {
            let offset = self.record_offset(start);
            self.file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| self.file.read_exact(&mut data))
                .map_err(|e| TreeError::io(format!("reading window at node {}", start), e))?;
        }
        self.buffer.load(start, &data);
        self.stats.buffer_loads += 1;
        trace!("Loaded buffer window at node {} ({} records)", start, available);
        Ok(())
    }

    /// Writes the dirty window back to the file.
    fn flush_window(&mut self) -> TreeResult<()> {
        let record_size = self.header.record_size();
        let mut written = None;
        if let Some((first, bytes)) = self.buffer.dirty_span() {
            let offset = self.header_len + (first as u64 - 1) * record_size as u64;
            self.file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| self.file.write_all(bytes))
                .map_err(|e| TreeError::io(format!("writing window at node {}", first), e))?;
            written = Some(first as u64 - 1 + (bytes.len() / record_size) as u64);
        }
        if let Some(end) = written {
            self.records_on_disk = self.records_on_disk.max(end);
            self.buffer.mark_clean();
            self.stats.buffer_flushes += 1;
        }
        Ok(())
    }

    fn put_record(&mut self, id: NodeId, record: &NodeRecord) -> TreeResult<()> {
        self.adjust_buffer(id)?;
        let order = self.header.byte_order;
        let dimension = self.header.dimension as usize;
        let slot = self
            .buffer
            .record_mut(id)
            .ok_or(TreeError::UnknownNode(id))?;
        encode_record(slot, record, dimension, order)?;
        self.stats.record_writes += 1;
        Ok(())
    }
}

impl NodeStore for FileNodeStore {
    fn max_elements(&self) -> usize {
        self.header.max_elements as usize
    }

    fn coordinate_system(&self) -> &CoordinateSystem {
        &self.header.coordinate_system
    }

    fn create_node(&mut self, record: NodeRecord) -> TreeResult<NodeId> {
        self.check_closed()?;
        let id = match self.free.acquire() {
            Some(id) => id,
            None => {
                if self.next_id >= i32::MAX as NodeId {
                    return Err(TreeError::InvalidState("node id space exhausted".into()));
                }
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        self.put_record(id, &record)?;
        self.live += 1;
        Ok(id)
    }

    fn read_node(&mut self, id: NodeId) -> TreeResult<NodeRecord> {
        self.check_closed()?;
        self.check_live(id)?;
        self.adjust_buffer(id)?;
        let bytes = self.buffer.record(id).ok_or(TreeError::UnknownNode(id))?;
        let record = decode_record(
            bytes,
            self.header.dimension as usize,
            self.header.byte_order,
            id,
        )?;
        self.stats.record_reads += 1;
        Ok(record)
    }

    fn write_node(&mut self, id: NodeId, record: &NodeRecord) -> TreeResult<()> {
        self.check_closed()?;
        self.check_live(id)?;
        self.put_record(id, record)
    }

    fn delete_node(&mut self, id: NodeId) -> TreeResult<()> {
        self.check_closed()?;
        self.check_live(id)?;
        self.free.release(id);
        self.live = self.live.saturating_sub(1);
        Ok(())
    }

    fn next_id(&self) -> NodeId {
        self.next_id
    }

    fn is_live(&self, id: NodeId) -> bool {
        id != NO_NODE && id < self.next_id && !self.free.contains(id)
    }

    fn rewind(&mut self) -> TreeResult<()> {
        self.check_closed()?;
        self.flush_window()?;
        self.buffer.invalidate();
        self.next_id = 1;
        self.free.clear();
        self.live = 0;
        debug!("Rewound node store at {:?}", self.path);
        Ok(())
    }

    fn flush(&mut self) -> TreeResult<()> {
        self.check_closed()?;
        self.flush_window()?;

        // records abandoned by a rewind must not look allocated on reopen
        let allocated = self.next_id as u64 - 1;
        if self.records_on_disk > allocated {
            let len = self.header_len + allocated * self.header.record_size() as u64;
            self.file
                .set_len(len)
                .map_err(|e| TreeError::io("truncating abandoned records", e))?;
            self.records_on_disk = allocated;
        }

        self.file
            .sync_all()
            .map_err(|e| TreeError::io("syncing file", e))
    }

    fn close(&mut self) -> TreeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.buffer.invalidate();
        self.closed = true;
        debug!("Closed node store at {:?}", self.path);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            live_records: self.live,
            ..self.stats.clone()
        }
    }
}

impl Drop for FileNodeStore {
    fn drop(&mut self) {
        // Best effort flush on drop
        if !self.closed {
            if let Err(e) = self.flush() {
                warn!("Failed to flush node store at {:?}: {}", self.path, e);
            }
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn put_i32(out: &mut [u8], value: i32, order: ByteOrder) {
    let bytes = match order {
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndian => value.to_be_bytes(),
    };
    out[..4].copy_from_slice(&bytes);
}

fn put_f64(out: &mut [u8], value: f64, order: ByteOrder) {
    let bytes = match order {
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndian => value.to_be_bytes(),
    };
    out[..8].copy_from_slice(&bytes);
}

fn get_i32(bytes: &[u8], order: ByteOrder) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    match order {
        ByteOrder::LittleEndian => i32::from_le_bytes(raw),
        ByteOrder::BigEndian => i32::from_be_bytes(raw),
    }
}

fn get_f64(bytes: &[u8], order: ByteOrder) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    match order {
        ByteOrder::LittleEndian => f64::from_le_bytes(raw),
        ByteOrder::BigEndian => f64::from_be_bytes(raw),
    }
}

fn to_raw_id(value: u32, what: &str) -> TreeResult<i32> {
    i32::try_from(value)
        .map_err(|_| TreeError::InvalidArgument(format!("{} {} does not fit the record", what, value)))
}

pub(crate) fn encode_header(header: &FileHeader) -> TreeResult<Vec<u8>> {
    let blob = bincode::serde::encode_to_vec(&header.coordinate_system, bincode::config::legacy())
        .map_err(|e| TreeError::Serialization(e.to_string()))?;
    let order = header.byte_order;

    let mut bytes = vec![0u8; FIXED_HEADER_LEN + blob.len()];
    put_i32(&mut bytes[0..], header.magic, order);
    bytes[4] = matches!(order, ByteOrder::LittleEndian) as u8;
    put_f64(&mut bytes[5..], header.version, order);
    put_i32(&mut bytes[13..], to_raw_id(header.max_elements, "max elements")?, order);
    put_i32(&mut bytes[17..], to_raw_id(header.dimension, "dimension")?, order);
    put_i32(&mut bytes[21..], to_raw_id(blob.len() as u32, "blob length")?, order);
    bytes[FIXED_HEADER_LEN..].copy_from_slice(&blob);
    Ok(bytes)
}

/// Reads the header from the start of `file`, returning it with its length.
fn read_header(file: &mut File) -> TreeResult<(FileHeader, u64)> {
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_exact(&mut fixed))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => TreeError::Format("truncated header".into()),
            _ => TreeError::io("reading header", e),
        })?;

    let order = match fixed[4] {
        1 => ByteOrder::LittleEndian,
        0 => ByteOrder::BigEndian,
        flag => {
            return Err(TreeError::Format(format!("invalid byte order flag {}", flag)));
        }
    };
    let magic = get_i32(&fixed[0..], order);
    if magic != crate::tree::rtree_constants::MAGIC {
        return Err(TreeError::Format("bad magic number".into()));
    }

    let version = get_f64(&fixed[5..], order);
    let max_elements = get_i32(&fixed[13..], order);
    let dimension = get_i32(&fixed[17..], order);
    let blob_len = get_i32(&fixed[21..], order);
    if max_elements < 0 || dimension <= 0 || blob_len < 0 {
        return Err(TreeError::Format("negative header field".into()));
    }

    let mut blob = vec![0u8; blob_len as usize];
    file.read_exact(&mut blob).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            TreeError::Format("truncated coordinate system".into())
        }
        _ => TreeError::io("reading coordinate system", e),
    })?;
    let coordinate_system: CoordinateSystem =
        bincode::serde::decode_from_slice(&blob, bincode::config::legacy())
            .map(|(cs, _)| cs)
            .map_err(|e| TreeError::Serialization(e.to_string()))?;

    let header = FileHeader {
        magic,
        byte_order: order,
        version,
        max_elements: max_elements as u32,
        dimension: dimension as u32,
        coordinate_system,
    };
    Ok((header, (FIXED_HEADER_LEN + blob.len()) as u64))
}

pub(crate) fn encode_record(
    out: &mut [u8],
    record: &NodeRecord,
    dimension: usize,
    order: ByteOrder,
) -> TreeResult<()> {
    let doubles = dimension * 2;
    match &record.boundary {
        Some(env) => {
            if env.dimension() != dimension {
                return Err(TreeError::InvalidArgument(format!(
                    "boundary has dimension {}, store expects {}",
                    env.dimension(),
                    dimension
                )));
            }
            for (i, c) in env.coords().iter().enumerate() {
                put_f64(&mut out[i * 8..], *c, order);
            }
        }
        None => {
            for i in 0..doubles {
                put_f64(&mut out[i * 8..], f64::NAN, order);
            }
        }
    }
    let base = doubles * 8;
    put_i32(&mut out[base..], to_raw_id(record.parent, "parent id")?, order);
    put_i32(&mut out[base + 4..], to_raw_id(record.sibling, "sibling id")?, order);
    if let ChildLink::Node(id) | ChildLink::Element(id) = record.child {
        to_raw_id(id, "child id")?;
    }
    put_i32(&mut out[base + 8..], record.child.to_raw(), order);
    put_i32(&mut out[base + 12..], to_raw_id(record.child_count, "child count")?, order);
    Ok(())
}

pub(crate) fn decode_record(
    bytes: &[u8],
    dimension: usize,
    order: ByteOrder,
    id: NodeId,
) -> TreeResult<NodeRecord> {
    let doubles = dimension * 2;
    let coords: Vec<f64> = (0..doubles).map(|i| get_f64(&bytes[i * 8..], order)).collect();
    let boundary = if coords.iter().any(|c| c.is_nan()) {
        None
    } else {
        Some(Envelope::new(coords).map_err(|e| {
            TreeError::Format(format!("corrupt boundary in node {}: {}", id, e))
        })?)
    };

    let base = doubles * 8;
    let parent = get_i32(&bytes[base..], order);
    let sibling = get_i32(&bytes[base + 4..], order);
    let child = get_i32(&bytes[base + 8..], order);
    let child_count = get_i32(&bytes[base + 12..], order);
    if parent < 0 || sibling < 0 || child_count < 0 {
        return Err(TreeError::Format(format!("corrupt links in node {}", id)));
    }

    Ok(NodeRecord {
        boundary,
        parent: parent as NodeId,
        sibling: sibling as NodeId,
        child: ChildLink::from_raw(child),
        child_count: child_count as u32,
    })
}
