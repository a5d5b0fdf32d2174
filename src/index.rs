//! B+-tree index engine
//!
//! Directories ($I30) and the $Secure id index ($SII) are B+-trees whose
//! root node lives in a resident $INDEX_ROOT attribute and whose remaining
//! nodes ("index buffers") live in a non-resident $INDEX_ALLOCATION stream,
//! addressed by virtual cluster number. Keys are ordered by the collation
//! rule stored in the root.

use crate::cache::BoundedCache;
use crate::error::{NtfsError, Result};
use crate::fixup::apply_fixup;
use crate::mft::MftRecord;
use crate::stream::NtfsStream;
use crate::structs::{
    AttributeType, FileName, SegmentReference, FILE_NAME_DOS, INDEX_BUFFER_SIGNATURE, SECTOR_SHIFT,
};
use crate::volume::NtfsCore;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Weak};
use tracing::warn;

/// Bound on cached index buffers, per index
const BUFFER_CACHE_SIZE: usize = 128;

/// Collation rules, as stored in $INDEX_ROOT
pub mod collation {
    pub const BINARY: u32 = 0;
    pub const FILE_NAME: u32 = 1;
    pub const UNICODE_STRING: u32 = 2;
    pub const NTOFS_ULONG: u32 = 16;
    pub const NTOFS_SID: u32 = 17;
    pub const NTOFS_SECURITY_HASH: u32 = 18;
    pub const NTOFS_ULONGS: u32 = 19;
}

// Index entry flags
pub const INDEX_ENTRY_NODE: u16 = 0x01;
pub const INDEX_ENTRY_END: u16 = 0x02;

/// Size of the on-disk _INDEX_ENTRY header
const INDEX_ENTRY_SIZE: usize = 16;

/// Size of the on-disk _INDEX_ROOT structure, up to the first entry
const INDEX_ROOT_SIZE: usize = 32;

/// Offset of the INDEX_HEADER within an index allocation buffer
const INDEX_BUFFER_HEADER_SIZE: usize = 0x18;

// ============================================================================
// Index root
// ============================================================================

/// Parsed $INDEX_ROOT value: tree metadata plus the root node's entries
#[derive(Debug, Clone)]
pub struct IndexRoot {
    pub attribute_type: u32,
    pub collation_rule: u32,
    pub bytes_per_index_buffer: u32,
    pub clusters_per_index_buffer: u8,
    pub first_entry_offset: u32,
    pub total_size_of_entries: u32,
    pub flags: u8,
    data: Vec<u8>,
}

impl IndexRoot {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < INDEX_ROOT_SIZE {
            return Err(NtfsError::BadIndex(format!(
                "$INDEX_ROOT truncated: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            attribute_type: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            collation_rule: u32::from_le_bytes(data[4..8].try_into().unwrap()),
            bytes_per_index_buffer: u32::from_le_bytes(data[8..12].try_into().unwrap()),
            clusters_per_index_buffer: data[12],
            first_entry_offset: u32::from_le_bytes(data[16..20].try_into().unwrap()),
            total_size_of_entries: u32::from_le_bytes(data[20..24].try_into().unwrap()),
            flags: data[28],
            data,
        })
    }
}

// ============================================================================
// Index entry
// ============================================================================

/// One entry of an index node.
///
/// The first 8 header bytes are a union: a file reference for directory
/// style indexes, or a (data offset, data length) pair for data-carrying
/// indexes like $SII. `END` entries terminate a node and carry no key.
#[derive(Clone)]
pub struct IndexEntry {
    core: Weak<NtfsCore>,
    /// Indexed attribute type from the root, used to interpret the key
    attribute_type: u32,
    union_raw: u64,
    length: u16,
    key_length: u16,
    flags: u16,
    /// Entry bytes past the 16-byte header: key, padding, optional child VCN
    buf: Vec<u8>,
}

impl std::fmt::Debug for IndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEntry")
            .field("length", &self.length)
            .field("key_length", &self.key_length)
            .field("flags", &self.flags)
            .finish()
    }
}

impl IndexEntry {
    pub fn is_end(&self) -> bool {
        self.flags & INDEX_ENTRY_END != 0 || self.length == 0
    }

    pub fn is_node(&self) -> bool {
        self.flags & INDEX_ENTRY_NODE != 0
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn key_length(&self) -> u16 {
        self.key_length
    }

    /// The raw key bytes of this entry
    pub fn key(&self) -> &[u8] {
        let end = (self.key_length as usize).min(self.buf.len());
        &self.buf[..end]
    }

    /// The data part of the union, for data-carrying indexes
    pub fn data(&self) -> &[u8] {
        let data_offset = (self.union_raw & 0xFFFF) as usize;
        let data_length = ((self.union_raw >> 16) & 0xFFFF) as usize;

        let start = data_offset.saturating_sub(INDEX_ENTRY_SIZE);
        let end = (start + data_length).min(self.buf.len());
        if start >= end {
            return &[];
        }
        &self.buf[start..end]
    }

    /// The file reference part of the union, for directory style indexes
    pub fn file_reference(&self) -> SegmentReference {
        SegmentReference::from_u64(self.union_raw)
    }

    /// The child node VCN carried in the last 8 bytes of node entries
    pub fn node_vcn(&self) -> Option<u64> {
        if !self.is_node() || self.buf.len() < 8 {
            return None;
        }
        let tail = &self.buf[self.buf.len() - 8..];
        Some(u64::from_le_bytes(tail.try_into().unwrap()))
    }

    /// Decode the key as a $FILE_NAME, for filename-collated indexes
    pub fn file_name(&self) -> Result<FileName> {
        if self.attribute_type != AttributeType::FileName as u32 {
            return Err(NtfsError::BadIndex(
                "index does not hold $FILE_NAME keys".to_string(),
            ));
        }
        FileName::from_bytes(self.key())
            .ok_or_else(|| NtfsError::BadIndex("index entry $FILE_NAME key truncated".to_string()))
    }

    /// Resolve the file reference to its MFT record
    pub fn dereference(&self) -> Result<MftRecord> {
        let core = self.core.upgrade().ok_or(NtfsError::MftUnavailable)?;
        let mft = core.mft.get().ok_or(NtfsError::MftUnavailable)?;
        mft.get_reference(self.file_reference())
    }
}

/// Parse the entries of one index node slice, stopping at an END entry or a
/// zero length
fn parse_node_entries(
    core: &Weak<NtfsCore>,
    attribute_type: u32,
    data: &[u8],
    start: usize,
    size: usize,
) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    let max_offset = (start + size).min(data.len());
    let mut offset = start;

    while offset + INDEX_ENTRY_SIZE <= data.len() && offset < max_offset {
        let union_raw = u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
        let length = u16::from_le_bytes(data[offset + 8..offset + 10].try_into().unwrap());
        let key_length = u16::from_le_bytes(data[offset + 10..offset + 12].try_into().unwrap());
        let flags = u16::from_le_bytes(data[offset + 12..offset + 14].try_into().unwrap());

        let buf_end = (offset + (length as usize).max(INDEX_ENTRY_SIZE)).min(data.len());
        let entry = IndexEntry {
            core: core.clone(),
            attribute_type,
            union_raw,
            length,
            key_length,
            flags,
            buf: data[offset + INDEX_ENTRY_SIZE..buf_end].to_vec(),
        };

        let is_end = entry.is_end();
        entries.push(entry);
        if is_end {
            break;
        }
        offset += length as usize;
    }

    entries
}

// ============================================================================
// Index
// ============================================================================

/// Search key for the built-in collation rules
#[derive(Debug, Clone, Copy)]
pub enum IndexKey<'a> {
    /// FILE_NAME collation: case-insensitive file name comparison
    FileName(&'a str),
    /// NTOFS_ULONG collation: little-endian 4-byte unsigned comparison
    U32(u32),
}

struct IndexInner {
    record: MftRecord,
    name: String,
    root: IndexRoot,
    allocation: Option<Mutex<NtfsStream>>,
    vcn_shift: u32,
    cache: Mutex<BoundedCache<u64, Arc<Vec<u8>>>>,
}

/// An index opened on an MFT record, e.g. `record.index("$I30")`.
/// Cheap to clone.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl Index {
    pub(crate) fn new(record: MftRecord, name: &str) -> Result<Self> {
        let root_data = record
            .open(name, AttributeType::IndexRoot, false)?
            .read_all()?;
        let root = IndexRoot::from_bytes(root_data)?;

        // VCN to byte conversion uses the cluster size unless index buffers
        // are smaller than a cluster, in which case it uses the sector size
        let vcn_shift = match record.core_weak().upgrade() {
            Some(core) if core.geometry.cluster_size <= root.bytes_per_index_buffer => {
                core.geometry.cluster_shift
            }
            _ => SECTOR_SHIFT,
        };

        let allocation = match record.open(name, AttributeType::IndexAllocation, false) {
            Ok(stream) => Some(Mutex::new(stream)),
            Err(NtfsError::NoSuchStream { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            inner: Arc::new(IndexInner {
                record,
                name: name.to_string(),
                root,
                allocation,
                vcn_shift,
                cache: Mutex::new(BoundedCache::new(BUFFER_CACHE_SIZE)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn root(&self) -> &IndexRoot {
        &self.inner.root
    }

    pub fn record(&self) -> &MftRecord {
        &self.inner.record
    }

    /// The entries of the root node, END entry included
    fn root_entries(&self) -> Vec<IndexEntry> {
        let root = &self.inner.root;
        parse_node_entries(
            &self.inner.record.core_weak(),
            root.attribute_type,
            &root.data,
            0x10 + root.first_entry_offset as usize,
            root.total_size_of_entries as usize,
        )
    }

    /// Read, verify and fix up the index buffer at a VCN
    fn buffer_bytes(&self, vcn: u64) -> Result<Arc<Vec<u8>>> {
        if let Some(cached) = self.inner.cache.lock().get(&vcn) {
            return Ok(cached);
        }

        let Some(allocation) = &self.inner.allocation else {
            return Err(NtfsError::NotFound(format!(
                "index has no index allocation: {}",
                self.inner.name
            )));
        };

        let mut buf = vec![0u8; self.inner.root.bytes_per_index_buffer as usize];
        {
            let mut stream = allocation.lock();
            stream.seek(SeekFrom::Start(vcn << self.inner.vcn_shift))?;
            stream.read_exact(&mut buf)?;
        }

        if &buf[..4] != INDEX_BUFFER_SIGNATURE {
            return Err(NtfsError::BadIndex(format!(
                "broken INDX header in buffer at vcn {}",
                vcn
            )));
        }

        let fixed = Arc::new(apply_fixup(&buf)?);
        self.inner.cache.lock().insert(vcn, fixed.clone());
        Ok(fixed)
    }

    /// The entries of the index buffer at a VCN, END entry included
    fn buffer_entries(&self, vcn: u64) -> Result<Vec<IndexEntry>> {
        let data = self.buffer_bytes(vcn)?;
        if data.len() < INDEX_BUFFER_HEADER_SIZE + 8 {
            return Err(NtfsError::BadIndex("index buffer truncated".to_string()));
        }

        let first_entry_offset =
            u32::from_le_bytes(data[0x18..0x1C].try_into().unwrap()) as usize;
        let total_size = u32::from_le_bytes(data[0x1C..0x20].try_into().unwrap()) as usize;

        Ok(parse_node_entries(
            &self.inner.record.core_weak(),
            self.inner.root.attribute_type,
            &data,
            INDEX_BUFFER_HEADER_SIZE + first_entry_offset,
            total_size,
        ))
    }

    /// Search the tree with a key matching the root's collation rule.
    ///
    /// Returns the matching entry for an exact search, otherwise the first
    /// entry whose key collates greater than or equal to the search key.
    pub fn search(&self, key: IndexKey<'_>, exact: bool) -> Result<IndexEntry> {
        match (self.inner.root.collation_rule, key) {
            (collation::FILE_NAME, IndexKey::FileName(name)) => {
                let wanted = upper(name);
                self.search_with(
                    |entry| cmp_filename(entry, &wanted),
                    exact,
                    &format!("{:?}", name),
                )
            }
            (collation::NTOFS_ULONG, IndexKey::U32(value)) => {
                self.search_with(|entry| cmp_ulong(entry, value), exact, &value.to_string())
            }
            (rule, _) => Err(NtfsError::NoCollation(rule)),
        }
    }

    /// Search the tree with a caller-provided comparator.
    ///
    /// The comparator returns the ordering of the search key relative to the
    /// entry's key.
    pub fn search_with<F>(&self, cmp: F, exact: bool, describe: &str) -> Result<IndexEntry>
    where
        F: Fn(&IndexEntry) -> Result<Ordering>,
    {
        let mut entries = self.root_entries();

        loop {
            let entry = bsearch(&entries, &cmp)?;
            let exact_hit = !entry.is_end() && cmp(entry)? == Ordering::Equal;

            if !entry.is_node() || exact_hit {
                if exact && !exact_hit {
                    return Err(NtfsError::NotFound(format!("key not found: {}", describe)));
                }
                return Ok(entry.clone());
            }

            let vcn = entry
                .node_vcn()
                .ok_or_else(|| NtfsError::BadIndex("node entry without child VCN".to_string()))?;
            entries = self.buffer_entries(vcn)?;
        }
    }

    /// Iterate every entry: the root node first, then the allocation buffers
    /// at VCN 0, 1, 2, ... in on-disk order. Broken buffers are skipped.
    pub fn entries(&self) -> IndexEntries {
        IndexEntries {
            index: self.clone(),
            current: self.root_entries().into_iter(),
            vcn: 0,
            in_allocation: false,
            done: false,
        }
    }
}

/// Binary search for the first entry whose key is greater than or equal to
/// the search key. END entries compare greater than any key.
fn bsearch<'e, F>(entries: &'e [IndexEntry], cmp: &F) -> Result<&'e IndexEntry>
where
    F: Fn(&IndexEntry) -> Result<Ordering>,
{
    if entries.is_empty() {
        return Err(NtfsError::BadIndex("empty index node".to_string()));
    }

    let mut min = 0;
    let mut max = entries.len() - 1;

    while min != max {
        let test = min + (max - min) / 2;
        let entry = &entries[test];

        let order = if entry.is_end() {
            Ordering::Less
        } else {
            cmp(entry)?
        };

        if !entry.is_end() && order == Ordering::Greater {
            min = test + 1;
        } else if order == Ordering::Equal {
            return Ok(entry);
        } else {
            max = test;
        }
    }

    Ok(&entries[min])
}

/// Unicode-uppercase approximation of the on-disk $UpCase collation
fn upper(value: &str) -> String {
    value.chars().flat_map(char::to_uppercase).collect()
}

/// FILE_NAME collation: compare the search key against the entry's name,
/// both uppercased. The name length lives at key offset 64, the UTF-16LE
/// characters at offset 66.
fn cmp_filename(entry: &IndexEntry, upper_value: &str) -> Result<Ordering> {
    let buf = &entry.buf;
    if buf.len() < 65 {
        return Err(NtfsError::BadIndex(
            "index entry too short for a $FILE_NAME key".to_string(),
        ));
    }

    let length = buf[64] as usize;
    let end = 66 + length * 2;
    if buf.len() < end {
        return Err(NtfsError::BadIndex(
            "index entry $FILE_NAME key truncated".to_string(),
        ));
    }

    let entry_name = upper(&crate::structs::decode_utf16le(&buf[66..end]));
    Ok(upper_value.cmp(entry_name.as_str()))
}

/// NTOFS_ULONG collation: little-endian 4-byte unsigned comparison
fn cmp_ulong(entry: &IndexEntry, value: u32) -> Result<Ordering> {
    let key = entry.key();
    if key.len() != 4 {
        return Err(NtfsError::BadIndex(format!(
            "invalid key length for ULONG collation: {}",
            key.len()
        )));
    }
    let entry_value = u32::from_le_bytes(key.try_into().unwrap());
    Ok(value.cmp(&entry_value))
}

// ============================================================================
// Iteration
// ============================================================================

/// Iterator over every entry of an index, in on-disk traversal order
pub struct IndexEntries {
    index: Index,
    current: std::vec::IntoIter<IndexEntry>,
    vcn: u64,
    in_allocation: bool,
    done: bool,
}

impl Iterator for IndexEntries {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for entry in self.current.by_ref() {
                if entry.is_end() {
                    break;
                }
                return Some(entry);
            }

            if self.done {
                return None;
            }
            if self.index.inner.allocation.is_none() {
                self.done = true;
                return None;
            }

            if self.in_allocation {
                self.vcn += 1;
            } else {
                self.in_allocation = true;
                self.vcn = 0;
            }

            match self.index.buffer_entries(self.vcn) {
                Ok(entries) => self.current = entries.into_iter(),
                Err(e) if e.is_eof() => {
                    self.done = true;
                    return None;
                }
                Err(e) if e.is_recoverable() => {
                    // A single broken buffer does not halt iteration
                    warn!(vcn = self.vcn, error = %e, "skipping broken index buffer");
                    self.current = Vec::new().into_iter();
                }
                Err(e) => {
                    warn!(vcn = self.vcn, error = %e, "stopping index iteration");
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Iterator over a directory's $I30 entries
pub struct DirEntries {
    entries: IndexEntries,
    ignore_dos: bool,
}

impl DirEntries {
    pub(crate) fn new(index: Index, ignore_dos: bool) -> Self {
        Self {
            entries: index.entries(),
            ignore_dos,
        }
    }
}

impl Iterator for DirEntries {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            if self.ignore_dos {
                if let Ok(fname) = entry.file_name() {
                    if fname.flags == FILE_NAME_DOS {
                        continue;
                    }
                }
            }
            return Some(entry);
        }
        None
    }
}
