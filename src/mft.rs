//! MFT record parsing and the Master File Table
//!
//! Every file on an NTFS volume is described by one or more fixed-size
//! records in the $MFT. `MftRecord` decodes a single record (fixup,
//! header, attributes); `Mft` fronts the whole table with a bounded
//! segment cache and resolves string paths through directory indexes.

use crate::attr::{
    parse_record_attributes, wof, AttributeCollection, AttributeMap, AttributeValue,
    WOF_DATA_STREAM_NAME,
};
use crate::cache::BoundedCache;
use crate::error::{NtfsError, Result};
use crate::fixup::apply_fixup;
use crate::index::{DirEntries, Index, IndexEntry, IndexKey};
use crate::io::ReadSeek;
use crate::stream::{missing_decompressor, NtfsStream, RunlistStream, WofCompressedStream};
use crate::structs::{
    AttributeType, DataRun, FileRecordHeader, SegmentReference, FILE_NAME_DOS, FILE_NUMBER_MFT,
    FILE_NUMBER_ROOT, MFT_RECORD_SIGNATURE,
};
use crate::volume::NtfsCore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// Bound on the number of cached MFT records
const RECORD_CACHE_SIZE: usize = 4096;

// ============================================================================
// MFT record
// ============================================================================

struct RecordInner {
    core: Weak<NtfsCore>,
    segment: Option<u64>,
    /// Fixed-up record bytes, shared with the attributes parsed out of it
    data: Arc<Vec<u8>>,
    header: FileRecordHeader,
    attributes: OnceLock<AttributeMap>,
}

/// One parsed file record segment. Cheap to clone.
#[derive(Clone)]
pub struct MftRecord {
    inner: Arc<RecordInner>,
}

impl std::fmt::Debug for MftRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.segment {
            Some(segment) => write!(
                f,
                "<MftRecord {}#{}>",
                segment, self.inner.header.sequence_number
            ),
            None => write!(f, "<MftRecord ?#{}>", self.inner.header.sequence_number),
        }
    }
}

impl PartialEq for MftRecord {
    fn eq(&self, other: &Self) -> bool {
        self.inner.segment == other.inner.segment
            && self.inner.header.sequence_number == other.inner.header.sequence_number
    }
}

impl MftRecord {
    /// Parse an isolated record from bytes, without any volume context.
    ///
    /// Non-resident data and index lookups on the result fail with
    /// [`NtfsError::VolumeUnavailable`] / [`NtfsError::MftUnavailable`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse(data, Weak::new(), None)
    }

    pub(crate) fn parse(data: &[u8], core: Weak<NtfsCore>, segment: Option<u64>) -> Result<Self> {
        if data.len() < 4 || &data[..4] != MFT_RECORD_SIGNATURE {
            return Err(NtfsError::BadMft(format!(
                "invalid MFT record signature: {:?}",
                &data[..data.len().min(4)]
            )));
        }

        let fixed = apply_fixup(data)?;
        let header = FileRecordHeader::from_bytes(&fixed)
            .ok_or_else(|| NtfsError::BadMft("file record header truncated".to_string()))?;

        Ok(Self {
            inner: Arc::new(RecordInner {
                core,
                segment,
                data: Arc::new(fixed),
                header,
                attributes: OnceLock::new(),
            }),
        })
    }

    pub fn segment(&self) -> Option<u64> {
        self.inner.segment
    }

    pub fn header(&self) -> &FileRecordHeader {
        &self.inner.header
    }

    /// The fixed-up record bytes
    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    pub(crate) fn core_weak(&self) -> Weak<NtfsCore> {
        self.inner.core.clone()
    }

    fn core(&self) -> Result<Arc<NtfsCore>> {
        self.inner.core.upgrade().ok_or(NtfsError::MftUnavailable)
    }

    fn mft(&self) -> Result<Arc<NtfsCore>> {
        let core = self.core()?;
        if core.mft.get().is_none() {
            return Err(NtfsError::MftUnavailable);
        }
        Ok(core)
    }

    /// The attributes of this record, parsed on first access.
    ///
    /// A non-resident or child-record $ATTRIBUTE_LIST is resolved only when
    /// the owning MFT is available; without it the list stays unresolved.
    pub fn attributes(&self) -> Result<&AttributeMap> {
        if let Some(attrs) = self.inner.attributes.get() {
            return Ok(attrs);
        }

        let attrs = self.parse_attributes()?;
        Ok(self.inner.attributes.get_or_init(|| attrs))
    }

    fn parse_attributes(&self) -> Result<AttributeMap> {
        let mut attrs = parse_record_attributes(
            &self.inner.core,
            self.inner.segment,
            &self.inner.data,
            self.inner.header.first_attribute_offset as usize,
        )?;

        let list = attrs.get(AttributeType::AttributeList);
        if list.is_empty() {
            return Ok(attrs);
        }

        let Some(core) = self.inner.core.upgrade() else {
            return Ok(attrs);
        };
        let Some(mft) = core.mft.get() else {
            return Ok(attrs);
        };

        // The list itself can be non-resident; without a volume to read it
        // from it stays unresolved
        let entries = match list.iter().next().unwrap().attribute_list() {
            Ok(entries) => entries.to_vec(),
            Err(NtfsError::VolumeUnavailable) => return Ok(attrs),
            Err(e) => return Err(e),
        };

        let mut seen = std::collections::HashSet::new();
        seen.insert(self.inner.segment.unwrap_or(u64::MAX));

        for entry in entries {
            let segment = entry.segment_reference.segment;
            if segment == 0 || !seen.insert(segment) {
                continue;
            }

            let child = mft.get_segment(segment)?;
            for attr in child.attributes()?.values() {
                attrs.add(attr.clone());
            }
        }

        Ok(attrs)
    }

    /// Whether the default $DATA stream is resident
    pub fn resident(&self) -> Result<bool> {
        Ok(self
            .attributes()?
            .get(AttributeType::Data)
            .iter()
            .any(|attr| attr.resident()))
    }

    pub fn is_dir(&self) -> bool {
        self.inner.header.has_filename_index()
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn is_in_use(&self) -> bool {
        self.inner.header.is_in_use()
    }

    /// All file names of this record, sorted by name flags so Win32 names
    /// order deterministically before DOS tie-breakers
    pub fn filenames(&self, ignore_dos: bool) -> Result<Vec<String>> {
        let mut names: Vec<(u8, String)> = Vec::new();
        for attr in self.attributes()?.get(AttributeType::FileName).iter() {
            let fname = attr.file_name()?;
            if ignore_dos && fname.flags == FILE_NAME_DOS {
                continue;
            }
            names.push((fname.flags, fname.name.clone()));
        }
        names.sort_by_key(|(flags, _)| *flags);
        Ok(names.into_iter().map(|(_, name)| name).collect())
    }

    /// The first file name, or None if this record has no file names
    pub fn filename(&self) -> Result<Option<String>> {
        Ok(self.filenames(false)?.into_iter().next())
    }

    /// All full paths of this record, reconstructed through parent references
    pub fn full_paths(&self, ignore_dos: bool) -> Result<Vec<String>> {
        let core = self.mft()?;
        let mft = core.mft.get().unwrap();

        let mut paths: Vec<(u8, String)> = Vec::new();
        for attr in self.attributes()?.get(AttributeType::FileName).iter() {
            let fname = attr.file_name()?;
            if ignore_dos && fname.flags == FILE_NAME_DOS {
                continue;
            }
            paths.push((
                fname.flags,
                full_path_from(mft, &fname.name, fname.parent_directory),
            ));
        }
        paths.sort_by_key(|(flags, _)| *flags);
        Ok(paths.into_iter().map(|(_, path)| path).collect())
    }

    /// The first full path, or None if this record has no file names
    pub fn full_path(&self) -> Result<Option<String>> {
        Ok(self.full_paths(false)?.into_iter().next())
    }

    /// Resolve a path relative to this record
    pub fn get(&self, path: &str) -> Result<MftRecord> {
        let core = self.mft()?;
        core.mft.get().unwrap().get_path(path, Some(self))
    }

    fn stream_attributes(&self, name: &str, attr_type: AttributeType) -> Result<AttributeCollection> {
        let attrs = self.attributes()?.find(name, attr_type);
        if attrs.is_empty() {
            return Err(NtfsError::NoSuchStream {
                segment: self.inner.segment.unwrap_or(0),
                name: name.to_string(),
                attr_type: attr_type as u32,
            });
        }
        Ok(attrs)
    }

    /// Open a stream by name and attribute type.
    ///
    /// The default $DATA stream of a WOF-overlay file is transparently
    /// served through its compressed chunks; the raw sparse stream stays
    /// reachable via `allocated`.
    pub fn open(&self, name: &str, attr_type: AttributeType, allocated: bool) -> Result<NtfsStream> {
        if name.is_empty() && attr_type == AttributeType::Data && !allocated {
            if let Some(stream) = self.open_wof()? {
                return Ok(stream);
            }
        }
        self.stream_attributes(name, attr_type)?.open(allocated)
    }

    /// Route a WOF-overlay file's data through its WofCompressedData stream.
    ///
    /// Returns None when this record is not a file-provider WOF overlay, so
    /// the caller falls back to the ordinary stream path.
    fn open_wof(&self) -> Result<Option<NtfsStream>> {
        let attrs = self.attributes()?;

        let reparse_attrs = attrs.get(AttributeType::ReparsePoint);
        let Some(reparse) = reparse_attrs.iter().next() else {
            return Ok(None);
        };
        let info = match reparse.value() {
            Ok(AttributeValue::ReparsePoint(rp)) => rp.wof_info(),
            Ok(_) => None,
            Err(NtfsError::VolumeUnavailable) => None,
            Err(e) => return Err(e),
        };
        let Some(info) = info else {
            return Ok(None);
        };
        // WIM-backed overlays resolve outside the volume
        if info.provider != wof::PROVIDER_FILE {
            return Ok(None);
        }
        let Some(chunk_size) = info.chunk_size() else {
            return Err(NtfsError::DecompressionFailed(format!(
                "unknown WOF compression algorithm: {}",
                info.algorithm
            )));
        };

        let backing = attrs.find(WOF_DATA_STREAM_NAME, AttributeType::Data);
        if backing.is_empty() || backing.resident() {
            return Ok(None);
        }

        let core = self
            .inner
            .core
            .upgrade()
            .ok_or(NtfsError::VolumeUnavailable)?;
        let source = core.source.clone().ok_or(NtfsError::VolumeUnavailable)?;

        let original_size = self
            .stream_attributes("", AttributeType::Data)?
            .size(false);
        let decompress = match info.algorithm {
            wof::COMPRESSION_LZX => core
                .lzx
                .clone()
                .unwrap_or_else(|| missing_decompressor("LZX")),
            _ => core
                .lzxpress_huffman
                .clone()
                .unwrap_or_else(|| missing_decompressor("LZXPRESS-Huffman")),
        };

        let stream = WofCompressedStream::new(
            source,
            backing.dataruns()?,
            backing.size(false),
            original_size,
            core.geometry.cluster_size as u64,
            decompress,
            chunk_size,
        )?;
        Ok(Some(NtfsStream::Wof(stream)))
    }

    /// Open the default $DATA stream
    pub fn open_data(&self) -> Result<NtfsStream> {
        self.open("", AttributeType::Data, false)
    }

    /// Stream size by name and attribute type
    pub fn size(&self, name: &str, attr_type: AttributeType, allocated: bool) -> Result<u64> {
        Ok(self.stream_attributes(name, attr_type)?.size(allocated))
    }

    /// Size of the default $DATA stream
    pub fn data_size(&self) -> Result<u64> {
        self.size("", AttributeType::Data, false)
    }

    /// The merged runlist of a stream
    pub fn dataruns(&self, name: &str, attr_type: AttributeType) -> Result<Vec<DataRun>> {
        self.stream_attributes(name, attr_type)?.dataruns()
    }

    pub fn has_stream(&self, name: &str, attr_type: AttributeType) -> Result<bool> {
        Ok(!self.attributes()?.find(name, attr_type).is_empty())
    }

    /// Open an index on this record, e.g. "$I30"
    pub fn index(&self, name: &str) -> Result<Index> {
        Index::new(self.clone(), name)
    }

    /// Iterate the entries of this directory's $I30 index lazily
    pub fn iterdir(&self, ignore_dos: bool) -> Result<DirEntries> {
        if !self.is_dir() {
            return Err(NtfsError::NotADirectory(format!("{:?}", self)));
        }
        Ok(DirEntries::new(self.index("$I30")?, ignore_dos))
    }

    /// Directory entries keyed by file name
    pub fn listdir(&self, ignore_dos: bool) -> Result<HashMap<String, IndexEntry>> {
        let mut result = HashMap::new();
        for entry in self.iterdir(ignore_dos)? {
            if let Ok(fname) = entry.file_name() {
                result.insert(fname.name.clone(), entry);
            }
        }
        Ok(result)
    }
}

// ============================================================================
// Master File Table
// ============================================================================

/// Byte stream the MFT reads its records from
enum MftStream {
    /// A host-supplied $MFT file
    External(Mutex<Box<dyn ReadSeek>>),
    /// The $MFT reconstructed from its own runlist on a raw volume
    Runlist(Mutex<RunlistStream>),
}

impl MftStream {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            MftStream::External(fh) => {
                let mut fh = fh.lock();
                fh.seek(SeekFrom::Start(offset))?;
                fh.read_exact(buf)?;
                Ok(())
            }
            MftStream::Runlist(stream) => {
                let mut stream = stream.lock();
                stream.seek(SeekFrom::Start(offset))?;
                stream.read_exact(buf)?;
                Ok(())
            }
        }
    }
}

/// The Master File Table: an array of fixed-size records indexed by segment
/// number, fronted by a bounded cache.
pub struct Mft {
    core: Weak<NtfsCore>,
    stream: MftStream,
    record_size: u64,
    cache: Mutex<BoundedCache<u64, MftRecord>>,
}

impl Mft {
    /// Open an MFT over a host-supplied $MFT file
    pub(crate) fn from_stream(
        fh: Box<dyn ReadSeek>,
        core: Weak<NtfsCore>,
        record_size: u64,
    ) -> Self {
        Self {
            core,
            stream: MftStream::External(Mutex::new(fh)),
            record_size,
            cache: Mutex::new(BoundedCache::new(RECORD_CACHE_SIZE)),
        }
    }

    /// Open an MFT over a runlist into the raw volume
    pub(crate) fn from_runlist(
        stream: RunlistStream,
        core: Weak<NtfsCore>,
        record_size: u64,
    ) -> Self {
        Self {
            core,
            stream: MftStream::Runlist(Mutex::new(stream)),
            record_size,
            cache: Mutex::new(BoundedCache::new(RECORD_CACHE_SIZE)),
        }
    }

    /// Append runs to the backing runlist stream during bootstrap
    pub(crate) fn extend_runlist<I: IntoIterator<Item = DataRun>>(&self, runs: I) {
        if let MftStream::Runlist(stream) = &self.stream {
            stream.lock().extend_runlist(runs);
        }
    }

    /// The current extent map of the backing stream, when runlist-backed
    pub fn runlist(&self) -> Option<Vec<DataRun>> {
        match &self.stream {
            MftStream::Runlist(stream) => Some(stream.lock().runlist().to_vec()),
            MftStream::External(_) => None,
        }
    }

    /// The root directory record
    pub fn root(&self) -> Result<MftRecord> {
        self.get_segment(FILE_NUMBER_ROOT)
    }

    /// Retrieve a record by segment number
    pub fn get_segment(&self, segment: u64) -> Result<MftRecord> {
        if let Some(record) = self.cache.lock().get(&segment) {
            return Ok(record);
        }

        let mut data = vec![0u8; self.record_size as usize];
        self.stream
            .read_exact_at(segment * self.record_size, &mut data)?;

        let record = MftRecord::parse(&data, self.core.clone(), Some(segment))?;
        self.cache.lock().insert(segment, record.clone());
        Ok(record)
    }

    /// Retrieve a record by segment reference.
    ///
    /// Only the segment number is used; staleness of the sequence number is
    /// the caller's concern.
    pub fn get_reference(&self, reference: SegmentReference) -> Result<MftRecord> {
        self.get_segment(reference.segment)
    }

    /// Resolve a file path to a record. Both `/` and `\` separate components.
    pub fn get(&self, path: &str) -> Result<MftRecord> {
        self.get_path(path, None)
    }

    pub(crate) fn get_path(&self, path: &str, root: Option<&MftRecord>) -> Result<MftRecord> {
        let mut node = match root {
            Some(record) => record.clone(),
            None => self.root()?,
        };

        let normalized = path.replace('\\', "/");
        for part in normalized.split('/') {
            if part.is_empty() {
                continue;
            }

            if !node.is_dir() {
                return Err(NtfsError::NotADirectory(format!(
                    "error finding path {}: {:?} is not a directory",
                    path, node
                )));
            }

            let index = node.index("$I30")?;
            let entry = match index.search(IndexKey::FileName(part), true) {
                Ok(entry) => entry,
                Err(NtfsError::NotFound(_)) => {
                    return Err(NtfsError::NotFound(format!("file not found: {}", path)))
                }
                Err(e) => return Err(e),
            };
            node = entry.dereference()?;
        }

        Ok(node)
    }

    /// Total size of the $MFT data stream in bytes
    pub fn size(&self) -> Result<u64> {
        self.get_segment(FILE_NUMBER_MFT)?.data_size()
    }

    /// Iterate every parseable record slot, in use or not.
    ///
    /// Broken records (bad signature, failed fixup) are skipped; iteration
    /// ends at the end of the $MFT stream.
    pub fn segments(&self) -> Result<Segments<'_>> {
        let count = self.size()? / self.record_size;
        Ok(Segments {
            mft: self,
            segment: 0,
            count,
        })
    }
}

/// Iterator over all MFT record slots
pub struct Segments<'a> {
    mft: &'a Mft,
    segment: u64,
    count: u64,
}

impl Iterator for Segments<'_> {
    type Item = MftRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.segment < self.count {
            let segment = self.segment;
            self.segment += 1;

            match self.mft.get_segment(segment) {
                Ok(record) => return Some(record),
                Err(e) if e.is_recoverable() => {
                    debug!(segment, error = %e, "skipping broken MFT record");
                    continue;
                }
                Err(e) if e.is_eof() => return None,
                Err(e) => {
                    debug!(segment, error = %e, "stopping MFT iteration");
                    return None;
                }
            }
        }
        None
    }
}

// ============================================================================
// Path reconstruction
// ============================================================================

/// Walk parent references upward to build a full path for `name`.
///
/// Unresolvable parents produce `<unknown_segment_0x..>` markers and
/// reference loops produce `<recursion>`, so a best-effort path always comes
/// back.
pub(crate) fn full_path_from(mft: &Mft, name: &str, parent: SegmentReference) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut path = vec![name.to_string()];
    let mut parent = parent;

    loop {
        if parent.segment == FILE_NUMBER_ROOT {
            break;
        }

        if !seen.insert(parent.segment) {
            path.push("<recursion>".to_string());
            break;
        }

        match parent_component(mft, parent) {
            Ok((component, next_parent)) => {
                path.push(component);
                match next_parent {
                    Some(next) => parent = next,
                    None => break,
                }
            }
            Err(_) => {
                path.push(format!("<unknown_segment_0x{:x}>", parent.segment));
                break;
            }
        }
    }

    path.reverse();
    path.join("\\")
}

/// One step up the parent chain: the parent's name and its own parent
fn parent_component(
    mft: &Mft,
    parent: SegmentReference,
) -> Result<(String, Option<SegmentReference>)> {
    let record = mft.get_segment(parent.segment)?;

    let filename_attrs = record.attributes()?.get(AttributeType::FileName);
    let Some(attr) = filename_attrs.iter().next() else {
        return Err(NtfsError::NotFound("record has no file name".to_string()));
    };

    if record.header().sequence_number != parent.sequence {
        return Ok((
            format!("<broken_reference_0x{:x}#{}>", parent.segment, parent.sequence),
            None,
        ));
    }

    let fname = attr.file_name()?;
    Ok((fname.name.clone(), Some(fname.parent_directory)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_rejects_bad_signature() {
        let data = vec![0u8; 1024];
        assert!(matches!(
            MftRecord::from_bytes(&data),
            Err(NtfsError::BadMft(_))
        ));

        let mut data = vec![0u8; 1024];
        data[..4].copy_from_slice(b"BAAD");
        assert!(matches!(
            MftRecord::from_bytes(&data),
            Err(NtfsError::BadMft(_))
        ));
    }

    #[test]
    fn record_requires_valid_fixup() {
        let mut data = vec![0u8; 1024];
        data[..4].copy_from_slice(b"FILE");
        // Fixup array at offset 48, count 3, but mismatched sector tails
        data[4..6].copy_from_slice(&48u16.to_le_bytes());
        data[48..50].copy_from_slice(&0x1234u16.to_le_bytes());
        assert!(matches!(
            MftRecord::from_bytes(&data),
            Err(NtfsError::BadFixup(_))
        ));
    }
}
