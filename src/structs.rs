//! NTFS on-disk structures and constants
//!
//! Everything in this module is a bit-exact little-endian decode of what is
//! on disk. Parsers are `from_bytes` constructors; interpretation (streams,
//! indexes, lookups) lives in the higher-level modules.

use crate::error::{NtfsError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use std::io::Cursor;

// ============================================================================
// Constants
// ============================================================================

/// Boot sector OEM field, trailing spaces included
pub const NTFS_SIGNATURE: &[u8; 8] = b"NTFS    ";

/// MFT record signature
pub const MFT_RECORD_SIGNATURE: &[u8; 4] = b"FILE";

/// Index buffer signature
pub const INDEX_BUFFER_SIGNATURE: &[u8; 4] = b"INDX";

/// End of attributes marker
pub const ATTRIBUTE_END_MARKER: u32 = 0xFFFF_FFFF;

pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_SHIFT: u32 = 9;

/// USN journal page size; records never straddle a page
pub const USN_PAGE_SIZE: u64 = 4096;

// Geometry defaults used when neither a volume nor a $BOOT file is available
pub const DEFAULT_SECTOR_SIZE: u32 = 512;
pub const DEFAULT_CLUSTER_SIZE: u32 = 4096;
pub const DEFAULT_RECORD_SIZE: u32 = 1024;
pub const DEFAULT_INDEX_SIZE: u32 = 4096;

// File numbers of the well-known system files
pub const FILE_NUMBER_MFT: u64 = 0;
pub const FILE_NUMBER_MFTMIRR: u64 = 1;
pub const FILE_NUMBER_LOGFILE: u64 = 2;
pub const FILE_NUMBER_VOLUME: u64 = 3;
pub const FILE_NUMBER_ATTRDEF: u64 = 4;
pub const FILE_NUMBER_ROOT: u64 = 5;
pub const FILE_NUMBER_BITMAP: u64 = 6;
pub const FILE_NUMBER_BOOT: u64 = 7;
pub const FILE_NUMBER_SECURE: u64 = 9;
pub const FILE_NUMBER_EXTEND: u64 = 11;

// MFT record flags
pub const FILE_RECORD_SEGMENT_IN_USE: u16 = 0x0001;
pub const FILE_FILE_NAME_INDEX_PRESENT: u16 = 0x0002;

// Attribute flags
pub const ATTRIBUTE_FLAG_COMPRESSION_MASK: u16 = 0x00FF;
pub const ATTRIBUTE_FLAG_ENCRYPTED: u16 = 0x4000;
pub const ATTRIBUTE_FLAG_SPARSE: u16 = 0x8000;

// $FILE_NAME flags
pub const FILE_NAME_NTFS: u8 = 0x01;
pub const FILE_NAME_DOS: u8 = 0x02;

/// File attribute bits shared by $STANDARD_INFORMATION, $FILE_NAME and USN records
pub mod file_attributes {
    pub const READONLY: u32 = 0x0000_0001;
    pub const HIDDEN: u32 = 0x0000_0002;
    pub const SYSTEM: u32 = 0x0000_0004;
    pub const DIRECTORY: u32 = 0x0000_0010;
    pub const ARCHIVE: u32 = 0x0000_0020;
    pub const DEVICE: u32 = 0x0000_0040;
    pub const NORMAL: u32 = 0x0000_0080;
    pub const TEMPORARY: u32 = 0x0000_0100;
    pub const SPARSE_FILE: u32 = 0x0000_0200;
    pub const REPARSE_POINT: u32 = 0x0000_0400;
    pub const COMPRESSED: u32 = 0x0000_0800;
    pub const OFFLINE: u32 = 0x0000_1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x0000_2000;
    pub const ENCRYPTED: u32 = 0x0000_4000;
}

// ============================================================================
// Attribute types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    LoggedUtilityStream = 0x100,
    End = 0xFFFF_FFFF,
}

impl AttributeType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x10 => Some(Self::StandardInformation),
            0x20 => Some(Self::AttributeList),
            0x30 => Some(Self::FileName),
            0x40 => Some(Self::ObjectId),
            0x50 => Some(Self::SecurityDescriptor),
            0x60 => Some(Self::VolumeName),
            0x70 => Some(Self::VolumeInformation),
            0x80 => Some(Self::Data),
            0x90 => Some(Self::IndexRoot),
            0xA0 => Some(Self::IndexAllocation),
            0xB0 => Some(Self::Bitmap),
            0xC0 => Some(Self::ReparsePoint),
            0xD0 => Some(Self::EaInformation),
            0xE0 => Some(Self::Ea),
            0x100 => Some(Self::LoggedUtilityStream),
            0xFFFF_FFFF => Some(Self::End),
            _ => None,
        }
    }
}

/// Well-known reparse point tags. Only tag identification is supported.
pub mod reparse_tag {
    pub const MOUNT_POINT: u32 = 0xA000_0003;
    pub const SYMLINK: u32 = 0xA000_000C;
    pub const DEDUP: u32 = 0x8000_0013;
    pub const WOF: u32 = 0x8000_0017;
}

// ============================================================================
// Segment references
// ============================================================================

/// 48-bit MFT segment number plus 16-bit sequence number.
///
/// The pair is the identity of an MFT record; a reference whose sequence no
/// longer matches the current occupant of the segment is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SegmentReference {
    pub segment: u64,
    pub sequence: u16,
}

impl SegmentReference {
    /// Decode from the raw 8-byte on-disk form
    pub fn from_u64(raw: u64) -> Self {
        Self {
            segment: raw & 0x0000_FFFF_FFFF_FFFF,
            sequence: (raw >> 48) as u16,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        Some(Self::from_u64(u64::from_le_bytes(data[..8].try_into().ok()?)))
    }
}

impl std::fmt::Display for SegmentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.segment, self.sequence)
    }
}

// ============================================================================
// Boot sector
// ============================================================================

/// Parsed NTFS boot sector (first 512 bytes of the volume)
#[derive(Debug, Clone)]
pub struct BootSector {
    /// OEM ID, must be "NTFS    "
    pub oem: [u8; 8],
    pub bytes_per_sector: u16,
    /// Negative values encode `1 << -n` sectors per cluster
    pub sectors_per_cluster: i8,
    pub number_sectors: u64,
    pub mft_start_lcn: u64,
    pub mft2_start_lcn: u64,
    /// Negative values encode a record size of `1 << -n` bytes
    pub clusters_per_file_record_segment: i8,
    /// Negative values encode a buffer size of `2 << -n` bytes.
    /// The off-by-one against the record size field is how it is on disk.
    pub clusters_per_index_buffer: i8,
    pub serial_number: u64,
}

impl BootSector {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 0x50 {
            return Err(NtfsError::BadVolume(data.to_vec()));
        }

        let mut oem = [0u8; 8];
        oem.copy_from_slice(&data[0x03..0x0B]);
        if &oem != NTFS_SIGNATURE {
            return Err(NtfsError::BadVolume(oem.to_vec()));
        }

        Ok(Self {
            oem,
            bytes_per_sector: u16::from_le_bytes([data[0x0B], data[0x0C]]),
            sectors_per_cluster: data[0x0D] as i8,
            number_sectors: u64::from_le_bytes(data[0x28..0x30].try_into().unwrap()),
            mft_start_lcn: u64::from_le_bytes(data[0x30..0x38].try_into().unwrap()),
            mft2_start_lcn: u64::from_le_bytes(data[0x38..0x40].try_into().unwrap()),
            clusters_per_file_record_segment: data[0x40] as i8,
            clusters_per_index_buffer: data[0x44] as i8,
            serial_number: u64::from_le_bytes(data[0x48..0x50].try_into().unwrap()),
        })
    }

    pub fn cluster_size(&self) -> u32 {
        let sectors = if self.sectors_per_cluster < 0 {
            1u32 << (-self.sectors_per_cluster as u32)
        } else {
            self.sectors_per_cluster as u32
        };
        sectors * self.bytes_per_sector as u32
    }

    pub fn record_size(&self) -> u32 {
        if self.clusters_per_file_record_segment < 0 {
            1u32 << (-self.clusters_per_file_record_segment as u32)
        } else {
            self.clusters_per_file_record_segment as u32 * self.cluster_size()
        }
    }

    pub fn index_size(&self) -> u32 {
        if self.clusters_per_index_buffer < 0 {
            2u32 << (-self.clusters_per_index_buffer as u32)
        } else {
            self.clusters_per_index_buffer as u32 * self.cluster_size()
        }
    }
}

// ============================================================================
// MFT record header
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FileRecordHeader {
    pub signature: [u8; 4],
    pub update_sequence_offset: u16,
    pub update_sequence_count: u16,
    pub lsn: u64,
    pub sequence_number: u16,
    pub reference_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub bytes_in_use: u32,
    pub bytes_allocated: u32,
    pub base_record: SegmentReference,
    pub next_attribute_instance: u16,
}

impl FileRecordHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 42 {
            return None;
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[..4]);

        let mut cursor = Cursor::new(&data[4..]);
        Some(Self {
            signature,
            update_sequence_offset: cursor.read_u16::<LittleEndian>().ok()?,
            update_sequence_count: cursor.read_u16::<LittleEndian>().ok()?,
            lsn: cursor.read_u64::<LittleEndian>().ok()?,
            sequence_number: cursor.read_u16::<LittleEndian>().ok()?,
            reference_count: cursor.read_u16::<LittleEndian>().ok()?,
            first_attribute_offset: cursor.read_u16::<LittleEndian>().ok()?,
            flags: cursor.read_u16::<LittleEndian>().ok()?,
            bytes_in_use: cursor.read_u32::<LittleEndian>().ok()?,
            bytes_allocated: cursor.read_u32::<LittleEndian>().ok()?,
            base_record: SegmentReference::from_u64(cursor.read_u64::<LittleEndian>().ok()?),
            next_attribute_instance: cursor.read_u16::<LittleEndian>().ok()?,
        })
    }

    pub fn is_in_use(&self) -> bool {
        (self.flags & FILE_RECORD_SEGMENT_IN_USE) != 0
    }

    /// A filename index on a record is what makes it a directory
    pub fn has_filename_index(&self) -> bool {
        (self.flags & FILE_FILE_NAME_INDEX_PRESENT) != 0
    }

    pub fn is_base_record(&self) -> bool {
        self.base_record.segment == 0
    }
}

// ============================================================================
// $STANDARD_INFORMATION
// ============================================================================

/// Decoded $STANDARD_INFORMATION value.
///
/// Short (pre-3.0) records are tolerated by zero-padding to the extended
/// layout before decoding.
#[derive(Debug, Clone, Default)]
pub struct StandardInformation {
    pub creation_time: u64,
    pub last_modification_time: u64,
    pub last_change_time: u64,
    pub last_access_time: u64,
    pub file_attributes: u32,
    pub maximum_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
    pub owner_id: u32,
    pub security_id: u32,
    pub quota_charged: u64,
    pub usn: u64,
}

/// Size of the extended (NTFS 3.0+) $STANDARD_INFORMATION layout
const STANDARD_INFORMATION_SIZE: usize = 72;

impl StandardInformation {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut padded;
        let data = if data.len() < STANDARD_INFORMATION_SIZE {
            padded = data.to_vec();
            padded.resize(STANDARD_INFORMATION_SIZE, 0);
            &padded[..]
        } else {
            data
        };

        let mut cursor = Cursor::new(data);
        // Reads cannot fail past the padding above
        Self {
            creation_time: cursor.read_u64::<LittleEndian>().unwrap_or(0),
            last_modification_time: cursor.read_u64::<LittleEndian>().unwrap_or(0),
            last_change_time: cursor.read_u64::<LittleEndian>().unwrap_or(0),
            last_access_time: cursor.read_u64::<LittleEndian>().unwrap_or(0),
            file_attributes: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            maximum_versions: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            version_number: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            class_id: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            owner_id: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            security_id: cursor.read_u32::<LittleEndian>().unwrap_or(0),
            quota_charged: cursor.read_u64::<LittleEndian>().unwrap_or(0),
            usn: cursor.read_u64::<LittleEndian>().unwrap_or(0),
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        wintimestamp(self.creation_time)
    }

    pub fn creation_time_ns(&self) -> i64 {
        filetime_ns(self.creation_time)
    }

    pub fn last_modification_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_modification_time)
    }

    pub fn last_modification_time_ns(&self) -> i64 {
        filetime_ns(self.last_modification_time)
    }

    pub fn last_change_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_change_time)
    }

    pub fn last_change_time_ns(&self) -> i64 {
        filetime_ns(self.last_change_time)
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_access_time)
    }

    pub fn last_access_time_ns(&self) -> i64 {
        filetime_ns(self.last_access_time)
    }
}

// ============================================================================
// $FILE_NAME
// ============================================================================

/// Decoded $FILE_NAME value
#[derive(Debug, Clone)]
pub struct FileName {
    pub parent_directory: SegmentReference,
    pub creation_time: u64,
    pub last_modification_time: u64,
    pub last_change_time: u64,
    pub last_access_time: u64,
    pub allocated_length: u64,
    pub file_size: u64,
    pub file_attributes: u32,
    /// EaSize or ReparsePointTag, depending on the file
    pub reparse_value: u32,
    pub name_length: u8,
    /// FILE_NAME_NTFS / FILE_NAME_DOS bits
    pub flags: u8,
    pub name: String,
}

/// Fixed part of the $FILE_NAME layout, before the name characters
pub const FILE_NAME_HEADER_SIZE: usize = 66;

impl FileName {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FILE_NAME_HEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let parent_directory = SegmentReference::from_u64(cursor.read_u64::<LittleEndian>().ok()?);
        let creation_time = cursor.read_u64::<LittleEndian>().ok()?;
        let last_modification_time = cursor.read_u64::<LittleEndian>().ok()?;
        let last_change_time = cursor.read_u64::<LittleEndian>().ok()?;
        let last_access_time = cursor.read_u64::<LittleEndian>().ok()?;
        let allocated_length = cursor.read_u64::<LittleEndian>().ok()?;
        let file_size = cursor.read_u64::<LittleEndian>().ok()?;
        let file_attributes = cursor.read_u32::<LittleEndian>().ok()?;
        let reparse_value = cursor.read_u32::<LittleEndian>().ok()?;
        let name_length = cursor.read_u8().ok()?;
        let flags = cursor.read_u8().ok()?;

        let name_bytes = name_length as usize * 2;
        if data.len() < FILE_NAME_HEADER_SIZE + name_bytes {
            return None;
        }
        let name = decode_utf16le(&data[FILE_NAME_HEADER_SIZE..FILE_NAME_HEADER_SIZE + name_bytes]);

        Some(Self {
            parent_directory,
            creation_time,
            last_modification_time,
            last_change_time,
            last_access_time,
            allocated_length,
            file_size,
            file_attributes,
            reparse_value,
            name_length,
            flags,
            name,
        })
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        wintimestamp(self.creation_time)
    }

    pub fn last_modification_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_modification_time)
    }

    pub fn last_change_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_change_time)
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        wintimestamp(self.last_access_time)
    }

    pub fn is_dos(&self) -> bool {
        self.flags == FILE_NAME_DOS
    }
}

// ============================================================================
// $ATTRIBUTE_LIST entries
// ============================================================================

/// Entry in an $ATTRIBUTE_LIST, pointing at the MFT record that holds the
/// attribute it describes
#[derive(Debug, Clone)]
pub struct AttributeListEntry {
    pub attribute_type: u32,
    pub record_length: u16,
    pub name_length: u8,
    pub name_offset: u8,
    pub lowest_vcn: u64,
    pub segment_reference: SegmentReference,
    pub instance: u16,
    pub name: String,
}

/// Fixed part of an attribute list entry
const ATTRIBUTE_LIST_ENTRY_SIZE: usize = 26;

impl AttributeListEntry {
    /// Parse one entry; returns the entry and the bytes consumed
    pub fn from_bytes(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < ATTRIBUTE_LIST_ENTRY_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let attribute_type = cursor.read_u32::<LittleEndian>().ok()?;
        let record_length = cursor.read_u16::<LittleEndian>().ok()?;
        let name_length = cursor.read_u8().ok()?;
        let name_offset = cursor.read_u8().ok()?;
        let lowest_vcn = cursor.read_u64::<LittleEndian>().ok()?;
        let segment_reference = SegmentReference::from_u64(cursor.read_u64::<LittleEndian>().ok()?);
        let instance = cursor.read_u16::<LittleEndian>().ok()?;

        if (record_length as usize) < ATTRIBUTE_LIST_ENTRY_SIZE
            || record_length as usize > data.len()
        {
            return None;
        }

        let name = if name_length > 0 {
            let start = name_offset as usize;
            let end = start + name_length as usize * 2;
            if end > data.len() {
                return None;
            }
            decode_utf16le(&data[start..end])
        } else {
            String::new()
        };

        Some((
            Self {
                attribute_type,
                record_length,
                name_length,
                name_offset,
                lowest_vcn,
                segment_reference,
                instance,
                name,
            },
            record_length as usize,
        ))
    }
}

/// Parse every entry of an $ATTRIBUTE_LIST value, stopping at a zero
/// record length or end of data
pub fn parse_attribute_list(data: &[u8]) -> Vec<AttributeListEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset + ATTRIBUTE_LIST_ENTRY_SIZE <= data.len() {
        match AttributeListEntry::from_bytes(&data[offset..]) {
            Some((entry, consumed)) => {
                if consumed == 0 {
                    break;
                }
                entries.push(entry);
                offset += consumed;
            }
            None => break,
        }
    }

    entries
}

// ============================================================================
// Data runs (mapping pairs)
// ============================================================================

/// One extent of a non-resident attribute. A `None` LCN is a sparse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    pub lcn: Option<i64>,
    pub count: u64,
}

impl DataRun {
    pub fn is_sparse(&self) -> bool {
        self.lcn.is_none()
    }
}

/// Parse a variable-width signed integer from a mapping pair field.
///
/// Values are sign-extended from the top bit of the most significant byte
/// and parsed as little-endian.
pub fn varint(buf: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    let n = buf.len().min(8);
    bytes[..n].copy_from_slice(&buf[..n]);
    if n > 0 && n < 8 && buf[n - 1] & 0x80 != 0 {
        for b in bytes[n..].iter_mut() {
            *b = 0xFF;
        }
    }
    i64::from_le_bytes(bytes)
}

/// Decode mapping pair bytes into a runlist.
///
/// Offsets are deltas against the previous run's LCN; sparse runs (offset
/// length 0) leave the accumulator untouched.
pub fn decode_runs(data: &[u8]) -> Result<Vec<DataRun>> {
    let mut runs = Vec::new();
    let mut pos = 0;
    let mut lcn: i64 = 0;

    while pos < data.len() {
        let header = data[pos];
        if header == 0 {
            return Ok(runs);
        }

        let size_len = (header & 0x0F) as usize;
        let offset_len = ((header >> 4) & 0x0F) as usize;
        pos += 1;

        if size_len == 0 || size_len > 8 || offset_len > 8 {
            return Err(NtfsError::BadRunlist);
        }
        if pos + size_len + offset_len > data.len() {
            return Err(NtfsError::BadRunlist);
        }

        let count = varint(&data[pos..pos + size_len]) as u64;
        pos += size_len;

        let run_lcn = if offset_len == 0 {
            None
        } else {
            lcn += varint(&data[pos..pos + offset_len]);
            pos += offset_len;
            Some(lcn)
        };

        runs.push(DataRun { lcn: run_lcn, count });
    }

    Err(NtfsError::BadRunlist)
}

/// Encode a runlist back into mapping pair bytes.
///
/// Produces the minimal-width encoding, which round-trips with
/// [`decode_runs`] for canonically encoded input.
pub fn encode_runs(runs: &[DataRun]) -> Vec<u8> {
    fn signed_width(value: i64) -> usize {
        for width in 1..8 {
            let truncated = varint(&value.to_le_bytes()[..width]);
            if truncated == value {
                return width;
            }
        }
        8
    }

    fn unsigned_width(value: u64) -> usize {
        let mut width = 1;
        while width < 8 && value >> (width * 8) != 0 {
            width += 1;
        }
        // A set top bit would read back as a sign; widen once more
        if width < 8 && value >> (width * 8 - 1) & 1 != 0 {
            width += 1;
        }
        width
    }

    let mut out = Vec::new();
    let mut prev_lcn: i64 = 0;

    for run in runs {
        let size_len = unsigned_width(run.count);

        match run.lcn {
            None => {
                out.push(size_len as u8);
                out.extend_from_slice(&run.count.to_le_bytes()[..size_len]);
            }
            Some(lcn) => {
                let delta = lcn - prev_lcn;
                prev_lcn = lcn;
                let offset_len = signed_width(delta);
                out.push(((offset_len as u8) << 4) | size_len as u8);
                out.extend_from_slice(&run.count.to_le_bytes()[..size_len]);
                out.extend_from_slice(&delta.to_le_bytes()[..offset_len]);
            }
        }
    }

    out.push(0);
    out
}

// ============================================================================
// USN journal records
// ============================================================================

/// Common prefix of every USN record version
#[derive(Debug, Clone, Copy)]
pub struct UsnCommonHeader {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
}

impl UsnCommonHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        Some(Self {
            record_length: u32::from_le_bytes(data[0..4].try_into().ok()?),
            major_version: u16::from_le_bytes(data[4..6].try_into().ok()?),
            minor_version: u16::from_le_bytes(data[6..8].try_into().ok()?),
        })
    }
}

/// USN change reason flags
pub mod usn_reason {
    pub const DATA_OVERWRITE: u32 = 0x0000_0001;
    pub const DATA_EXTEND: u32 = 0x0000_0002;
    pub const DATA_TRUNCATION: u32 = 0x0000_0004;
    pub const NAMED_DATA_OVERWRITE: u32 = 0x0000_0010;
    pub const NAMED_DATA_EXTEND: u32 = 0x0000_0020;
    pub const NAMED_DATA_TRUNCATION: u32 = 0x0000_0040;
    pub const FILE_CREATE: u32 = 0x0000_0100;
    pub const FILE_DELETE: u32 = 0x0000_0200;
    pub const EA_CHANGE: u32 = 0x0000_0400;
    pub const SECURITY_CHANGE: u32 = 0x0000_0800;
    pub const RENAME_OLD_NAME: u32 = 0x0000_1000;
    pub const RENAME_NEW_NAME: u32 = 0x0000_2000;
    pub const INDEXABLE_CHANGE: u32 = 0x0000_4000;
    pub const BASIC_INFO_CHANGE: u32 = 0x0000_8000;
    pub const HARD_LINK_CHANGE: u32 = 0x0001_0000;
    pub const COMPRESSION_CHANGE: u32 = 0x0002_0000;
    pub const ENCRYPTION_CHANGE: u32 = 0x0004_0000;
    pub const OBJECT_ID_CHANGE: u32 = 0x0008_0000;
    pub const REPARSE_POINT_CHANGE: u32 = 0x0010_0000;
    pub const STREAM_CHANGE: u32 = 0x0020_0000;
    pub const CLOSE: u32 = 0x8000_0000;
}

/// Decoded USN_RECORD_V2. The only version surfaced to consumers.
#[derive(Debug, Clone)]
pub struct UsnRecordV2 {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub file_reference: SegmentReference,
    pub parent_file_reference: SegmentReference,
    pub usn: u64,
    pub timestamp: u64,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub file_attributes: u32,
    pub file_name_length: u16,
    pub file_name_offset: u16,
}

/// Fixed size of a v2 record before the filename
pub const USN_RECORD_V2_SIZE: usize = 60;

/// Fixed size of a v3 record before the filename (128-bit references)
pub const USN_RECORD_V3_SIZE: usize = 76;

/// Fixed size of a v4 record before its extent array
pub const USN_RECORD_V4_SIZE: usize = 64;

impl UsnRecordV2 {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < USN_RECORD_V2_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        Some(Self {
            record_length: cursor.read_u32::<LittleEndian>().ok()?,
            major_version: cursor.read_u16::<LittleEndian>().ok()?,
            minor_version: cursor.read_u16::<LittleEndian>().ok()?,
            file_reference: SegmentReference::from_u64(cursor.read_u64::<LittleEndian>().ok()?),
            parent_file_reference: SegmentReference::from_u64(
                cursor.read_u64::<LittleEndian>().ok()?,
            ),
            usn: cursor.read_u64::<LittleEndian>().ok()?,
            timestamp: cursor.read_u64::<LittleEndian>().ok()?,
            reason: cursor.read_u32::<LittleEndian>().ok()?,
            source_info: cursor.read_u32::<LittleEndian>().ok()?,
            security_id: cursor.read_u32::<LittleEndian>().ok()?,
            file_attributes: cursor.read_u32::<LittleEndian>().ok()?,
            file_name_length: cursor.read_u16::<LittleEndian>().ok()?,
            file_name_offset: cursor.read_u16::<LittleEndian>().ok()?,
        })
    }
}

// ============================================================================
// FILETIME conversion
// ============================================================================

/// Offset between the Windows epoch (1601) and the Unix epoch in nanoseconds
const EPOCH_DIFF_NS: i128 = 11_644_473_600_000_000_000;

/// Convert a Windows FILETIME (100ns intervals since 1601) to Unix nanoseconds
pub fn filetime_ns(filetime: u64) -> i64 {
    ((filetime as i128) * 100 - EPOCH_DIFF_NS) as i64
}

/// Convert a Windows FILETIME to a UTC timestamp
pub fn wintimestamp(filetime: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(filetime_ns(filetime))
}

// ============================================================================
// UTF-16LE helper
// ============================================================================

/// Decode on-disk UTF-16LE bytes, replacing unpaired surrogates
pub fn decode_utf16le(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
