//! $Secure security descriptor lookup
//!
//! NTFS stores one copy of every distinct security descriptor in the
//! $Secure:$SDS stream, an append-only log of 16-byte-aligned entries. Files
//! reference a descriptor by security id; the $SII index maps an id to its
//! byte offset in the stream. Without the index, lookup degrades to a
//! forward scan.

use crate::error::{NtfsError, Result};
use crate::index::{Index, IndexKey};
use crate::io::ReadSeek;
use crate::mft::MftRecord;
use crate::structs::AttributeType;
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// The $SDS stream is duplicated at this interval; corrupt regions are
/// skipped by jumping to the next boundary
const DEFAULT_DUPLICATION_INTERVAL: u64 = 0x40000;

/// Upper bound on a sane descriptor entry length
const MAX_ENTRY_LENGTH: u32 = 0x10000;

/// Size of the on-disk _SECURITY_DESCRIPTOR_HEADER
const SDS_HEADER_SIZE: usize = 20;

// ============================================================================
// SIDs and GUIDs
// ============================================================================

/// A decoded security identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sid {
    pub revision: u8,
    pub authority: u64,
    pub subauthorities: Vec<u32>,
}

impl Sid {
    /// Parse a SID, returning it and the bytes consumed
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 8 {
            return Err(NtfsError::BadMft("SID truncated".to_string()));
        }

        let revision = data[0];
        let count = data[1] as usize;
        let mut authority_bytes = [0u8; 8];
        authority_bytes[2..8].copy_from_slice(&data[2..8]);
        let authority = u64::from_be_bytes(authority_bytes);

        let total = 8 + count * 4;
        if data.len() < total {
            return Err(NtfsError::BadMft("SID subauthorities truncated".to_string()));
        }

        let subauthorities = (0..count)
            .map(|i| u32::from_le_bytes(data[8 + i * 4..12 + i * 4].try_into().unwrap()))
            .collect();

        Ok((
            Self {
                revision,
                authority,
                subauthorities,
            },
            total,
        ))
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.subauthorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

/// A GUID in its on-disk mixed-endian form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid(pub [u8; 16]);

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            u32::from_le_bytes(d[0..4].try_into().unwrap()),
            u16::from_le_bytes(d[4..6].try_into().unwrap()),
            u16::from_le_bytes(d[6..8].try_into().unwrap()),
            d[8],
            d[9],
            d[10],
            d[11],
            d[12],
            d[13],
            d[14],
            d[15],
        )
    }
}

// ============================================================================
// ACEs and ACLs
// ============================================================================

/// ACE type codes
pub mod ace_type {
    pub const ACCESS_ALLOWED: u8 = 0x00;
    pub const ACCESS_DENIED: u8 = 0x01;
    pub const SYSTEM_AUDIT: u8 = 0x02;
    pub const SYSTEM_ALARM: u8 = 0x03;
    pub const ACCESS_ALLOWED_COMPOUND: u8 = 0x04;
    pub const ACCESS_ALLOWED_OBJECT: u8 = 0x05;
    pub const ACCESS_DENIED_OBJECT: u8 = 0x06;
    pub const SYSTEM_AUDIT_OBJECT: u8 = 0x07;
    pub const SYSTEM_ALARM_OBJECT: u8 = 0x08;
    pub const ACCESS_ALLOWED_CALLBACK: u8 = 0x09;
    pub const ACCESS_DENIED_CALLBACK: u8 = 0x0A;
    pub const ACCESS_ALLOWED_CALLBACK_OBJECT: u8 = 0x0B;
    pub const ACCESS_DENIED_CALLBACK_OBJECT: u8 = 0x0C;
    pub const SYSTEM_AUDIT_CALLBACK: u8 = 0x0D;
    pub const SYSTEM_ALARM_CALLBACK: u8 = 0x0E;
    pub const SYSTEM_AUDIT_CALLBACK_OBJECT: u8 = 0x0F;
    pub const SYSTEM_ALARM_CALLBACK_OBJECT: u8 = 0x10;
    pub const SYSTEM_MANDATORY_LABEL: u8 = 0x11;
    pub const SYSTEM_RESOURCE_ATTRIBUTE: u8 = 0x12;
    pub const SYSTEM_SCOPED_POLICY_ID: u8 = 0x13;
}

/// One access control entry
#[derive(Debug, Clone)]
pub struct Ace {
    pub ace_type: u8,
    pub ace_flags: u8,
    pub ace_size: u16,
    pub mask: Option<u32>,
    /// Object ACE flags
    pub flags: Option<u32>,
    pub object_type: Option<Guid>,
    pub inherited_object_type: Option<Guid>,
    pub sid: Option<Sid>,
    /// Trailing callback or resource attribute data
    pub application_data: Vec<u8>,
}

impl Ace {
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 4 {
            return Err(NtfsError::BadMft("ACE header truncated".to_string()));
        }

        let ace_type = data[0];
        let ace_flags = data[1];
        let ace_size = u16::from_le_bytes(data[2..4].try_into().unwrap());
        if (ace_size as usize) < 4 || ace_size as usize > data.len() {
            return Err(NtfsError::BadMft("ACE size out of bounds".to_string()));
        }

        let body = &data[4..ace_size as usize];
        let mut ace = Self {
            ace_type,
            ace_flags,
            ace_size,
            mask: None,
            flags: None,
            object_type: None,
            inherited_object_type: None,
            sid: None,
            application_data: Vec::new(),
        };

        let mut pos = 0;
        if is_standard_ace(ace_type) {
            if body.len() < 4 {
                return Err(NtfsError::BadMft("ACE body truncated".to_string()));
            }
            ace.mask = Some(u32::from_le_bytes(body[0..4].try_into().unwrap()));
            let (sid, used) = Sid::from_bytes(&body[4..])?;
            ace.sid = Some(sid);
            pos = 4 + used;
        } else if is_object_ace(ace_type) {
            if body.len() < 40 {
                return Err(NtfsError::BadMft("object ACE body truncated".to_string()));
            }
            ace.mask = Some(u32::from_le_bytes(body[0..4].try_into().unwrap()));
            ace.flags = Some(u32::from_le_bytes(body[4..8].try_into().unwrap()));
            ace.object_type = Some(Guid(body[8..24].try_into().unwrap()));
            ace.inherited_object_type = Some(Guid(body[24..40].try_into().unwrap()));
            let (sid, used) = Sid::from_bytes(&body[40..])?;
            ace.sid = Some(sid);
            pos = 40 + used;
        }

        ace.application_data = body[pos.min(body.len())..].to_vec();
        Ok((ace, ace_size as usize))
    }
}

pub fn is_standard_ace(ace_type: u8) -> bool {
    matches!(
        ace_type,
        ace_type::ACCESS_ALLOWED
            | ace_type::ACCESS_DENIED
            | ace_type::SYSTEM_AUDIT
            | ace_type::SYSTEM_ALARM
            | ace_type::ACCESS_ALLOWED_COMPOUND
            | ace_type::ACCESS_ALLOWED_CALLBACK
            | ace_type::ACCESS_DENIED_CALLBACK
            | ace_type::SYSTEM_AUDIT_CALLBACK
            | ace_type::SYSTEM_ALARM_CALLBACK
            | ace_type::SYSTEM_MANDATORY_LABEL
            | ace_type::SYSTEM_RESOURCE_ATTRIBUTE
            | ace_type::SYSTEM_SCOPED_POLICY_ID
    )
}

pub fn is_object_ace(ace_type: u8) -> bool {
    matches!(
        ace_type,
        ace_type::ACCESS_ALLOWED_OBJECT
            | ace_type::ACCESS_DENIED_OBJECT
            | ace_type::SYSTEM_AUDIT_OBJECT
            | ace_type::SYSTEM_ALARM_OBJECT
            | ace_type::ACCESS_ALLOWED_CALLBACK_OBJECT
            | ace_type::ACCESS_DENIED_CALLBACK_OBJECT
            | ace_type::SYSTEM_AUDIT_CALLBACK_OBJECT
            | ace_type::SYSTEM_ALARM_CALLBACK_OBJECT
    )
}

/// An access control list: an ACL header followed by its ACEs
#[derive(Debug, Clone)]
pub struct Acl {
    pub revision: u8,
    pub acl_size: u16,
    pub ace: Vec<Ace>,
}

impl Acl {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(NtfsError::BadMft("ACL header truncated".to_string()));
        }

        let revision = data[0];
        let acl_size = u16::from_le_bytes(data[2..4].try_into().unwrap());
        let ace_count = u16::from_le_bytes(data[4..6].try_into().unwrap());

        let mut ace = Vec::with_capacity(ace_count as usize);
        let mut offset = 8;
        for _ in 0..ace_count {
            let (entry, used) = Ace::from_bytes(&data[offset..])?;
            ace.push(entry);
            offset += used;
        }

        Ok(Self {
            revision,
            acl_size,
            ace,
        })
    }
}

// ============================================================================
// Security descriptors
// ============================================================================

/// A parsed self-relative security descriptor
#[derive(Debug, Clone)]
pub struct SecurityDescriptor {
    pub revision: u8,
    pub control: u16,
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    pub sacl: Option<Acl>,
    pub dacl: Option<Acl>,
}

impl SecurityDescriptor {
    /// Parse from bytes beginning at the descriptor header; owner, group and
    /// ACL offsets are relative to that start
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 20 {
            return Err(NtfsError::BadMft(
                "security descriptor header truncated".to_string(),
            ));
        }

        let revision = data[0];
        let control = u16::from_le_bytes(data[2..4].try_into().unwrap());
        let owner_offset = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        let group_offset = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        let sacl_offset = u32::from_le_bytes(data[12..16].try_into().unwrap()) as usize;
        let dacl_offset = u32::from_le_bytes(data[16..20].try_into().unwrap()) as usize;

        let slice_from = |offset: usize| -> Result<&[u8]> {
            if offset >= data.len() {
                return Err(NtfsError::BadMft(
                    "security descriptor offset out of bounds".to_string(),
                ));
            }
            Ok(&data[offset..])
        };

        Ok(Self {
            revision,
            control,
            owner: match owner_offset {
                0 => None,
                o => Some(Sid::from_bytes(slice_from(o)?)?.0),
            },
            group: match group_offset {
                0 => None,
                o => Some(Sid::from_bytes(slice_from(o)?)?.0),
            },
            sacl: match sacl_offset {
                0 => None,
                o => Some(Acl::from_bytes(slice_from(o)?)?),
            },
            dacl: match dacl_offset {
                0 => None,
                o => Some(Acl::from_bytes(slice_from(o)?)?),
            },
        })
    }
}

// ============================================================================
// $SDS entries
// ============================================================================

/// The header prefixed to every $SDS entry
#[derive(Debug, Clone, Copy)]
pub struct SdsEntryHeader {
    pub hash_id: u32,
    pub security_id: u32,
    pub offset: u64,
    pub length: u32,
}

impl SdsEntryHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SDS_HEADER_SIZE {
            return Err(NtfsError::BadMft("SDS entry header truncated".to_string()));
        }
        Ok(Self {
            hash_id: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            security_id: u32::from_le_bytes(data[4..8].try_into().unwrap()),
            offset: u64::from_le_bytes(data[8..16].try_into().unwrap()),
            length: u32::from_le_bytes(data[16..20].try_into().unwrap()),
        })
    }
}

/// One $SDS entry: its header and the descriptor payload bytes
#[derive(Debug, Clone)]
pub struct SdsEntry {
    pub header: SdsEntryHeader,
    payload: Vec<u8>,
}

impl SdsEntry {
    pub fn security_id(&self) -> u32 {
        self.header.security_id
    }

    /// Parse the descriptor stored in this entry
    pub fn descriptor(&self) -> Result<SecurityDescriptor> {
        SecurityDescriptor::from_bytes(&self.payload)
    }
}

// ============================================================================
// Secure
// ============================================================================

/// Security descriptor lookup over $SDS, with an optional $SII index
pub struct Secure {
    sds: Mutex<Box<dyn ReadSeek>>,
    sds_size: u64,
    sii: Option<Index>,
    duplication_interval: u64,
}

impl Secure {
    /// Open from the $Secure MFT record of a mounted volume
    pub fn from_record(record: &MftRecord) -> Result<Self> {
        let sds = record.open("$SDS", AttributeType::Data, false)?;
        let sds_size = sds.size();
        let sii = record.index("$SII").ok();

        Ok(Self {
            sds: Mutex::new(Box::new(sds)),
            sds_size,
            sii,
            duplication_interval: DEFAULT_DUPLICATION_INTERVAL,
        })
    }

    /// Open from a standalone $SDS stream, e.g. an extracted system file
    pub fn from_sds<T: ReadSeek + 'static>(mut sds: T) -> Result<Self> {
        let sds_size = sds.seek(SeekFrom::End(0))?;
        Ok(Self {
            sds: Mutex::new(Box::new(sds)),
            sds_size,
            sii: None,
            duplication_interval: DEFAULT_DUPLICATION_INTERVAL,
        })
    }

    /// Override the assumed $SDS duplication interval.
    ///
    /// The interval is not formally documented; 256 KiB matches observed
    /// volumes.
    pub fn set_duplication_interval(&mut self, interval: u64) {
        self.duplication_interval = interval;
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut fh = self.sds.lock();
        fh.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < buf.len() {
            match fh.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Iterate entries from the start of the stream
    pub fn entries(&self) -> SdsEntries<'_> {
        self.entries_from(0)
    }

    fn entries_from(&self, offset: u64) -> SdsEntries<'_> {
        SdsEntries {
            secure: self,
            offset,
            done: false,
        }
    }

    /// Iterate every security descriptor in the stream
    pub fn descriptors(&self) -> impl Iterator<Item = Result<SecurityDescriptor>> + '_ {
        self.entries().map(|entry| entry.descriptor())
    }

    /// Look up a security descriptor by id.
    ///
    /// Lands directly on the right offset when a $SII index is available,
    /// otherwise scans forward from the start of the stream.
    pub fn lookup(&self, security_id: u32) -> Result<SecurityDescriptor> {
        let not_found = || NtfsError::NotFound(format!("couldn't find security ID: {}", security_id));

        let start = match &self.sii {
            Some(sii) => {
                let entry = sii
                    .search(IndexKey::U32(security_id), true)
                    .map_err(|e| match e {
                        NtfsError::NotFound(_) => not_found(),
                        other => other,
                    })?;
                SdsEntryHeader::from_bytes(entry.data())?.offset
            }
            None => 0,
        };

        for entry in self.entries_from(start) {
            if entry.security_id() == security_id {
                return entry.descriptor();
            }
        }

        Err(not_found())
    }
}

/// Forward iterator over $SDS entries.
///
/// A malformed header ends the current 256 KiB region: iteration jumps to
/// the next duplication boundary and tries again.
pub struct SdsEntries<'a> {
    secure: &'a Secure,
    offset: u64,
    done: bool,
}

impl Iterator for SdsEntries<'_> {
    type Item = SdsEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let mut header_buf = [0u8; SDS_HEADER_SIZE];
            match self.secure.read_at(self.offset, &mut header_buf) {
                Ok(n) if n == SDS_HEADER_SIZE => {}
                _ => {
                    self.done = true;
                    return None;
                }
            }

            let header = SdsEntryHeader::from_bytes(&header_buf).ok()?;
            if header.length == 0
                || header.offset > self.secure.sds_size
                || header.length > MAX_ENTRY_LENGTH
            {
                // End of this region: jump to the next duplicate
                let interval = self.secure.duplication_interval;
                let jump = interval - (self.offset % interval);
                debug!(offset = self.offset, "malformed $SDS entry, skipping region");
                self.offset += jump;
                if self.offset >= self.secure.sds_size {
                    self.done = true;
                    return None;
                }
                continue;
            }

            let payload_len = (header.length as usize).saturating_sub(SDS_HEADER_SIZE);
            let mut payload = vec![0u8; payload_len];
            match self.secure.read_at(self.offset + SDS_HEADER_SIZE as u64, &mut payload) {
                Ok(n) if n == payload_len => {}
                _ => {
                    self.done = true;
                    return None;
                }
            }

            // Advance past the entry and align to 16 bytes
            self.offset += header.length as u64;
            self.offset += self.offset.wrapping_neg() & 0xF;

            return Some(SdsEntry { header, payload });
        }
    }
}
