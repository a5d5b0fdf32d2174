//! USN journal parsing
//!
//! The $Extend/$UsnJrnl:$J stream is an append-only log of change records.
//! The stream front is a huge sparse region that must be skipped without
//! reading, and live data is organized in 4 KiB pages: a zeroed record
//! length means the rest of the page is empty padding.
//!
//! Version 2 records are surfaced; v3 and v4 records are length-decoded and
//! stepped over.

use crate::error::{NtfsError, Result};
use crate::io::ReadSeek;
use crate::mft::MftRecord;
use crate::structs::{
    decode_utf16le, filetime_ns, wintimestamp, DataRun, SegmentReference, UsnCommonHeader,
    UsnRecordV2, USN_PAGE_SIZE, USN_RECORD_V2_SIZE, USN_RECORD_V3_SIZE, USN_RECORD_V4_SIZE,
};
use crate::volume::NtfsCore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Weak;
use tracing::debug;

/// Reader for a $UsnJrnl:$J stream
pub struct UsnJrnl {
    fh: Mutex<Box<dyn ReadSeek>>,
    /// Extent map of the backing stream, for sparse-prefix skipping
    runlist: Option<Vec<DataRun>>,
    cluster_size: u64,
    core: Weak<NtfsCore>,
}

impl UsnJrnl {
    /// Open from a standalone $J stream, e.g. an extracted system file
    pub fn from_stream<T: ReadSeek + 'static>(fh: T) -> Self {
        Self {
            fh: Mutex::new(Box::new(fh)),
            runlist: None,
            cluster_size: 0,
            core: Weak::new(),
        }
    }

    pub(crate) fn new(
        fh: Box<dyn ReadSeek>,
        runlist: Option<Vec<DataRun>>,
        cluster_size: u64,
        core: Weak<NtfsCore>,
    ) -> Self {
        Self {
            fh: Mutex::new(fh),
            runlist,
            cluster_size,
            core,
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut fh = self.fh.lock();
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

    /// Byte length of the leading fully-sparse runs, skipped without a read
    fn sparse_prefix(&self) -> u64 {
        let Some(runlist) = &self.runlist else {
            return 0;
        };

        let mut offset = 0;
        for run in runlist {
            if run.lcn.is_some() {
                break;
            }
            offset += run.count * self.cluster_size;
        }
        offset
    }

    /// Iterate the journal's v2 records in on-disk order
    pub fn records(&self) -> UsnRecords<'_> {
        UsnRecords {
            jrnl: self,
            offset: self.sparse_prefix(),
            done: false,
        }
    }
}

/// One decoded v2 USN record
pub struct UsnRecord {
    record: UsnRecordV2,
    filename: String,
    offset: u64,
    core: Weak<NtfsCore>,
}

impl std::fmt::Debug for UsnRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<UsnRecord {}>", self.record.usn)
    }
}

impl UsnRecord {
    /// The raw decoded record
    pub fn record(&self) -> &UsnRecordV2 {
        &self.record
    }

    /// Byte offset of this record within the stream
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn usn(&self) -> u64 {
        self.record.usn
    }

    pub fn reason(&self) -> u32 {
        self.record.reason
    }

    pub fn file_attributes(&self) -> u32 {
        self.record.file_attributes
    }

    pub fn file_reference(&self) -> SegmentReference {
        self.record.file_reference
    }

    pub fn parent_file_reference(&self) -> SegmentReference {
        self.record.parent_file_reference
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        wintimestamp(self.record.timestamp)
    }

    pub fn timestamp_ns(&self) -> i64 {
        filetime_ns(self.record.timestamp)
    }

    fn mft(&self) -> Result<std::sync::Arc<NtfsCore>> {
        let core = self.core.upgrade().ok_or(NtfsError::MftUnavailable)?;
        if core.mft.get().is_none() {
            return Err(NtfsError::MftUnavailable);
        }
        Ok(core)
    }

    /// The record's file, resolved through the MFT
    pub fn file(&self) -> Result<MftRecord> {
        let core = self.mft()?;
        core.mft.get().unwrap().get_reference(self.record.file_reference)
    }

    /// The record's parent directory, resolved through the MFT
    pub fn parent(&self) -> Result<MftRecord> {
        let core = self.mft()?;
        core.mft
            .get()
            .unwrap()
            .get_reference(self.record.parent_file_reference)
    }

    /// Reconstruct the full path of this record's file.
    ///
    /// An unavailable parent yields an `<unavailable_reference_…>` marker, a
    /// parent whose sequence number no longer matches yields
    /// `<broken_reference_…>`.
    pub fn full_path(&self) -> String {
        let parent_ref = self.record.parent_file_reference;

        let parent_path = match self.parent() {
            Err(_) => format!(
                "<unavailable_reference_0x{:x}#{}>",
                parent_ref.segment, parent_ref.sequence
            ),
            Ok(parent) => {
                if parent.header().sequence_number == parent_ref.sequence {
                    parent.full_path().ok().flatten().unwrap_or_default()
                } else {
                    format!(
                        "<broken_reference_0x{:x}#{}>",
                        parent_ref.segment, parent_ref.sequence
                    )
                }
            }
        };

        format!("{}\\{}", parent_path, self.filename)
    }
}

/// Iterator over the v2 records of a journal
pub struct UsnRecords<'a> {
    jrnl: &'a UsnJrnl,
    offset: u64,
    done: bool,
}

impl UsnRecords<'_> {
    /// Advance to the next 4 KiB page boundary
    fn next_page(&mut self) {
        self.offset += USN_PAGE_SIZE - (self.offset % USN_PAGE_SIZE);
    }
}

impl Iterator for UsnRecords<'_> {
    type Item = Result<UsnRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let mut probe = [0u8; 8];
            match self.jrnl.read_at(self.offset, &mut probe) {
                Ok(n) if n == probe.len() => {}
                _ => {
                    self.done = true;
                    return None;
                }
            }

            // A zeroed record length means the rest of the page is padding
            if probe[..4] == [0, 0, 0, 0] {
                self.next_page();
                continue;
            }

            let header = UsnCommonHeader::from_bytes(&probe).unwrap();
            let min_size = match header.major_version {
                2 => USN_RECORD_V2_SIZE,
                3 => USN_RECORD_V3_SIZE,
                4 => USN_RECORD_V4_SIZE,
                other => {
                    self.done = true;
                    return Some(Err(NtfsError::UnsupportedUsnVersion(other)));
                }
            };

            if (header.record_length as usize) < min_size {
                debug!(
                    offset = self.offset,
                    length = header.record_length,
                    "implausible USN record length, stopping"
                );
                self.done = true;
                return None;
            }

            let record_offset = self.offset;
            let record_length = header.record_length as usize;

            // Advance past this record and align to 8 bytes
            self.offset += header.record_length as u64;
            self.offset += self.offset.wrapping_neg() & 0x7;

            if header.major_version != 2 {
                continue;
            }

            let mut data = vec![0u8; record_length];
            match self.jrnl.read_at(record_offset, &mut data) {
                Ok(n) if n == record_length => {}
                _ => {
                    self.done = true;
                    return None;
                }
            }

            let Some(record) = UsnRecordV2::from_bytes(&data) else {
                self.done = true;
                return None;
            };

            let name_start = record.file_name_offset as usize;
            let name_end = name_start + record.file_name_length as usize;
            if name_end > data.len() {
                self.done = true;
                return None;
            }
            let filename = decode_utf16le(&data[name_start..name_end]);

            return Some(Ok(UsnRecord {
                record,
                filename,
                offset: record_offset,
                core: self.jrnl.core.clone(),
            }));
        }
    }
}
