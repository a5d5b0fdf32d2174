//! Stream reconstruction for non-resident attributes
//!
//! A non-resident attribute's data lives in clusters scattered across the
//! volume, described by a runlist. The types in this module present that as
//! an ordinary seekable byte stream: plain runs read through to the volume,
//! sparse runs synthesize zeros, and compressed streams decompress one
//! compression unit at a time.
//!
//! The LZNT1 and LZXPRESS decompressors themselves are host-provided pure
//! functions; this crate only drives them.

use crate::error::{NtfsError, Result};
use crate::io::Source;
use crate::structs::DataRun;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Host-provided decompressor: compressed bytes in, decompressed bytes out.
pub type DecompressFn = Arc<dyn Fn(&[u8]) -> io::Result<Vec<u8>> + Send + Sync>;

impl From<NtfsError> for io::Error {
    fn from(err: NtfsError) -> Self {
        match err {
            NtfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

fn seek_position(pos: u64, size: u64, target: SeekFrom) -> io::Result<u64> {
    let new_pos = match target {
        SeekFrom::Start(n) => n as i64,
        SeekFrom::End(n) => size as i64 + n,
        SeekFrom::Current(n) => pos as i64 + n,
    };
    if new_pos < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start of stream",
        ));
    }
    Ok(new_pos as u64)
}

// ============================================================================
// Resident stream
// ============================================================================

/// Byte view over a resident attribute value, backed by its record's data
#[derive(Clone)]
pub struct ResidentStream {
    data: Arc<Vec<u8>>,
    start: usize,
    len: usize,
    pos: u64,
}

impl ResidentStream {
    pub fn new(data: Arc<Vec<u8>>, start: usize, len: usize) -> Self {
        // Clamp a malformed value range to the record bounds
        let start = start.min(data.len());
        let len = len.min(data.len() - start);
        Self {
            data,
            start,
            len,
            pos: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.len as u64
    }
}

impl Read for ResidentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = (self.len as u64).saturating_sub(self.pos) as usize;
        let n = buf.len().min(remaining);
        if n == 0 {
            return Ok(0);
        }
        let offset = self.start + self.pos as usize;
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ResidentStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = seek_position(self.pos, self.len as u64, target)?;
        Ok(self.pos)
    }
}

// ============================================================================
// Runlist stream
// ============================================================================

/// Seekable view over a runlist.
///
/// Reads may span run boundaries; sparse runs yield zeros without touching
/// the source, and reads at or past the declared size return empty.
pub struct RunlistStream {
    source: Source,
    runlist: Vec<DataRun>,
    size: u64,
    cluster_size: u64,
    pos: u64,
}

impl RunlistStream {
    pub fn new(source: Source, runlist: Vec<DataRun>, size: u64, cluster_size: u64) -> Self {
        Self {
            source,
            runlist,
            size,
            cluster_size,
            pos: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn runlist(&self) -> &[DataRun] {
        &self.runlist
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    /// Append runs to the extent map.
    ///
    /// Used while bootstrapping a fragmented $MFT, where extents become
    /// known incrementally as attribute list entries are resolved.
    pub fn extend_runlist<I: IntoIterator<Item = DataRun>>(&mut self, runs: I) {
        self.runlist.extend(runs);
    }
}

impl Read for RunlistStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let want = buf.len().min(remaining as usize);
        let mut done = 0;

        while done < want {
            let pos = self.pos + done as u64;

            // Locate the run containing this byte
            let mut run_start = 0u64;
            let mut located = None;
            for run in &self.runlist {
                let run_len = run.count * self.cluster_size;
                if pos < run_start + run_len {
                    located = Some((*run, run_start));
                    break;
                }
                run_start += run_len;
            }

            let Some((run, run_start)) = located else {
                // Size extends past the extent map; the tail reads as zeros
                buf[done..want].fill(0);
                done = want;
                break;
            };

            let offset_in_run = pos - run_start;
            let run_remaining = run.count * self.cluster_size - offset_in_run;
            let chunk = run_remaining.min((want - done) as u64) as usize;

            match run.lcn {
                None => buf[done..done + chunk].fill(0),
                Some(lcn) => {
                    let disk_offset = lcn as u64 * self.cluster_size + offset_in_run;
                    self.source
                        .read_exact_at(disk_offset, &mut buf[done..done + chunk])?;
                }
            }
            done += chunk;
        }

        self.pos += done as u64;
        Ok(done)
    }
}

impl Seek for RunlistStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = seek_position(self.pos, self.size, target)?;
        Ok(self.pos)
    }
}

// ============================================================================
// Compressed stream
// ============================================================================

/// Seekable view over an LZNT1-compressed runlist.
///
/// The allocation is divided into compression units of
/// `cluster_size << compression_unit` bytes. Within one unit the run shape
/// decides the storage form: all clusters present means stored verbatim, a
/// sparse tail after data means compressed, no data at all means fully
/// sparse.
pub struct CompressedStream {
    source: Source,
    /// Runs regrouped per compression unit
    unit_runs: Vec<Vec<DataRun>>,
    size: u64,
    cluster_size: u64,
    unit_size: u64,
    decompress: DecompressFn,
    pos: u64,
    cache: Option<(usize, Vec<u8>)>,
}

/// Zero padding appended before handing a unit to the decompressor, a safety
/// margin the decoder may read into
const DECOMPRESS_PAD: usize = 64;

impl CompressedStream {
    pub fn new(
        source: Source,
        runlist: Vec<DataRun>,
        size: u64,
        cluster_size: u64,
        compression_unit: u8,
        decompress: DecompressFn,
    ) -> Self {
        let clusters_per_unit = 1u64 << compression_unit;
        let unit_runs = split_compression_units(&runlist, clusters_per_unit);

        Self {
            source,
            unit_runs,
            size,
            cluster_size,
            unit_size: cluster_size << compression_unit,
            decompress,
            pos: 0,
            cache: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Decode one whole compression unit
    fn read_unit(&self, unit: usize) -> Result<Vec<u8>> {
        let unit_size = self.unit_size as usize;
        let Some(runs) = self.unit_runs.get(unit) else {
            return Ok(vec![0; unit_size]);
        };

        let total_remaining = self.size.saturating_sub(unit as u64 * self.unit_size);
        let mut data = Vec::with_capacity(unit_size);
        let mut compressed = false;

        for run in runs {
            match run.lcn {
                // A sparse run after data within one unit marks it compressed
                None => compressed = true,
                Some(lcn) => {
                    let run_len = (run.count * self.cluster_size) as usize;
                    let start = data.len();
                    data.resize(start + run_len, 0);
                    self.source
                        .read_exact_at(lcn as u64 * self.cluster_size, &mut data[start..])?;

                    if data.len() as u64 == total_remaining {
                        break;
                    }
                }
            }
        }

        let mut result = if data.is_empty() {
            // Fully sparse unit
            vec![0; unit_size]
        } else if compressed {
            data.resize(data.len() + DECOMPRESS_PAD, 0);
            let mut decompressed = (self.decompress)(&data)
                .map_err(|e| NtfsError::DecompressionFailed(e.to_string()))?;
            decompressed.truncate(unit_size);
            decompressed
        } else {
            data
        };

        result.resize(unit_size, 0);
        Ok(result)
    }

    fn unit_bytes(&mut self, unit: usize) -> Result<&[u8]> {
        if self.cache.as_ref().map(|(n, _)| *n) != Some(unit) {
            let bytes = self.read_unit(unit)?;
            self.cache = Some((unit, bytes));
        }
        Ok(&self.cache.as_ref().unwrap().1)
    }
}

impl Read for CompressedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let want = buf.len().min(remaining as usize);
        let mut done = 0;

        while done < want {
            let pos = self.pos + done as u64;
            let unit = (pos / self.unit_size) as usize;
            let offset_in_unit = (pos % self.unit_size) as usize;

            let unit_size = self.unit_size as usize;
            let chunk = (unit_size - offset_in_unit).min(want - done);
            let bytes = self.unit_bytes(unit)?;
            buf[done..done + chunk].copy_from_slice(&bytes[offset_in_unit..offset_in_unit + chunk]);
            done += chunk;
        }

        self.pos += done as u64;
        Ok(done)
    }
}

impl Seek for CompressedStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = seek_position(self.pos, self.size, target)?;
        Ok(self.pos)
    }
}

/// Regroup a runlist into per-compression-unit extents.
///
/// Runs are split at unit boundaries so each group describes exactly one
/// unit's clusters; a trailing partial group is kept as-is.
fn split_compression_units(runlist: &[DataRun], clusters_per_unit: u64) -> Vec<Vec<DataRun>> {
    let mut units = Vec::new();
    let mut current = Vec::new();
    let mut left_in_unit = clusters_per_unit;

    for run in runlist {
        let mut lcn = run.lcn;
        let mut count = run.count;

        while count > 0 {
            let use_count = count.min(left_in_unit);
            current.push(DataRun {
                lcn,
                count: use_count,
            });

            count -= use_count;
            left_in_unit -= use_count;
            if let Some(ref mut l) = lcn {
                *l += use_count as i64;
            }

            if left_in_unit == 0 {
                units.push(std::mem::take(&mut current));
                left_in_unit = clusters_per_unit;
            }
        }
    }

    if !current.is_empty() {
        units.push(current);
    }
    units
}

// ============================================================================
// WOF compressed stream
// ============================================================================

/// Seekable view over a Windows-Overlay-Filter compressed alternate stream.
///
/// The backing runlist holds a chunk offset table followed by the compressed
/// chunks; like any non-resident stream it may be fragmented, so all reads
/// go through a [`RunlistStream`]. Chunks whose compressed length equals
/// their uncompressed length are stored verbatim; the rest go through the
/// configured decompressor (LZXPRESS-Huffman at 4/8/16/32 KiB, LZX or
/// LZNT1).
pub struct WofCompressedStream {
    backing: RunlistStream,
    original_size: u64,
    chunk_size: u64,
    decompress: DecompressFn,
    /// Chunk start offsets relative to the first chunk, leading zero included
    chunk_offsets: Vec<u64>,
    /// Offset of the first chunk's data within the backing stream
    first_chunk: u64,
    /// One past the last chunk's data within the backing stream
    data_end: u64,
    pos: u64,
    cache: Option<(usize, Vec<u8>)>,
}

impl WofCompressedStream {
    pub fn new(
        source: Source,
        runlist: Vec<DataRun>,
        compressed_size: u64,
        original_size: u64,
        cluster_size: u64,
        decompress: DecompressFn,
        chunk_size: u64,
    ) -> Result<Self> {
        let mut backing = RunlistStream::new(source, runlist, compressed_size, cluster_size);

        let chunk_count = original_size.div_ceil(chunk_size);
        let table_entries = chunk_count.saturating_sub(1) as usize;
        let entry_width: usize = if original_size > u32::MAX as u64 { 8 } else { 4 };

        let mut table = vec![0u8; table_entries * entry_width];
        backing.seek(SeekFrom::Start(0))?;
        backing.read_exact(&mut table)?;

        let mut chunk_offsets = Vec::with_capacity(table_entries + 1);
        chunk_offsets.push(0);
        for entry in table.chunks_exact(entry_width) {
            chunk_offsets.push(if entry_width == 8 {
                u64::from_le_bytes(entry.try_into().unwrap())
            } else {
                u32::from_le_bytes(entry.try_into().unwrap()) as u64
            });
        }

        Ok(Self {
            backing,
            original_size,
            chunk_size,
            decompress,
            chunk_offsets,
            first_chunk: (table_entries * entry_width) as u64,
            data_end: compressed_size,
            pos: 0,
            cache: None,
        })
    }

    pub fn size(&self) -> u64 {
        self.original_size
    }

    /// The extent map of the backing compressed stream
    pub fn runlist(&self) -> &[DataRun] {
        self.backing.runlist()
    }

    fn chunk_count(&self) -> usize {
        self.chunk_offsets.len()
    }

    fn read_chunk(&mut self, chunk: usize) -> Result<Vec<u8>> {
        let start = self.first_chunk + self.chunk_offsets[chunk];
        let end = match self.chunk_offsets.get(chunk + 1) {
            Some(next) => self.first_chunk + next,
            None => self.data_end,
        };

        let uncompressed_len = if chunk + 1 == self.chunk_count() {
            ((self.original_size - 1) % self.chunk_size + 1) as usize
        } else {
            self.chunk_size as usize
        };

        let compressed_len = end.saturating_sub(start) as usize;
        let mut data = vec![0u8; compressed_len];
        self.backing.seek(SeekFrom::Start(start))?;
        self.backing.read_exact(&mut data)?;

        if compressed_len == uncompressed_len {
            return Ok(data);
        }

        let mut decompressed =
            (self.decompress)(&data).map_err(|e| NtfsError::DecompressionFailed(e.to_string()))?;
        decompressed.resize(uncompressed_len, 0);
        Ok(decompressed)
    }

    fn chunk_bytes(&mut self, chunk: usize) -> Result<&[u8]> {
        if self.cache.as_ref().map(|(n, _)| *n) != Some(chunk) {
            let bytes = self.read_chunk(chunk)?;
            self.cache = Some((chunk, bytes));
        }
        Ok(&self.cache.as_ref().unwrap().1)
    }
}

impl Read for WofCompressedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.original_size.saturating_sub(self.pos);
        let want = buf.len().min(remaining as usize);
        let mut done = 0;

        while done < want {
            let pos = self.pos + done as u64;
            let chunk = (pos / self.chunk_size) as usize;
            let offset_in_chunk = (pos % self.chunk_size) as usize;

            let bytes = self.chunk_bytes(chunk)?;
            let available = bytes.len().saturating_sub(offset_in_chunk);
            let step = available.min(want - done);
            if step == 0 {
                break;
            }
            buf[done..done + step]
                .copy_from_slice(&bytes[offset_in_chunk..offset_in_chunk + step]);
            done += step;
        }

        self.pos += done as u64;
        Ok(done)
    }
}

impl Seek for WofCompressedStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = seek_position(self.pos, self.original_size, target)?;
        Ok(self.pos)
    }
}

// ============================================================================
// Stream dispatch
// ============================================================================

/// Host decompressor stand-in that fails at the first compressed unit
pub(crate) fn missing_decompressor(name: &'static str) -> DecompressFn {
    Arc::new(move |_: &[u8]| {
        Err(io::Error::other(format!(
            "no {} decompressor configured on this volume",
            name
        )))
    })
}

/// Concrete stream over an attribute's data, resident or non-resident
pub enum NtfsStream {
    Resident(ResidentStream),
    Runlist(RunlistStream),
    Compressed(CompressedStream),
    Wof(WofCompressedStream),
}

impl NtfsStream {
    pub fn size(&self) -> u64 {
        match self {
            NtfsStream::Resident(s) => s.size(),
            NtfsStream::Runlist(s) => s.size(),
            NtfsStream::Compressed(s) => s.size(),
            NtfsStream::Wof(s) => s.size(),
        }
    }

    /// The backing runlist when this stream is runlist-backed
    pub fn runlist(&self) -> Option<&[DataRun]> {
        match self {
            NtfsStream::Runlist(s) => Some(s.runlist()),
            _ => None,
        }
    }

    /// Read the entire stream from the start
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0))?;
        let mut data = Vec::with_capacity(self.size().min(1 << 24) as usize);
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for NtfsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NtfsStream::Resident(s) => s.read(buf),
            NtfsStream::Runlist(s) => s.read(buf),
            NtfsStream::Compressed(s) => s.read(buf),
            NtfsStream::Wof(s) => s.read(buf),
        }
    }
}

impl Seek for NtfsStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        match self {
            NtfsStream::Resident(s) => s.seek(target),
            NtfsStream::Runlist(s) => s.seek(target),
            NtfsStream::Compressed(s) => s.seek(target),
            NtfsStream::Wof(s) => s.seek(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn volume_with(pattern: impl Fn(u64) -> u8, len: usize) -> Source {
        let data: Vec<u8> = (0..len as u64).map(pattern).collect();
        Source::new(Cursor::new(data))
    }

    #[test]
    fn runlist_stream_reads_across_runs() {
        // Clusters of 4 bytes; run at LCN 2 (2 clusters), sparse (1), LCN 0 (1)
        let source = volume_with(|i| i as u8, 64);
        let runs = vec![
            DataRun {
                lcn: Some(2),
                count: 2,
            },
            DataRun { lcn: None, count: 1 },
            DataRun {
                lcn: Some(0),
                count: 1,
            },
        ];
        let mut stream = RunlistStream::new(source, runs, 16, 4);

        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(
            data,
            vec![8, 9, 10, 11, 12, 13, 14, 15, 0, 0, 0, 0, 0, 1, 2, 3]
        );
    }

    #[test]
    fn runlist_stream_truncates_to_size() {
        let source = volume_with(|i| i as u8, 64);
        let runs = vec![DataRun {
            lcn: Some(0),
            count: 4,
        }];
        // Size smaller than the allocation
        let mut stream = RunlistStream::new(source, runs, 10, 4);

        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 10);

        // Reads at or past size return empty
        stream.seek(SeekFrom::Start(10)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn runlist_stream_seek_and_partial_read() {
        let source = volume_with(|i| (i % 251) as u8, 4096);
        let runs = vec![DataRun {
            lcn: Some(0),
            count: 8,
        }];
        let mut stream = RunlistStream::new(source, runs, 4096, 512);

        stream.seek(SeekFrom::Start(1000)).unwrap();
        let mut buf = [0u8; 16];
        stream.read_exact(&mut buf).unwrap();
        let expected: Vec<u8> = (1000u64..1016).map(|i| (i % 251) as u8).collect();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn compression_unit_split() {
        let runs = vec![
            DataRun {
                lcn: Some(100),
                count: 20,
            },
            DataRun {
                lcn: None,
                count: 12,
            },
        ];
        let units = split_compression_units(&runs, 16);

        assert_eq!(units.len(), 2);
        assert_eq!(
            units[0],
            vec![DataRun {
                lcn: Some(100),
                count: 16
            }]
        );
        assert_eq!(
            units[1],
            vec![
                DataRun {
                    lcn: Some(116),
                    count: 4
                },
                DataRun { lcn: None, count: 12 },
            ]
        );
    }

    #[test]
    fn compressed_stream_unit_forms() {
        // Cluster size 4, compression unit 2 -> 16-byte units
        // Unit 0: verbatim (4 full clusters at LCN 0)
        // Unit 1: compressed (2 clusters at LCN 4 + sparse tail)
        // Unit 2: fully sparse
        let source = volume_with(|i| i as u8, 64);
        let runs = vec![
            DataRun {
                lcn: Some(0),
                count: 4,
            },
            DataRun {
                lcn: Some(4),
                count: 2,
            },
            DataRun { lcn: None, count: 6 },
        ];

        let decompress: DecompressFn = Arc::new(|input: &[u8]| {
            // The unit's 8 data bytes arrive followed by the 64-byte pad
            assert_eq!(input.len(), 8 + 64);
            assert_eq!(&input[..4], &[16, 17, 18, 19]);
            Ok(vec![0xAB; 20])
        });

        let mut stream = CompressedStream::new(source, runs, 48, 4, 2, decompress);
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();

        assert_eq!(data.len(), 48);
        let expected_unit0: Vec<u8> = (0..16).collect();
        assert_eq!(&data[..16], &expected_unit0[..]);
        // Decompressed output truncated to one unit
        assert_eq!(&data[16..32], &[0xAB; 16]);
        assert_eq!(&data[32..48], &[0; 16]);
    }

    #[test]
    fn compressed_stream_decoder_failure() {
        let source = volume_with(|i| i as u8, 64);
        let runs = vec![
            DataRun {
                lcn: Some(0),
                count: 2,
            },
            DataRun { lcn: None, count: 2 },
        ];
        let decompress: DecompressFn =
            Arc::new(|_: &[u8]| Err(io::Error::other("bad token stream")));

        let mut stream = CompressedStream::new(source, runs, 16, 4, 2, decompress);
        let mut data = Vec::new();
        let err = stream.read_to_end(&mut data).unwrap_err();
        assert!(err.to_string().contains("Decompression failed"));
    }

    #[test]
    fn wof_stream_chunk_table() {
        // Two 16-byte chunks, 4-byte table entries. Chunk 0 compresses to 4
        // bytes, chunk 1 (12 bytes long) is stored verbatim. The compressed
        // stream occupies 5 contiguous 4-byte clusters at LCN 0.
        let mut image = Vec::new();
        image.extend_from_slice(&4u32.to_le_bytes());
        image.extend_from_slice(&[0xC0, 0xC1, 0xC2, 0xC3]);
        image.extend_from_slice(&(0..12).collect::<Vec<u8>>());

        let compressed_size = image.len() as u64;
        let decompress: DecompressFn = Arc::new(|input: &[u8]| {
            assert_eq!(input, &[0xC0, 0xC1, 0xC2, 0xC3]);
            Ok(vec![0x55; 16])
        });

        let runs = vec![DataRun {
            lcn: Some(0),
            count: 5,
        }];
        let mut stream = WofCompressedStream::new(
            Source::new(Cursor::new(image)),
            runs,
            compressed_size,
            28,
            4,
            decompress,
            16,
        )
        .unwrap();

        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 28);
        assert_eq!(&data[..16], &[0x55; 16]);
        assert_eq!(&data[16..], &(0..12).collect::<Vec<u8>>()[..]);
    }

    #[test]
    fn wof_stream_single_chunk_has_no_table() {
        // original_size <= chunk_size: zero table entries, data starts at 0
        let image: Vec<u8> = (0..10).collect();
        let decompress: DecompressFn = Arc::new(|_: &[u8]| panic!("not compressed"));

        let runs = vec![DataRun {
            lcn: Some(0),
            count: 3,
        }];
        let mut stream = WofCompressedStream::new(
            Source::new(Cursor::new(image.clone())),
            runs,
            10,
            10,
            4,
            decompress,
            16,
        )
        .unwrap();

        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data, image);
    }

    #[test]
    fn wof_stream_reads_through_fragmented_runs() {
        // Compressed stream of 22 bytes over two non-adjacent 8-byte
        // clusters: table (one 4-byte entry), a 14-byte compressed chunk, a
        // 4-byte verbatim tail chunk
        let mut content = Vec::new();
        content.extend_from_slice(&14u32.to_le_bytes());
        content.extend_from_slice(&[0xAB; 14]);
        content.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(content.len(), 22);

        let mut image = vec![0u8; 64];
        image[..16].copy_from_slice(&content[..16]);
        image[32..38].copy_from_slice(&content[16..]);

        let decompress: DecompressFn = Arc::new(|input: &[u8]| {
            assert_eq!(input, &[0xAB; 14]);
            Ok(vec![0xCD; 16])
        });

        let runs = vec![
            DataRun {
                lcn: Some(0),
                count: 2,
            },
            DataRun {
                lcn: Some(4),
                count: 1,
            },
        ];
        let mut stream = WofCompressedStream::new(
            Source::new(Cursor::new(image)),
            runs,
            22,
            20,
            8,
            decompress,
            16,
        )
        .unwrap();

        assert_eq!(stream.runlist().len(), 2);
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(&data[..16], &[0xCD; 16]);
        assert_eq!(&data[16..], &[1, 2, 3, 4]);
    }

    #[test]
    fn resident_stream_slices_record_data() {
        let record = Arc::new((0u8..32).collect::<Vec<u8>>());
        let mut stream = ResidentStream::new(record, 8, 5);

        assert_eq!(stream.size(), 5);
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data, vec![8, 9, 10, 11, 12]);

        stream.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[11, 12]);
    }
}
