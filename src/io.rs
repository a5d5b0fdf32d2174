//! Byte source plumbing
//!
//! The parser never owns the raw volume bytes; it reads them through a
//! host-provided seekable stream. `Source` is the shared handle used by every
//! sub-component: one lock, held for the duration of a single seek+read pair.

use crate::error::Result;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Anything seekable we can parse NTFS structures out of.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Shared handle to a seekable byte source.
///
/// Cloning is cheap; all clones read through the same cursor, serialized by
/// an internal lock so independent streams can interleave reads safely.
#[derive(Clone)]
pub struct Source {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
}

impl Source {
    pub fn new<T: ReadSeek + 'static>(fh: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(fh))),
        }
    }

    /// Read up to `buf.len()` bytes at an absolute offset.
    ///
    /// Returns the number of bytes read, which is short only at end of source.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut fh = self.inner.lock();
        fh.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < buf.len() {
            match fh.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes at an absolute offset.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read at offset {}: {} of {} bytes", offset, n, buf.len()),
            )
            .into());
        }
        Ok(())
    }

    /// Total size of the underlying source in bytes.
    pub fn size(&self) -> Result<u64> {
        let mut fh = self.inner.lock();
        Ok(fh.seek(SeekFrom::End(0))?)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Source")
    }
}

/// Memory-mapped read-only view of a raw image file.
///
/// Forensic images easily run into the hundreds of gigabytes; mapping them
/// avoids double-buffering every record read through the page cache.
pub struct MmapSource {
    map: memmap2::Mmap,
    pos: u64,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the file is expected to be a
        // static evidence image; concurrent truncation is the host's problem.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self { map, pos: 0 })
    }

    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }
}

impl Read for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos.min(self.len()) as usize;
        let end = (start + buf.len()).min(self.map.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.map[start..end]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MmapSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => self.len() as i64 + n,
            SeekFrom::Current(n) => self.pos as i64 + n,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of image",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
