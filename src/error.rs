//! Error types for ntfs-reader
//!
//! One error enum covers every parsing and lookup failure in the crate.

use thiserror::Error;

/// Main error type for NTFS parsing operations
#[derive(Error, Debug)]
pub enum NtfsError {
    #[error("Invalid NTFS boot sector magic: {0:?}")]
    BadVolume(Vec<u8>),

    #[error("Broken MFT record: {0}")]
    BadMft(String),

    #[error("Broken fixup: {0}")]
    BadFixup(String),

    #[error("Broken index: {0}")]
    BadIndex(String),

    #[error("Truncated or invalid mapping pairs")]
    BadRunlist,

    #[error("No such stream on record {segment}: ({name:?}, 0x{attr_type:x})")]
    NoSuchStream {
        segment: u64,
        name: String,
        attr_type: u32,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Operation requires an MFT but none is available")]
    MftUnavailable,

    #[error("Operation requires a volume byte source but none is available")]
    VolumeUnavailable,

    #[error("No collation function for collation rule {0}")]
    NoCollation(u32),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Unsupported USN record version: {0}")]
    UnsupportedUsnVersion(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for NTFS parsing operations
pub type Result<T> = std::result::Result<T, NtfsError>;

impl NtfsError {
    /// Check if this error is recoverable during bulk iteration.
    ///
    /// Record and index iteration skip individual broken items and continue;
    /// everything else is surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NtfsError::BadMft(_) | NtfsError::BadFixup(_) | NtfsError::BadIndex(_)
        )
    }

    /// Check if this error is an end-of-data condition on the byte source.
    pub(crate) fn is_eof(&self) -> bool {
        matches!(self, NtfsError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
