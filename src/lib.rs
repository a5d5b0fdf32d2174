//! ntfs-reader - Read-only NTFS parser for forensic examination
//!
//! Parses NTFS from a raw volume image or from extracted system files, with
//! no OS support and no write path. Built for offline consumers: triage
//! engines, timelining, file carving, security descriptor analysis.
//!
//! # Features
//!
//! - **MFT parsing**: fixup-protected record decoding, attribute lists,
//!   fragmented $MFT bootstrap
//! - **Stream reconstruction**: sparse runs, LZNT1 compression units,
//!   WOF-compressed files
//! - **Directory indexes**: collation-aware B+-tree search and iteration
//! - **$Secure**: security descriptor lookup by id
//! - **USN journal**: change record iteration with full path reconstruction
//!
//! # Example
//!
//! ```no_run
//! use ntfs_reader::{AttributeType, Volume};
//!
//! fn main() -> ntfs_reader::Result<()> {
//!     let volume = Volume::open_image("evidence/disk.img")?;
//!
//!     let record = volume.get("Windows\\System32\\cmd.exe")?;
//!     let data = record.open("", AttributeType::Data, false)?.read_all()?;
//!     println!("read {} bytes of {:?}", data.len(), record.filename()?);
//!
//!     for entry in volume.get("Windows")?.iterdir(true)? {
//!         println!("{}", entry.file_name()?.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod attr;
mod cache;
pub mod error;
pub mod fixup;
pub mod index;
pub mod io;
pub mod mft;
pub mod secure;
pub mod stream;
pub mod structs;
pub mod usn;
pub mod volume;

// Re-export the main types
pub use attr::{
    Attribute, AttributeCollection, AttributeHeader, AttributeMap, AttributeValue, ReparsePoint,
    WofInfo,
};
pub use error::{NtfsError, Result};
pub use fixup::apply_fixup;
pub use index::{collation, Index, IndexEntry, IndexKey};
pub use io::{MmapSource, ReadSeek, Source};
pub use mft::{Mft, MftRecord};
pub use secure::{Ace, Acl, Secure, SecurityDescriptor, Sid};
pub use stream::{
    CompressedStream, DecompressFn, NtfsStream, ResidentStream, RunlistStream, WofCompressedStream,
};
pub use structs::{
    AttributeType, BootSector, DataRun, FileName, SegmentReference, StandardInformation, UsnRecordV2,
};
pub use usn::{UsnJrnl, UsnRecord};
pub use volume::{Volume, VolumeOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
