//! Volume opening and component wiring
//!
//! A `Volume` is parsed either from a raw volume byte source or from any
//! subset of extracted system files ($BOOT, $MFT, $UsnJrnl:$J, $Secure:$SDS).
//! Explicitly supplied files take precedence over discovery through the
//! volume source.

use crate::error::{NtfsError, Result};
use crate::io::{MmapSource, ReadSeek, Source};
use crate::mft::{Mft, MftRecord};
use crate::secure::Secure;
use crate::stream::{DecompressFn, RunlistStream};
use crate::structs::{
    decode_utf16le, AttributeType, BootSector, DEFAULT_CLUSTER_SIZE, DEFAULT_INDEX_SIZE,
    DEFAULT_RECORD_SIZE, DEFAULT_SECTOR_SIZE, FILE_NUMBER_VOLUME, SECTOR_SIZE,
};
use crate::usn::UsnJrnl;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

// ============================================================================
// Shared volume state
// ============================================================================

/// Derived volume geometry, cached shifts included
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub sector_size: u32,
    pub cluster_size: u32,
    pub record_size: u32,
    pub index_size: u32,
    pub sector_shift: u32,
    pub cluster_shift: u32,
}

impl Geometry {
    fn from_boot_sector(boot: &BootSector) -> Self {
        let sector_size = boot.bytes_per_sector as u32;
        let cluster_size = boot.cluster_size();
        Self {
            sector_size,
            cluster_size,
            record_size: boot.record_size(),
            index_size: boot.index_size(),
            sector_shift: sector_size.trailing_zeros(),
            cluster_shift: cluster_size.trailing_zeros(),
        }
    }

    fn defaults() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            cluster_size: DEFAULT_CLUSTER_SIZE,
            record_size: DEFAULT_RECORD_SIZE,
            index_size: DEFAULT_INDEX_SIZE,
            sector_shift: DEFAULT_SECTOR_SIZE.trailing_zeros(),
            cluster_shift: DEFAULT_CLUSTER_SIZE.trailing_zeros(),
        }
    }
}

/// State shared by every parser component of one volume.
///
/// Records and index entries hold weak handles to this; only the `Volume`
/// and the component readers hold it strongly, so parser-produced objects
/// never form ownership cycles.
pub(crate) struct NtfsCore {
    pub(crate) source: Option<Source>,
    pub(crate) geometry: Geometry,
    pub(crate) lznt1: Option<DecompressFn>,
    pub(crate) lzxpress_huffman: Option<DecompressFn>,
    pub(crate) lzx: Option<DecompressFn>,
    pub(crate) mft: OnceLock<Mft>,
}

// ============================================================================
// Volume options
// ============================================================================

/// Builder for opening a volume from any combination of sources
#[derive(Default)]
pub struct VolumeOptions {
    source: Option<Source>,
    boot: Option<Box<dyn ReadSeek>>,
    mft: Option<Box<dyn ReadSeek>>,
    usnjrnl: Option<Box<dyn ReadSeek>>,
    sds: Option<Box<dyn ReadSeek>>,
    lznt1: Option<DecompressFn>,
    lzxpress_huffman: Option<DecompressFn>,
    lzx: Option<DecompressFn>,
}

impl VolumeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw volume byte source, where data on disk is read from
    pub fn source<T: ReadSeek + 'static>(mut self, fh: T) -> Self {
        self.source = Some(Source::new(fh));
        self
    }

    /// A $BOOT file, parsed instead of the volume's first sector
    pub fn boot<T: ReadSeek + 'static>(mut self, fh: T) -> Self {
        self.boot = Some(Box::new(fh));
        self
    }

    /// A $MFT file, used instead of locating the MFT on the volume
    pub fn mft<T: ReadSeek + 'static>(mut self, fh: T) -> Self {
        self.mft = Some(Box::new(fh));
        self
    }

    /// A $UsnJrnl:$J stream
    pub fn usnjrnl<T: ReadSeek + 'static>(mut self, fh: T) -> Self {
        self.usnjrnl = Some(Box::new(fh));
        self
    }

    /// A $Secure:$SDS stream
    pub fn sds<T: ReadSeek + 'static>(mut self, fh: T) -> Self {
        self.sds = Some(Box::new(fh));
        self
    }

    /// The LZNT1 decompressor used for compressed streams
    pub fn lznt1(mut self, decompress: DecompressFn) -> Self {
        self.lznt1 = Some(decompress);
        self
    }

    /// The LZXPRESS-Huffman decompressor used for WOF overlay chunks.
    ///
    /// One function covers the whole 4/8/16 KiB family; the chunk size comes
    /// from the overlay's reparse point.
    pub fn lzxpress_huffman(mut self, decompress: DecompressFn) -> Self {
        self.lzxpress_huffman = Some(decompress);
        self
    }

    /// The LZX decompressor used for 32 KiB WOF overlay chunks
    pub fn lzx(mut self, decompress: DecompressFn) -> Self {
        self.lzx = Some(decompress);
        self
    }

    pub fn open(self) -> Result<Volume> {
        Volume::from_options(self)
    }
}

// ============================================================================
// Volume
// ============================================================================

/// A parsed NTFS volume
pub struct Volume {
    core: Arc<NtfsCore>,
    boot_sector: Option<BootSector>,
    secure: Option<Secure>,
    usnjrnl: Option<UsnJrnl>,
}

impl Volume {
    /// Open a volume from a raw byte source
    pub fn open<T: ReadSeek + 'static>(fh: T) -> Result<Self> {
        VolumeOptions::new().source(fh).open()
    }

    /// Open a volume from a raw image file, memory-mapped
    pub fn open_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(MmapSource::open(path)?)
    }

    /// Open with explicit system files or decompressors
    pub fn options() -> VolumeOptions {
        VolumeOptions::new()
    }

    fn from_options(mut options: VolumeOptions) -> Result<Self> {
        // Geometry comes from $BOOT, the volume's first sector, or defaults
        let boot_sector = match (&mut options.boot, &options.source) {
            (Some(boot), _) => {
                let mut data = vec![0u8; SECTOR_SIZE];
                boot.seek(SeekFrom::Start(0))?;
                boot.read_exact(&mut data)?;
                Some(BootSector::from_bytes(&data)?)
            }
            (None, Some(source)) => {
                let mut data = vec![0u8; SECTOR_SIZE];
                source.read_exact_at(0, &mut data)?;
                Some(BootSector::from_bytes(&data)?)
            }
            (None, None) => None,
        };

        let geometry = match &boot_sector {
            Some(boot) => Geometry::from_boot_sector(boot),
            None => Geometry::defaults(),
        };
        debug!(
            sector_size = geometry.sector_size,
            cluster_size = geometry.cluster_size,
            record_size = geometry.record_size,
            index_size = geometry.index_size,
            "derived volume geometry"
        );

        let core = Arc::new(NtfsCore {
            source: options.source.clone(),
            geometry,
            lznt1: options.lznt1.clone(),
            lzxpress_huffman: options.lzxpress_huffman.clone(),
            lzx: options.lzx.clone(),
            mft: OnceLock::new(),
        });

        if let Some(mft_fh) = options.mft {
            let mft = Mft::from_stream(mft_fh, Arc::downgrade(&core), geometry.record_size as u64);
            let _ = core.mft.set(mft);
        } else if let (Some(source), Some(boot)) = (&options.source, &boot_sector) {
            bootstrap_mft(&core, source, boot)?;
        }

        let secure = match options.sds {
            Some(sds) => Some(Secure::from_sds(sds)?),
            None => discover_secure(&core)?,
        };

        let usnjrnl = match options.usnjrnl {
            Some(fh) => Some(UsnJrnl::new(
                fh,
                None,
                geometry.cluster_size as u64,
                Arc::downgrade(&core),
            )),
            None => discover_usnjrnl(&core)?,
        };

        Ok(Self {
            core,
            boot_sector,
            secure,
            usnjrnl,
        })
    }

    pub fn boot_sector(&self) -> Option<&BootSector> {
        self.boot_sector.as_ref()
    }

    pub fn sector_size(&self) -> u32 {
        self.core.geometry.sector_size
    }

    pub fn cluster_size(&self) -> u32 {
        self.core.geometry.cluster_size
    }

    pub fn record_size(&self) -> u32 {
        self.core.geometry.record_size
    }

    pub fn index_size(&self) -> u32 {
        self.core.geometry.index_size
    }

    /// The volume serial number, when a boot sector was available
    pub fn serial(&self) -> Option<u64> {
        self.boot_sector.as_ref().map(|boot| boot.serial_number)
    }

    /// The Master File Table
    pub fn mft(&self) -> Result<&Mft> {
        self.core.mft.get().ok_or(NtfsError::MftUnavailable)
    }

    /// The $Secure reader, when available
    pub fn secure(&self) -> Option<&Secure> {
        self.secure.as_ref()
    }

    /// The USN journal reader, when available
    pub fn usnjrnl(&self) -> Option<&UsnJrnl> {
        self.usnjrnl.as_ref()
    }

    /// Retrieve an MFT record by path
    pub fn get(&self, path: &str) -> Result<MftRecord> {
        self.mft()?.get(path)
    }

    /// The volume label from record 3's $VOLUME_NAME attribute
    pub fn volume_name(&self) -> Result<Option<String>> {
        let mft = self.mft()?;
        let record = mft.get_segment(FILE_NUMBER_VOLUME)?;

        let attrs = record.attributes()?.get(AttributeType::VolumeName);
        let Some(attr) = attrs.iter().next() else {
            return Ok(None);
        };
        Ok(Some(decode_utf16le(&attr.data()?)))
    }
}

// ============================================================================
// MFT bootstrap
// ============================================================================

/// Resolve the $MFT from a raw volume.
///
/// Record 0 describes the $MFT itself, but on a heavily fragmented volume
/// its extent map continues in child records that are only reachable through
/// the very stream being reconstructed. The runs parsed from record 0 are
/// guaranteed to cover the child records named by its attribute list, so the
/// stream is built from record 0 first and extended run by run as the list
/// entries resolve, each append making the next child reachable.
fn bootstrap_mft(core: &Arc<NtfsCore>, source: &Source, boot: &BootSector) -> Result<()> {
    let geometry = &core.geometry;
    let mft_offset = boot.mft_start_lcn * geometry.cluster_size as u64;

    let mut data = vec![0u8; geometry.record_size as usize];
    source.read_exact_at(mft_offset, &mut data)?;
    let record = MftRecord::parse(&data, Arc::downgrade(core), Some(0))?;

    // Runs reachable from record 0 alone
    let runs = record.dataruns("", AttributeType::Data)?;
    let size = record.size("", AttributeType::Data, false)?;
    let stream = RunlistStream::new(source.clone(), runs, size, geometry.cluster_size as u64);

    let mft = Mft::from_runlist(stream, Arc::downgrade(core), geometry.record_size as u64);
    let _ = core.mft.set(mft);

    // Runs only reachable through the attribute list. Each child's runs are
    // appended before the next entry resolves, because that entry's record
    // may live inside them.
    let list = record.attributes()?.get(AttributeType::AttributeList);
    if list.is_empty() {
        return Ok(());
    }
    let entries = list.iter().next().unwrap().attribute_list()?.to_vec();

    let mft = core.mft.get().unwrap();
    let mut seen = HashSet::from([0u64]);

    for entry in entries {
        let segment = entry.segment_reference.segment;
        if segment == 0 || !seen.insert(segment) {
            continue;
        }

        let child = mft.get_segment(segment)?;
        for attr in child.attributes()?.get(AttributeType::Data).iter() {
            if !attr.resident() {
                mft.extend_runlist(attr.dataruns()?);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Collaborator discovery
// ============================================================================

fn discover_secure(core: &Arc<NtfsCore>) -> Result<Option<Secure>> {
    let Some(mft) = core.mft.get() else {
        return Ok(None);
    };

    match mft.get("$Secure").and_then(|record| Secure::from_record(&record)) {
        Ok(secure) => Ok(Some(secure)),
        Err(
            NtfsError::NotFound(_)
            | NtfsError::NoSuchStream { .. }
            | NtfsError::VolumeUnavailable
            | NtfsError::MftUnavailable,
        ) => Ok(None),
        Err(e) => Err(e),
    }
}

fn discover_usnjrnl(core: &Arc<NtfsCore>) -> Result<Option<UsnJrnl>> {
    let Some(mft) = core.mft.get() else {
        return Ok(None);
    };

    let open = || -> Result<UsnJrnl> {
        let record = mft.get("$Extend/$UsnJrnl")?;
        let stream = record.open("$J", AttributeType::Data, false)?;
        let runlist = stream.runlist().map(|runs| runs.to_vec());
        Ok(UsnJrnl::new(
            Box::new(stream),
            runlist,
            core.geometry.cluster_size as u64,
            Arc::downgrade(core),
        ))
    };

    match open() {
        Ok(jrnl) => Ok(Some(jrnl)),
        Err(
            NtfsError::NotFound(_)
            | NtfsError::NoSuchStream { .. }
            | NtfsError::NotADirectory(_)
            | NtfsError::VolumeUnavailable
            | NtfsError::MftUnavailable,
        ) => Ok(None),
        Err(e) => Err(e),
    }
}
