//! Multi-sector transfer fixups
//!
//! NTFS relocates the last two bytes of every sector of a protected block
//! (MFT records, index buffers) into an update sequence array in the block
//! header and plants a sample value in their place, so torn writes are
//! detectable. Parsing any protected block starts by undoing that.

use crate::error::{NtfsError, Result};
use crate::structs::SECTOR_SIZE;

/// Apply the update sequence array to a protected block.
///
/// The input is not modified; the fixed-up bytes are returned as a new
/// buffer. The fixup array offset is read from offset 4 of the block and the
/// array holds one sample value followed by one replacement per sector.
///
/// Fails with [`NtfsError::BadFixup`] on invalid geometry or when a sector's
/// trailing bytes do not match the sample.
pub fn apply_fixup(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(NtfsError::BadFixup(format!(
            "block too small for a multi sector header: {} bytes",
            data.len()
        )));
    }

    let fixup_offset = u16::from_le_bytes([data[4], data[5]]) as usize;
    let sector_count = data.len() >> 9;

    // The array must be even-aligned, fit inside the first sector, and
    // describe at least one full sector of data
    if fixup_offset & 1 != 0
        || fixup_offset + (sector_count + 1) * 2 > SECTOR_SIZE
        || sector_count == 0
        || sector_count * SECTOR_SIZE > data.len()
    {
        return Err(NtfsError::BadFixup(format!(
            "fixup array out of range: offset {}, {} sectors, {} bytes",
            fixup_offset,
            sector_count,
            data.len()
        )));
    }

    let mut fixed = data.to_vec();
    let sample = [data[fixup_offset], data[fixup_offset + 1]];

    for sector in 0..sector_count {
        let end = (sector + 1) * SECTOR_SIZE - 2;
        if fixed[end..end + 2] != sample {
            return Err(NtfsError::BadFixup(format!(
                "sample mismatch in sector {}: {:02x}{:02x} != {:02x}{:02x}",
                sector,
                fixed[end],
                fixed[end + 1],
                sample[0],
                sample[1]
            )));
        }

        let replacement = fixup_offset + 2 + sector * 2;
        fixed[end] = data[replacement];
        fixed[end + 1] = data[replacement + 1];
    }

    Ok(fixed)
}
