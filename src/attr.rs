//! MFT attribute parsing
//!
//! An attribute is a (header, value) pair inside an MFT record. The header
//! carries the type code, name and form; the value is either resident (inline
//! bytes) or non-resident (a runlist into the volume). Typed values decode
//! lazily into a closed set of body types; everything else stays raw.
//!
//! `AttributeMap` groups one record's attributes by type code, and
//! `AttributeCollection` presents the attributes backing one logical stream,
//! which may be fragmented over several attribute records.

use crate::error::{NtfsError, Result};
use crate::stream::{
    missing_decompressor, CompressedStream, NtfsStream, ResidentStream, RunlistStream,
};
use crate::structs::{
    decode_runs, decode_utf16le, parse_attribute_list, AttributeListEntry, AttributeType, DataRun,
    FileName, StandardInformation, ATTRIBUTE_END_MARKER, ATTRIBUTE_FLAG_COMPRESSION_MASK,
};
use crate::volume::NtfsCore;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

// ============================================================================
// Attribute header
// ============================================================================

/// Form-specific part of an attribute record header
#[derive(Debug, Clone)]
pub enum AttributeForm {
    Resident {
        value_length: u32,
        value_offset: u16,
        indexed: u8,
    },
    NonResident {
        lowest_vcn: u64,
        highest_vcn: u64,
        mapping_pairs_offset: u16,
        compression_unit: u8,
        allocated_length: u64,
        file_size: u64,
        valid_data_length: u64,
        total_allocated: Option<u64>,
    },
}

/// Parsed attribute record header
#[derive(Debug, Clone)]
pub struct AttributeHeader {
    pub type_code: u32,
    pub record_length: u32,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub instance: u16,
    pub name: String,
    pub form: AttributeForm,
}

impl AttributeHeader {
    /// Parse an attribute header from the start of an attribute record slice
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(NtfsError::BadMft(format!(
                "attribute header truncated: {} bytes",
                data.len()
            )));
        }

        let type_code = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let record_length = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let form_code = data[8];
        let name_length = data[9];
        let name_offset = u16::from_le_bytes(data[10..12].try_into().unwrap());
        let flags = u16::from_le_bytes(data[12..14].try_into().unwrap());
        let instance = u16::from_le_bytes(data[14..16].try_into().unwrap());

        let name = if name_length > 0 {
            let start = name_offset as usize;
            let end = start + name_length as usize * 2;
            if end > data.len() {
                return Err(NtfsError::BadMft("attribute name out of bounds".to_string()));
            }
            decode_utf16le(&data[start..end])
        } else {
            String::new()
        };

        let form = if form_code == 0 {
            if data.len() < 24 {
                return Err(NtfsError::BadMft("resident attribute header truncated".to_string()));
            }
            AttributeForm::Resident {
                value_length: u32::from_le_bytes(data[16..20].try_into().unwrap()),
                value_offset: u16::from_le_bytes(data[20..22].try_into().unwrap()),
                indexed: data[22],
            }
        } else {
            if data.len() < 64 {
                return Err(NtfsError::BadMft(
                    "non-resident attribute header truncated".to_string(),
                ));
            }
            let compression_unit = data[34];
            AttributeForm::NonResident {
                lowest_vcn: u64::from_le_bytes(data[16..24].try_into().unwrap()),
                highest_vcn: u64::from_le_bytes(data[24..32].try_into().unwrap()),
                mapping_pairs_offset: u16::from_le_bytes(data[32..34].try_into().unwrap()),
                compression_unit,
                allocated_length: u64::from_le_bytes(data[40..48].try_into().unwrap()),
                file_size: u64::from_le_bytes(data[48..56].try_into().unwrap()),
                valid_data_length: u64::from_le_bytes(data[56..64].try_into().unwrap()),
                total_allocated: if compression_unit > 0 && data.len() >= 72 {
                    Some(u64::from_le_bytes(data[64..72].try_into().unwrap()))
                } else {
                    None
                },
            }
        };

        Ok(Self {
            type_code,
            record_length,
            name_length,
            name_offset,
            flags,
            instance,
            name,
            form,
        })
    }

    pub fn resident(&self) -> bool {
        matches!(self.form, AttributeForm::Resident { .. })
    }

    /// Data size: the resident value length or the non-resident file size
    pub fn size(&self) -> u64 {
        match self.form {
            AttributeForm::Resident { value_length, .. } => value_length as u64,
            AttributeForm::NonResident { file_size, .. } => file_size,
        }
    }

    pub fn allocated_size(&self) -> Option<u64> {
        match self.form {
            AttributeForm::Resident { .. } => None,
            AttributeForm::NonResident {
                allocated_length, ..
            } => Some(allocated_length),
        }
    }

    pub fn lowest_vcn(&self) -> Option<u64> {
        match self.form {
            AttributeForm::Resident { .. } => None,
            AttributeForm::NonResident { lowest_vcn, .. } => Some(lowest_vcn),
        }
    }

    pub fn compression_unit(&self) -> Option<u8> {
        match self.form {
            AttributeForm::Resident { .. } => None,
            AttributeForm::NonResident {
                compression_unit, ..
            } => Some(compression_unit),
        }
    }
}

// ============================================================================
// Typed attribute values
// ============================================================================

/// $REPARSE_POINT value, decoded to its tag only.
///
/// Interpreting the reparse data beyond the tag is out of scope; the raw
/// bytes are kept for callers that need them. The one exception is the WOF
/// tag, whose provider info selects how the overlay's compressed data
/// stream is decoded.
#[derive(Debug, Clone)]
pub struct ReparsePoint {
    pub tag: u32,
    pub data: Vec<u8>,
}

/// Name of the alternate data stream holding a WOF overlay's chunks
pub const WOF_DATA_STREAM_NAME: &str = "WofCompressedData";

/// WOF overlay provider and compression identifiers
pub mod wof {
    pub const PROVIDER_WIM: u32 = 1;
    pub const PROVIDER_FILE: u32 = 2;

    pub const COMPRESSION_XPRESS4K: u32 = 0;
    pub const COMPRESSION_LZX: u32 = 1;
    pub const COMPRESSION_XPRESS8K: u32 = 2;
    pub const COMPRESSION_XPRESS16K: u32 = 3;
}

/// Overlay provider info carried by a WOF reparse point
#[derive(Debug, Clone, Copy)]
pub struct WofInfo {
    pub version: u32,
    pub provider: u32,
    pub provider_version: u32,
    pub algorithm: u32,
}

impl WofInfo {
    /// The uncompressed chunk size selected by the algorithm
    pub fn chunk_size(&self) -> Option<u64> {
        match self.algorithm {
            wof::COMPRESSION_XPRESS4K => Some(4096),
            wof::COMPRESSION_LZX => Some(32768),
            wof::COMPRESSION_XPRESS8K => Some(8192),
            wof::COMPRESSION_XPRESS16K => Some(16384),
            _ => None,
        }
    }
}

impl ReparsePoint {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(NtfsError::BadMft("reparse point value truncated".to_string()));
        }
        Ok(Self {
            tag: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            data: data[8..].to_vec(),
        })
    }

    /// Decode the overlay provider info of a WOF reparse point
    pub fn wof_info(&self) -> Option<WofInfo> {
        if self.tag != crate::structs::reparse_tag::WOF || self.data.len() < 16 {
            return None;
        }
        Some(WofInfo {
            version: u32::from_le_bytes(self.data[0..4].try_into().unwrap()),
            provider: u32::from_le_bytes(self.data[4..8].try_into().unwrap()),
            provider_version: u32::from_le_bytes(self.data[8..12].try_into().unwrap()),
            algorithm: u32::from_le_bytes(self.data[12..16].try_into().unwrap()),
        })
    }
}

/// Decoded attribute value. Types outside the closed set stay raw.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    StandardInformation(StandardInformation),
    FileName(FileName),
    AttributeList(Vec<AttributeListEntry>),
    ReparsePoint(ReparsePoint),
    Raw(Vec<u8>),
}

// ============================================================================
// Attribute
// ============================================================================

/// One attribute record, bound to the MFT record buffer it was parsed from
#[derive(Clone)]
pub struct Attribute {
    core: Weak<NtfsCore>,
    /// Segment number of the owning record, when known
    owner: Option<u64>,
    /// The owning record's fixed-up buffer
    data: Arc<Vec<u8>>,
    /// Offset of this attribute within the record buffer
    offset: usize,
    header: AttributeHeader,
    value: OnceLock<AttributeValue>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("type", &format_args!("0x{:x}", self.header.type_code))
            .field("name", &self.header.name)
            .field("resident", &self.header.resident())
            .field("owner", &self.owner)
            .finish()
    }
}

impl Attribute {
    pub(crate) fn new(
        core: Weak<NtfsCore>,
        owner: Option<u64>,
        data: Arc<Vec<u8>>,
        offset: usize,
        header: AttributeHeader,
    ) -> Self {
        Self {
            core,
            owner,
            data,
            offset,
            header,
            value: OnceLock::new(),
        }
    }

    /// Parse a standalone attribute from bytes, without a backing record.
    ///
    /// Non-resident data access on the result fails with
    /// [`NtfsError::VolumeUnavailable`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = AttributeHeader::from_bytes(data)?;
        Ok(Self::new(
            Weak::new(),
            None,
            Arc::new(data.to_vec()),
            0,
            header,
        ))
    }

    pub fn header(&self) -> &AttributeHeader {
        &self.header
    }

    pub fn type_code(&self) -> u32 {
        self.header.type_code
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn resident(&self) -> bool {
        self.header.resident()
    }

    pub fn size(&self) -> u64 {
        self.header.size()
    }

    /// The raw bytes of this attribute record (header included)
    fn record_slice(&self) -> &[u8] {
        let end = (self.offset + self.header.record_length as usize).min(self.data.len());
        &self.data[self.offset..end]
    }

    /// Decode this attribute's runlist.
    ///
    /// # Panics
    ///
    /// Panics when called on a resident attribute; residency is a type
    /// invariant the caller is expected to check.
    pub fn dataruns(&self) -> Result<Vec<DataRun>> {
        let AttributeForm::NonResident {
            mapping_pairs_offset,
            ..
        } = self.header.form
        else {
            panic!("resident attributes have no dataruns");
        };

        let slice = self.record_slice();
        let start = mapping_pairs_offset as usize;
        if start >= slice.len() {
            return Err(NtfsError::BadRunlist);
        }
        decode_runs(&slice[start..])
    }

    /// Open a stream over this single attribute's data.
    ///
    /// For multi-record streams use [`AttributeCollection::open`], which
    /// merges every extent of the stream.
    pub fn open(&self) -> Result<NtfsStream> {
        match self.header.form {
            AttributeForm::Resident {
                value_length,
                value_offset,
                ..
            } => Ok(NtfsStream::Resident(ResidentStream::new(
                self.data.clone(),
                self.offset + value_offset as usize,
                value_length as usize,
            ))),
            AttributeForm::NonResident { file_size, .. } => {
                let core = self.core.upgrade().ok_or(NtfsError::VolumeUnavailable)?;
                let source = core.source.clone().ok_or(NtfsError::VolumeUnavailable)?;
                Ok(NtfsStream::Runlist(RunlistStream::new(
                    source,
                    self.dataruns()?,
                    file_size,
                    core.geometry.cluster_size as u64,
                )))
            }
        }
    }

    /// Read all of this attribute's data
    pub fn data(&self) -> Result<Vec<u8>> {
        self.open()?.read_all()
    }

    /// Decode the typed value, caching the result.
    pub fn value(&self) -> Result<&AttributeValue> {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let decoded = self.decode_value()?;
        Ok(self.value.get_or_init(|| decoded))
    }

    fn decode_value(&self) -> Result<AttributeValue> {
        let data = self.data()?;
        Ok(match AttributeType::from_u32(self.header.type_code) {
            Some(AttributeType::StandardInformation) => {
                AttributeValue::StandardInformation(StandardInformation::from_bytes(&data))
            }
            Some(AttributeType::FileName) => AttributeValue::FileName(
                FileName::from_bytes(&data)
                    .ok_or_else(|| NtfsError::BadMft("$FILE_NAME value truncated".to_string()))?,
            ),
            Some(AttributeType::AttributeList) => {
                AttributeValue::AttributeList(parse_attribute_list(&data))
            }
            Some(AttributeType::ReparsePoint) => {
                AttributeValue::ReparsePoint(ReparsePoint::from_bytes(&data)?)
            }
            _ => AttributeValue::Raw(data),
        })
    }

    /// The decoded $STANDARD_INFORMATION value of this attribute
    pub fn standard_information(&self) -> Result<&StandardInformation> {
        match self.value()? {
            AttributeValue::StandardInformation(si) => Ok(si),
            _ => Err(NtfsError::BadMft(format!(
                "attribute 0x{:x} is not $STANDARD_INFORMATION",
                self.header.type_code
            ))),
        }
    }

    /// The decoded $FILE_NAME value of this attribute
    pub fn file_name(&self) -> Result<&FileName> {
        match self.value()? {
            AttributeValue::FileName(fname) => Ok(fname),
            _ => Err(NtfsError::BadMft(format!(
                "attribute 0x{:x} is not $FILE_NAME",
                self.header.type_code
            ))),
        }
    }

    /// The decoded $ATTRIBUTE_LIST entries of this attribute
    pub fn attribute_list(&self) -> Result<&[AttributeListEntry]> {
        match self.value()? {
            AttributeValue::AttributeList(entries) => Ok(entries),
            _ => Err(NtfsError::BadMft(format!(
                "attribute 0x{:x} is not $ATTRIBUTE_LIST",
                self.header.type_code
            ))),
        }
    }

    pub(crate) fn core(&self) -> Weak<NtfsCore> {
        self.core.clone()
    }
}

// ============================================================================
// Attribute map
// ============================================================================

/// A record's attributes grouped by type code, in insertion order per type
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    map: HashMap<u32, AttributeCollection>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute; the only intended mutation
    pub fn add(&mut self, attr: Attribute) {
        self.map
            .entry(attr.type_code())
            .or_default()
            .0
            .push(attr);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, attr_type: AttributeType) -> bool {
        self.map.contains_key(&(attr_type as u32))
    }

    /// All attributes of one type, or an empty collection
    pub fn get(&self, attr_type: AttributeType) -> AttributeCollection {
        self.map
            .get(&(attr_type as u32))
            .cloned()
            .unwrap_or_default()
    }

    /// Find attributes by case-insensitive name and type
    pub fn find(&self, name: &str, attr_type: AttributeType) -> AttributeCollection {
        let wanted = name.to_lowercase();
        AttributeCollection(
            self.get(attr_type)
                .0
                .into_iter()
                .filter(|attr| attr.name().to_lowercase() == wanted)
                .collect(),
        )
    }

    pub fn values(&self) -> impl Iterator<Item = &Attribute> {
        self.map.values().flat_map(|collection| collection.0.iter())
    }
}

// ============================================================================
// Attribute collection
// ============================================================================

/// The attributes backing one logical stream.
///
/// Resident streams have exactly one member. Non-resident streams may span
/// several attribute records; members are merged in `lowest_vcn` order.
#[derive(Debug, Clone, Default)]
pub struct AttributeCollection(pub(crate) Vec<Attribute>);

impl AttributeCollection {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    fn first(&self) -> &Attribute {
        self.0.first().expect("empty attribute collection")
    }

    /// Whether the stream is resident, judged from its first attribute
    pub fn resident(&self) -> bool {
        self.first().resident()
    }

    /// Non-resident members sorted by lowest VCN
    fn stream_attributes(&self) -> Vec<&Attribute> {
        let mut attrs: Vec<&Attribute> =
            self.0.iter().filter(|attr| !attr.resident()).collect();
        attrs.sort_by_key(|attr| attr.header().lowest_vcn());
        attrs
    }

    /// Stream size: the resident value length, or the real/allocated size
    /// from the lowest-VCN attribute
    pub fn size(&self, allocated: bool) -> u64 {
        if self.resident() {
            return self.first().size();
        }

        let attrs = self.stream_attributes();
        let header = attrs[0].header();
        if allocated {
            header.allocated_size().unwrap_or_else(|| header.size())
        } else {
            header.size()
        }
    }

    /// The merged runlist of every non-resident member.
    ///
    /// # Panics
    ///
    /// Panics when the stream is resident; residency is a type invariant the
    /// caller is expected to check.
    pub fn dataruns(&self) -> Result<Vec<DataRun>> {
        if self.resident() {
            panic!("resident attributes have no dataruns");
        }

        let mut runs = Vec::new();
        for attr in self.stream_attributes() {
            runs.extend(attr.dataruns()?);
        }
        Ok(runs)
    }

    /// Open a stream over this collection's data.
    ///
    /// Resident values are served from the record buffer. Non-resident
    /// streams read through the volume and are decompressed per compression
    /// unit when the attribute header carries a compression flag.
    pub fn open(&self, allocated: bool) -> Result<NtfsStream> {
        if self.resident() {
            return self.first().open();
        }

        let attrs = self.stream_attributes();
        let head = attrs[0];
        let core = head.core().upgrade().ok_or(NtfsError::VolumeUnavailable)?;
        let source = core.source.clone().ok_or(NtfsError::VolumeUnavailable)?;

        let mut runs = Vec::new();
        for attr in &attrs {
            runs.extend(attr.dataruns()?);
        }
        let size = self.size(allocated);
        let cluster_size = core.geometry.cluster_size as u64;

        if head.header().flags & ATTRIBUTE_FLAG_COMPRESSION_MASK != 0 {
            let decompress = core
                .lznt1
                .clone()
                .unwrap_or_else(|| missing_decompressor("LZNT1"));
            Ok(NtfsStream::Compressed(CompressedStream::new(
                source,
                runs,
                size,
                cluster_size,
                head.header().compression_unit().unwrap_or(4),
                decompress,
            )))
        } else {
            Ok(NtfsStream::Runlist(RunlistStream::new(
                source,
                runs,
                size,
                cluster_size,
            )))
        }
    }
}

// ============================================================================
// Record attribute iteration
// ============================================================================

/// Parse every attribute record in a fixed-up MFT record buffer.
///
/// Stops at the end marker or end of buffer; a zero record length before the
/// end marker is a broken record.
pub(crate) fn parse_record_attributes(
    core: &Weak<NtfsCore>,
    owner: Option<u64>,
    data: &Arc<Vec<u8>>,
    first_attribute_offset: usize,
) -> Result<AttributeMap> {
    let mut attrs = AttributeMap::new();
    let mut offset = first_attribute_offset;

    loop {
        if offset + 8 > data.len() {
            break;
        }

        let type_code = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
        if type_code == ATTRIBUTE_END_MARKER {
            break;
        }

        let record_length =
            u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as usize;
        if record_length == 0 {
            return Err(NtfsError::BadMft(
                "attribute record length is 0 before end marker".to_string(),
            ));
        }
        if offset + record_length > data.len() {
            break;
        }

        let header = AttributeHeader::from_bytes(&data[offset..offset + record_length])?;
        attrs.add(Attribute::new(
            core.clone(),
            owner,
            data.clone(),
            offset,
            header,
        ));

        offset += record_length;
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::wintimestamp;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    const STANDARD_INFORMATION_ATTR: &str = "100000006000000000001800000000004800000018000000d2145d665666d801\
         d2145d665666d801d2145d665666d801d2145d665666d8010600000000000000\
         0000000000000000000000000001000000000000000000000000000000000000";

    #[test]
    fn standard_information_attribute() {
        let attr = Attribute::from_bytes(&unhex(STANDARD_INFORMATION_ATTR)).unwrap();
        assert_eq!(attr.type_code(), AttributeType::StandardInformation as u32);
        assert!(attr.resident());

        let si = attr.standard_information().unwrap();
        let expected = "2022-05-12T23:17:07.802645Z";
        for ts in [
            si.creation_time,
            si.last_modification_time,
            si.last_change_time,
            si.last_access_time,
        ] {
            assert_eq!(
                wintimestamp(ts).to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
                expected
            );
        }
        assert_eq!(si.creation_time_ns(), 1_652_397_427_802_645_000);
        assert_eq!(si.file_attributes, 0x06);
    }

    #[test]
    fn file_name_attribute() {
        let data = unhex(
            "300000006800000000001800000003004a000000180001000500000000000500\
             d2145d665666d801d2145d665666d801d2145d665666d801d2145d665666d801\
             004000000000000000400000000000000600000000000000040324004d004600\
             5400000000000000",
        );
        let attr = Attribute::from_bytes(&data).unwrap();
        assert_eq!(attr.type_code(), AttributeType::FileName as u32);

        let fname = attr.file_name().unwrap();
        assert_eq!(fname.name, "$MFT");
        assert_eq!(fname.file_size, 16384);
        assert_eq!(fname.parent_directory.segment, 5);
        assert_eq!(
            fname
                .creation_time()
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "2022-05-12T23:17:07.802645Z"
        );
    }

    #[test]
    fn data_attribute_runs_and_no_volume() {
        let data = unhex(
            "8000000048000000010040000000060000000000000000003f00000000000000\
             4000000000000000000004000000000000000400000000000000040000000000\
             2140550200000000",
        );
        let attr = Attribute::from_bytes(&data).unwrap();
        assert_eq!(attr.type_code(), AttributeType::Data as u32);
        assert!(!attr.resident());
        assert_eq!(
            attr.dataruns().unwrap(),
            vec![DataRun {
                lcn: Some(597),
                count: 64
            }]
        );

        // Standalone attributes have no volume to read through
        assert!(matches!(attr.open(), Err(NtfsError::VolumeUnavailable)));
    }

    #[test]
    fn reparse_point_tag_identification() {
        let data = unhex(
            "c00000005800000000000000000004004000000018000000030000a038000000\
             00001a001c0012005c003f003f005c0043003a005c0054006100720067006500\
             7400000043003a005c00540061007200670065007400",
        );
        let attr = Attribute::from_bytes(&data).unwrap();
        assert_eq!(attr.type_code(), AttributeType::ReparsePoint as u32);

        match attr.value().unwrap() {
            AttributeValue::ReparsePoint(rp) => {
                assert_eq!(rp.tag, crate::structs::reparse_tag::MOUNT_POINT);
                assert!(!rp.data.is_empty());
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn attribute_map_membership_and_find() {
        let mut map = AttributeMap::new();
        assert_eq!(map.len(), 0);
        assert!(map.get(AttributeType::StandardInformation).is_empty());
        assert!(!map.contains(AttributeType::StandardInformation));

        let attr = Attribute::from_bytes(&unhex(STANDARD_INFORMATION_ATTR)).unwrap();
        map.add(attr);

        assert_eq!(map.len(), 1);
        assert!(map.contains(AttributeType::StandardInformation));
        assert_eq!(map.get(AttributeType::StandardInformation).len(), 1);
        assert_eq!(map.find("", AttributeType::StandardInformation).len(), 1);
        assert_eq!(map.find("$bad", AttributeType::StandardInformation).len(), 0);
    }

    #[test]
    #[should_panic(expected = "resident attributes have no dataruns")]
    fn dataruns_on_resident_attribute_panics() {
        let attr = Attribute::from_bytes(&unhex(STANDARD_INFORMATION_ATTR)).unwrap();
        let _ = attr.dataruns();
    }
}
