//! In-memory NTFS image construction for integration tests.
//!
//! Builds byte-exact volume images: boot sector, fixup-protected MFT
//! records, resident and non-resident attributes, directory indexes with
//! INDX allocation buffers. Geometry is fixed at 512-byte sectors, 4 KiB
//! clusters and 1 KiB file records.

#![allow(dead_code)]

pub const SECTOR: usize = 512;
pub const CLUSTER: usize = 4096;
pub const RECORD: usize = 1024;
pub const MFT_START_LCN: u64 = 4;

pub const TEST_FILETIME: u64 = 0x01D86656665D14D2;

// Attribute type codes
pub const STANDARD_INFORMATION: u32 = 0x10;
pub const ATTRIBUTE_LIST: u32 = 0x20;
pub const FILE_NAME: u32 = 0x30;
pub const VOLUME_NAME: u32 = 0x60;
pub const DATA: u32 = 0x80;
pub const INDEX_ROOT: u32 = 0x90;
pub const INDEX_ALLOCATION: u32 = 0xA0;
pub const REPARSE_POINT: u32 = 0xC0;

fn utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

pub fn segment_ref(segment: u64, sequence: u16) -> u64 {
    segment | ((sequence as u64) << 48)
}

// ============================================================================
// Image assembly
// ============================================================================

pub struct Image {
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(clusters: usize) -> Self {
        Self {
            data: vec![0u8; clusters * CLUSTER],
        }
    }

    pub fn put(&mut self, offset: usize, bytes: &[u8]) {
        if self.data.len() < offset + bytes.len() {
            self.data.resize(offset + bytes.len(), 0);
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_record(&mut self, segment: u64, record: &[u8]) {
        assert_eq!(record.len(), RECORD);
        let offset = MFT_START_LCN as usize * CLUSTER + segment as usize * RECORD;
        self.put(offset, record);
    }

    pub fn fill_cluster(&mut self, lcn: u64, value: u8) {
        let offset = lcn as usize * CLUSTER;
        self.put(offset, &vec![value; CLUSTER]);
    }
}

/// Boot sector for the fixed test geometry
pub fn boot_sector() -> Vec<u8> {
    let mut data = vec![0u8; SECTOR];
    data[0x03..0x0B].copy_from_slice(b"NTFS    ");
    data[0x0B..0x0D].copy_from_slice(&(SECTOR as u16).to_le_bytes());
    data[0x0D] = 8; // sectors per cluster
    data[0x28..0x30].copy_from_slice(&0x10000u64.to_le_bytes());
    data[0x30..0x38].copy_from_slice(&MFT_START_LCN.to_le_bytes());
    data[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
    data[0x40] = (-10i8) as u8; // 1 KiB records
    data[0x44] = (-11i8) as u8; // 4 KiB index buffers
    data[0x48..0x50].copy_from_slice(&0x1234567890ABCDEFu64.to_le_bytes());
    data[0x1FE] = 0x55;
    data[0x1FF] = 0xAA;
    data
}

// ============================================================================
// Fixup protection
// ============================================================================

/// Move each sector's trailing bytes into the update sequence array and
/// plant the sample value, producing the on-disk protected form
pub fn protect(block: &mut [u8], usa_offset: usize) {
    let sectors = block.len() / SECTOR;
    let sample = 0x0101u16.to_le_bytes();

    block[usa_offset..usa_offset + 2].copy_from_slice(&sample);
    for sector in 0..sectors {
        let end = (sector + 1) * SECTOR - 2;
        let slot = usa_offset + 2 + sector * 2;
        let original = [block[end], block[end + 1]];
        block[slot..slot + 2].copy_from_slice(&original);
        block[end..end + 2].copy_from_slice(&sample);
    }
}

// ============================================================================
// Attribute values
// ============================================================================

pub fn standard_information_value() -> Vec<u8> {
    let mut value = Vec::with_capacity(72);
    for _ in 0..4 {
        value.extend_from_slice(&TEST_FILETIME.to_le_bytes());
    }
    value.extend_from_slice(&0x20u32.to_le_bytes()); // FILE_ATTRIBUTE_ARCHIVE
    value.extend_from_slice(&[0u8; 16]);
    value.extend_from_slice(&0x100u32.to_le_bytes()); // security id
    value.extend_from_slice(&[0u8; 16]);
    value
}

pub fn file_name_value(
    parent: u64,
    parent_seq: u16,
    name: &str,
    flags: u8,
    real_size: u64,
    alloc_size: u64,
) -> Vec<u8> {
    let mut value = Vec::new();
    value.extend_from_slice(&segment_ref(parent, parent_seq).to_le_bytes());
    for _ in 0..4 {
        value.extend_from_slice(&TEST_FILETIME.to_le_bytes());
    }
    value.extend_from_slice(&alloc_size.to_le_bytes());
    value.extend_from_slice(&real_size.to_le_bytes());
    value.extend_from_slice(&0x20u32.to_le_bytes());
    value.extend_from_slice(&0u32.to_le_bytes());
    value.push(name.encode_utf16().count() as u8);
    value.push(flags);
    value.extend_from_slice(&utf16_bytes(name));
    value
}

/// $REPARSE_POINT value for a WOF file-provider overlay
pub fn wof_reparse_value(algorithm: u32) -> Vec<u8> {
    let mut value = Vec::new();
    value.extend_from_slice(&0x8000_0017u32.to_le_bytes()); // IO_REPARSE_TAG_WOF
    value.extend_from_slice(&16u16.to_le_bytes()); // reparse data length
    value.extend_from_slice(&0u16.to_le_bytes());
    value.extend_from_slice(&1u32.to_le_bytes()); // wof version
    value.extend_from_slice(&2u32.to_le_bytes()); // file provider
    value.extend_from_slice(&1u32.to_le_bytes()); // provider version
    value.extend_from_slice(&algorithm.to_le_bytes());
    value
}

/// One $ATTRIBUTE_LIST entry (no attribute name)
pub fn attribute_list_entry(
    type_code: u32,
    lowest_vcn: u64,
    segment: u64,
    sequence: u16,
    instance: u16,
) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&type_code.to_le_bytes());
    entry.extend_from_slice(&32u16.to_le_bytes());
    entry.push(0); // name length
    entry.push(26); // name offset
    entry.extend_from_slice(&lowest_vcn.to_le_bytes());
    entry.extend_from_slice(&segment_ref(segment, sequence).to_le_bytes());
    entry.extend_from_slice(&instance.to_le_bytes());
    entry.resize(32, 0);
    entry
}

// ============================================================================
// Attribute records
// ============================================================================

pub fn resident_attr(type_code: u32, name: &str, value: &[u8], flags: u16) -> Vec<u8> {
    let name_bytes = utf16_bytes(name);
    let name_offset = 24usize;
    let value_offset = align8(name_offset + name_bytes.len());
    let record_length = align8(value_offset + value.len());

    let mut attr = vec![0u8; record_length];
    attr[0..4].copy_from_slice(&type_code.to_le_bytes());
    attr[4..8].copy_from_slice(&(record_length as u32).to_le_bytes());
    attr[8] = 0; // resident
    attr[9] = name.encode_utf16().count() as u8;
    attr[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
    attr[12..14].copy_from_slice(&flags.to_le_bytes());
    attr[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    attr[20..22].copy_from_slice(&(value_offset as u16).to_le_bytes());
    attr[name_offset..name_offset + name_bytes.len()].copy_from_slice(&name_bytes);
    attr[value_offset..value_offset + value.len()].copy_from_slice(value);
    attr
}

#[allow(clippy::too_many_arguments)]
pub fn nonresident_attr(
    type_code: u32,
    name: &str,
    lowest_vcn: u64,
    highest_vcn: u64,
    mapping_pairs: &[u8],
    allocated: u64,
    size: u64,
    compression_unit: u8,
    flags: u16,
) -> Vec<u8> {
    let name_bytes = utf16_bytes(name);
    let base = if compression_unit > 0 { 72 } else { 64 };
    let name_offset = base;
    let pairs_offset = align8(name_offset + name_bytes.len());
    let record_length = align8(pairs_offset + mapping_pairs.len());

    let mut attr = vec![0u8; record_length];
    attr[0..4].copy_from_slice(&type_code.to_le_bytes());
    attr[4..8].copy_from_slice(&(record_length as u32).to_le_bytes());
    attr[8] = 1; // non-resident
    attr[9] = name.encode_utf16().count() as u8;
    attr[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
    attr[12..14].copy_from_slice(&flags.to_le_bytes());
    attr[16..24].copy_from_slice(&lowest_vcn.to_le_bytes());
    attr[24..32].copy_from_slice(&highest_vcn.to_le_bytes());
    attr[32..34].copy_from_slice(&(pairs_offset as u16).to_le_bytes());
    attr[34] = compression_unit;
    attr[40..48].copy_from_slice(&allocated.to_le_bytes());
    attr[48..56].copy_from_slice(&size.to_le_bytes());
    attr[56..64].copy_from_slice(&size.to_le_bytes()); // valid data length
    if compression_unit > 0 {
        attr[64..72].copy_from_slice(&allocated.to_le_bytes()); // total allocated
    }
    attr[name_offset..name_offset + name_bytes.len()].copy_from_slice(&name_bytes);
    attr[pairs_offset..pairs_offset + mapping_pairs.len()].copy_from_slice(mapping_pairs);
    attr
}

// ============================================================================
// MFT records
// ============================================================================

pub const FLAG_IN_USE: u16 = 0x01;
pub const FLAG_DIRECTORY: u16 = 0x02;

/// Assemble one protected 1 KiB file record from its attributes
pub fn build_record(sequence: u16, flags: u16, attrs: &[Vec<u8>], base_record: u64) -> Vec<u8> {
    let usa_offset = 48usize;
    let first_attr = 56usize;

    let mut record = vec![0u8; RECORD];
    record[0..4].copy_from_slice(b"FILE");
    record[4..6].copy_from_slice(&(usa_offset as u16).to_le_bytes());
    record[6..8].copy_from_slice(&3u16.to_le_bytes()); // sample + 2 sectors
    record[16..18].copy_from_slice(&sequence.to_le_bytes());
    record[18..20].copy_from_slice(&1u16.to_le_bytes());
    record[20..22].copy_from_slice(&(first_attr as u16).to_le_bytes());
    record[22..24].copy_from_slice(&flags.to_le_bytes());
    record[28..32].copy_from_slice(&(RECORD as u32).to_le_bytes());
    record[32..40].copy_from_slice(&base_record.to_le_bytes());

    let mut offset = first_attr;
    for attr in attrs {
        record[offset..offset + attr.len()].copy_from_slice(attr);
        offset += attr.len();
    }
    record[offset..offset + 4].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());
    record[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());

    protect(&mut record, usa_offset);
    record
}

// ============================================================================
// Index nodes
// ============================================================================

/// One index entry. `key` is a $FILE_NAME body for $I30 indexes; END entries
/// carry no key. A `child_vcn` makes this a node entry.
pub fn index_entry(file_ref: u64, key: &[u8], child_vcn: Option<u64>, end: bool) -> Vec<u8> {
    let mut flags = 0u16;
    if child_vcn.is_some() {
        flags |= 0x01;
    }
    if end {
        flags |= 0x02;
    }

    let key = if end { &[][..] } else { key };
    let mut length = align8(16 + key.len());
    if child_vcn.is_some() {
        length += 8;
    }

    let mut entry = vec![0u8; length];
    entry[0..8].copy_from_slice(&file_ref.to_le_bytes());
    entry[8..10].copy_from_slice(&(length as u16).to_le_bytes());
    entry[10..12].copy_from_slice(&(key.len() as u16).to_le_bytes());
    entry[12..14].copy_from_slice(&flags.to_le_bytes());
    entry[16..16 + key.len()].copy_from_slice(key);
    if let Some(vcn) = child_vcn {
        let at = length - 8;
        entry[at..].copy_from_slice(&vcn.to_le_bytes());
    }
    entry
}

/// $INDEX_ROOT value for a $I30 filename index
pub fn index_root_value(entries: &[Vec<u8>], has_allocation: bool) -> Vec<u8> {
    let entries_len: usize = entries.iter().map(|e| e.len()).sum();

    let mut value = vec![0u8; 32];
    value[0..4].copy_from_slice(&FILE_NAME.to_le_bytes());
    value[4..8].copy_from_slice(&1u32.to_le_bytes()); // COLLATION_FILE_NAME
    value[8..12].copy_from_slice(&(CLUSTER as u32).to_le_bytes());
    value[12] = 1; // clusters per index buffer
    // INDEX_HEADER, offsets relative to its own start
    value[16..20].copy_from_slice(&16u32.to_le_bytes());
    value[20..24].copy_from_slice(&((16 + entries_len) as u32).to_le_bytes());
    value[24..28].copy_from_slice(&((16 + entries_len) as u32).to_le_bytes());
    value[28] = has_allocation as u8;

    for entry in entries {
        value.extend_from_slice(entry);
    }
    value
}

/// One protected 4 KiB INDX allocation buffer
pub fn indx_buffer(vcn: u64, entries: &[Vec<u8>]) -> Vec<u8> {
    let usa_offset = 40usize;
    let first_entry = 64usize;
    let entries_len: usize = entries.iter().map(|e| e.len()).sum();

    let mut buffer = vec![0u8; CLUSTER];
    buffer[0..4].copy_from_slice(b"INDX");
    buffer[4..6].copy_from_slice(&(usa_offset as u16).to_le_bytes());
    buffer[6..8].copy_from_slice(&9u16.to_le_bytes()); // sample + 8 sectors
    buffer[16..24].copy_from_slice(&vcn.to_le_bytes());
    // INDEX_HEADER at 24, offsets relative to its own start
    buffer[24..28].copy_from_slice(&((first_entry - 24) as u32).to_le_bytes());
    buffer[28..32].copy_from_slice(&((first_entry - 24 + entries_len) as u32).to_le_bytes());
    buffer[32..36].copy_from_slice(&((CLUSTER - 24) as u32).to_le_bytes());

    let mut offset = first_entry;
    for entry in entries {
        buffer[offset..offset + entry.len()].copy_from_slice(entry);
        offset += entry.len();
    }

    protect(&mut buffer, usa_offset);
    buffer
}

// ============================================================================
// USN records
// ============================================================================

pub fn usn_record_v2(
    file: (u64, u16),
    parent: (u64, u16),
    usn: u64,
    reason: u32,
    name: &str,
) -> Vec<u8> {
    let name_bytes = utf16_bytes(name);
    let length = align8(60 + name_bytes.len());

    let mut record = vec![0u8; length];
    record[0..4].copy_from_slice(&(length as u32).to_le_bytes());
    record[4..6].copy_from_slice(&2u16.to_le_bytes());
    record[8..16].copy_from_slice(&segment_ref(file.0, file.1).to_le_bytes());
    record[16..24].copy_from_slice(&segment_ref(parent.0, parent.1).to_le_bytes());
    record[24..32].copy_from_slice(&usn.to_le_bytes());
    record[32..40].copy_from_slice(&TEST_FILETIME.to_le_bytes());
    record[40..44].copy_from_slice(&reason.to_le_bytes());
    record[52..56].copy_from_slice(&0x20u32.to_le_bytes());
    record[56..58].copy_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    record[58..60].copy_from_slice(&60u16.to_le_bytes());
    record[60..60 + name_bytes.len()].copy_from_slice(&name_bytes);
    record
}

// ============================================================================
// Canned volumes
// ============================================================================

fn file_record(parent: u64, name: &str, data_attr: Vec<u8>) -> Vec<u8> {
    build_record(
        1,
        FLAG_IN_USE,
        &[
            resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
            resident_attr(
                FILE_NAME,
                "",
                &file_name_value(parent, 1, name, 0x01, 0, 0),
                0,
            ),
            data_attr,
        ],
        0,
    )
}

fn dir_record(parent: u64, name: &str, index_attrs: Vec<Vec<u8>>) -> Vec<u8> {
    let mut attrs = vec![
        resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
        resident_attr(
            FILE_NAME,
            "",
            &file_name_value(parent, 1, name, 0x01, 0, 0),
            0,
        ),
    ];
    attrs.extend(index_attrs);
    build_record(1, FLAG_IN_USE | FLAG_DIRECTORY, &attrs, 0)
}

/// An $I30 key for a child entry
fn child_key(parent: u64, name: &str) -> Vec<u8> {
    file_name_value(parent, 1, name, 0x01, 0, 0)
}

/// Build the main test volume.
///
/// Layout:
/// - record 0: $MFT, 16 clusters at LCN 4 (64 record slots)
/// - record 3: $Volume with volume name "New Volume"
/// - record 5: root directory containing Big.bin, Comp.bin, Dir, File.txt,
///   Sparse.bin and Sub
/// - record 6: File.txt, resident "Contents here"
/// - record 7: Big.bin, non-resident 6000 bytes at LCN 32
/// - record 8: Sub directory containing Inner.txt
/// - record 9: Inner.txt, resident "inner data"
/// - record 10: Dir, two-level index of 40 children (Dir 00 .. Dir 39)
/// - records 11..=50: the Dir children
/// - record 51: Sparse.bin, data-sparse-data runs
/// - record 52: Comp.bin, one LZNT1 compression unit
/// - record 53: Wof.txt, a WOF overlay whose WofCompressedData stream is
///   fragmented over two non-adjacent clusters
pub fn build_main_image() -> Image {
    let mut image = Image::new(60);
    image.put(0, &boot_sector());

    // Record 0: $MFT itself
    image.put_record(
        0,
        &build_record(
            1,
            FLAG_IN_USE,
            &[
                resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
                resident_attr(
                    FILE_NAME,
                    "",
                    &file_name_value(5, 1, "$MFT", 0x01, 65536, 65536),
                    0,
                ),
                nonresident_attr(
                    DATA,
                    "",
                    0,
                    15,
                    &[0x11, 0x10, 0x04, 0x00],
                    65536,
                    65536,
                    0,
                    0,
                ),
            ],
            0,
        ),
    );

    // Record 3: $Volume
    image.put_record(
        3,
        &build_record(
            1,
            FLAG_IN_USE,
            &[
                resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
                resident_attr(
                    FILE_NAME,
                    "",
                    &file_name_value(5, 1, "$Volume", 0x01, 0, 0),
                    0,
                ),
                resident_attr(VOLUME_NAME, "", &utf16_bytes("New Volume"), 0),
            ],
            0,
        ),
    );

    // Record 5: root directory, children in collation order
    let root_entries = vec![
        index_entry(segment_ref(7, 1), &child_key(5, "Big.bin"), None, false),
        index_entry(segment_ref(52, 1), &child_key(5, "Comp.bin"), None, false),
        index_entry(segment_ref(10, 1), &child_key(5, "Dir"), None, false),
        index_entry(segment_ref(6, 1), &child_key(5, "File.txt"), None, false),
        index_entry(segment_ref(51, 1), &child_key(5, "Sparse.bin"), None, false),
        index_entry(segment_ref(8, 1), &child_key(5, "Sub"), None, false),
        index_entry(segment_ref(53, 1), &child_key(5, "Wof.txt"), None, false),
        index_entry(0, &[], None, true),
    ];
    image.put_record(
        5,
        &dir_record(
            5,
            ".",
            vec![resident_attr(
                INDEX_ROOT,
                "$I30",
                &index_root_value(&root_entries, false),
                0,
            )],
        ),
    );

    // Record 6: File.txt
    image.put_record(
        6,
        &file_record(5, "File.txt", resident_attr(DATA, "", b"Contents here", 0)),
    );

    // Record 7: Big.bin, 6000 bytes in clusters 32..34
    let big_content: Vec<u8> = (0..6000u32).map(|i| (i % 199) as u8).collect();
    image.put(32 * CLUSTER, &big_content);
    image.put_record(
        7,
        &file_record(
            5,
            "Big.bin",
            nonresident_attr(DATA, "", 0, 1, &[0x11, 0x02, 0x20, 0x00], 8192, 6000, 0, 0),
        ),
    );

    // Record 8: Sub directory
    let sub_entries = vec![
        index_entry(segment_ref(9, 1), &child_key(8, "Inner.txt"), None, false),
        index_entry(0, &[], None, true),
    ];
    image.put_record(
        8,
        &dir_record(
            5,
            "Sub",
            vec![resident_attr(
                INDEX_ROOT,
                "$I30",
                &index_root_value(&sub_entries, false),
                0,
            )],
        ),
    );

    // Record 9: Inner.txt
    image.put_record(
        9,
        &file_record(8, "Inner.txt", resident_attr(DATA, "", b"inner data", 0)),
    );

    // Record 10: Dir, a two-level tree. "Dir 19" lives in the root node,
    // buffers 0 and 1 hold the rest.
    let dir_root_entries = vec![
        index_entry(segment_ref(30, 1), &child_key(10, "Dir 19"), Some(0), false),
        index_entry(0, &[], Some(1), true),
    ];
    image.put_record(
        10,
        &dir_record(
            5,
            "Dir",
            vec![
                resident_attr(INDEX_ROOT, "$I30", &index_root_value(&dir_root_entries, true), 0),
                nonresident_attr(
                    INDEX_ALLOCATION,
                    "$I30",
                    0,
                    1,
                    &[0x11, 0x02, 0x28, 0x00],
                    8192,
                    8192,
                    0,
                    0,
                ),
            ],
        ),
    );

    // Records 11..=50: Dir children, plus the two leaf buffers
    let mut low_entries = Vec::new();
    let mut high_entries = Vec::new();
    for i in 0..40u64 {
        let name = format!("Dir {:02}", i);
        let segment = 11 + i;
        image.put_record(
            segment,
            &file_record(10, &name, resident_attr(DATA, "", b"", 0)),
        );

        let entry = index_entry(segment_ref(segment, 1), &child_key(10, &name), None, false);
        match i {
            0..=18 => low_entries.push(entry),
            19 => {} // lives in the root node
            _ => high_entries.push(entry),
        }
    }
    low_entries.push(index_entry(0, &[], None, true));
    high_entries.push(index_entry(0, &[], None, true));
    image.put(40 * CLUSTER, &indx_buffer(0, &low_entries));
    image.put(41 * CLUSTER, &indx_buffer(1, &high_entries));

    // Record 51: Sparse.bin, data / sparse / data
    image.fill_cluster(48, 0xAA);
    image.fill_cluster(49, 0xBB);
    image.put_record(
        51,
        &file_record(
            5,
            "Sparse.bin",
            nonresident_attr(
                DATA,
                "",
                0,
                2,
                &[0x11, 0x01, 0x30, 0x01, 0x01, 0x11, 0x01, 0x01, 0x00],
                12288,
                12288,
                0,
                0,
            ),
        ),
    );

    // Record 52: Comp.bin, one 64 KiB compression unit: 4 data clusters at
    // LCN 56 followed by a 12-cluster sparse tail
    for lcn in 56..60 {
        image.fill_cluster(lcn, 0xC3);
    }
    image.put_record(
        52,
        &file_record(
            5,
            "Comp.bin",
            nonresident_attr(
                DATA,
                "",
                0,
                15,
                &[0x11, 0x04, 0x38, 0x01, 0x0C, 0x00],
                65536,
                65536,
                4,
                0x0001,
            ),
        ),
    );

    // Record 53: Wof.txt, 12000 bytes in three 4 KiB chunks. Chunks 0 and 2
    // are compressed, chunk 1 is stored verbatim. The compressed stream
    // (4128 bytes) spans clusters 44 and 46; the default data stream is
    // fully sparse as WOF leaves it.
    let mut wof_content = Vec::new();
    wof_content.extend_from_slice(&8u32.to_le_bytes()); // chunk 1 offset
    wof_content.extend_from_slice(&4104u32.to_le_bytes()); // chunk 2 offset
    wof_content.extend_from_slice(&[0xD0; 8]);
    wof_content.extend_from_slice(&[0xD1; 4096]);
    wof_content.extend_from_slice(&[0xD2; 16]);
    assert_eq!(wof_content.len(), 4128);
    image.put(44 * CLUSTER, &wof_content[..CLUSTER]);
    image.put(46 * CLUSTER, &wof_content[CLUSTER..]);

    image.put_record(
        53,
        &build_record(
            1,
            FLAG_IN_USE,
            &[
                resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
                resident_attr(
                    FILE_NAME,
                    "",
                    &file_name_value(5, 1, "Wof.txt", 0x01, 12000, 12288),
                    0,
                ),
                resident_attr(REPARSE_POINT, "", &wof_reparse_value(0), 0),
                nonresident_attr(DATA, "", 0, 2, &[0x01, 0x03, 0x00], 12288, 12000, 0, 0),
                nonresident_attr(
                    DATA,
                    "WofCompressedData",
                    0,
                    1,
                    &[0x11, 0x01, 0x2C, 0x11, 0x01, 0x02, 0x00],
                    8192,
                    4128,
                    0,
                    0,
                ),
            ],
            0,
        ),
    );

    image
}

/// Build a volume whose $MFT extent map continues through an attribute list:
/// record 0 covers records 0..15, an extension record (15) adds the runs
/// holding records 16..31, and a file record lives in that second extent.
pub fn build_fragmented_mft_image() -> Image {
    let mut image = Image::new(104);
    image.put(0, &boot_sector());

    let list = [
        attribute_list_entry(DATA, 0, 0, 1, 0),
        attribute_list_entry(DATA, 4, 15, 1, 1),
    ]
    .concat();

    image.put_record(
        0,
        &build_record(
            1,
            FLAG_IN_USE,
            &[
                resident_attr(STANDARD_INFORMATION, "", &standard_information_value(), 0),
                resident_attr(ATTRIBUTE_LIST, "", &list, 0),
                resident_attr(
                    FILE_NAME,
                    "",
                    &file_name_value(5, 1, "$MFT", 0x01, 32768, 32768),
                    0,
                ),
                nonresident_attr(DATA, "", 0, 3, &[0x11, 0x04, 0x04, 0x00], 32768, 32768, 0, 0),
            ],
            0,
        ),
    );

    // Root directory with an empty index, so system file discovery resolves
    // to clean lookup misses
    let root_entries = vec![index_entry(0, &[], None, true)];
    image.put_record(
        5,
        &dir_record(
            5,
            ".",
            vec![resident_attr(
                INDEX_ROOT,
                "$I30",
                &index_root_value(&root_entries, false),
                0,
            )],
        ),
    );

    // Record 15: extension holding the second $DATA extent, records 16..31
    // in clusters 100..104
    image.put_record(
        15,
        &build_record(
            1,
            FLAG_IN_USE,
            &[nonresident_attr(
                DATA,
                "",
                4,
                7,
                &[0x11, 0x04, 0x64, 0x00],
                0,
                0,
                0,
                0,
            )],
            segment_ref(0, 1),
        ),
    );

    // Record 20 lives in the second extent: byte offset 20480 is VCN 5,
    // which maps to cluster 101
    let hidden = file_record(5, "Hidden.txt", resident_attr(DATA, "", b"found me", 0));
    image.put(101 * CLUSTER, &hidden);

    image
}
