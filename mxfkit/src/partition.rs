//! MXF partition packs
//!
//! MXF files are divided into partitions:
//! - Header partition (required, first)
//! - Body partitions (optional)
//! - Footer partition (last; may be missing from a truncated file)
//!
//! Each partition opens with a partition pack whose value has a fixed
//! big-endian layout, followed by the operational pattern label and a
//! batch of essence container labels.

use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::compound::Batch;
use crate::error::{MxfError, Result};
use crate::klv::Klv;
use crate::source::ByteSource;
use crate::ul::{labels, UniversalLabel};

/// Bytes of fixed fields before the operational pattern
pub const PACK_META_SIZE: usize = 64;

/// Offset of the essence container batch in the pack value
pub const ESSENCE_BATCH_OFFSET: usize = PACK_META_SIZE + 16;

/// Partition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Header partition
    Header,
    /// Body partition
    Body,
    /// Footer partition
    Footer,
}

impl PartitionKind {
    /// Kind from byte 13 of a partition pack key
    pub fn from_key_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(PartitionKind::Header),
            0x03 => Some(PartitionKind::Body),
            0x04 => Some(PartitionKind::Footer),
            _ => None,
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartitionKind::Header => "HeaderPartitionPack",
            PartitionKind::Body => "BodyPartitionPack",
            PartitionKind::Footer => "FooterPartitionPack",
        };
        f.write_str(name)
    }
}

/// Fixed partition pack fields, read verbatim
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackMeta {
    /// KAG size (key alignment grid)
    pub kag_size: u32,
    /// This partition offset in file
    pub this_partition: u64,
    /// Previous partition offset
    pub previous_partition: u64,
    /// Footer partition offset
    pub footer_partition: u64,
    /// Header metadata byte count
    pub header_byte_count: u64,
    /// Index table byte count
    pub index_byte_count: u64,
    /// Index SID (stream ID for index)
    pub index_sid: u32,
    /// Body offset (for body partitions)
    pub body_offset: u64,
    /// Body SID (stream ID for essence)
    pub body_sid: u32,
}

/// Item complexity of an operational pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemComplexity {
    Single,
    Playlist,
    Edit,
}

/// Package complexity of an operational pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageComplexity {
    Single,
    Ganged,
    Alternate,
}

/// Decoded operational pattern label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationalPattern {
    /// Item complexity, byte 12
    pub item_complexity: Option<ItemComplexity>,
    /// Package complexity, byte 13
    pub package_complexity: Option<PackageComplexity>,
    /// Qualifier bit 1: essence is external
    pub external: bool,
    /// Qualifier bit 2: not a streamable file
    pub non_stream_file: bool,
    /// Qualifier bit 3: multi-track
    pub multi_track: bool,
}

impl OperationalPattern {
    /// Decode the pattern bytes of an operational pattern label
    pub fn parse(ul: &[u8; 16]) -> Self {
        let qualifier = ul[14];
        OperationalPattern {
            item_complexity: match ul[12] {
                0x01 => Some(ItemComplexity::Single),
                0x02 => Some(ItemComplexity::Playlist),
                0x03 => Some(ItemComplexity::Edit),
                _ => None,
            },
            package_complexity: match ul[13] {
                0x01 => Some(PackageComplexity::Single),
                0x02 => Some(PackageComplexity::Ganged),
                0x03 => Some(PackageComplexity::Alternate),
                _ => None,
            },
            external: qualifier & 0b0010 != 0,
            non_stream_file: qualifier & 0b0100 != 0,
            multi_track: qualifier & 0b1000 != 0,
        }
    }

    /// Short name such as `OP1a`, when both complexities are set
    pub fn short_name(&self) -> Option<String> {
        let item = match self.item_complexity? {
            ItemComplexity::Single => '1',
            ItemComplexity::Playlist => '2',
            ItemComplexity::Edit => '3',
        };
        let package = match self.package_complexity? {
            PackageComplexity::Single => 'a',
            PackageComplexity::Ganged => 'b',
            PackageComplexity::Alternate => 'c',
        };
        Some(format!("OP{}{}", item, package))
    }
}

/// A decoded partition pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPack {
    /// Partition kind
    pub kind: PartitionKind,
    /// Closed (header metadata is final)
    pub closed: bool,
    /// Complete (header metadata is complete)
    pub completed: bool,
    /// Major version (should be 1)
    pub major_version: u16,
    /// Minor version (2 or 3)
    pub minor_version: u16,
    /// Fixed fields
    pub meta: PackMeta,
    /// Operational pattern, if a recognized label is present
    pub operational_pattern: Option<OperationalPattern>,
    /// Essence container labels
    pub essence_containers: Batch,
}

impl PartitionPack {
    /// Read and decode the partition pack behind `klv`
    pub fn decode<S: ByteSource + ?Sized>(klv: &Klv, source: &S) -> Result<Self> {
        // Check the key before touching the source
        if !klv.key.is_partition_pack() {
            return Err(not_a_partition(&klv.key));
        }
        let value = klv.read_value(source)?;
        Self::parse(&klv.key, &value)
    }

    /// Decode a partition pack from its key and value bytes
    pub fn parse(key: &UniversalLabel, value: &[u8]) -> Result<Self> {
        let kind = key.partition_kind().ok_or_else(|| not_a_partition(key))?;
        let status = key.as_bytes()[14];

        if value.len() < PACK_META_SIZE {
            return Err(MxfError::bounds(PACK_META_SIZE, value.len()));
        }

        let mut cursor = Cursor::new(value);
        let major_version = cursor.read_u16::<BigEndian>()?;
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let meta = PackMeta {
            kag_size: cursor.read_u32::<BigEndian>()?,
            this_partition: cursor.read_u64::<BigEndian>()?,
            previous_partition: cursor.read_u64::<BigEndian>()?,
            footer_partition: cursor.read_u64::<BigEndian>()?,
            header_byte_count: cursor.read_u64::<BigEndian>()?,
            index_byte_count: cursor.read_u64::<BigEndian>()?,
            index_sid: cursor.read_u32::<BigEndian>()?,
            body_offset: cursor.read_u64::<BigEndian>()?,
            body_sid: cursor.read_u32::<BigEndian>()?,
        };

        let operational_pattern = value
            .get(PACK_META_SIZE..ESSENCE_BATCH_OFFSET)
            .filter(|op| op[..12] == labels::OPERATIONAL_PATTERN)
            .and_then(|op| <&[u8; 16]>::try_from(op).ok())
            .map(OperationalPattern::parse);

        let batch = value.get(ESSENCE_BATCH_OFFSET..).unwrap_or_default();
        let essence_containers = Batch::parse(batch).map_err(|e| match e {
            MxfError::Bounds { needed, available } => MxfError::Bounds {
                needed: needed + ESSENCE_BATCH_OFFSET as u64,
                available: available + ESSENCE_BATCH_OFFSET.min(value.len()) as u64,
            },
            other => other,
        })?;

        Ok(PartitionPack {
            kind,
            closed: status == 0x02 || status == 0x04,
            completed: status == 0x03 || status == 0x04,
            major_version,
            minor_version,
            meta,
            operational_pattern,
            essence_containers,
        })
    }

    /// Whether a recognized operational pattern label was present
    pub fn has_valid_operational_pattern(&self) -> bool {
        self.operational_pattern.is_some()
    }
}

fn not_a_partition(key: &UniversalLabel) -> MxfError {
    MxfError::InvalidPartition(format!("not a partition pack key: {}", key))
}

/// Build a partition pack value. Test fixture for this crate and its
/// integration tests; there is no write path.
#[doc(hidden)]
pub fn encode_pack_value(
    meta: &PackMeta,
    operational_pattern: Option<&[u8; 16]>,
    essence_containers: &[[u8; 16]],
) -> Vec<u8> {
    let mut value = Vec::with_capacity(ESSENCE_BATCH_OFFSET + 8 + 16 * essence_containers.len());
    value.extend_from_slice(&1u16.to_be_bytes());
    value.extend_from_slice(&3u16.to_be_bytes());
    value.extend_from_slice(&meta.kag_size.to_be_bytes());
    value.extend_from_slice(&meta.this_partition.to_be_bytes());
    value.extend_from_slice(&meta.previous_partition.to_be_bytes());
    value.extend_from_slice(&meta.footer_partition.to_be_bytes());
    value.extend_from_slice(&meta.header_byte_count.to_be_bytes());
    value.extend_from_slice(&meta.index_byte_count.to_be_bytes());
    value.extend_from_slice(&meta.index_sid.to_be_bytes());
    value.extend_from_slice(&meta.body_offset.to_be_bytes());
    value.extend_from_slice(&meta.body_sid.to_be_bytes());
    value.extend_from_slice(operational_pattern.unwrap_or(&[0; 16]));
    value.extend_from_slice(&(essence_containers.len() as u32).to_be_bytes());
    value.extend_from_slice(&16u32.to_be_bytes());
    for ec in essence_containers {
        value.extend_from_slice(ec);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::encode_klv;

    fn sample_meta() -> PackMeta {
        PackMeta {
            kag_size: 512,
            this_partition: 0x0102_0304_0506_0708,
            previous_partition: 0x1000,
            footer_partition: 0xDEAD_BEEF,
            header_byte_count: 0x4000,
            index_byte_count: 0x200,
            index_sid: 2,
            body_offset: 0x1122_3344_5566,
            body_sid: 1,
        }
    }

    #[test]
    fn test_partition_kinds() {
        assert_eq!(PartitionKind::from_key_byte(2), Some(PartitionKind::Header));
        assert_eq!(PartitionKind::from_key_byte(3), Some(PartitionKind::Body));
        assert_eq!(PartitionKind::from_key_byte(4), Some(PartitionKind::Footer));
        assert_eq!(PartitionKind::from_key_byte(5), None);
        assert_eq!(PartitionKind::Body.to_string(), "BodyPartitionPack");
    }

    #[test]
    fn test_parse_closed_complete_footer() {
        let key = UniversalLabel::new(labels::partition_pack(0x04, 0x04));
        let value = encode_pack_value(&sample_meta(), Some(&labels::OP1A), &[]);

        let pack = PartitionPack::parse(&key, &value).unwrap();
        assert_eq!(pack.kind, PartitionKind::Footer);
        assert!(pack.closed);
        assert!(pack.completed);
        assert_eq!(pack.meta, sample_meta());
        assert_eq!(pack.major_version, 1);
        assert_eq!(pack.minor_version, 3);
        assert_eq!(pack.essence_containers.count, 0);
    }

    #[test]
    fn test_status_flags() {
        let value = encode_pack_value(&PackMeta::default(), None, &[]);
        let cases = [
            (0x01, false, false),
            (0x02, true, false),
            (0x03, false, true),
            (0x04, true, true),
        ];
        for (status, closed, completed) in cases {
            let key = UniversalLabel::new(labels::partition_pack(0x02, status));
            let pack = PartitionPack::parse(&key, &value).unwrap();
            assert_eq!(pack.closed, closed, "status {}", status);
            assert_eq!(pack.completed, completed, "status {}", status);
        }
    }

    #[test]
    fn test_operational_pattern_present() {
        let key = UniversalLabel::new(labels::HEADER_PARTITION_CLOSED_COMPLETE);
        let value = encode_pack_value(&sample_meta(), Some(&labels::OP1A), &[]);
        let pack = PartitionPack::parse(&key, &value).unwrap();

        let op = pack.operational_pattern.unwrap();
        assert!(pack.has_valid_operational_pattern());
        assert_eq!(op.item_complexity, Some(ItemComplexity::Single));
        assert_eq!(op.package_complexity, Some(PackageComplexity::Single));
        // 0x09: bit 3 multi-track, bit 0 reserved
        assert!(!op.external);
        assert!(!op.non_stream_file);
        assert!(op.multi_track);
        assert_eq!(op.short_name().as_deref(), Some("OP1a"));
    }

    #[test]
    fn test_operational_pattern_absent() {
        let key = UniversalLabel::new(labels::HEADER_PARTITION_CLOSED_COMPLETE);
        let mut other = labels::OP1A;
        other[4] = 0x0E;
        let value = encode_pack_value(&sample_meta(), Some(&other), &[]);
        let pack = PartitionPack::parse(&key, &value).unwrap();
        assert!(pack.operational_pattern.is_none());
    }

    #[test]
    fn test_operational_pattern_qualifiers() {
        let mut ul = labels::OP1A;
        ul[14] = 0x02;
        let op = OperationalPattern::parse(&ul);
        assert!(op.external && !op.non_stream_file && !op.multi_track);

        ul[14] = 0x0E;
        let op = OperationalPattern::parse(&ul);
        assert!(op.external && op.non_stream_file && op.multi_track);

        ul[14] = 0b1010;
        let op = OperationalPattern::parse(&ul);
        assert!(op.external && !op.non_stream_file && op.multi_track);
    }

    #[test]
    fn test_operational_pattern_complexities() {
        let mut ul = labels::OP1A;
        ul[12] = 0x03;
        ul[13] = 0x02;
        let op = OperationalPattern::parse(&ul);
        assert_eq!(op.item_complexity, Some(ItemComplexity::Edit));
        assert_eq!(op.package_complexity, Some(PackageComplexity::Ganged));
        assert_eq!(op.short_name().as_deref(), Some("OP3b"));

        ul[12] = 0x10;
        ul[13] = 0x00;
        let op = OperationalPattern::parse(&ul);
        assert_eq!(op.item_complexity, None);
        assert_eq!(op.package_complexity, None);
        assert_eq!(op.short_name(), None);
    }

    #[test]
    fn test_essence_containers() {
        let key = UniversalLabel::new(labels::HEADER_PARTITION_CLOSED_COMPLETE);
        let ec1 = [0x11; 16];
        let ec2 = [0x22; 16];
        let value = encode_pack_value(&sample_meta(), Some(&labels::OP1A), &[ec1, ec2]);
        let pack = PartitionPack::parse(&key, &value).unwrap();

        assert_eq!(pack.essence_containers.count, 2);
        assert_eq!(pack.essence_containers.element_len, 16);
        let labels: Vec<_> = pack.essence_containers.labels().collect();
        assert_eq!(labels, vec![UniversalLabel::new(ec1), UniversalLabel::new(ec2)]);
    }

    #[test]
    fn test_short_value() {
        let key = UniversalLabel::new(labels::HEADER_PARTITION_CLOSED_COMPLETE);
        let value = encode_pack_value(&sample_meta(), None, &[]);

        assert!(matches!(
            PartitionPack::parse(&key, &value[..40]),
            Err(MxfError::Bounds { needed: 64, available: 40 })
        ));

        // Batch header cut off
        assert!(matches!(
            PartitionPack::parse(&key, &value[..84]),
            Err(MxfError::Bounds { .. })
        ));

        // Batch claims more labels than are present
        let mut value = encode_pack_value(&sample_meta(), None, &[[0x11; 16]]);
        value.truncate(value.len() - 1);
        assert!(matches!(
            PartitionPack::parse(&key, &value),
            Err(MxfError::Bounds { .. })
        ));
    }

    #[test]
    fn test_not_a_partition() {
        let key = UniversalLabel::new(labels::PRIMER_PACK_V1);
        assert!(matches!(
            PartitionPack::parse(&key, &[0; 88]),
            Err(MxfError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_decode_from_source() {
        let value = encode_pack_value(&sample_meta(), Some(&labels::OP1A), &[[0x33; 16]]);
        let data = encode_klv(&labels::partition_pack(0x03, 0x01), &value);
        let klv = crate::klv::scan(&data, Default::default()).unwrap()[0];

        let pack = PartitionPack::decode(&klv, &data).unwrap();
        assert_eq!(pack.kind, PartitionKind::Body);
        assert!(!pack.closed);
        assert!(!pack.completed);
        assert_eq!(pack.meta.body_sid, 1);
        assert_eq!(pack.essence_containers.elements, vec![vec![0x33; 16]]);
    }
}
