//! Universal Labels and key classification
//!
//! Universal Labels are 16-byte SMPTE identifiers; every KLV key in an MXF
//! file is one. Classification matches label prefixes, some of which carry
//! a wildcard byte, so the order of the checks in [`classify`] matters.

use std::borrow::Cow;
use std::fmt;

use crate::partition::PartitionKind;

/// A 16-byte Universal Label
pub type UL = [u8; 16];

/// Universal Label wrapper with helper methods
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UniversalLabel(pub UL);

impl UniversalLabel {
    /// Create from raw bytes
    pub fn new(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }

    /// Create from the first 16 bytes of a slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let ul: UL = bytes.get(..16)?.try_into().ok()?;
        Some(UniversalLabel(ul))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &UL {
        &self.0
    }

    /// Check if this is a SMPTE-registered label (starts with 06 0E 2B 34)
    pub fn is_smpte(&self) -> bool {
        self.0[0..4] == labels::SMPTE_PREFIX
    }

    /// Check if this is a partition pack
    pub fn is_partition_pack(&self) -> bool {
        self.partition_kind().is_some()
    }

    /// Partition kind carried in byte 13 of a partition pack key
    pub fn partition_kind(&self) -> Option<PartitionKind> {
        if self.0[0..13] != labels::PARTITION_PACK {
            return None;
        }
        PartitionKind::from_key_byte(self.0[13])
    }

    /// Check if this is a fill item
    pub fn is_fill_item(&self) -> bool {
        self.0 == labels::FILL_ITEM
    }

    /// Check if this is a structural metadata set
    pub fn is_structural_metadata(&self) -> bool {
        matches_wildcard(&self.0, &labels::STRUCTURAL_METADATA)
    }
}

impl fmt::Debug for UniversalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UL({})", self)
    }
}

impl fmt::Display for UniversalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl From<UL> for UniversalLabel {
    fn from(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }
}

/// Compare `key` against a prefix whose byte 5 (the set length coding) is
/// a wildcard.
fn matches_wildcard(key: &UL, prefix: &[u8]) -> bool {
    key[0..5] == prefix[0..5] && key[6..prefix.len()] == prefix[6..]
}

/// Structural metadata set kinds resolved by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralSet {
    Preface,
    Identification,
    ContentStorage,
    EssenceContainerData,
    MaterialPackage,
    SourcePackage,
    TimelineTrack,
    Sequence,
    SourceClip,
    TimecodeComponent,
    MultipleDescriptor,
    /// Any other set, by the code in key bytes 13..15
    Other(u16),
}

/// Set codes (key bytes 13..15) of the named structural sets
static STRUCTURAL_SETS: &[(u16, StructuralSet, &str)] = &[
    (0x012F, StructuralSet::Preface, "Preface"),
    (0x0130, StructuralSet::Identification, "Identification"),
    (0x0118, StructuralSet::ContentStorage, "Content Storage"),
    (0x0123, StructuralSet::EssenceContainerData, "Essence Container Data"),
    (0x0136, StructuralSet::MaterialPackage, "Material Package"),
    (0x0137, StructuralSet::SourcePackage, "Source Package"),
    (0x013B, StructuralSet::TimelineTrack, "Timeline Track"),
    (0x010F, StructuralSet::Sequence, "Sequence"),
    (0x0111, StructuralSet::SourceClip, "Source Clip"),
    (0x0114, StructuralSet::TimecodeComponent, "Timecode Component"),
    (0x0144, StructuralSet::MultipleDescriptor, "Multiple Descriptor"),
];

impl StructuralSet {
    /// Resolve a set code
    pub fn from_code(code: u16) -> Self {
        STRUCTURAL_SETS
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, set, _)| *set)
            .unwrap_or(StructuralSet::Other(code))
    }

    /// The set code in key bytes 13..15
    pub fn code(&self) -> u16 {
        match self {
            StructuralSet::Other(code) => *code,
            known => STRUCTURAL_SETS
                .iter()
                .find(|(_, set, _)| set == known)
                .map(|(code, _, _)| *code)
                .unwrap_or_default(),
        }
    }

    /// Human-readable name
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            StructuralSet::Other(code) => {
                Cow::Owned(format!("Structural Metadata 0x{:04x}", code))
            }
            known => STRUCTURAL_SETS
                .iter()
                .find(|(_, set, _)| set == known)
                .map(|(_, _, name)| Cow::Borrowed(*name))
                .unwrap_or(Cow::Borrowed("Structural Metadata")),
        }
    }
}

/// Semantic category of a KLV key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// KLV fill (padding to the KAG)
    FillItem,
    /// Partition pack
    PartitionPack(PartitionKind),
    /// Primer pack (local tag to UL mapping)
    PrimerPack,
    /// Essence element
    EssenceElement,
    /// Structural metadata set
    StructuralMetadata(StructuralSet),
    /// Index table segment
    IndexTableSegment,
    /// Random index pack
    RandomIndexPack,
    /// Anything else; kept, just not named
    Unknown,
}

impl Classification {
    /// Whether the key was recognized
    pub fn is_known(&self) -> bool {
        !matches!(self, Classification::Unknown)
    }

    /// Whether this is padding
    pub fn is_fill(&self) -> bool {
        matches!(self, Classification::FillItem)
    }

    /// Human-readable name
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Classification::FillItem => "Fill Item".into(),
            Classification::PartitionPack(kind) => match kind {
                PartitionKind::Header => "Header Partition Pack".into(),
                PartitionKind::Body => "Body Partition Pack".into(),
                PartitionKind::Footer => "Footer Partition Pack".into(),
            },
            Classification::PrimerPack => "Primer Pack".into(),
            Classification::EssenceElement => "Essence Element".into(),
            Classification::StructuralMetadata(set) => match set {
                StructuralSet::Other(_) => set.name(),
                named => format!("SM - {}", named.name()).into(),
            },
            Classification::IndexTableSegment => "Index Table Segment".into(),
            Classification::RandomIndexPack => "Random Index Pack".into(),
            Classification::Unknown => "Unknown KLV".into(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Classify a KLV key.
pub fn classify(key: &UniversalLabel) -> Classification {
    let ul = key.as_bytes();

    if key.is_fill_item() {
        return Classification::FillItem;
    }
    if let Some(kind) = key.partition_kind() {
        return Classification::PartitionPack(kind);
    }
    if ul[0..14] == labels::PRIMER_PACK {
        return Classification::PrimerPack;
    }
    if key.is_structural_metadata() {
        let code = u16::from_be_bytes([ul[13], ul[14]]);
        return Classification::StructuralMetadata(StructuralSet::from_code(code));
    }
    if matches_wildcard(ul, &labels::INDEX_TABLE_SEGMENT) {
        return Classification::IndexTableSegment;
    }
    if ul[0..12] == labels::ESSENCE_ELEMENT {
        return Classification::EssenceElement;
    }
    if ul[0..15] == labels::RANDOM_INDEX_PACK {
        return Classification::RandomIndexPack;
    }
    Classification::Unknown
}

/// Well-known Universal Labels and label prefixes
pub mod labels {
    use super::UL;

    /// SMPTE Label prefix
    pub const SMPTE_PREFIX: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

    /// Fill item
    pub const FILL_ITEM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00,
        0x00,
    ];

    /// Partition pack prefix; byte 13 is the kind, byte 14 the status
    pub const PARTITION_PACK: [u8; 13] = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01,
    ];

    /// Operational pattern prefix; bytes 12..15 carry the pattern
    pub const OPERATIONAL_PATTERN: [u8; 12] = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01,
    ];

    /// Structural metadata prefix; byte 5 is a wildcard
    pub const STRUCTURAL_METADATA: [u8; 13] = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x00, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01,
    ];

    /// Primer pack prefix; byte 14 is the version
    pub const PRIMER_PACK: [u8; 14] = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x05,
    ];

    /// Generic-container essence element prefix
    pub const ESSENCE_ELEMENT: [u8; 12] = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01,
    ];

    /// Index table segment prefix; byte 5 is a wildcard
    pub const INDEX_TABLE_SEGMENT: [u8; 15] = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x00, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01,
    ];

    /// Random index pack prefix
    pub const RANDOM_INDEX_PACK: [u8; 15] = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01,
    ];

    /// Full partition pack key for a kind byte and status byte
    pub const fn partition_pack(kind: u8, status: u8) -> UL {
        let mut ul = [0u8; 16];
        let mut i = 0;
        while i < 13 {
            ul[i] = PARTITION_PACK[i];
            i += 1;
        }
        ul[13] = kind;
        ul[14] = status;
        ul
    }

    /// Header partition - closed complete
    pub const HEADER_PARTITION_CLOSED_COMPLETE: UL = partition_pack(0x02, 0x04);

    /// Body partition - open incomplete
    pub const BODY_PARTITION_OPEN_INCOMPLETE: UL = partition_pack(0x03, 0x01);

    /// Footer partition - closed complete
    pub const FOOTER_PARTITION_CLOSED_COMPLETE: UL = partition_pack(0x04, 0x04);

    /// Primer pack, version 1
    pub const PRIMER_PACK_V1: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01,
        0x00,
    ];

    /// Random index pack
    pub const RANDOM_INDEX_PACK_V1: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01,
        0x00,
    ];

    /// Preface set
    pub const PREFACE: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x2F,
        0x00,
    ];

    /// Index table segment, 2-byte local set coding
    pub const INDEX_TABLE_SEGMENT_V1: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01,
        0x00,
    ];

    /// Op1a operational pattern
    pub const OP1A: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x09,
        0x00,
    ];
}
