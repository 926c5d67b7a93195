//! Primer pack and random index pack values

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::compound::Batch;
use crate::error::{MxfError, Result};
use crate::ul::UniversalLabel;

/// Size of one primer entry: local tag + UL
const PRIMER_ENTRY_SIZE: u32 = 18;

/// Primer pack for local tag mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimerPack {
    /// Local tag to UL mapping, in stored order
    pub mappings: Vec<(u16, UniversalLabel)>,
}

impl PrimerPack {
    /// Parse a primer pack value (a batch of 18-byte entries)
    pub fn parse(value: &[u8]) -> Result<Self> {
        let batch = Batch::parse(value)?;
        if batch.count > 0 && batch.element_len != PRIMER_ENTRY_SIZE {
            return Err(MxfError::UnsupportedEncoding(format!(
                "primer entries of {} bytes",
                batch.element_len
            )));
        }

        let mappings = batch
            .elements
            .iter()
            .filter_map(|entry| {
                let tag = u16::from_be_bytes([entry[0], entry[1]]);
                UniversalLabel::from_slice(&entry[2..]).map(|ul| (tag, ul))
            })
            .collect();

        Ok(PrimerPack { mappings })
    }

    /// Lookup UL by tag
    pub fn lookup(&self, tag: u16) -> Option<&UniversalLabel> {
        self.mappings.iter().find(|(t, _)| *t == tag).map(|(_, ul)| ul)
    }

    /// Lookup tag by UL
    pub fn reverse_lookup(&self, ul: &UniversalLabel) -> Option<u16> {
        self.mappings.iter().find(|(_, u)| u == ul).map(|(t, _)| *t)
    }
}

/// Statically assigned local tags with their names
static LOCAL_TAGS: &[(u16, &str)] = &[
    (0x3C0A, "Instance UID"),
    (0x0102, "Generation UID"),
    (0x3B02, "Last Modified Date"),
    (0x3B05, "Version"),
    (0x3B03, "Content Storage"),
    (0x3B06, "Identifications"),
    (0x3B09, "Operational Pattern"),
    (0x3B0A, "Essence Containers"),
    (0x1901, "Packages"),
    (0x1902, "Essence Container Data"),
    (0x4401, "Package UID"),
    (0x4402, "Name"),
    (0x4403, "Tracks"),
    (0x4405, "Package Creation Date"),
    (0x4404, "Package Modified Date"),
    (0x4701, "Descriptor"),
    (0x4801, "Track ID"),
    (0x4804, "Track Number"),
    (0x4802, "Track Name"),
    (0x4803, "Sequence"),
    (0x4B01, "Edit Rate"),
    (0x4B02, "Origin"),
    (0x0201, "Data Definition"),
    (0x0202, "Duration"),
    (0x1001, "Structural Components"),
    (0x1101, "Source Package ID"),
    (0x1102, "Source Track ID"),
    (0x1201, "Start Position"),
    (0x1501, "Start Timecode"),
    (0x1502, "Rounded Timecode Base"),
    (0x1503, "Drop Frame"),
    (0x2701, "Linked Package UID"),
    (0x3F06, "Index SID"),
    (0x3F07, "Body SID"),
    (0x3F01, "Sub Descriptors"),
];

/// Name of a statically assigned local tag
pub fn local_tag_name(tag: u16) -> Option<&'static str> {
    LOCAL_TAGS.iter().find(|(t, _)| *t == tag).map(|(_, name)| *name)
}

/// Random Index Pack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    /// Body SID (0 for partitions without essence)
    pub body_sid: u32,
    /// Byte offset of the partition pack
    pub byte_offset: u64,
}

/// Random Index Pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomIndexPack {
    /// Partition entries
    pub entries: Vec<RipEntry>,
    /// Overall length of the pack, key included
    pub overall_length: u32,
}

impl RandomIndexPack {
    /// Size of one entry: body SID + byte offset
    pub const ENTRY_SIZE: usize = 12;

    /// Parse a random index pack value: entries, then the u32 overall length
    pub fn parse(value: &[u8]) -> Result<Self> {
        if value.len() < 4 {
            return Err(MxfError::bounds(4, value.len()));
        }
        let body_len = value.len() - 4;
        if body_len % Self::ENTRY_SIZE != 0 {
            return Err(MxfError::UnsupportedEncoding(format!(
                "random index pack body of {} bytes is not a whole number of entries",
                body_len
            )));
        }

        let mut cursor = Cursor::new(value);
        let mut entries = Vec::with_capacity(body_len / Self::ENTRY_SIZE);
        for _ in 0..body_len / Self::ENTRY_SIZE {
            let body_sid = cursor.read_u32::<BigEndian>()?;
            let byte_offset = cursor.read_u64::<BigEndian>()?;
            entries.push(RipEntry {
                body_sid,
                byte_offset,
            });
        }
        let overall_length = cursor.read_u32::<BigEndian>()?;

        Ok(RandomIndexPack {
            entries,
            overall_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ul::labels;

    #[test]
    fn test_primer_pack() {
        let mut value = Vec::new();
        value.extend_from_slice(&2u32.to_be_bytes());
        value.extend_from_slice(&18u32.to_be_bytes());
        value.extend_from_slice(&0x3C0Au16.to_be_bytes());
        value.extend_from_slice(&labels::PREFACE);
        value.extend_from_slice(&0x8001u16.to_be_bytes());
        value.extend_from_slice(&labels::FILL_ITEM);

        let primer = PrimerPack::parse(&value).unwrap();
        assert_eq!(primer.mappings.len(), 2);
        assert_eq!(primer.lookup(0x8001), Some(&UniversalLabel::new(labels::FILL_ITEM)));
        assert!(primer.lookup(0x9999).is_none());
        assert_eq!(
            primer.reverse_lookup(&UniversalLabel::new(labels::PREFACE)),
            Some(0x3C0A)
        );
    }

    #[test]
    fn test_primer_wrong_entry_size() {
        let mut value = Vec::new();
        value.extend_from_slice(&1u32.to_be_bytes());
        value.extend_from_slice(&16u32.to_be_bytes());
        value.extend_from_slice(&[0; 16]);
        assert!(matches!(
            PrimerPack::parse(&value),
            Err(MxfError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_local_tag_names() {
        assert_eq!(local_tag_name(0x3C0A), Some("Instance UID"));
        assert_eq!(local_tag_name(0x8001), None);
    }

    #[test]
    fn test_rip() {
        let mut value = Vec::new();
        for (sid, offset) in [(0u32, 0u64), (1, 1000), (0, 5000)] {
            value.extend_from_slice(&sid.to_be_bytes());
            value.extend_from_slice(&offset.to_be_bytes());
        }
        value.extend_from_slice(&57u32.to_be_bytes());

        let rip = RandomIndexPack::parse(&value).unwrap();
        assert_eq!(rip.entries.len(), 3);
        assert_eq!(
            rip.entries[1],
            RipEntry {
                body_sid: 1,
                byte_offset: 1000
            }
        );
        assert_eq!(rip.overall_length, 57);
    }

    #[test]
    fn test_rip_malformed() {
        assert!(matches!(
            RandomIndexPack::parse(&[0, 0]),
            Err(MxfError::Bounds { .. })
        ));
        assert!(matches!(
            RandomIndexPack::parse(&[0; 10]),
            Err(MxfError::UnsupportedEncoding(_))
        ));
    }
}
