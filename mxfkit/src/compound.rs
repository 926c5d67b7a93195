//! Compound value encodings
//!
//! - Batch: `{count u32}{element length u32}` then `count` fixed-size
//!   elements, back to back.
//! - Local set: `{tag u16}{length u16}{value}` entries with no terminator.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{MxfError, Result};
use crate::ul::UniversalLabel;

/// Size of the batch header
pub const BATCH_HEADER_SIZE: usize = 8;

/// A batch of fixed-size elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Number of elements
    pub count: u32,
    /// Length of each element
    pub element_len: u32,
    /// Elements, in stored order
    pub elements: Vec<Vec<u8>>,
}

impl Batch {
    /// Parse a batch from the start of `data`. Trailing bytes are ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BATCH_HEADER_SIZE {
            return Err(MxfError::bounds(BATCH_HEADER_SIZE, data.len()));
        }

        let mut cursor = Cursor::new(data);
        let count = cursor.read_u32::<BigEndian>()?;
        let element_len = cursor.read_u32::<BigEndian>()?;

        let needed = u64::from(count) * u64::from(element_len) + BATCH_HEADER_SIZE as u64;
        if needed > data.len() as u64 {
            return Err(MxfError::Bounds {
                needed,
                available: data.len() as u64,
            });
        }

        if element_len == 0 && count > 0 {
            return Err(MxfError::UnsupportedEncoding(format!(
                "batch of {} zero-length elements",
                count
            )));
        }

        let elements = data[BATCH_HEADER_SIZE..needed as usize]
            .chunks_exact(element_len.max(1) as usize)
            .map(<[u8]>::to_vec)
            .collect();

        Ok(Batch {
            count,
            element_len,
            elements,
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the batch holds no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements interpreted as Universal Labels; empty unless elements
    /// are 16 bytes long
    pub fn labels(&self) -> impl Iterator<Item = UniversalLabel> + '_ {
        self.elements
            .iter()
            .filter_map(|e| <[u8; 16]>::try_from(e.as_slice()).ok())
            .map(UniversalLabel)
    }
}

/// Length field coding of a local set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthEncoding {
    /// 2-byte big-endian length
    #[default]
    TwoByte,
    /// BER-coded length
    Ber,
}

/// One local set entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSetEntry<'a> {
    /// Local tag
    pub tag: u16,
    /// Value length
    pub len: u16,
    /// Value bytes
    pub value: &'a [u8],
}

/// Parse a local-set coded region.
///
/// Parsing stops when fewer than 4 bytes remain. Only 2-byte lengths are
/// handled; BER-length sets are rejected rather than misread.
pub fn parse_local_set(data: &[u8], encoding: LengthEncoding) -> Result<Vec<LocalSetEntry<'_>>> {
    if encoding == LengthEncoding::Ber {
        return Err(MxfError::UnsupportedEncoding(
            "local sets with BER lengths".into(),
        ));
    }

    let mut entries = Vec::new();
    let mut offset = 0;
    while data.len() - offset >= 4 {
        let mut cursor = Cursor::new(&data[offset..offset + 4]);
        let tag = cursor.read_u16::<BigEndian>()?;
        let len = cursor.read_u16::<BigEndian>()?;

        let start = offset + 4;
        let end = start + len as usize;
        if end > data.len() {
            return Err(MxfError::bounds(end, data.len()));
        }

        entries.push(LocalSetEntry {
            tag,
            len,
            value: &data[start..end],
        });
        offset = end;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_bytes(count: u32, element_len: u32, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&count.to_be_bytes());
        data.extend_from_slice(&element_len.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_batch() {
        let payload: Vec<u8> = (1..=12).collect();
        let batch = Batch::parse(&batch_bytes(3, 4, &payload)).unwrap();

        assert_eq!(batch.count, 3);
        assert_eq!(batch.element_len, 4);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.elements[0], vec![1, 2, 3, 4]);
        assert_eq!(batch.elements[1], vec![5, 6, 7, 8]);
        assert_eq!(batch.elements[2], vec![9, 10, 11, 12]);
    }

    #[test]
    fn test_batch_empty_and_trailing() {
        let batch = Batch::parse(&batch_bytes(0, 16, &[])).unwrap();
        assert!(batch.is_empty());

        let batch = Batch::parse(&batch_bytes(1, 2, &[7, 8, 9, 9])).unwrap();
        assert_eq!(batch.elements, vec![vec![7, 8]]);
    }

    #[test]
    fn test_batch_zero_length_elements() {
        assert!(Batch::parse(&batch_bytes(0, 0, &[])).unwrap().is_empty());
        assert!(matches!(
            Batch::parse(&batch_bytes(2, 0, &[])),
            Err(MxfError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_batch_short() {
        assert!(matches!(
            Batch::parse(&[0, 0, 0]),
            Err(MxfError::Bounds { needed: 8, available: 3 })
        ));
        assert!(matches!(
            Batch::parse(&batch_bytes(3, 4, &[0; 11])),
            Err(MxfError::Bounds { needed: 20, available: 19 })
        ));
        // count * len far past the buffer must not overflow
        assert!(matches!(
            Batch::parse(&batch_bytes(u32::MAX, u32::MAX, &[])),
            Err(MxfError::Bounds { .. })
        ));
    }

    #[test]
    fn test_batch_labels() {
        let mut payload = vec![0xAA; 16];
        payload.extend_from_slice(&[0xBB; 16]);
        let batch = Batch::parse(&batch_bytes(2, 16, &payload)).unwrap();
        let labels: Vec<_> = batch.labels().collect();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1].as_bytes(), &[0xBB; 16]);

        let batch = Batch::parse(&batch_bytes(1, 4, &[1, 2, 3, 4])).unwrap();
        assert_eq!(batch.labels().count(), 0);
    }

    #[test]
    fn test_local_set() {
        let data = [
            0x3C, 0x0A, 0x00, 0x03, 1, 2, 3, // tag 3c0a, 3 bytes
            0x01, 0x02, 0x00, 0x00, // tag 0102, empty
            0x44, 0x01, 0x00, 0x01, 9, // tag 4401, 1 byte
            0xFF, 0xFF, 0x00, // fewer than 4 bytes left
        ];
        let entries = parse_local_set(&data, LengthEncoding::TwoByte).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].tag, 0x3C0A);
        assert_eq!(entries[0].len, 3);
        assert_eq!(entries[0].value, &[1, 2, 3]);
        assert_eq!(entries[1].tag, 0x0102);
        assert!(entries[1].value.is_empty());
        assert_eq!(entries[2].value, &[9]);
    }

    #[test]
    fn test_local_set_overrun() {
        let data = [0x3C, 0x0A, 0x00, 0x08, 1, 2];
        assert!(matches!(
            parse_local_set(&data, LengthEncoding::TwoByte),
            Err(MxfError::Bounds { needed: 12, available: 6 })
        ));
    }

    #[test]
    fn test_local_set_ber_rejected() {
        assert!(matches!(
            parse_local_set(&[0x3C, 0x0A, 0x01, 0x00], LengthEncoding::Ber),
            Err(MxfError::UnsupportedEncoding(_))
        ));
    }
}
