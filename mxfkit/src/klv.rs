//! KLV (Key-Length-Value) triplet scanning
//!
//! All data in MXF files is encoded as KLV triplets:
//! - Key: 16-byte Universal Label identifying the data
//! - Length: BER-encoded length of the value
//! - Value: The actual data
//!
//! The scanner only indexes triplets; values stay in the byte source until
//! something asks for them.
//!
//! ```text
//! | Key | BER |  [Value]  |
//! at          value_start
//!             |- length ->|
//! |------- size --------->|
//! ```

use std::ops::Range;

use crate::ber::decode_ber_length;
use crate::error::{MxfError, Result};
use crate::source::ByteSource;
use crate::ul::UniversalLabel;

/// MXF keys are always 16 bytes
pub const KEY_SIZE: u64 = 16;

/// Bytes read after the key to find the BER length
const LENGTH_PROBE_SIZE: u64 = 16;

/// An indexed KLV triplet; the value is not loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Klv {
    /// Universal Label (key)
    pub key: UniversalLabel,
    /// Declared value length
    pub length: u64,
    /// Offset of the key in the source
    pub at: u64,
    /// Offset of the value in the source
    pub value_start: u64,
}

impl Klv {
    /// Total size including key and length field
    pub fn size(&self) -> u64 {
        self.value_start + self.length - self.at
    }

    /// Byte range of the value
    pub fn value_range(&self) -> Range<u64> {
        self.value_start..self.value_start + self.length
    }

    /// Offset just past this triplet
    pub fn end(&self) -> u64 {
        self.value_start + self.length
    }

    /// Read the value bytes from `source`
    pub fn read_value<S: ByteSource + ?Sized>(&self, source: &S) -> Result<Vec<u8>> {
        let available = source.size().saturating_sub(self.value_start);
        if self.length > available {
            return Err(MxfError::Bounds {
                needed: self.length,
                available,
            });
        }
        let mut value = vec![0u8; self.length as usize];
        source.read_exact_at(&mut value, self.value_start)?;
        Ok(value)
    }
}

/// Scanner options
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Stop after this many triplets
    pub max_elements: Option<usize>,
}

impl ScanOptions {
    /// Limit the scan to `max` triplets
    pub fn with_max_elements(max: usize) -> Self {
        ScanOptions {
            max_elements: Some(max),
        }
    }
}

/// Walks a byte source triplet by triplet
pub struct KlvScanner<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    size: u64,
    position: u64,
    remaining: Option<usize>,
    failed: bool,
}

impl<'a, S: ByteSource + ?Sized> KlvScanner<'a, S> {
    /// Create a scanner starting at offset 0
    pub fn new(source: &'a S, options: ScanOptions) -> Self {
        KlvScanner {
            size: source.size(),
            source,
            position: 0,
            remaining: options.max_elements,
            failed: false,
        }
    }

    /// Offset of the next triplet
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the triplet at `at`
    fn read_klv(&self, at: u64) -> Result<Klv> {
        let mut key = [0u8; KEY_SIZE as usize];
        self.source.read_exact_at(&mut key, at)?;

        let length_at = at + KEY_SIZE;
        let probe = LENGTH_PROBE_SIZE.min(self.size.saturating_sub(length_at)) as usize;
        let mut buf = [0u8; LENGTH_PROBE_SIZE as usize];
        self.source.read_exact_at(&mut buf[..probe], length_at)?;

        let (length, consumed) = decode_ber_length(&buf[..probe]).map_err(|e| {
            tracing::debug!("bad BER length at offset {}: {}", length_at, e);
            e
        })?;

        let value_start = length_at + consumed as u64;
        if value_start.checked_add(length).is_none() {
            return Err(MxfError::Bounds {
                needed: length,
                available: self.size.saturating_sub(value_start),
            });
        }

        Ok(Klv {
            key: UniversalLabel::new(key),
            length,
            at,
            value_start,
        })
    }
}

impl<S: ByteSource + ?Sized> Iterator for KlvScanner<'_, S> {
    type Item = Result<Klv>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.size || self.remaining == Some(0) {
            return None;
        }

        match self.read_klv(self.position) {
            Ok(klv) => {
                if klv.end() > self.size {
                    tracing::warn!(
                        "KLV at offset {} runs {} bytes past the end of the source",
                        klv.at,
                        klv.end() - self.size
                    );
                }
                self.position = klv.end();
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(klv))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Scan `source` from the start into a flat list of triplets.
///
/// Any failure aborts the scan: once a length is misread, every later
/// offset is wrong.
pub fn scan<S: ByteSource + ?Sized>(source: &S, options: ScanOptions) -> Result<Vec<Klv>> {
    let klvs = KlvScanner::new(source, options).collect::<Result<Vec<_>>>()?;
    tracing::debug!("scanned {} KLVs from {} bytes", klvs.len(), source.size());
    Ok(klvs)
}

/// Encode one triplet with a shortest-form BER length. Test fixture for
/// this crate and its integration tests; there is no write path.
#[doc(hidden)]
pub fn encode_klv(key: &[u8; 16], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + 9 + value.len());
    out.extend_from_slice(key);
    out.extend_from_slice(&crate::ber::encode_ber_length(value.len() as u64));
    out.extend_from_slice(value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ul::labels;

    const KEY_A: [u8; 16] = [0x06, 0x0E, 0x2B, 0x34, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

    #[test]
    fn test_klv_reader() {
        let value = vec![0xAA, 0xBB, 0xCC];
        let data = encode_klv(&KEY_A, &value);

        let klvs = scan(&data, ScanOptions::default()).unwrap();
        assert_eq!(klvs.len(), 1);

        let klv = klvs[0];
        assert_eq!(klv.key.as_bytes(), &KEY_A);
        assert_eq!(klv.length, 3);
        assert_eq!(klv.at, 0);
        assert_eq!(klv.value_start, 17);
        assert_eq!(klv.size(), 20);
        assert_eq!(klv.value_range(), 17..20);
        assert_eq!(klv.read_value(&data).unwrap(), value);
    }

    #[test]
    fn test_klv_reader_long_length() {
        let mut data = Vec::new();
        data.extend_from_slice(&KEY_A);
        data.extend_from_slice(&[0x83, 0x00, 0x00, 0xC8]);
        data.extend_from_slice(&[0u8; 200]);
        data.extend_from_slice(&encode_klv(&labels::FILL_ITEM, &[0; 5]));

        let klvs = scan(&data, ScanOptions::default()).unwrap();
        assert_eq!(klvs.len(), 2);
        assert_eq!(klvs[0].length, 200);
        assert_eq!(klvs[0].value_start, 20);
        assert_eq!(klvs[1].at, 220);
        assert_eq!(klvs[1].value_start, 237);
    }

    #[test]
    fn test_back_to_back_layout() {
        let sizes = [0usize, 1, 127, 128, 300, 70_000];
        let mut data = Vec::new();
        let mut expected = Vec::new();
        for (i, &len) in sizes.iter().enumerate() {
            let mut key = KEY_A;
            key[15] = i as u8;
            let at = data.len() as u64;
            data.extend_from_slice(&encode_klv(&key, &vec![i as u8; len]));
            let header = 16 + crate::ber::ber_length_size(len as u64) as u64;
            expected.push((at, at + header, len as u64));
        }

        let klvs = scan(&data, ScanOptions::default()).unwrap();
        assert_eq!(klvs.len(), sizes.len());
        for (klv, (at, value_start, length)) in klvs.iter().zip(expected) {
            assert_eq!(klv.at, at);
            assert_eq!(klv.value_start, value_start);
            assert_eq!(klv.length, length);
            assert_eq!(klv.size(), value_start - at + length);
        }
    }

    #[test]
    fn test_max_elements() {
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend_from_slice(&encode_klv(&KEY_A, &[1, 2]));
        }

        let klvs = scan(&data, ScanOptions::with_max_elements(3)).unwrap();
        assert_eq!(klvs.len(), 3);
        assert_eq!(klvs[2].at, 38);

        let klvs = scan(&data, ScanOptions::with_max_elements(10)).unwrap();
        assert_eq!(klvs.len(), 5);
    }

    #[test]
    fn test_empty_source() {
        let data: &[u8] = &[];
        assert!(scan(data, ScanOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_key() {
        let data = &KEY_A[..10];
        assert!(matches!(
            scan(data, ScanOptions::default()),
            Err(MxfError::Io(_))
        ));
    }

    #[test]
    fn test_key_at_end_of_source() {
        assert!(matches!(
            scan(&KEY_A[..], ScanOptions::default()),
            Err(MxfError::Bounds { .. })
        ));
    }

    #[test]
    fn test_bad_ber_aborts_scan() {
        let mut data = encode_klv(&KEY_A, &[1, 2, 3]);
        data.extend_from_slice(&KEY_A);
        data.push(0x80);
        data.extend_from_slice(&[0; 4]);

        assert!(matches!(
            scan(&data, ScanOptions::default()),
            Err(MxfError::UnsupportedEncoding(_))
        ));

        // The iterator reports the good triplet before the failure, then stops
        let mut scanner = KlvScanner::new(&data, ScanOptions::default());
        assert!(scanner.next().unwrap().is_ok());
        assert!(scanner.next().unwrap().is_err());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_value_past_end_is_kept() {
        let mut data = encode_klv(&KEY_A, &[0; 50]);
        data.truncate(40);

        let klvs = scan(&data, ScanOptions::default()).unwrap();
        assert_eq!(klvs.len(), 1);
        assert_eq!(klvs[0].length, 50);
        assert!(matches!(
            klvs[0].read_value(&data),
            Err(MxfError::Bounds { needed: 50, available: 23 })
        ));
    }

    #[test]
    fn test_length_overflow() {
        let mut data = KEY_A.to_vec();
        data.push(0x88);
        data.extend_from_slice(&[0xFF; 8]);
        assert!(matches!(
            scan(&data, ScanOptions::default()),
            Err(MxfError::Bounds { .. })
        ));
    }
}
