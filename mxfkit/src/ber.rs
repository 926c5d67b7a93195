//! BER length fields
//!
//! The length of every KLV triplet is BER encoded:
//! - Short form: one byte, high bit clear, value in the low 7 bits
//! - Long form: `0x80 | k` followed by `k` big-endian octets
//!
//! Indefinite (`0x80`) and reserved (`0xFF`) forms are rejected.

use crate::error::{MxfError, Result};

/// Longest BER field an MXF encoder may emit (1 + 8 octets)
pub const MAX_BER_LENGTH_SIZE: usize = 9;

/// Decode a BER length from the start of `data`.
///
/// Returns the decoded value and the number of bytes the length field
/// occupies.
pub fn decode_ber_length(data: &[u8]) -> Result<(u64, usize)> {
    let first_byte = *data.first().ok_or_else(|| MxfError::bounds(1, 0))?;

    if first_byte & 0x80 == 0 {
        return Ok((u64::from(first_byte), 1));
    }

    let num_bytes = (first_byte & 0x7F) as usize;
    match num_bytes {
        0 => {
            return Err(MxfError::UnsupportedEncoding(
                "BER indefinite length".into(),
            ))
        }
        0x7F => {
            return Err(MxfError::UnsupportedEncoding(
                "BER reserved length".into(),
            ))
        }
        _ => {}
    }

    if data.len() < 1 + num_bytes {
        return Err(MxfError::bounds(1 + num_bytes, data.len()));
    }

    let mut length: u64 = 0;
    for &byte in &data[1..=num_bytes] {
        length = length
            .checked_mul(256)
            .map(|l| l | u64::from(byte))
            .ok_or_else(|| {
                MxfError::UnsupportedEncoding(format!(
                    "BER length with {} octets overflows 64 bits",
                    num_bytes
                ))
            })?;
    }

    Ok((length, 1 + num_bytes))
}

/// Size of the shortest BER encoding of `length`
pub fn ber_length_size(length: u64) -> usize {
    if length < 0x80 {
        1
    } else {
        1 + (8 - length.leading_zeros() as usize / 8)
    }
}

/// Encode `length` in its shortest BER form
pub fn encode_ber_length(length: u64) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let octets = ber_length_size(length) - 1;
    let mut out = Vec::with_capacity(1 + octets);
    out.push(0x80 | octets as u8);
    out.extend_from_slice(&length.to_be_bytes()[8 - octets..]);
    out
}
