#![no_main]

//! Fuzz target for MXF KLV scanning and partition assembly.
//!
//! Tests BER lengths, the KLV scanner and the partition state machine with
//! arbitrary input to find parsing bugs and panics.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mxfkit::{assemble, assemble_parallel, scan, ScanOptions};

#[derive(Arbitrary, Debug)]
struct KlvInput {
    data: Vec<u8>,
    operation: KlvOperation,
}

#[derive(Arbitrary, Debug)]
enum KlvOperation {
    /// Decode a BER length
    DecodeBerLength,
    /// Round-trip encode/decode a BER length
    BerRoundtrip { value: u64 },
    /// Scan KLVs, optionally capped
    Scan { max: Option<u8> },
    /// Scan and assemble partitions
    Assemble,
    /// Sequential and parallel assembly must agree
    AssembleParallel,
}

fuzz_target!(|input: KlvInput| {
    // Limit input size to prevent excessive memory allocation
    if input.data.len() > 64 * 1024 {
        return;
    }

    match input.operation {
        KlvOperation::DecodeBerLength => {
            // Should not panic on any input
            let _ = mxfkit::ber::decode_ber_length(&input.data);
        }

        KlvOperation::BerRoundtrip { value } => {
            let encoded = mxfkit::ber::encode_ber_length(value);
            let (decoded, consumed) =
                mxfkit::ber::decode_ber_length(&encoded).expect("encoded length must decode");
            assert_eq!(value, decoded, "BER round-trip mismatch");
            assert_eq!(encoded.len(), consumed, "BER size mismatch");
        }

        KlvOperation::Scan { max } => {
            let options = match max {
                Some(max) => ScanOptions::with_max_elements(max as usize),
                None => ScanOptions::default(),
            };
            if let Ok(klvs) = scan(&input.data, options) {
                if let Some(max) = max {
                    assert!(klvs.len() <= max as usize);
                }
                // Triplets are back to back
                for pair in klvs.windows(2) {
                    assert_eq!(pair[0].end(), pair[1].at);
                }
            }
        }

        KlvOperation::Assemble => {
            if let Ok(klvs) = scan(&input.data, ScanOptions::default()) {
                if let Ok(file) = assemble(&input.data, &klvs) {
                    assert!(file.klv_count() <= klvs.len());
                }
            }
        }

        KlvOperation::AssembleParallel => {
            if let Ok(klvs) = scan(&input.data, ScanOptions::default()) {
                // Same tree, or the same first error in KLV order
                let sequential = assemble(&input.data, &klvs).map_err(|e| e.to_string());
                let parallel = assemble_parallel(&input.data, &klvs).map_err(|e| e.to_string());
                assert_eq!(sequential, parallel, "parallel assembly differs");
            }
        }
    }
});
