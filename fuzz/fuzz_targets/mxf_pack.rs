#![no_main]

//! Fuzz target for MXF pack and set values.
//!
//! Feeds arbitrary values to the partition pack, batch, local set, primer
//! pack and random index pack parsers.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mxfkit::ul::labels;
use mxfkit::{
    parse_local_set, Batch, LengthEncoding, PartitionPack, PrimerPack, RandomIndexPack,
    UniversalLabel,
};

#[derive(Arbitrary, Debug)]
struct PackInput {
    value: Vec<u8>,
    target: PackTarget,
}

#[derive(Arbitrary, Debug)]
enum PackTarget {
    /// Parse a partition pack of the given kind and status
    PartitionPack { kind: u8, status: u8 },
    /// Parse a batch
    Batch,
    /// Parse a 2-byte local set
    LocalSet,
    /// Parse a primer pack
    PrimerPack,
    /// Parse a random index pack
    RandomIndexPack,
}

fuzz_target!(|input: PackInput| {
    if input.value.len() > 64 * 1024 {
        return;
    }

    match input.target {
        PackTarget::PartitionPack { kind, status } => {
            let key = UniversalLabel::new(labels::partition_pack(kind, status));
            if let Ok(pack) = PartitionPack::parse(&key, &input.value) {
                assert!(input.value.len() >= mxfkit::partition::PACK_META_SIZE);
                assert_eq!(
                    pack.has_valid_operational_pattern(),
                    pack.operational_pattern.is_some()
                );
            }
        }

        PackTarget::Batch => {
            if let Ok(batch) = Batch::parse(&input.value) {
                assert_eq!(batch.len(), batch.count as usize);
            }
        }

        PackTarget::LocalSet => {
            if let Ok(entries) = parse_local_set(&input.value, LengthEncoding::TwoByte) {
                let total: usize = entries.iter().map(|e| 4 + e.value.len()).sum();
                assert!(total <= input.value.len());
            }
        }

        PackTarget::PrimerPack => {
            let _ = PrimerPack::parse(&input.value);
        }

        PackTarget::RandomIndexPack => {
            let _ = RandomIndexPack::parse(&input.value);
        }
    }
});
