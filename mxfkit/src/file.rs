//! Partition tree assembly
//!
//! A single forward pass over the flat KLV list groups triplets under the
//! partition pack that precedes them. Partition packs must arrive as one
//! header, any number of bodies, then at most one footer.

use rayon::prelude::*;

use crate::compound::Batch;
use crate::error::{MxfError, Result};
use crate::klv::Klv;
use crate::partition::{OperationalPattern, PackMeta, PartitionKind, PartitionPack};
use crate::source::ByteSource;
use crate::ul::{classify, Classification};

/// A KLV together with its classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedKlv {
    /// The indexed triplet
    pub klv: Klv,
    /// What its key says it is
    pub class: Classification,
}

impl ClassifiedKlv {
    /// Classify a triplet
    pub fn new(klv: Klv) -> Self {
        ClassifiedKlv {
            class: classify(&klv.key),
            klv,
        }
    }
}

/// One partition: its pack and the triplets that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Decoded partition pack
    pub pack: PartitionPack,
    /// Non-fill triplets up to the next partition pack
    pub sub: Vec<ClassifiedKlv>,
}

impl Partition {
    fn new(pack: PartitionPack) -> Self {
        Partition {
            pack,
            sub: Vec::new(),
        }
    }

    /// Header, Body or Footer
    pub fn kind(&self) -> PartitionKind {
        self.pack.kind
    }

    /// Whether the pack marks the partition closed
    pub fn closed(&self) -> bool {
        self.pack.closed
    }

    /// Whether the pack marks the partition complete
    pub fn completed(&self) -> bool {
        self.pack.completed
    }

    /// Offsets, byte counts and stream IDs from the pack
    pub fn meta(&self) -> &PackMeta {
        &self.pack.meta
    }

    /// Operational pattern, when the pack carries a recognized one
    pub fn operational_pattern(&self) -> Option<&OperationalPattern> {
        self.pack.operational_pattern.as_ref()
    }

    /// Essence container labels batch
    pub fn essence_containers(&self) -> &Batch {
        &self.pack.essence_containers
    }

    /// Triplets in this partition, pack and fill excluded
    pub fn sub(&self) -> &[ClassifiedKlv] {
        &self.sub
    }

    /// First triplet of the given classification
    pub fn find(&self, class: Classification) -> Option<&ClassifiedKlv> {
        self.sub.iter().find(|k| k.class == class)
    }
}

/// A decoded MXF file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    /// Non-fill triplets seen before the header partition pack
    pub run_in: Vec<ClassifiedKlv>,
    /// Header partition; `None` only if no partition pack was seen
    pub header: Option<Partition>,
    /// Body partitions, in file order
    pub body: Vec<Partition>,
    /// Footer partition; missing from truncated files
    pub footer: Option<Partition>,
}

impl File {
    /// All partitions in file order
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.header
            .iter()
            .chain(self.body.iter())
            .chain(self.footer.iter())
    }

    /// Number of non-fill triplets across all partitions
    pub fn klv_count(&self) -> usize {
        self.run_in.len() + self.partitions().map(|p| p.sub.len()).sum::<usize>()
    }
}

/// Assembler state: the partition being filled and what has been closed
struct Assembler {
    file: File,
    current: Option<Partition>,
}

impl Assembler {
    fn new() -> Self {
        Assembler {
            file: File::default(),
            current: None,
        }
    }

    fn open(&mut self, pack: PartitionPack) -> Result<()> {
        match pack.kind {
            PartitionKind::Header => {
                if self.current.is_some() {
                    return Err(MxfError::OrderViolation("header partition must be first"));
                }
                if self.file.header.is_some() {
                    return Err(MxfError::OrderViolation("repeated header partition"));
                }
            }
            PartitionKind::Body | PartitionKind::Footer => match self.current.take() {
                Some(p) if p.kind() == PartitionKind::Header => self.file.header = Some(p),
                Some(p) if p.kind() == PartitionKind::Body => self.file.body.push(p),
                _ => return Err(MxfError::OrderViolation("invalid partition order")),
            },
        }

        tracing::debug!(
            "{} partition at offset {}",
            pack.kind,
            pack.meta.this_partition
        );
        self.current = Some(Partition::new(pack));
        Ok(())
    }

    fn push(&mut self, klv: Klv) {
        let entry = ClassifiedKlv::new(klv);
        match self.current.as_mut() {
            Some(partition) => partition.sub.push(entry),
            None => self.file.run_in.push(entry),
        }
    }

    fn finish(mut self) -> File {
        if let Some(partition) = self.current.take() {
            match partition.kind() {
                PartitionKind::Header => self.file.header = Some(partition),
                PartitionKind::Body => self.file.body.push(partition),
                PartitionKind::Footer => self.file.footer = Some(partition),
            }
        }
        if self.file.header.is_none() {
            tracing::warn!("no partition pack found");
        }
        self.file
    }
}

/// Run the partition state machine, decoding packs with `decode_pack`
fn assemble_with<F>(klvs: &[Klv], mut decode_pack: F) -> Result<File>
where
    F: FnMut(usize, &Klv) -> Result<PartitionPack>,
{
    let mut assembler = Assembler::new();

    for (index, klv) in klvs.iter().enumerate() {
        if klv.key.is_fill_item() {
            continue;
        }
        if klv.key.is_partition_pack() {
            let pack = decode_pack(index, klv)?;
            assembler.open(pack)?;
        } else {
            assembler.push(*klv);
        }
    }

    Ok(assembler.finish())
}

/// Assemble a scanned KLV list into a partition tree.
///
/// Partition packs are decoded from `source` as they are met. Any decode
/// error, including a short pack, aborts the whole assembly.
pub fn assemble<S: ByteSource + ?Sized>(source: &S, klvs: &[Klv]) -> Result<File> {
    assemble_with(klvs, |_, klv| PartitionPack::decode(klv, source))
}

/// Decode every partition pack in `klvs` in parallel.
///
/// Returns `(index into klvs, decode result)` pairs in KLV order. A failed
/// pack does not stop the others from being decoded.
pub fn decode_partition_packs<S: ByteSource + ?Sized>(
    source: &S,
    klvs: &[Klv],
) -> Vec<(usize, Result<PartitionPack>)> {
    klvs.par_iter()
        .enumerate()
        .filter(|(_, klv)| klv.key.is_partition_pack())
        .map(|(index, klv)| (index, PartitionPack::decode(klv, source)))
        .collect()
}

/// Same as [`assemble`], with the partition packs decoded up front on the
/// rayon pool. Errors are reported in KLV order, so the outcome matches
/// [`assemble`] exactly.
pub fn assemble_parallel<S: ByteSource + ?Sized>(source: &S, klvs: &[Klv]) -> Result<File> {
    let mut packs = decode_partition_packs(source, klvs).into_iter();

    assemble_with(klvs, |index, _| match packs.next() {
        Some((i, pack)) if i == index => pack,
        _ => Err(MxfError::InvalidPartition(format!(
            "no decoded pack for KLV #{}",
            index
        ))),
    })
}
