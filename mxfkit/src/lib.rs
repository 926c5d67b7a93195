//! MXF (Material eXchange Format) structure decoding
//!
//! This crate turns an MXF file (SMPTE 377M) into a navigable model of its
//! partitions and the KLV triplets inside them, without loading essence.
//!
//! # Features
//!
//! - BER length decoding and KLV scanning over positioned reads
//! - Universal Label classification (partition packs, fill, primer pack,
//!   structural metadata, index tables, essence elements, RIP)
//! - Partition pack, operational pattern, batch and local set decoding
//! - Header/Body/Footer partition assembly with ordering checks
//!
//! # Example
//!
//! ```no_run
//! use mxfkit::{assemble, scan, FileSource, ScanOptions};
//!
//! let source = FileSource::open("video.mxf")?;
//! let klvs = scan(&source, ScanOptions::default())?;
//! let file = assemble(&source, &klvs)?;
//!
//! for partition in file.partitions() {
//!     println!("{}: {} KLVs", partition.kind(), partition.sub().len());
//! }
//! # Ok::<(), mxfkit::MxfError>(())
//! ```

pub mod ber;
pub mod compound;
mod error;
pub mod file;
pub mod klv;
pub mod metadata;
pub mod partition;
pub mod source;
pub mod ul;

pub use compound::{parse_local_set, Batch, LengthEncoding, LocalSetEntry};
pub use error::{MxfError, Result};
pub use file::{assemble, assemble_parallel, decode_partition_packs, ClassifiedKlv, File, Partition};
pub use klv::{scan, Klv, KlvScanner, ScanOptions};
pub use metadata::{PrimerPack, RandomIndexPack, RipEntry};
pub use partition::{
    ItemComplexity, OperationalPattern, PackMeta, PackageComplexity, PartitionKind, PartitionPack,
};
pub use source::{ByteSource, FileSource, MmapSource};
pub use ul::{classify, Classification, StructuralSet, UniversalLabel, UL};
