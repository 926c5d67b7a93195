//! KLV-of-interest selection and value dumps.
//!
//! A KOI reads `{part}[n]:{idx}[:{style}[limit]]`, for example `h:3`,
//! `b1:0:r64` or `f:2:s0`.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use anyhow::Context;
use console::style;
use mxfkit::metadata::local_tag_name;
use mxfkit::{
    parse_local_set, ByteSource, ClassifiedKlv, Classification, File, LengthEncoding, Partition,
    PrimerPack,
};
use serde::Serialize;
use tracing::warn;

use crate::report::klv_name;

/// Bytes dumped when the KOI gives no limit.
pub const DEFAULT_LIMIT: usize = 128;

const ROW_SIZE: usize = 8;

/// Partition addressed by a KOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSelector {
    Header,
    Body(usize),
    Footer,
}

impl fmt::Display for PartSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartSelector::Header => write!(f, "header"),
            PartSelector::Body(n) => write!(f, "body[{}]", n),
            PartSelector::Footer => write!(f, "footer"),
        }
    }
}

/// How a value is dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// Local sets for structural metadata, raw otherwise.
    Auto,
    LocalSet,
    Raw,
}

/// A parsed KLV-of-interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Koi {
    pub part: PartSelector,
    /// Index into the partition's KLVs.
    pub index: usize,
    pub style: DumpStyle,
    /// Maximum bytes dumped (0 = unlimited).
    pub limit: usize,
}

/// Split off the first character.
fn split_first(s: &str) -> (&str, &str) {
    let at = s.char_indices().nth(1).map_or(s.len(), |(i, _)| i);
    s.split_at(at)
}

impl FromStr for Koi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(':');
        let part = fields.next().unwrap_or_default();
        let index = fields
            .next()
            .ok_or_else(|| format!("missing KLV index in '{}'", s))?;
        let dump = fields.next();
        if fields.next().is_some() {
            return Err(format!("too many fields in '{}'", s));
        }

        let part = match split_first(part) {
            ("h", "") => PartSelector::Header,
            ("f", "") => PartSelector::Footer,
            ("b", "") => PartSelector::Body(0),
            ("b", n) => PartSelector::Body(
                n.parse()
                    .map_err(|_| format!("invalid body partition index '{}'", n))?,
            ),
            _ => return Err(format!("unknown partition '{}' (expected h, f or b<n>)", part)),
        };

        let index = index
            .parse()
            .map_err(|_| format!("invalid KLV index '{}'", index))?;

        let (style, limit) = match dump {
            None => (DumpStyle::Auto, DEFAULT_LIMIT),
            Some(dump) => {
                let (style, limit) = split_first(dump);
                let style = match style {
                    "a" => DumpStyle::Auto,
                    "s" => DumpStyle::LocalSet,
                    "r" => DumpStyle::Raw,
                    _ => return Err(format!("unknown dump style '{}' (expected a, s or r)", dump)),
                };
                let limit = if limit.is_empty() {
                    DEFAULT_LIMIT
                } else {
                    limit
                        .parse()
                        .map_err(|_| format!("invalid dump limit '{}'", limit))?
                };
                (style, limit)
            }
        };

        Ok(Koi {
            part,
            index,
            style,
            limit,
        })
    }
}

/// One local set entry of a dumped value.
#[derive(Debug, Clone, Serialize)]
pub struct TagEntry {
    pub tag: u16,
    /// Static tag name, or the primer's UL for dynamic tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub len: u16,
    /// Value bytes, cut at the dump limit.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

/// Dumped value of a KLV.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailBody {
    LocalSet(Vec<TagEntry>),
    #[serde(with = "hex_bytes")]
    Raw(Vec<u8>),
}

/// Detail of one KLV.
#[derive(Debug, Clone, Serialize)]
pub struct DetailReport {
    pub partition: String,
    pub index: usize,
    pub name: String,
    pub offset: u64,
    pub length: u64,
    pub value_offset: u64,
    pub body: DetailBody,
    /// Whether the limit cut the dump short.
    pub truncated: bool,
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        serializer.serialize_str(&hex)
    }
}

fn select<'f>(file: &'f File, part: PartSelector) -> anyhow::Result<(&'f Partition, PartSelector)> {
    match part {
        PartSelector::Header => file
            .header
            .as_ref()
            .map(|p| (p, part))
            .context("file has no header partition"),
        PartSelector::Footer => file
            .footer
            .as_ref()
            .map(|p| (p, part))
            .context("file has no footer partition"),
        PartSelector::Body(n) => {
            let n = if n < file.body.len() {
                n
            } else {
                warn!("body partition {} out of range, using 0", n);
                0
            };
            file.body
                .get(n)
                .map(|p| (p, PartSelector::Body(n)))
                .context("file has no body partition")
        }
    }
}

fn cut(limit: usize, len: usize) -> usize {
    if limit == 0 {
        len
    } else {
        len.min(limit)
    }
}

fn header_primer<S: ByteSource + ?Sized>(source: &S, file: &File) -> Option<PrimerPack> {
    let entry = file.header.as_ref()?.find(Classification::PrimerPack)?;
    match entry.klv.read_value(source).and_then(|v| PrimerPack::parse(&v)) {
        Ok(primer) => Some(primer),
        Err(e) => {
            warn!("ignoring primer pack: {}", e);
            None
        }
    }
}

fn local_set_body<S: ByteSource + ?Sized>(
    source: &S,
    file: &File,
    entry: &ClassifiedKlv,
    limit: usize,
) -> anyhow::Result<(DetailBody, bool)> {
    let value = entry.klv.read_value(source)?;
    let primer = header_primer(source, file);
    let mut truncated = false;

    let entries = parse_local_set(&value, LengthEncoding::TwoByte)?
        .into_iter()
        .map(|e| {
            let shown = cut(limit, e.value.len());
            truncated |= shown < e.value.len();
            let name = local_tag_name(e.tag).map(String::from).or_else(|| {
                primer
                    .as_ref()
                    .and_then(|p| p.lookup(e.tag))
                    .map(|ul| ul.to_string())
            });
            TagEntry {
                tag: e.tag,
                name,
                len: e.len,
                value: e.value[..shown].to_vec(),
            }
        })
        .collect();

    Ok((DetailBody::LocalSet(entries), truncated))
}

fn raw_body<S: ByteSource + ?Sized>(
    source: &S,
    entry: &ClassifiedKlv,
    limit: usize,
) -> anyhow::Result<(DetailBody, bool)> {
    let klv = &entry.klv;
    let available = source.size().saturating_sub(klv.value_start).min(klv.length);
    let len = usize::try_from(available).unwrap_or(usize::MAX);
    let shown = cut(limit, len);

    let mut buf = vec![0; shown];
    source
        .read_exact_at(&mut buf, klv.value_start)
        .with_context(|| format!("failed to read value at offset {}", klv.value_start))?;

    Ok((DetailBody::Raw(buf), (shown as u64) < klv.length))
}

/// Look up the KOI in `file` and dump its value.
pub fn inspect<S: ByteSource + ?Sized>(
    source: &S,
    file: &File,
    koi: &Koi,
) -> anyhow::Result<DetailReport> {
    let (partition, part) = select(file, koi.part)?;
    let entry = partition.sub().get(koi.index).with_context(|| {
        format!(
            "KLV #{} out of range: {} has {} KLVs",
            koi.index,
            part,
            partition.sub().len()
        )
    })?;

    let style = match (koi.style, entry.class) {
        (DumpStyle::Auto, Classification::StructuralMetadata(_)) => DumpStyle::LocalSet,
        (DumpStyle::Auto, _) => DumpStyle::Raw,
        (style, _) => style,
    };
    let (body, truncated) = match style {
        DumpStyle::LocalSet => local_set_body(source, file, entry, koi.limit)?,
        _ => raw_body(source, entry, koi.limit)?,
    };

    Ok(DetailReport {
        partition: part.to_string(),
        index: koi.index,
        name: klv_name(entry),
        offset: entry.klv.at,
        length: entry.klv.length,
        value_offset: entry.klv.value_start,
        body,
        truncated,
    })
}

fn hex_list(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write raw bytes as rows of eight, prefixed with their offset range.
pub fn write_rows(out: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    for (row, chunk) in bytes.chunks(ROW_SIZE).enumerate() {
        let start = row * ROW_SIZE;
        writeln!(
            out,
            "[{:05}-{:05}] {}",
            start,
            start + chunk.len() - 1,
            hex_list(chunk)
        )?;
    }
    Ok(())
}

/// Write a detail report as text.
pub fn write_detail(out: &mut impl Write, detail: &DetailReport) -> io::Result<()> {
    writeln!(
        out,
        "{} {} #{} {} @{}: data-len: {} @{}",
        style(">>").green().bold(),
        detail.partition,
        detail.index,
        style(&detail.name).yellow(),
        detail.offset,
        detail.length,
        detail.value_offset
    )?;

    match &detail.body {
        DetailBody::LocalSet(entries) => {
            for entry in entries {
                writeln!(
                    out,
                    "  0x{:04x} {} ({} bytes): {}",
                    entry.tag,
                    entry.name.as_deref().unwrap_or("<unknown tag>"),
                    entry.len,
                    hex_list(&entry.value)
                )?;
            }
        }
        DetailBody::Raw(bytes) => write_rows(out, bytes)?,
    }

    if detail.truncated {
        writeln!(out, "{}", style("... truncated").dim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxfkit::klv::encode_klv;
    use mxfkit::partition::encode_pack_value;
    use mxfkit::ul::labels;
    use mxfkit::{assemble, scan, PackMeta, ScanOptions, UniversalLabel};

    #[test]
    fn test_parse_koi() {
        assert_eq!(
            "h:3".parse::<Koi>().unwrap(),
            Koi {
                part: PartSelector::Header,
                index: 3,
                style: DumpStyle::Auto,
                limit: DEFAULT_LIMIT,
            }
        );
        assert_eq!(
            "b2:0:r64".parse::<Koi>().unwrap(),
            Koi {
                part: PartSelector::Body(2),
                index: 0,
                style: DumpStyle::Raw,
                limit: 64,
            }
        );

        let koi: Koi = "b:1:s".parse().unwrap();
        assert_eq!(koi.part, PartSelector::Body(0));
        assert_eq!(koi.style, DumpStyle::LocalSet);
        assert_eq!(koi.limit, DEFAULT_LIMIT);

        let koi: Koi = "f:0:a0".parse().unwrap();
        assert_eq!(koi.part, PartSelector::Footer);
        assert_eq!(koi.limit, 0);
    }

    #[test]
    fn test_parse_koi_errors() {
        for bad in ["", "h", "é:1", "x:1", "h:z", "h:1:q", "bx:0", "h:1:r1k", "h:1:a:2"] {
            assert!(bad.parse::<Koi>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_write_rows() {
        let mut out = Vec::new();
        write_rows(&mut out, &(0u8..10).collect::<Vec<_>>()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "[00000-00007] 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07"
        );
        assert_eq!(lines[1], "[00008-00009] 0x08, 0x09");
    }

    fn sample() -> Vec<u8> {
        let meta = PackMeta::default();
        let mut data = encode_klv(
            &labels::partition_pack(0x02, 0x04),
            &encode_pack_value(&meta, Some(&labels::OP1A), &[]),
        );

        let mut primer = Vec::new();
        primer.extend_from_slice(&1u32.to_be_bytes());
        primer.extend_from_slice(&18u32.to_be_bytes());
        primer.extend_from_slice(&0x8001u16.to_be_bytes());
        primer.extend_from_slice(&labels::OP1A);
        data.extend(encode_klv(&labels::PRIMER_PACK_V1, &primer));

        let mut preface = Vec::new();
        preface.extend_from_slice(&[0x3C, 0x0A, 0x00, 0x04, 1, 2, 3, 4]);
        preface.extend_from_slice(&[0x80, 0x01, 0x00, 0x02, 9, 9]);
        preface.extend_from_slice(&[0x80, 0x02, 0x00, 0x01, 7]);
        data.extend(encode_klv(&labels::PREFACE, &preface));

        data.extend(encode_klv(&labels::INDEX_TABLE_SEGMENT_V1, &[0xAB; 20]));
        data
    }

    fn koi(s: &str) -> Koi {
        s.parse().unwrap()
    }

    #[test]
    fn test_inspect_local_set() {
        let data = sample();
        let klvs = scan(&data, ScanOptions::default()).unwrap();
        let file = assemble(&data, &klvs).unwrap();

        let detail = inspect(&data, &file, &koi("h:1:a2")).unwrap();
        assert_eq!(detail.name, "SM - Preface");
        assert!(detail.truncated);
        let DetailBody::LocalSet(entries) = detail.body else {
            panic!("expected a local set");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name.as_deref(), Some("Instance UID"));
        assert_eq!(entries[0].value, vec![1, 2]);
        let op1a = UniversalLabel::new(labels::OP1A).to_string();
        assert_eq!(entries[1].name.as_deref(), Some(op1a.as_str()));
        assert_eq!(entries[2].name, None);
    }

    #[test]
    fn test_inspect_raw() {
        let data = sample();
        let klvs = scan(&data, ScanOptions::default()).unwrap();
        let file = assemble(&data, &klvs).unwrap();

        let detail = inspect(&data, &file, &koi("h:2")).unwrap();
        assert_eq!(detail.name, "Index Table Segment");
        assert!(!detail.truncated);
        assert!(matches!(&detail.body, DetailBody::Raw(b) if b.len() == 20));

        let detail = inspect(&data, &file, &koi("h:2:r8")).unwrap();
        assert!(detail.truncated);
        assert!(matches!(&detail.body, DetailBody::Raw(b) if b == &[0xAB; 8]));
    }

    #[test]
    fn test_inspect_missing() {
        let data = sample();
        let klvs = scan(&data, ScanOptions::default()).unwrap();
        let file = assemble(&data, &klvs).unwrap();

        assert!(inspect(&data, &file, &koi("h:9")).is_err());
        assert!(inspect(&data, &file, &koi("f:0")).is_err());
        assert!(inspect(&data, &file, &koi("b3:0")).is_err());
    }
}
