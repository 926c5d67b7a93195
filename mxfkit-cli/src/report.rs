//! Text and JSON structure reports.

use std::io::{self, Write};

use console::style;
use mxfkit::{ClassifiedKlv, Classification, File, Klv, PackMeta, Partition, PartitionKind};
use serde::Serialize;

use crate::detail::DetailReport;

/// What the reports show.
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    /// 1 = flat KLV list, 2 = partition tree, 3 = tree with KLVs.
    pub level: u8,
    /// KLVs listed before folding (0 = unlimited).
    pub max: usize,
    /// List unknown KLVs at level 3.
    pub show_unknown: bool,
}

impl ReportConfig {
    fn limit(&self) -> usize {
        if self.max == 0 {
            usize::MAX
        } else {
            self.max
        }
    }
}

/// Display name of a classified KLV.
pub fn klv_name(entry: &ClassifiedKlv) -> String {
    match entry.class {
        Classification::Unknown => format!("<[Unknown {}]>", entry.klv.key),
        class => class.to_string(),
    }
}

fn fold_line(out: &mut impl Write, from: usize, total: usize) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        style(format!("... #{}~{} KLVs folded ...", from, total)).dim()
    )
}

/// Write the summary line and the flat KLV list.
pub fn write_klv_list(
    out: &mut impl Write,
    config: &ReportConfig,
    file_name: &str,
    file_size: u64,
    klvs: &[Klv],
) -> io::Result<()> {
    writeln!(
        out,
        "total {} klv read from file {} with size {} bytes",
        klvs.len(),
        file_name,
        file_size
    )?;

    let limit = config.limit();
    for (i, klv) in klvs.iter().enumerate() {
        if i == limit {
            return fold_line(out, i, klvs.len());
        }
        writeln!(
            out,
            "#{} klv @{} with size {}: data-len: {} @{}",
            i,
            klv.at,
            klv.size(),
            klv.length,
            klv.value_start
        )?;
    }
    Ok(())
}

fn format_meta(meta: &PackMeta) -> String {
    format!(
        "{{kag: {}, this: {}, previous: {}, footer: {}, header-bytes: {}, index-bytes: {}, \
         index-sid: {}, body-offset: {}, body-sid: {}}}",
        meta.kag_size,
        meta.this_partition,
        meta.previous_partition,
        meta.footer_partition,
        meta.header_byte_count,
        meta.index_byte_count,
        meta.index_sid,
        meta.body_offset,
        meta.body_sid
    )
}

/// Every non-fill triplet counts, classified or not.
fn valid_klvs(partition: &Partition) -> usize {
    partition.sub().len()
}

fn write_partition(
    out: &mut impl Write,
    config: &ReportConfig,
    partition: &Partition,
) -> io::Result<()> {
    writeln!(
        out,
        "{} closed={}, completed={}, nContainers: {}, meta: {}",
        style(format!("== {}:", partition.kind())).cyan().bold(),
        partition.closed(),
        partition.completed(),
        partition.essence_containers().len(),
        format_meta(partition.meta())
    )?;

    if partition.kind() == PartitionKind::Header {
        let op = partition
            .operational_pattern()
            .and_then(|op| op.short_name())
            .unwrap_or_else(|| "invalid".to_string());
        writeln!(out, "   OP: {}", style(op).yellow())?;
        for (i, label) in partition.essence_containers().labels().enumerate() {
            writeln!(out, "   EC[{}]: {}", i, label)?;
        }
    }

    if config.level >= 3 {
        let limit = config.limit();
        let mut shown = 0;
        for (i, entry) in partition.sub().iter().enumerate() {
            if !entry.class.is_known() && !config.show_unknown {
                continue;
            }
            if shown == limit {
                fold_line(out, i, partition.sub().len())?;
                break;
            }
            shown += 1;
            writeln!(
                out,
                "|   #{} klv {} @{} with size {}: data-len: {} @{}",
                i,
                klv_name(entry),
                entry.klv.at,
                entry.klv.size(),
                entry.klv.length,
                entry.klv.value_start
            )?;
        }
    }

    writeln!(out, "|-- total {} valid KLVs", valid_klvs(partition))
}

/// Write the partition tree (level 2 and up).
pub fn write_partitions(out: &mut impl Write, config: &ReportConfig, file: &File) -> io::Result<()> {
    if !file.run_in.is_empty() {
        writeln!(
            out,
            "{} {} KLVs before the header partition",
            style("== RunIn:").cyan().bold(),
            file.run_in.len()
        )?;
    }
    for partition in file.partitions() {
        write_partition(out, config, partition)?;
    }
    Ok(())
}

// =============================================================================
// JSON
// =============================================================================

/// One KLV in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct KlvInfo {
    /// Index in the scan, or in the partition for partition listings.
    pub index: usize,
    /// Classified name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key as dotted hex.
    pub key: String,
    /// Offset of the key.
    pub offset: u64,
    /// Total size (key + length + value).
    pub size: u64,
    /// Value length.
    pub length: u64,
    /// Offset of the value.
    pub value_offset: u64,
}

impl KlvInfo {
    fn new(index: usize, klv: &Klv, name: Option<String>) -> Self {
        KlvInfo {
            index,
            name,
            key: klv.key.to_string(),
            offset: klv.at,
            size: klv.size(),
            length: klv.length,
            value_offset: klv.value_start,
        }
    }
}

/// Partition pack fields in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct MetaInfo {
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
}

impl From<&PackMeta> for MetaInfo {
    fn from(meta: &PackMeta) -> Self {
        MetaInfo {
            kag_size: meta.kag_size,
            this_partition: meta.this_partition,
            previous_partition: meta.previous_partition,
            footer_partition: meta.footer_partition,
            header_byte_count: meta.header_byte_count,
            index_byte_count: meta.index_byte_count,
            index_sid: meta.index_sid,
            body_offset: meta.body_offset,
            body_sid: meta.body_sid,
        }
    }
}

/// One partition in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionInfo {
    /// Header, Body or Footer.
    pub kind: String,
    pub closed: bool,
    pub completed: bool,
    /// Operational pattern short name, when the pack carries a valid one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operational_pattern: Option<String>,
    /// Essence container labels.
    pub essence_containers: Vec<String>,
    pub meta: MetaInfo,
    /// Number of non-fill KLVs.
    pub valid_klvs: usize,
    /// KLVs inside the partition (level 3).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub klvs: Vec<KlvInfo>,
}

impl PartitionInfo {
    fn new(config: &ReportConfig, partition: &Partition) -> Self {
        let klvs = if config.level >= 3 {
            partition
                .sub()
                .iter()
                .enumerate()
                .filter(|(_, k)| k.class.is_known() || config.show_unknown)
                .map(|(i, k)| KlvInfo::new(i, &k.klv, Some(klv_name(k))))
                .collect()
        } else {
            Vec::new()
        };

        PartitionInfo {
            kind: partition.kind().to_string(),
            closed: partition.closed(),
            completed: partition.completed(),
            operational_pattern: partition.operational_pattern().and_then(|op| op.short_name()),
            essence_containers: partition
                .essence_containers()
                .labels()
                .map(|ul| ul.to_string())
                .collect(),
            meta: partition.meta().into(),
            valid_klvs: valid_klvs(partition),
            klvs,
        }
    }
}

/// Full JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// File path.
    pub file: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Number of KLVs scanned.
    pub total_klvs: usize,
    /// Flat KLV list (level 1, or when assembly failed).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub klvs: Vec<KlvInfo>,
    /// KLVs before the header partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_in: Option<usize>,
    /// Partition tree (level 2 and up).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionInfo>,
    /// Requested KLV detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailReport>,
    /// Assembly error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    /// Build a report; `file` is `None` when assembly failed.
    pub fn new(
        config: &ReportConfig,
        file_name: &str,
        file_size: u64,
        klvs: &[Klv],
        file: Option<&File>,
    ) -> Self {
        let flat = file.is_none() || config.level <= 1;
        FileReport {
            file: file_name.to_string(),
            size_bytes: file_size,
            total_klvs: klvs.len(),
            klvs: if flat {
                klvs.iter()
                    .enumerate()
                    .map(|(i, k)| KlvInfo::new(i, k, None))
                    .collect()
            } else {
                Vec::new()
            },
            run_in: file
                .map(|f| f.run_in.len())
                .filter(|&n| n > 0 && config.level >= 2),
            partitions: match file {
                Some(file) if config.level >= 2 => file
                    .partitions()
                    .map(|p| PartitionInfo::new(config, p))
                    .collect(),
                _ => Vec::new(),
            },
            detail: None,
            error: None,
        }
    }
}
