//! mxfkit CLI - inspect the KLV and partition structure of MXF files.

mod detail;
mod report;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mxfkit::{
    assemble, assemble_parallel, scan, ByteSource, File, FileSource, Klv, MmapSource, MxfError,
    ScanOptions,
};
use tracing::{debug, info};

use crate::detail::Koi;
use crate::report::{FileReport, ReportConfig};

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Text report.
    Normal,
    /// JSON report for programmatic parsing.
    Json,
    /// Summary line and KOI detail only.
    Quiet,
    /// Text report with debug logging.
    Verbose,
}

/// Command-line arguments for the mxfkit tool.
#[derive(Parser, Debug)]
#[command(name = "mxfkit")]
#[command(version)]
#[command(about = "Inspect the KLV and partition structure of MXF files")]
#[command(long_about = "mxfkit scans an MXF (SMPTE 377M) file into KLV triplets and \n\
    groups them into header, body and footer partitions.\n\n\
    EXAMPLES:\n    \
    mxfkit input.mxf\n    \
    mxfkit input.mxf -l 3 -m 0\n    \
    mxfkit input.mxf -l 2 -i h:3\n    \
    mxfkit input.mxf -i b0:1:r256\n    \
    mxfkit input.mxf -l 2 --json")]
struct Args {
    /// MXF file to inspect
    file: PathBuf,

    /// Maximum number of KLVs to read (default or 0: all)
    #[arg(short = 'n', long = "read")]
    read: Option<usize>,

    /// Report level: 1 = KLV list, 2 = partitions, 3 = partitions with KLVs
    #[arg(short, long, default_value = "1")]
    level: u8,

    /// List unknown KLVs at level 3
    #[arg(short = 'u', long)]
    show_unknown: bool,

    /// KLVs listed before folding (0 = unlimited)
    #[arg(short, long, default_value = "32")]
    max: usize,

    /// KLV of interest to dump, as {part}[n]:{idx}[:{style}[limit]]
    /// (part h, f or b<n>; style a, s or r)
    #[arg(short = 'i', long = "detail")]
    detail: Option<Koi>,

    /// Memory-map the file instead of using positioned reads
    #[arg(long)]
    mmap: bool,

    /// Decode partition packs on the thread pool
    #[arg(long)]
    parallel: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, conflicts_with = "quiet", conflicts_with = "json")]
    verbose: bool,

    /// Quiet mode (summary line and KOI detail only)
    #[arg(short, long, conflicts_with = "verbose", conflicts_with = "json")]
    quiet: bool,

    /// JSON output mode for programmatic parsing
    #[arg(long, conflicts_with = "verbose", conflicts_with = "quiet")]
    json: bool,
}

impl Args {
    /// Determine the output mode based on flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }

    fn report_config(&self) -> ReportConfig {
        ReportConfig {
            level: self.level,
            max: self.max,
            show_unknown: self.show_unknown,
        }
    }

    fn scan_options(&self) -> ScanOptions {
        match self.read {
            Some(n) if n > 0 => ScanOptions::with_max_elements(n),
            _ => ScanOptions::default(),
        }
    }

    fn open_source(&self) -> anyhow::Result<Box<dyn ByteSource>> {
        let source: Box<dyn ByteSource> = if self.mmap {
            Box::new(
                MmapSource::open(&self.file)
                    .with_context(|| format!("failed to map {}", self.file.display()))?,
            )
        } else {
            Box::new(
                FileSource::open(&self.file)
                    .with_context(|| format!("failed to open {}", self.file.display()))?,
            )
        };
        Ok(source)
    }
}

/// Write the text report for a decoded file.
fn print_text(
    out: &mut impl Write,
    args: &Args,
    mode: OutputMode,
    source: &dyn ByteSource,
    klvs: &[Klv],
    file: &File,
) -> anyhow::Result<()> {
    let config = args.report_config();
    let name = args.file.display().to_string();

    if mode == OutputMode::Quiet || config.level >= 2 {
        writeln!(
            out,
            "total {} klv read from file {} with size {} bytes",
            klvs.len(),
            name,
            source.size()
        )?;
    }
    if mode != OutputMode::Quiet {
        if config.level <= 1 {
            report::write_klv_list(out, &config, &name, source.size(), klvs)?;
        } else {
            report::write_partitions(out, &config, file)?;
        }
    }

    if let Some(koi) = &args.detail {
        let detail = detail::inspect(source, file, koi)?;
        detail::write_detail(out, &detail)?;
    }
    Ok(())
}

/// Write what is still known when the partitions don't line up: the flat
/// KLV list, or a JSON report carrying the list and the error.
fn write_failure(
    out: &mut impl Write,
    mode: OutputMode,
    config: &ReportConfig,
    name: &str,
    size: u64,
    klvs: &[Klv],
    err: &MxfError,
) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let mut report = FileReport::new(config, name, size, klvs, None);
        report.error = Some(err.to_string());
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        report::write_klv_list(out, config, name, size, klvs)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    let output_mode = args.output_mode();

    // Initialize logging (not in JSON or quiet mode)
    if output_mode != OutputMode::Json && output_mode != OutputMode::Quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(if args.verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })
            .with_target(false)
            .with_writer(io::stderr)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    let source = args.open_source()?;
    let source: &dyn ByteSource = &*source;
    debug!("{} is {} bytes", args.file.display(), source.size());

    let klvs = scan(source, args.scan_options())
        .with_context(|| format!("failed to scan {}", args.file.display()))?;

    let assembled = if args.parallel {
        assemble_parallel(source, &klvs)
    } else {
        assemble(source, &klvs)
    };

    let config = args.report_config();
    let name = args.file.display().to_string();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let file = match assembled {
        Ok(file) => file,
        Err(e) => {
            write_failure(&mut out, output_mode, &config, &name, source.size(), &klvs, &e)?;
            return Err(e).context("failed to assemble partitions");
        }
    };
    info!(
        "{} partitions, {} KLVs",
        file.partitions().count(),
        file.klv_count()
    );

    if output_mode == OutputMode::Json {
        let mut report = FileReport::new(&config, &name, source.size(), &klvs, Some(&file));
        if let Some(koi) = &args.detail {
            report.detail = Some(detail::inspect(source, &file, koi)?);
        }
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        print_text(&mut out, &args, output_mode, source, &klvs, &file)?;
    }

    Ok(())
}
