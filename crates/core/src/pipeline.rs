//! End-to-end conversion pipeline.
//!
//! Ties the stages together: load the exclusion table, read the raw
//! block table, run every surviving block through the toolchain on a
//! worker pool, and write the ordered dataset artifact. Tool failures
//! skip the affected block; everything else aborts the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ConfigError, DataLayout, RunConfig};
use crate::db::{ConversionRunRecord, RunDb, RunStatus};
use crate::exclusion::load_exclusions;
use crate::model::{ProcessedBlockRecord, RawBlockRecord};
use crate::reader::{read_block_table, ReadError};
use crate::toolchain::{BlockToolchain, ToolResult};
use crate::writer::{write_dataset, WriteError};

/// Fatal pipeline error. Per-block tool failures are not represented
/// here; they are counted in [`RunSummary::tool_failures`] instead.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration problem (unreadable exclusion table, missing tool).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The block table could not be read.
    #[error(transparent)]
    Input(#[from] ReadError),

    /// The dataset artifact could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// The worker pool could not be constructed.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Counters accumulated over one conversion run.
///
/// The counts satisfy
/// `blocks_written = blocks_read - blocks_excluded - tool_failures`
/// whenever the run completes. Malformed rows and duplicate ids are
/// reported separately and are not part of `blocks_read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub blocks_read: u64,
    pub blocks_excluded: u64,
    pub rows_malformed: u64,
    pub duplicate_ids: u64,
    pub tool_failures: u64,
    pub blocks_written: u64,
}

/// Outcome of a completed conversion run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub arch: crate::model::MicroArch,
    pub summary: RunSummary,
    /// Path of the written artifact, or `None` when no block survived
    /// and the write was skipped.
    pub dataset_path: Option<PathBuf>,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed: Duration,
}

/// Run the full conversion for one architecture.
///
/// The output directory named by `layout` must already exist. The run
/// is recorded in the run database on a best-effort basis, including
/// runs that fail partway through.
pub fn run(
    layout: &DataLayout,
    toolchain: &dyn BlockToolchain,
    config: &RunConfig,
) -> Result<RunReport, RunError> {
    let started_at = Utc::now().to_rfc3339();
    let started = Instant::now();
    let mut summary = RunSummary::default();
    let mut table_sha256 = None;

    let result = run_stages(layout, toolchain, config, &mut summary, &mut table_sha256);
    let finished_at = Utc::now().to_rfc3339();
    let elapsed = started.elapsed();

    let (status, dataset_path) = match &result {
        Ok(path) => {
            let status = if summary.tool_failures > 0 {
                RunStatus::Partial
            } else {
                RunStatus::Succeeded
            };
            (status, path.clone())
        }
        Err(_) => (RunStatus::Failed, None),
    };

    let record = ConversionRunRecord {
        arch: config.arch.code().to_string(),
        status,
        blocks_read: summary.blocks_read,
        blocks_excluded: summary.blocks_excluded,
        rows_malformed: summary.rows_malformed,
        duplicate_ids: summary.duplicate_ids,
        tool_failures: summary.tool_failures,
        blocks_written: summary.blocks_written,
        block_limit: config.limit,
        workers: config.workers.map(|w| w as u64),
        dataset_path: dataset_path.as_ref().map(|p| p.display().to_string()),
        table_sha256,
        started_at: started_at.clone(),
        finished_at: finished_at.clone(),
    };
    record_run(&layout.run_db_path, &record);

    let dataset_path = result?;
    Ok(RunReport {
        arch: config.arch,
        summary,
        dataset_path,
        started_at,
        finished_at,
        elapsed,
    })
}

/// The stage sequence proper. Counters and the table hash are written
/// through out-parameters so a failed run still reports whatever the
/// earlier stages counted.
fn run_stages(
    layout: &DataLayout,
    toolchain: &dyn BlockToolchain,
    config: &RunConfig,
    summary: &mut RunSummary,
    table_sha256: &mut Option<String>,
) -> Result<Option<PathBuf>, RunError> {
    // Load the exclusion table.
    info!("loading exclusions from {}", layout.exclusion_path.display());
    let exclusions = load_exclusions(&layout.exclusion_path)?;

    // Read the raw block table for the requested architecture.
    let table_path = layout.block_table_path(config.arch);
    info!("reading block table {}", table_path.display());
    let scan = read_block_table(&table_path, &exclusions, config.limit)?;
    summary.blocks_read = scan.blocks_read();
    summary.blocks_excluded = scan.excluded;
    summary.rows_malformed = scan.malformed;
    summary.duplicate_ids = scan.duplicates;

    *table_sha256 = match sha256_file(&table_path) {
        Ok(hash) => Some(hash),
        Err(err) => {
            warn!("failed to hash {}: {}", table_path.display(), err);
            None
        }
    };

    // Disassemble and tokenize every surviving block on a worker pool.
    let records = scan.records;
    info!("processing {} blocks", records.len());
    let pb = default_progress_bar(records.len() as u64);

    let process = || {
        records
            .into_par_iter()
            .enumerate()
            .map(|(idx, block)| {
                let outcome = process_block(toolchain, &block);
                if let Err(err) = &outcome {
                    warn!("skipping block {}: {}", block.block_id, err);
                }
                pb.inc(1);
                (idx, outcome)
            })
            .collect::<Vec<_>>()
    };

    let mut outcomes = if let Some(n) = config.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|err| RunError::WorkerPool(err.to_string()))?
            .install(process)
    } else {
        process()
    };

    pb.finish_and_clear();

    // Restore the original table order before writing.
    outcomes.sort_by_key(|(idx, _)| *idx);

    let mut dataset = Vec::new();
    for (_, outcome) in outcomes {
        match outcome {
            Ok(record) => dataset.push(record),
            Err(_) => summary.tool_failures += 1,
        }
    }

    if dataset.is_empty() {
        warn!("no blocks survived processing; skipping dataset write");
        return Ok(None);
    }

    // Write the ordered dataset artifact.
    let dataset_path = layout.dataset_path(config.arch);
    info!("writing {} records to {}", dataset.len(), dataset_path.display());
    write_dataset(&dataset, &dataset_path)?;
    summary.blocks_written = dataset.len() as u64;

    Ok(Some(dataset_path))
}

/// Convert one raw block through both tools.
fn process_block(
    toolchain: &dyn BlockToolchain,
    block: &RawBlockRecord,
) -> ToolResult<ProcessedBlockRecord> {
    let disasm = toolchain.disassemble(&block.hex)?;
    let tokens = toolchain.tokenize(&block.hex)?;
    Ok(ProcessedBlockRecord {
        block_id: block.block_id.clone(),
        throughput: block.throughput,
        asm_intel: disasm.intel,
        asm_xml: disasm.xml,
        tokens,
    })
}

/// Record the run in the history database. Failures are logged and
/// otherwise ignored; history must never abort a conversion.
fn record_run(db_path: &Path, record: &ConversionRunRecord) {
    let result = RunDb::open(db_path).and_then(|db| db.insert_run(record));
    if let Err(err) = result {
        warn!("failed to record run in {}: {}", db_path.display(), err);
    }
}

fn default_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap(),
    );
    pb
}

fn sha256_file(path: &Path) -> io::Result<String> {
    use sha2::{Digest, Sha256};

    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
