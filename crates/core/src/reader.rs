//! Streaming reader for the per-architecture block tables
//! (`throughput/<arch>.csv`).

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::exclusion::ExclusionSet;
use crate::model::{is_well_formed_hex, RawBlockRecord};

/// Errors while locating or reading a block table. Both abort the run.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The architecture's input table does not exist.
    #[error("block table not found at {0}")]
    TableNotFound(PathBuf),

    /// The table exists but reading it failed partway.
    #[error("failed to read block table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of scanning a block table: surviving records in table order plus
/// the counters for everything that was skipped along the way.
#[derive(Debug, Default)]
pub struct BlockScan {
    pub records: Vec<RawBlockRecord>,
    pub excluded: u64,
    pub malformed: u64,
    pub duplicates: u64,
}

impl BlockScan {
    /// Well-formed, non-duplicate rows scanned: yielded plus excluded.
    ///
    /// Defined this way so that
    /// `written == blocks_read() - excluded - tool failures` holds exactly;
    /// malformed rows and duplicates are reported separately.
    pub fn blocks_read(&self) -> u64 {
        self.records.len() as u64 + self.excluded
    }
}

/// Scan the block table at `path` in row order.
///
/// The first line is a header and is skipped. Each data row needs at least
/// three comma-separated fields (`block_id,throughput,hex`; extras ignored).
/// Rows that fail to parse, repeat an identifier, or hit the exclusion set
/// are counted and skipped. When `limit > 0`, scanning stops once that many
/// records have been yielded, so excluded rows never count against the
/// limit and the tail of a large table is never read.
pub fn read_block_table(
    path: &Path,
    exclusions: &ExclusionSet,
    limit: u64,
) -> Result<BlockScan, ReadError> {
    if !path.is_file() {
        return Err(ReadError::TableNotFound(path.to_path_buf()));
    }

    let file = File::open(path)
        .map_err(|source| ReadError::Io { path: path.to_path_buf(), source })?;

    let mut scan = BlockScan::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line =
            line.map_err(|source| ReadError::Io { path: path.to_path_buf(), source })?;
        if idx == 0 {
            // Header row.
            continue;
        }
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = match parse_row(trimmed) {
            Some(record) => record,
            None => {
                warn!("{}:{}: skipping malformed row", path.display(), line_no);
                scan.malformed += 1;
                continue;
            }
        };

        if !seen.insert(record.block_id.clone()) {
            warn!(
                "{}:{}: duplicate block id {}; keeping first occurrence",
                path.display(),
                line_no,
                record.block_id
            );
            scan.duplicates += 1;
            continue;
        }

        if exclusions.contains(&record.block_id) {
            debug!("block {} excluded", record.block_id);
            scan.excluded += 1;
            continue;
        }

        scan.records.push(record);
        if limit > 0 && scan.records.len() as u64 >= limit {
            break;
        }
    }

    Ok(scan)
}

/// Parse one data row into a record, enforcing the opcode-hex invariant.
fn parse_row(row: &str) -> Option<RawBlockRecord> {
    let mut fields = row.split(',');
    let block_id = fields.next()?.trim();
    let throughput = fields.next()?.trim().parse::<f64>().ok()?;
    let hex = fields.next()?.trim();

    if block_id.is_empty() || !throughput.is_finite() || !is_well_formed_hex(hex) {
        return None;
    }

    Some(RawBlockRecord {
        block_id: block_id.to_string(),
        throughput,
        hex: hex.to_string(),
    })
}
