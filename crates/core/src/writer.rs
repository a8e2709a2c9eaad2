//! Dataset artifact serialization with an atomicity contract: the canonical
//! path either holds a complete artifact or nothing at all.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::ProcessedBlockRecord;

/// Fatal serialization/persistence failure. Aborts the run.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write dataset at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize dataset for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize `records` as JSON to `path`.
///
/// Writes to `<path>.tmp` and renames into place once the write completes,
/// so a failure part-way never leaves a partial artifact at the canonical
/// path. The temporary file is removed on failure, best effort.
pub fn write_dataset(records: &[ProcessedBlockRecord], path: &Path) -> Result<(), WriteError> {
    let tmp_path = tmp_path_for(path);
    let result = write_to_tmp_and_rename(records, &tmp_path, path);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_to_tmp_and_rename(
    records: &[ProcessedBlockRecord],
    tmp_path: &Path,
    path: &Path,
) -> Result<(), WriteError> {
    let file = File::create(tmp_path)
        .map_err(|source| WriteError::Io { path: path.to_path_buf(), source })?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, records)
        .map_err(|source| WriteError::Serialize { path: path.to_path_buf(), source })?;

    writer
        .into_inner()
        .map_err(|e| WriteError::Io { path: path.to_path_buf(), source: e.into_error() })?;

    fs::rename(tmp_path, path)
        .map_err(|source| WriteError::Io { path: path.to_path_buf(), source })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.tmp")),
        None => path.with_extension("tmp"),
    }
}
