//! Run configuration: on-disk layout of benchmark data and the external
//! toolchain locations, resolved once by the frontend and passed in
//! explicitly. Nothing in this crate reads process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::model::MicroArch;

/// Default wait for a single external-tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Relative path of the tokenizer binary inside an Ithemal checkout.
pub const TOKENIZER_RELATIVE_PATH: &str = "data_collection/build/bin/tokenizer";

/// File name of the run-history database inside the output directory.
pub const RUN_DB_FILE_NAME: &str = "runs.db";

/// Configuration errors: misconfigured tool locations or an unreadable
/// exclusion table. All of these abort a run before any block is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The exclusion table exists but could not be read.
    #[error("exclusion table at {path} is unreadable: {source}")]
    ExclusionUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required tool executable is missing.
    #[error("{tool} executable not found at {path}")]
    ToolMissing { tool: &'static str, path: PathBuf },

    /// One of the tokenizer's required locations was never configured.
    #[error("required location {name} is not configured")]
    HomeMissing { name: &'static str },

    /// A configured tokenizer location does not exist on disk.
    #[error("{name} points at {path}, which does not exist")]
    HomeNotFound { name: &'static str, path: PathBuf },
}

/// Logical layout of the benchmark data and outputs on disk.
///
/// Derived from a data directory and an output directory; performs no IO
/// itself. Frontends create directories and override `exclusion_path` as
/// needed before handing the layout to the pipeline.
#[derive(Debug, Clone)]
pub struct DataLayout {
    /// Root of the benchmark data checkout.
    pub data_dir: PathBuf,
    /// Directory holding the per-architecture block tables.
    pub throughput_dir: PathBuf,
    /// Table of block identifiers to exclude from every run.
    pub exclusion_path: PathBuf,
    /// Directory the dataset artifact and run DB are written to.
    pub output_dir: PathBuf,
    /// Run-history database file.
    pub run_db_path: PathBuf,
}

impl DataLayout {
    /// Compute the default layout under `data_dir`, writing into `output_dir`.
    pub fn new(data_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let output_dir = output_dir.as_ref().to_path_buf();
        let throughput_dir = data_dir.join("throughput");
        let exclusion_path = data_dir.join("unreliable.csv");
        let run_db_path = output_dir.join(RUN_DB_FILE_NAME);

        Self { data_dir, throughput_dir, exclusion_path, output_dir, run_db_path }
    }

    /// Block table for an architecture (`throughput/<code>.csv`).
    pub fn block_table_path(&self, arch: MicroArch) -> PathBuf {
        self.throughput_dir.join(arch.table_file_name())
    }

    /// Final artifact path for an architecture (`bhive_<code>.data`).
    pub fn dataset_path(&self, arch: MicroArch) -> PathBuf {
        self.output_dir.join(arch.dataset_file_name())
    }

    /// Default disassembler location shipped alongside the benchmark data.
    pub fn default_disasm_path(&self) -> PathBuf {
        self.data_dir.join("disasm")
    }
}

/// Locations and limits for the two external tools.
///
/// The tokenizer needs its own checkout (`ithemal_home`) and the supporting
/// instrumentation toolkit (`dynamorio_home`); both are exported into each
/// tokenizer subprocess's environment.
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub disasm: PathBuf,
    pub tokenizer: PathBuf,
    pub ithemal_home: PathBuf,
    pub dynamorio_home: PathBuf,
    pub tool_timeout: Duration,
}

impl ToolchainConfig {
    /// Assemble a toolchain config from optional overrides, deriving what is
    /// derivable and failing on what is not.
    ///
    /// `disasm` falls back to the layout's bundled disassembler; `tokenizer`
    /// falls back to the conventional path inside `ithemal_home`. Both homes
    /// must be supplied; the frontend is responsible for merging flags and
    /// environment before calling this.
    pub fn build(
        layout: &DataLayout,
        disasm: Option<PathBuf>,
        tokenizer: Option<PathBuf>,
        ithemal_home: Option<PathBuf>,
        dynamorio_home: Option<PathBuf>,
        tool_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let ithemal_home =
            ithemal_home.ok_or(ConfigError::HomeMissing { name: "ITHEMAL_HOME" })?;
        let dynamorio_home =
            dynamorio_home.ok_or(ConfigError::HomeMissing { name: "DYNAMORIO_HOME" })?;

        let disasm = disasm.unwrap_or_else(|| layout.default_disasm_path());
        let tokenizer = tokenizer.unwrap_or_else(|| ithemal_home.join(TOKENIZER_RELATIVE_PATH));

        Ok(Self { disasm, tokenizer, ithemal_home, dynamorio_home, tool_timeout })
    }

    /// Check that every configured location actually exists.
    ///
    /// Run once before any block is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.disasm.is_file() {
            return Err(ConfigError::ToolMissing { tool: "disassembler", path: self.disasm.clone() });
        }
        if !self.tokenizer.is_file() {
            return Err(ConfigError::ToolMissing { tool: "tokenizer", path: self.tokenizer.clone() });
        }
        if !self.ithemal_home.is_dir() {
            return Err(ConfigError::HomeNotFound {
                name: "ITHEMAL_HOME",
                path: self.ithemal_home.clone(),
            });
        }
        if !self.dynamorio_home.is_dir() {
            return Err(ConfigError::HomeNotFound {
                name: "DYNAMORIO_HOME",
                path: self.dynamorio_home.clone(),
            });
        }
        Ok(())
    }
}

/// Per-run parameters supplied on the command line.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub arch: MicroArch,
    /// Maximum number of blocks to process; 0 means all.
    pub limit: u64,
    /// Worker-pool size; `None` means one worker per processing unit.
    pub workers: Option<usize>,
}
