use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bhive_core::config::{DataLayout, RunConfig, ToolchainConfig, DEFAULT_TOOL_TIMEOUT};
use bhive_core::model::MicroArch;
use bhive_core::pipeline;
use bhive_core::toolchain::CommandToolchain;
use clap::Args;

use crate::{default_data_dir, default_output_dir, flag_or_env};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Architecture code of the block table to convert (hsw, ivb, or skl).
    pub architecture: String,

    /// Maximum number of blocks to convert. 0, or omitting it, converts all.
    pub limit: Option<u64>,

    /// Worker threads for the processing stage. Defaults to one per core.
    pub num_workers: Option<usize>,

    /// Benchmark data directory. Falls back to BHIVE_DATA_DIR, then
    /// `bhive/benchmark`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Exclusion table. Defaults to `unreliable.csv` under the data directory.
    #[arg(long)]
    pub exclusions: Option<PathBuf>,

    /// Output directory for the dataset artifact and the run database.
    /// Falls back to BHIVE_OUTPUT_DIR, then the current directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Disassembler executable. Falls back to BHIVE_DISASM, then `disasm`
    /// under the data directory.
    #[arg(long)]
    pub disasm: Option<PathBuf>,

    /// Tokenizer executable. Falls back to BHIVE_TOKENIZER, then the
    /// conventional location inside the Ithemal checkout.
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Ithemal checkout directory. Falls back to ITHEMAL_HOME.
    #[arg(long)]
    pub ithemal_home: Option<PathBuf>,

    /// DynamoRIO installation directory. Falls back to DYNAMORIO_HOME.
    #[arg(long)]
    pub dynamorio_home: Option<PathBuf>,

    /// Seconds to wait for a single tool invocation before killing it.
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT.as_secs())]
    pub tool_timeout_secs: u64,
}

/// Convert one architecture's block table into a dataset artifact.
pub fn run_command(args: RunArgs) -> Result<()> {
    // Reject bad arguments before touching the filesystem.
    let arch = MicroArch::from_str(&args.architecture)?;
    if args.num_workers == Some(0) {
        bail!("num_workers must be at least 1");
    }

    // Resolve the data layout from flags and environment.
    let data_dir = flag_or_env(args.data_dir, "BHIVE_DATA_DIR").unwrap_or_else(default_data_dir);
    let output_dir =
        flag_or_env(args.output_dir, "BHIVE_OUTPUT_DIR").unwrap_or_else(default_output_dir);

    let mut layout = DataLayout::new(&data_dir, &output_dir);
    if let Some(path) = args.exclusions {
        layout.exclusion_path = path;
    }

    // Resolve tool locations the same way and check them up front.
    let toolchain_config = ToolchainConfig::build(
        &layout,
        flag_or_env(args.disasm, "BHIVE_DISASM"),
        flag_or_env(args.tokenizer, "BHIVE_TOKENIZER"),
        flag_or_env(args.ithemal_home, "ITHEMAL_HOME"),
        flag_or_env(args.dynamorio_home, "DYNAMORIO_HOME"),
        Duration::from_secs(args.tool_timeout_secs),
    )?;
    toolchain_config.validate()?;

    fs::create_dir_all(&layout.output_dir).with_context(|| {
        format!("Failed to create output directory: {}", layout.output_dir.display())
    })?;

    let run_config =
        RunConfig { arch, limit: args.limit.unwrap_or(0), workers: args.num_workers };

    let toolchain = CommandToolchain::new(toolchain_config);
    let report = pipeline::run(&layout, &toolchain, &run_config)?;

    let summary = report.summary;
    println!("Converted block table for {}:", report.arch);
    println!("  Blocks read: {}", summary.blocks_read);
    println!("  Excluded: {}", summary.blocks_excluded);
    println!("  Malformed rows: {}", summary.rows_malformed);
    println!("  Duplicate ids: {}", summary.duplicate_ids);
    println!("  Tool failures: {}", summary.tool_failures);
    println!("  Blocks written: {}", summary.blocks_written);
    match &report.dataset_path {
        Some(path) => println!("  Dataset: {}", path.display()),
        None => println!("  Dataset: (skipped, nothing to save)"),
    }
    println!("  Elapsed: {:.2}s", report.elapsed.as_secs_f64());

    Ok(())
}
