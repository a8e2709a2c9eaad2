use std::path::PathBuf;

use anyhow::{Context, Result};
use bhive_core::config::RUN_DB_FILE_NAME;
use bhive_core::db::RunDb;
use clap::Args;

use crate::{default_output_dir, flag_or_env};

/// Arguments for the `runs` command.
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Only show runs for this architecture code (e.g. hsw).
    #[arg(long)]
    pub arch: Option<String>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Output directory holding the run database. Falls back to
    /// BHIVE_OUTPUT_DIR, then the current directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// List recorded conversion runs in insertion order.
pub fn runs_command(args: RunsArgs) -> Result<()> {
    let output_dir =
        flag_or_env(args.output_dir, "BHIVE_OUTPUT_DIR").unwrap_or_else(default_output_dir);
    let db_path = output_dir.join(RUN_DB_FILE_NAME);

    if !db_path.is_file() {
        println!("No runs recorded yet ({} does not exist).", db_path.display());
        return Ok(());
    }

    let db = RunDb::open(&db_path)
        .with_context(|| format!("Failed to open run database at {}", db_path.display()))?;
    let runs = db.list_runs(args.arch.as_deref()).context("Failed to list runs")?;

    if args.json {
        let serialized =
            serde_json::to_string_pretty(&runs).context("Failed to serialize runs to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Runs ({}):", runs.len());
    if runs.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for run in runs {
        let dataset = run.dataset_path.as_deref().unwrap_or("-");
        println!(
            "  - {} [{}] read={} excluded={} failed={} written={} dataset={} finished={}",
            run.arch,
            run.status.as_str(),
            run.blocks_read,
            run.blocks_excluded,
            run.tool_failures,
            run.blocks_written,
            dataset,
            run.finished_at
        );
    }

    Ok(())
}
