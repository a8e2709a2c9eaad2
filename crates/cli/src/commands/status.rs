use std::path::{Path, PathBuf};

use anyhow::Result;
use bhive_core::config::{DataLayout, TOKENIZER_RELATIVE_PATH};
use bhive_core::model::MicroArch;
use clap::Args;

use crate::{default_data_dir, default_output_dir, flag_or_env};

/// Arguments for the `status` command.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Benchmark data directory. Falls back to BHIVE_DATA_DIR, then
    /// `bhive/benchmark`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Output directory. Falls back to BHIVE_OUTPUT_DIR, then the current
    /// directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Disassembler executable override.
    #[arg(long)]
    pub disasm: Option<PathBuf>,

    /// Tokenizer executable override.
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Ithemal checkout override.
    #[arg(long)]
    pub ithemal_home: Option<PathBuf>,

    /// DynamoRIO installation override.
    #[arg(long)]
    pub dynamorio_home: Option<PathBuf>,
}

/// Report which inputs, tools, and outputs are present on this machine.
///
/// Unlike `run`, nothing here is an error; every location is reported as
/// OK or MISSING and the command always exits successfully.
pub fn status_command(args: StatusArgs) -> Result<()> {
    let data_dir = flag_or_env(args.data_dir, "BHIVE_DATA_DIR").unwrap_or_else(default_data_dir);
    let output_dir =
        flag_or_env(args.output_dir, "BHIVE_OUTPUT_DIR").unwrap_or_else(default_output_dir);
    let layout = DataLayout::new(&data_dir, &output_dir);

    println!("bhive-prep v{}", bhive_core::version());
    println!("Data dir: {}", layout.data_dir.display());
    println!("Output dir: {}", layout.output_dir.display());
    println!();

    println!("Inputs:");
    for arch in MicroArch::all() {
        print_file_status(&format!("{arch} block table"), &layout.block_table_path(arch));
    }
    print_file_status("Exclusion table", &layout.exclusion_path);
    println!();

    // Tool locations resolve like `run`, except that missing homes are
    // reported rather than rejected.
    let ithemal_home = flag_or_env(args.ithemal_home, "ITHEMAL_HOME");
    let dynamorio_home = flag_or_env(args.dynamorio_home, "DYNAMORIO_HOME");
    let disasm =
        flag_or_env(args.disasm, "BHIVE_DISASM").unwrap_or_else(|| layout.default_disasm_path());
    let tokenizer = flag_or_env(args.tokenizer, "BHIVE_TOKENIZER")
        .or_else(|| ithemal_home.as_ref().map(|home| home.join(TOKENIZER_RELATIVE_PATH)));

    println!("Toolchain:");
    print_file_status("Disassembler", &disasm);
    match &tokenizer {
        Some(path) => print_file_status("Tokenizer", path),
        None => println!("- Tokenizer: MISSING (set --tokenizer or ITHEMAL_HOME)"),
    }
    print_home_status("ITHEMAL_HOME", ithemal_home.as_deref());
    print_home_status("DYNAMORIO_HOME", dynamorio_home.as_deref());
    println!();

    println!("Outputs:");
    print_file_status("Run database", &layout.run_db_path);
    for arch in MicroArch::all() {
        print_file_status(&format!("{arch} dataset"), &layout.dataset_path(arch));
    }

    Ok(())
}

/// Helper to print whether a file exists.
fn print_file_status(label: &str, path: &Path) {
    let exists = path.is_file();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}

/// Helper to print whether a configured home directory exists.
fn print_home_status(label: &str, path: Option<&Path>) {
    match path {
        Some(path) => {
            let exists = path.is_dir();
            println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
        }
        None => println!("- {label}: MISSING (not configured)"),
    }
}
