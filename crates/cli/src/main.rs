use anyhow::Result;
use bhive_prep::commands::{run_command, runs_command, status_command, RunArgs, RunsArgs, StatusArgs};
use clap::{Parser, Subcommand};

/// Basic-block throughput dataset preparation CLI.
///
/// This CLI is a thin wrapper around `bhive-core` (exposed in code as `bhive_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "bhive-prep",
    version,
    about = "Convert basic-block throughput benchmarks into training datasets",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one architecture's block table into a dataset artifact.
    ///
    /// Reads `throughput/<arch>.csv` under the data directory, disassembles
    /// and tokenizes every non-excluded block, and writes `bhive_<arch>.data`
    /// into the output directory.
    Run(RunArgs),

    /// Report which inputs, tools, and outputs are present on this machine.
    Status(StatusArgs),

    /// List recorded conversion runs from the run database.
    Runs(RunsArgs),
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // Default to the Status command if none is provided.
    match cli.command.unwrap_or(Command::Status(StatusArgs::default())) {
        Command::Run(args) => run_command(args)?,
        Command::Status(args) => status_command(args)?,
        Command::Runs(args) => runs_command(args)?,
    }

    Ok(())
}
