//! zipship — checksum-gated dependency archives for Python projects.
//!
//! # Usage
//!
//! ```text
//! zipship build [<project>] [--output <path>] [--deploy-folder <name>] [--no-sync] [--optimize <n>]
//! zipship compile [<project>] [--output <path>] [--optimize <n>]
//! zipship deploy <archive> [--into <dir>]
//! zipship inspect <archive> [--json]
//! ```
//!
//! Exit status: `0` success or nothing to do, `1` failure, `2` usage,
//! `3` dependency resolution failed, `4` output locked, `5` archive assembly
//! failed, `6` deploy failed, `99` bytecode precompilation failed.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{build::BuildArgs, compile::CompileArgs, deploy::DeployArgs, inspect::InspectArgs};
use zipship_build::BuildError;
use zipship_deploy::DeployError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "zipship",
    version,
    about = "Build and deploy checksum-gated dependency archives for Python projects",
    long_about = None,
)]
struct Cli {
    /// Log debug detail (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the dependency archive from the project's virtual environment.
    Build(BuildArgs),

    /// Archive the project's own package as compiled bytecode.
    Compile(CompileArgs),

    /// Synchronise a deploy folder from a dependency archive.
    Deploy(DeployArgs),

    /// Print the metadata record embedded in an archive.
    Inspect(InspectArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<()> = match cli.command {
        Commands::Build(args) => args.run(),
        Commands::Compile(args) => args.run(),
        Commands::Deploy(args) => args.run(),
        Commands::Inspect(args) => args.run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}

/// The status of the first typed failure in the chain, else `1`.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<BuildError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<DeployError>() {
            return e.exit_code();
        }
    }
    1
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
