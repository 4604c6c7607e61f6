//! `zipship build` — checksum-gated dependency archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use zipship_build::{ArchiveBuilder, BuildOptions, BuildOutcome, PythonPrecompiler, UvResolver};
use zipship_core::{Project, TracingReporter};

/// Arguments for `zipship build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project directory or `pyproject.toml`.
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Archive path (default `<project>/<name>.bin.<os>.zip`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Folder name the archive deploys into.
    #[arg(long)]
    pub deploy_folder: Option<String>,

    /// Skip synchronising the virtual environment before resolving.
    #[arg(long)]
    pub no_sync: bool,

    /// Bytecode optimisation level.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub optimize: Option<u8>,
}

impl BuildArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(&self.project)
            .with_context(|| format!("failed to load project at {}", self.project.display()))?;
        let resolver = UvResolver::from_settings(&project.settings);
        let precompiler = PythonPrecompiler::from_settings(&project.settings);
        let builder = ArchiveBuilder::new(&resolver, &precompiler, &TracingReporter);

        let options = BuildOptions {
            output: self.output,
            deploy_folder: self.deploy_folder,
            sync_environment: self.no_sync.then_some(false),
            optimize: self.optimize,
        };
        let outcome = builder
            .build(&project, &options)
            .with_context(|| format!("build failed for '{}'", project.name))?;

        match outcome {
            BuildOutcome::Built {
                archive,
                files,
                fingerprint,
            } => println!(
                "{} built {} ({files} files, checksum {fingerprint})",
                "✓".green(),
                archive.display()
            ),
            BuildOutcome::Unchanged {
                archive,
                fingerprint,
            } => println!(
                "{} {} is up to date (checksum {fingerprint})",
                "✓".green(),
                archive.display()
            ),
        }
        Ok(())
    }
}
