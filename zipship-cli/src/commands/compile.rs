//! `zipship compile` — bytecode archive of the project's own package.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use zipship_build::{ArchiveBuilder, CompileOptions, PythonPrecompiler, UvResolver};
use zipship_core::{Project, TracingReporter};

/// Arguments for `zipship compile`.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Project directory or `pyproject.toml`.
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Archive path (default `<project>/<name>.zip`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bytecode optimisation level.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub optimize: Option<u8>,
}

impl CompileArgs {
    pub fn run(self) -> Result<()> {
        let project = Project::load(&self.project)
            .with_context(|| format!("failed to load project at {}", self.project.display()))?;
        let resolver = UvResolver::from_settings(&project.settings);
        let precompiler = PythonPrecompiler::from_settings(&project.settings);
        let builder = ArchiveBuilder::new(&resolver, &precompiler, &TracingReporter);

        let options = CompileOptions {
            output: self.output,
            optimize: self.optimize,
        };
        let built = builder
            .compile_tree(&project, &options)
            .with_context(|| format!("compile failed for '{}'", project.name))?;

        println!(
            "{} built {} ({} files)",
            "✓".green(),
            built.archive.display(),
            built.files
        );
        Ok(())
    }
}
