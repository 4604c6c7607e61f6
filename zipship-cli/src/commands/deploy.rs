//! `zipship deploy` — bring a deploy folder in line with an archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use zipship_core::TracingReporter;
use zipship_deploy::{deploy, DeployOutcome};

/// Arguments for `zipship deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Dependency archive produced by `zipship build`.
    pub archive: PathBuf,

    /// Directory the deploy folder lives in (default: current directory).
    #[arg(long)]
    pub into: Option<PathBuf>,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let base_dir = match self.into {
            Some(dir) => dir,
            None => std::env::current_dir().context("could not determine current directory")?,
        };

        let outcome = deploy(&self.archive, &base_dir, &TracingReporter)
            .with_context(|| format!("deploy of {} failed", self.archive.display()))?;

        let (verb, folder) = match &outcome {
            DeployOutcome::FreshInstall { folder } => ("installed", folder),
            DeployOutcome::Unchanged { folder } => ("up to date", folder),
            DeployOutcome::Replaced { folder } => ("replaced", folder),
        };
        println!("{} {} {verb}", "✓".green(), folder.display());
        Ok(())
    }
}
