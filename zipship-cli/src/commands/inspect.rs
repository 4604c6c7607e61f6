//! `zipship inspect` — print an archive's embedded metadata.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use zipship_build::archive::read_metadata_document;
use zipship_core::IniDocument;

/// Arguments for `zipship inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Dependency or source archive.
    pub archive: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct MetadataRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let doc = read_metadata_document(&self.archive)
            .with_context(|| format!("failed to read metadata from {}", self.archive.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&doc.to_map()).context("failed to serialize metadata JSON")?
            );
            return Ok(());
        }

        print_table(&doc);
        Ok(())
    }
}

fn print_table(doc: &IniDocument) {
    for (section, entries) in doc.sections() {
        println!("{}", format!("[{section}]").bold());
        let rows: Vec<MetadataRow> = entries
            .iter()
            .map(|(key, value)| MetadataRow {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}
