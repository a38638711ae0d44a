//! `ascode check <dir>`: extract a `.cds` directory and report what it holds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ascode_sync::{extract_from_cds_files, read_cds_files};

use super::read_cds_dir;

/// Arguments for `ascode check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory holding the workflow files (usually `.cds`).
    pub dir: PathBuf,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let files = read_cds_dir(&self.dir)?;
        let mut archive = read_cds_files(&files).context("failed to pack workflow files")?;
        let entities = extract_from_cds_files(&mut archive)
            .with_context(|| format!("invalid workflow files in {}", self.dir.display()))?;
        let workflow = entities
            .workflow
            .to_workflow()
            .with_context(|| format!("invalid workflow in {}", entities.workflow_file))?;

        println!(
            "{} workflow {} ({})",
            "✓".green(),
            workflow.name.bold(),
            entities.workflow_file
        );
        println!("  nodes:        {}", workflow.root.nodes().len());
        println!("  hooks:        {}", workflow.root.hooks.len());
        println!("  applications: {}", entities.applications.len());
        println!("  pipelines:    {}", entities.pipelines.len());
        println!("  environments: {}", entities.environments.len());
        Ok(())
    }
}
