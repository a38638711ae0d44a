pub mod check;
pub mod import;
pub mod project;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use ascode_core::{Message, MessageLevel};

/// Every `.yml`/`.yaml` file under `dir`, keyed by path relative to `dir`.
pub fn read_cds_dir(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    collect(dir, dir, &mut files)?;
    Ok(files)
}

fn collect(base: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect(base, &path, files)?;
            continue;
        }
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if !is_yaml {
            continue;
        }
        let content =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let key = path
            .strip_prefix(base)
            .unwrap_or(path.as_path())
            .to_string_lossy()
            .into_owned();
        files.insert(key, content);
    }
    Ok(())
}

pub fn print_messages(messages: &[Message]) {
    for message in messages {
        let line = message.to_string();
        match message.level() {
            MessageLevel::Error => eprintln!("{} {}", "error:".red().bold(), line),
            MessageLevel::Warning => println!("{} {}", "warning:".yellow().bold(), line),
            MessageLevel::Info => println!("{} {}", "✓".green(), line),
        }
    }
}
