//! `ascode import <dir> --project <key>`: import a `.cds` directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use ascode_core::{registry, Actor, Message, ProjectKey};
use ascode_sync::repository::preview_project;
use ascode_sync::{
    extract_from_cds_files, prepare_import, push, read_cds_files, workflow_diff, FileStore,
    ImportFailure, ImportOptions, ProjectValidator,
};

use super::{print_messages, read_cds_dir};

/// Arguments for `ascode import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Directory holding the workflow files (usually `.cds`).
    pub dir: PathBuf,

    /// Key of the project to import into.
    #[arg(long, short = 'p')]
    pub project: String,

    /// Expected workflow name; the import fails if the files declare another.
    #[arg(long)]
    pub name: Option<String>,

    /// Overwrite an existing workflow.
    #[arg(long)]
    pub force: bool,

    /// Fetch URL of the repository the files come from.
    #[arg(long, value_name = "URL")]
    pub from_repository: Option<String>,

    /// Branch the files were read from.
    #[arg(long)]
    pub branch: Option<String>,

    /// Default branch of the repository.
    #[arg(long, value_name = "BRANCH")]
    pub default_branch: Option<String>,

    /// Who is importing.
    #[arg(long, env = "USER", default_value = "ascode")]
    pub actor: String,

    /// Show the unified diff of the stored workflow instead of writing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ImportJson<'a> {
    workflow: &'a str,
    id: i64,
    messages: Vec<MessageJson>,
}

#[derive(Serialize)]
struct DryRunJson<'a> {
    workflow: &'a str,
    diff: Option<&'a str>,
}

#[derive(Serialize)]
struct FailureJson {
    error: String,
    messages: Vec<MessageJson>,
}

#[derive(Serialize)]
struct MessageJson {
    #[serde(flatten)]
    message: Message,
    text: String,
}

impl From<&Message> for MessageJson {
    fn from(m: &Message) -> Self {
        Self {
            message: m.clone(),
            text: m.to_string(),
        }
    }
}

impl ImportArgs {
    pub async fn run(self, root: &Path) -> Result<()> {
        let key = ProjectKey::from(self.project.as_str());
        let project = registry::load_project_at(root, &key)
            .with_context(|| format!("failed to load project {key}; run `ascode project add {key}` first"))?;

        let files = read_cds_dir(&self.dir)?;
        debug!(dir = %self.dir.display(), files = files.len(), "read workflow files");
        let mut archive = read_cds_files(&files).context("failed to pack workflow files")?;
        let entities = extract_from_cds_files(&mut archive)
            .with_context(|| format!("invalid workflow files in {}", self.dir.display()))?;

        let store = FileStore::new(root);
        let previous_name = self.name.as_deref().unwrap_or(&entities.workflow.name);
        let previous = store
            .load_workflow(&key, previous_name)
            .with_context(|| format!("failed to load workflow {previous_name}"))?;
        let opts = self.import_options();

        if self.dry_run {
            let preview = preview_project(&project, &entities);
            let mut workflow = match prepare_import(
                &ProjectValidator,
                &preview,
                previous.as_ref(),
                &entities.workflow,
                &opts,
            )
            .await
            {
                Ok(w) => w,
                Err(failure) => return Err(self.report_failure(failure)),
            };
            if let Some(prev) = &previous {
                workflow.id = prev.id;
            }
            let diff = workflow_diff(previous.as_ref(), &workflow)?;
            let unified = diff.as_ref().map(|d| d.unified_diff.as_str());
            if self.json {
                let out = DryRunJson {
                    workflow: &workflow.name,
                    diff: unified,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }
            match unified {
                None => println!("No differences for '{}'.", workflow.name),
                Some(text) => {
                    print!("{text}");
                    if !text.ends_with('\n') {
                        println!();
                    }
                }
            }
            return Ok(());
        }

        // Extraction consumed the first archive.
        let mut archive = read_cds_files(&files).context("failed to pack workflow files")?;
        let actor = Actor::from(self.actor.as_str());
        let outcome = match push(
            &store,
            &ProjectValidator,
            &project,
            &mut archive,
            previous.as_ref(),
            &actor,
            &opts,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(failure) => return Err(self.report_failure(failure)),
        };

        if self.json {
            let out = ImportJson {
                workflow: &outcome.workflow.name,
                id: outcome.workflow.id,
                messages: outcome.messages.iter().map(MessageJson::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }
        print_messages(&outcome.messages);
        println!(
            "{} imported workflow {} into {}",
            "✓".green(),
            outcome.workflow.name.bold(),
            key
        );
        Ok(())
    }

    fn import_options(&self) -> ImportOptions {
        let is_default_branch = match (&self.branch, &self.default_branch) {
            (None, _) => true,
            (Some(branch), Some(default)) => branch == default,
            (Some(_), None) => false,
        };
        ImportOptions {
            force: self.force,
            workflow_name: self.name.clone(),
            from_repository: self.from_repository.clone(),
            is_default_branch,
            from_branch: self.branch.clone(),
            default_branch: self.default_branch.clone(),
            ..Default::default()
        }
    }

    /// Print what was collected before the failure and turn it into an error.
    fn report_failure(&self, failure: ImportFailure) -> anyhow::Error {
        if self.json {
            let out = FailureJson {
                error: failure.source.to_string(),
                messages: failure.messages.iter().map(MessageJson::from).collect(),
            };
            if let Ok(text) = serde_json::to_string_pretty(&out) {
                println!("{text}");
            }
        } else {
            print_messages(&failure.messages);
        }
        anyhow::Error::new(failure.source).context("import failed")
    }
}
