//! Import pipeline: parse → validate → rename nodes → reconcile → persist.
//!
//! Every step before persistence is pure with respect to the store, so a
//! workflow that fails validation, reconciliation or the name check is never
//! written. [`prepare_import`] runs those steps alone, for dry runs.

use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use ascode_core::export::WorkflowExport;
use ascode_core::types::{is_valid_name, NAME_PATTERN};
use ascode_core::{Actor, Message, Project, RepositoryStrategy, Workflow};

use crate::error::{ImportFailure, SyncError};
use crate::reconcile::reconcile;
use crate::store::{message_collector, WorkflowStore};
use crate::validator::{LoadOptions, WorkflowValidator};

/// What the caller knows about where a workflow comes from.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Overwrite an existing workflow.
    pub force: bool,
    /// When set, the imported workflow must carry exactly this name.
    pub workflow_name: Option<String>,
    /// Fetch URL of the source repository.
    pub from_repository: Option<String>,
    pub is_default_branch: bool,
    pub from_branch: Option<String>,
    /// Repository default branch, used for the default run payload.
    pub default_branch: Option<String>,
    /// VCS server to link the root application to.
    pub vcs_server: Option<String>,
    pub repository_name: String,
    pub repository_strategy: RepositoryStrategy,
    /// Set when the import is triggered by a hook; pipelines are then
    /// loaded in full.
    pub hook_uuid: Option<Uuid>,
}

/// A successful import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub workflow: Workflow,
    pub messages: Vec<Message>,
}

/// Turn an exported workflow into a workflow of `project`.
///
/// Project groups are inherited only when the export declares no
/// permissions of its own.
pub fn parse(project: &Project, export: &WorkflowExport) -> Result<Workflow, SyncError> {
    info!(workflow = %export.name, project = %project.key, "parsing workflow");
    if !is_valid_name(&export.name) {
        return Err(SyncError::InvalidName {
            name: export.name.clone(),
            pattern: NAME_PATTERN,
        });
    }

    let mut workflow = export.to_workflow()?;
    if workflow.groups.is_empty() {
        workflow.groups = project
            .groups
            .iter()
            .map(|g| (g.group.clone(), g.permission))
            .collect();
    }
    workflow.project_id = project.id;
    workflow.project_key = project.key.clone();
    Ok(workflow)
}

/// Give every node a unique, non-empty name.
///
/// Unnamed nodes take their pipeline's name; collisions get `_1`, `_2`, …
/// suffixes in depth-first order.
pub fn rename_nodes(workflow: &mut Workflow) {
    let mut used: HashSet<String> = HashSet::new();
    workflow.root.visit_mut(&mut |node| {
        let base = if node.name.is_empty() {
            node.pipeline_name.clone()
        } else {
            node.name.clone()
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while used.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        if candidate != node.name {
            debug!(from = %node.name, to = %candidate, "renaming node");
        }
        node.name = candidate.clone();
        used.insert(candidate);
    });
}

/// Parse, validate, rename and reconcile without touching the store.
pub async fn prepare_import<V>(
    validator: &V,
    project: &Project,
    previous: Option<&Workflow>,
    export: &WorkflowExport,
    opts: &ImportOptions,
) -> Result<Workflow, ImportFailure>
where
    V: WorkflowValidator + ?Sized,
{
    let mut workflow = parse(project, export)?;

    let load = LoadOptions {
        deep_pipeline: opts.hook_uuid.is_some(),
    };
    if let Err(e) = validator.validate(&mut workflow, project, load).await {
        let messages = e.message.clone().into_iter().collect();
        return Err(ImportFailure::new(SyncError::Validation(e), messages));
    }

    rename_nodes(&mut workflow);
    reconcile(&mut workflow, previous, opts)?;
    Ok(workflow)
}

/// Import an exported workflow into `project`, replacing `previous` if given.
///
/// Messages the store emits are collected concurrently and returned with the
/// outcome, whether the import succeeded or not.
pub async fn parse_and_import<S, V>(
    store: &S,
    validator: &V,
    project: &Project,
    previous: Option<&Workflow>,
    export: &WorkflowExport,
    actor: &Actor,
    opts: &ImportOptions,
) -> Result<ImportOutcome, ImportFailure>
where
    S: WorkflowStore + ?Sized,
    V: WorkflowValidator + ?Sized,
{
    let mut workflow = prepare_import(validator, project, previous, export, opts).await?;

    let (sink, collector) = message_collector();
    let stored = store
        .import_workflow(project, previous, &mut workflow, actor, opts.force, &sink)
        .await;
    let mut messages = collector.finish(sink).await?;

    match stored {
        Ok(()) => {
            info!(workflow = %workflow.name, messages = messages.len(), "workflow imported");
            Ok(ImportOutcome { workflow, messages })
        }
        Err(source) => {
            messages.extend(source.message());
            Err(ImportFailure::new(
                SyncError::Persistence {
                    entity: format!("workflow {}", workflow.name),
                    source,
                },
                messages,
            ))
        }
    }
}
