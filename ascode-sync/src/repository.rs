//! Repository-backed workflows: request the `.cds` files of a repository,
//! wait for them, then push them through the import pipeline.

use std::collections::BTreeMap;
use std::io::Read;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use ascode_core::operation::{OperationCheckout, OperationLoadFiles, OperationSetup};
use ascode_core::{Actor, Message, MessageId, Operation, Project, Workflow};

use crate::analyzer::RepositoryAnalyzer;
use crate::archive::{extract_from_cds_files, read_cds_files, ExportedEntities};
use crate::config::SyncConfig;
use crate::error::{ImportFailure, SyncError};
use crate::import::{parse_and_import, prepare_import, ImportOptions, ImportOutcome};
use crate::poller::poll_repository_operation;
use crate::reconcile::{GIT_BRANCH, GIT_HASH, GIT_TAG};
use crate::store::{message_collector, MessageSink, WorkflowStore};
use crate::validator::WorkflowValidator;

/// What started the run that asks for a repository sync.
#[derive(Debug, Clone)]
pub enum RunTrigger {
    /// A hook event, with its flat payload.
    Hook {
        uuid: Uuid,
        payload: BTreeMap<String, String>,
    },
    /// A manual run, with an arbitrary JSON payload.
    Manual { payload: Value },
}

impl RunTrigger {
    pub fn hook_uuid(&self) -> Option<Uuid> {
        match self {
            RunTrigger::Hook { uuid, .. } => Some(*uuid),
            RunTrigger::Manual { .. } => None,
        }
    }

    /// Payload as flat, lower-cased dotted keys.
    pub fn payload(&self) -> BTreeMap<String, String> {
        match self {
            RunTrigger::Hook { payload, .. } => payload.clone(),
            RunTrigger::Manual { payload } => {
                let mut flat = BTreeMap::new();
                flatten_payload("", payload, &mut flat);
                flat
            }
        }
    }
}

fn flatten_payload(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_lowercase()
        } else {
            format!("{prefix}.{}", k.to_lowercase())
        }
    };
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_payload(&key(k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_payload(&key(&i.to_string()), v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {
            out.insert(prefix.to_string(), String::new());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Build the analysis request for `workflow`'s repository.
///
/// The root node must have an application context; a branch or a tag must
/// be named by the trigger's payload.
pub fn create_operation_request(
    workflow: &Workflow,
    trigger: &RunTrigger,
    pattern: &str,
) -> Result<Operation, SyncError> {
    let app = workflow
        .root_application()
        .ok_or_else(|| SyncError::MissingApplicationContext {
            workflow: workflow.name.clone(),
            application_id: workflow.root.context.application_id,
        })?;

    let payload = trigger.payload();
    let param = |k: &str| payload.get(k).cloned().unwrap_or_default();
    let checkout = OperationCheckout {
        branch: param(GIT_BRANCH),
        tag: param(GIT_TAG),
        commit: param(GIT_HASH),
    };
    if checkout.branch.is_empty() && checkout.tag.is_empty() {
        return Err(SyncError::WrongRequest(
            "branch or tag parameter are mandatories".to_string(),
        ));
    }

    Ok(Operation {
        url: workflow.from_repository.clone().unwrap_or_default(),
        vcs_server: app.vcs_server.clone(),
        repo_full_name: app.repository_fullname.clone(),
        repository_strategy: app.repository_strategy.clone(),
        setup: OperationSetup { checkout },
        load_files: OperationLoadFiles {
            pattern: pattern.to_string(),
            results: BTreeMap::new(),
        },
        ..Default::default()
    })
}

/// Import the entities of a `.cds` archive, then the workflow itself.
///
/// Extraction reports every broken file at once. The workflow is then
/// parsed, validated and reconciled against a preview of the project; only
/// when that succeeds does persistence start, stopping at the first failure.
pub async fn push<R, S, V>(
    store: &S,
    validator: &V,
    project: &Project,
    archive: &mut tar::Archive<R>,
    previous: Option<&Workflow>,
    actor: &Actor,
    opts: &ImportOptions,
) -> Result<ImportOutcome, ImportFailure>
where
    R: Read,
    S: WorkflowStore + ?Sized,
    V: WorkflowValidator + ?Sized,
{
    let entities = extract_from_cds_files(archive)?;

    // Nothing is written until the workflow would import against the
    // project as it will look once its entities are stored.
    prepare_import(
        validator,
        &preview_project(project, &entities),
        previous,
        &entities.workflow,
        opts,
    )
    .await?;

    let (sink, collector) = message_collector();
    let imported = import_entities(store, project, &entities, &sink).await;
    let mut messages = collector.finish(sink).await?;
    if let Err(e) = imported {
        messages.extend(e.message());
        return Err(ImportFailure::new(e, messages));
    }

    let project = match store.load_project(&project.key).await {
        Ok(p) => p,
        Err(source) => {
            let e = SyncError::Persistence {
                entity: format!("project {}", project.key),
                source,
            };
            return Err(ImportFailure::new(e, messages));
        }
    };

    match parse_and_import(store, validator, &project, previous, &entities.workflow, actor, opts).await
    {
        Ok(mut outcome) => {
            messages.append(&mut outcome.messages);
            outcome.messages = messages;
            Ok(outcome)
        }
        Err(mut failure) => {
            messages.append(&mut failure.messages);
            failure.messages = messages;
            Err(failure)
        }
    }
}

async fn import_entities<S>(
    store: &S,
    project: &Project,
    entities: &ExportedEntities,
    sink: &MessageSink,
) -> Result<(), SyncError>
where
    S: WorkflowStore + ?Sized,
{
    for app in entities.applications.values() {
        store
            .import_application(project, &app.to_application(), sink)
            .await
            .map_err(|source| SyncError::Persistence {
                entity: format!("application {}", app.name),
                source,
            })?;
    }
    for env in entities.environments.values() {
        store
            .import_environment(project, &env.to_environment(), sink)
            .await
            .map_err(|source| SyncError::Persistence {
                entity: format!("environment {}", env.name),
                source,
            })?;
    }
    for pip in entities.pipelines.values() {
        store
            .import_pipeline(project, &pip.to_pipeline(), sink)
            .await
            .map_err(|source| SyncError::Persistence {
                entity: format!("pipeline {}", pip.name),
                source,
            })?;
    }
    Ok(())
}

/// `project` as it would look once `entities` are imported, for dry runs.
///
/// Entities the project does not know yet get the next free ids.
pub fn preview_project(project: &Project, entities: &ExportedEntities) -> Project {
    let mut preview = project.clone();
    for app in entities.applications.values() {
        if preview.application(&app.name).is_none() {
            let id = preview.applications.iter().map(|a| a.id).max().unwrap_or(0) + 1;
            preview.applications.push(ascode_core::Application {
                id,
                ..app.to_application()
            });
        }
    }
    for env in entities.environments.values() {
        if preview.environment(&env.name).is_none() {
            let id = preview.environments.iter().map(|e| e.id).max().unwrap_or(0) + 1;
            preview.environments.push(ascode_core::Environment {
                id,
                ..env.to_environment()
            });
        }
    }
    for pip in entities.pipelines.values() {
        if preview.pipeline(&pip.name).is_none() {
            let id = preview.pipelines.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            preview.pipelines.push(ascode_core::Pipeline {
                id,
                ..pip.to_pipeline()
            });
        }
    }
    preview
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Ties the analysis service, the store and the validator together.
#[derive(Debug)]
pub struct WorkflowSync<A, S, V> {
    analyzer: A,
    store: S,
    validator: V,
    config: SyncConfig,
}

impl<A, S, V> WorkflowSync<A, S, V>
where
    A: RepositoryAnalyzer,
    S: WorkflowStore,
    V: WorkflowValidator,
{
    pub fn new(analyzer: A, store: S, validator: V, config: SyncConfig) -> Self {
        Self {
            analyzer,
            store,
            validator,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Refresh `workflow` from its repository.
    ///
    /// On success `workflow` is replaced in place by the imported version.
    pub async fn create_from_repository(
        &self,
        project: &Project,
        workflow: &mut Workflow,
        trigger: &RunTrigger,
        actor: &Actor,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, ImportFailure> {
        let mut operation = create_operation_request(workflow, trigger, &self.config.pattern)?;
        self.analyzer
            .submit(project, &mut operation)
            .await
            .map_err(SyncError::Submit)?;
        info!(
            workflow = %workflow.name,
            operation = ?operation.uuid,
            "repository analysis submitted"
        );

        poll_repository_operation(&self.analyzer, &mut operation, &self.config.poller, cancel)
            .await?;

        let hook_uuid = trigger
            .hook_uuid()
            .or_else(|| workflow.repository_webhook().and_then(|h| h.uuid));
        self.extract_workflow(project, workflow, operation, actor, hook_uuid)
            .await
    }

    /// Import the files a finished operation retrieved.
    pub async fn extract_workflow(
        &self,
        project: &Project,
        workflow: &mut Workflow,
        operation: Operation,
        actor: &Actor,
        hook_uuid: Option<Uuid>,
    ) -> Result<Vec<Message>, ImportFailure> {
        let mut archive = match read_cds_files(&operation.load_files.results) {
            Ok(archive) => archive,
            Err(e) => {
                return Err(ImportFailure::new(
                    e,
                    vec![Message::new(MessageId::WorkflowErrorBadCdsDir)],
                ))
            }
        };

        let info = operation.repository_info.clone().unwrap_or_default();
        let checkout = &operation.setup.checkout;
        let opts = ImportOptions {
            // The repository is authoritative for its own workflow.
            force: true,
            workflow_name: None,
            from_repository: Some(info.fetch_url.clone()),
            is_default_branch: checkout.tag.is_empty() && checkout.branch == info.default_branch,
            from_branch: Some(checkout.branch.clone()),
            default_branch: Some(info.default_branch.clone()),
            vcs_server: Some(operation.vcs_server.clone()),
            repository_name: operation.repo_full_name.clone(),
            // Credentials are never persisted with the workflow.
            repository_strategy: operation.repository_strategy.without_secrets(),
            hook_uuid,
        };

        let outcome = push(
            &self.store,
            &self.validator,
            project,
            &mut archive,
            Some(&*workflow),
            actor,
            &opts,
        )
        .await?;

        if outcome.workflow.name != workflow.name {
            debug!(from = %workflow.name, to = %outcome.workflow.name, "workflow has been renamed");
        }
        *workflow = outcome.workflow;
        Ok(outcome.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascode_core::{Application, Node};
    use serde_json::json;

    fn workflow() -> Workflow {
        let mut root = Node::new("build", "build");
        root.context.application_id = 1;
        Workflow {
            name: "release".to_string(),
            root,
            applications: BTreeMap::from([(
                1,
                Application {
                    id: 1,
                    name: "api".to_string(),
                    vcs_server: "github".to_string(),
                    repository_fullname: "acme/api".to_string(),
                    ..Default::default()
                },
            )]),
            from_repository: Some("https://github.com/acme/api.git".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn manual_payload_is_flattened_lowercase() {
        let trigger = RunTrigger::Manual {
            payload: json!({"Git": {"Branch": "main", "Hash": "abc"}, "n": 3}),
        };
        let flat = trigger.payload();
        assert_eq!(flat.get("git.branch").map(String::as_str), Some("main"));
        assert_eq!(flat.get("git.hash").map(String::as_str), Some("abc"));
        assert_eq!(flat.get("n").map(String::as_str), Some("3"));
    }

    #[test]
    fn request_from_hook_payload() {
        let trigger = RunTrigger::Hook {
            uuid: Uuid::new_v4(),
            payload: BTreeMap::from([
                (GIT_TAG.to_string(), "v1.0".to_string()),
                (GIT_HASH.to_string(), "abc".to_string()),
            ]),
        };
        let op = create_operation_request(&workflow(), &trigger, ".cds/**/*.yml").expect("request");
        assert_eq!(op.setup.checkout.tag, "v1.0");
        assert_eq!(op.setup.checkout.commit, "abc");
        assert_eq!(op.repo_full_name, "acme/api");
        assert_eq!(op.load_files.pattern, ".cds/**/*.yml");
        assert_eq!(op.url, "https://github.com/acme/api.git");
    }

    #[test]
    fn request_needs_branch_or_tag() {
        let trigger = RunTrigger::Manual { payload: json!({}) };
        let err = create_operation_request(&workflow(), &trigger, ".cds/**/*.yml").unwrap_err();
        assert!(err.to_string().contains("branch or tag parameter are mandatories"));
    }

    #[test]
    fn request_needs_root_application() {
        let mut w = workflow();
        w.root.context.application_id = 0;
        let trigger = RunTrigger::Manual {
            payload: json!({"git.branch": "main"}),
        };
        let err = create_operation_request(&w, &trigger, ".cds/**/*.yml").unwrap_err();
        assert!(matches!(err, SyncError::MissingApplicationContext { .. }));
    }
}
