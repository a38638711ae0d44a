//! Persistence of imported entities and workflows.
//!
//! Stores report progress through a [`MessageSink`]. The sink is bounded and
//! drained concurrently by a [`MessageCollector`]; the collector only
//! completes once the sink is dropped, so every message sent during a
//! persistence call is in the collected list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ascode_core::hook::{
    HOOK_CONFIG_PROJECT, HOOK_CONFIG_REPO_FULLNAME, HOOK_CONFIG_VCS_SERVER, HOOK_CONFIG_WORKFLOW,
};
use ascode_core::registry;
use ascode_core::{
    Actor, Application, BoxError, Environment, HookConfigValue, Message, MessageId, Pipeline, Project, ProjectKey,
    RegistryError, Workflow,
};

use crate::error::SyncError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workflow {workflow} already exists")]
    AlreadyExists { workflow: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Other(BoxError),
}

impl StoreError {
    /// The user-facing message for this failure, if it has one.
    pub fn message(&self) -> Option<Message> {
        match self {
            StoreError::AlreadyExists { workflow } => Some(Message::with_args(
                MessageId::WorkflowAlreadyExists,
                [workflow.as_str()],
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message drain
// ---------------------------------------------------------------------------

/// Sending half of a message drain. Deliberately not `Clone`: dropping the
/// one sink is what lets the collector finish.
#[derive(Debug)]
pub struct MessageSink(mpsc::Sender<Message>);

impl MessageSink {
    pub async fn send(&self, message: Message) {
        if self.0.send(message).await.is_err() {
            warn!("message collector gone, dropping message");
        }
    }
}

/// Receiving half of a message drain, running on its own task.
#[derive(Debug)]
pub struct MessageCollector(JoinHandle<Vec<Message>>);

/// Start a drain task. Must be called from within a tokio runtime.
pub fn message_collector() -> (MessageSink, MessageCollector) {
    let (tx, mut rx) = mpsc::channel::<Message>(1);
    let handle = tokio::spawn(async move {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        messages
    });
    (MessageSink(tx), MessageCollector(handle))
}

impl MessageCollector {
    /// Close `sink` and wait for the drain task to hand over every message.
    pub async fn finish(self, sink: MessageSink) -> Result<Vec<Message>, SyncError> {
        drop(sink);
        self.0
            .await
            .map_err(|e| SyncError::Collector(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Current state of a project, including entities imported so far.
    async fn load_project(&self, key: &ProjectKey) -> Result<Project, StoreError>;

    async fn import_application(
        &self,
        project: &Project,
        application: &Application,
        sink: &MessageSink,
    ) -> Result<(), StoreError>;

    async fn import_pipeline(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        sink: &MessageSink,
    ) -> Result<(), StoreError>;

    async fn import_environment(
        &self,
        project: &Project,
        environment: &Environment,
        sink: &MessageSink,
    ) -> Result<(), StoreError>;

    /// Insert `workflow`, or update `previous` with it when `force` is set.
    /// The store may assign ids and hook uuids in place.
    async fn import_workflow(
        &self,
        project: &Project,
        previous: Option<&Workflow>,
        workflow: &mut Workflow,
        actor: &Actor,
        force: bool,
        sink: &MessageSink,
    ) -> Result<(), StoreError>;
}

/// A [`WorkflowStore`] over the on-disk registry.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_workflow(&self, key: &ProjectKey, name: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(registry::load_workflow_at(&self.root, key, name)?)
    }

    /// Apply `update` to the stored project and save it.
    fn update_project(
        &self,
        key: &ProjectKey,
        update: impl FnOnce(&mut Project),
    ) -> Result<(), StoreError> {
        let mut project = registry::load_project_at(&self.root, key)?;
        update(&mut project);
        registry::save_project_at(&self.root, &project)?;
        Ok(())
    }
}

/// Project entities that are matched by name and numbered on insert.
trait ProjectEntity {
    fn name(&self) -> &str;
    fn id_mut(&mut self) -> &mut i64;
}

impl ProjectEntity for Application {
    fn name(&self) -> &str {
        &self.name
    }
    fn id_mut(&mut self) -> &mut i64 {
        &mut self.id
    }
}

impl ProjectEntity for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }
    fn id_mut(&mut self) -> &mut i64 {
        &mut self.id
    }
}

impl ProjectEntity for Environment {
    fn name(&self) -> &str {
        &self.name
    }
    fn id_mut(&mut self) -> &mut i64 {
        &mut self.id
    }
}

/// Replace the entity with the same name, or append it with the next free id.
fn upsert<T: ProjectEntity>(items: &mut Vec<T>, mut entity: T) {
    if let Some(existing) = items.iter_mut().find(|i| i.name() == entity.name()) {
        *entity.id_mut() = *existing.id_mut();
        *existing = entity;
        return;
    }
    let next = items.iter_mut().map(|i| *i.id_mut()).max().unwrap_or(0) + 1;
    *entity.id_mut() = next;
    items.push(entity);
}

#[async_trait]
impl WorkflowStore for FileStore {
    async fn load_project(&self, key: &ProjectKey) -> Result<Project, StoreError> {
        Ok(registry::load_project_at(&self.root, key)?)
    }

    async fn import_application(
        &self,
        project: &Project,
        application: &Application,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        let app = Application {
            repository_strategy: application.repository_strategy.without_secrets(),
            ..application.clone()
        };
        self.update_project(&project.key, |p| {
            upsert(&mut p.applications, app)
        })?;
        debug!(application = %application.name, project = %project.key, "application imported");
        sink.send(Message::with_args(
            MessageId::ApplicationImported,
            [application.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_pipeline(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        let pip = pipeline.clone();
        self.update_project(&project.key, |p| {
            upsert(&mut p.pipelines, pip)
        })?;
        sink.send(Message::with_args(
            MessageId::PipelineImported,
            [pipeline.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_environment(
        &self,
        project: &Project,
        environment: &Environment,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        let env = environment.clone();
        self.update_project(&project.key, |p| {
            upsert(&mut p.environments, env)
        })?;
        sink.send(Message::with_args(
            MessageId::EnvironmentImported,
            [environment.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_workflow(
        &self,
        project: &Project,
        previous: Option<&Workflow>,
        workflow: &mut Workflow,
        actor: &Actor,
        force: bool,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        workflow.project_id = project.id;
        workflow.project_key = project.key.clone();
        let existing = registry::load_workflow_at(&self.root, &project.key, &workflow.name)?;

        match previous {
            None => {
                if existing.is_some() && !force {
                    return Err(StoreError::AlreadyExists {
                        workflow: workflow.name.clone(),
                    });
                }
                workflow.id = match &existing {
                    Some(w) => w.id,
                    None => next_workflow_id(&self.root, &project.key)?,
                };
            }
            Some(prev) => {
                if !force {
                    return Err(StoreError::AlreadyExists {
                        workflow: prev.name.clone(),
                    });
                }
                // A rename never replaces another workflow, forced or not.
                if existing.as_ref().is_some_and(|w| w.id != prev.id) {
                    return Err(StoreError::AlreadyExists {
                        workflow: workflow.name.clone(),
                    });
                }
                workflow.id = prev.id;
            }
        }

        let registered = register_hooks(workflow);

        registry::save_workflow_at(&self.root, workflow)?;
        info!(workflow = %workflow.name, project = %project.key, %actor, "workflow saved");

        match previous {
            Some(prev) => {
                if prev.name != workflow.name {
                    registry::delete_workflow_at(&self.root, &project.key, &prev.name)?;
                    sink.send(Message::with_args(
                        MessageId::WorkflowRenamed,
                        [prev.name.as_str(), workflow.name.as_str()],
                    ))
                    .await;
                }
                sink.send(Message::with_args(
                    MessageId::WorkflowImportedUpdated,
                    [workflow.name.as_str()],
                ))
                .await;
            }
            None => {
                sink.send(Message::with_args(
                    MessageId::WorkflowImportedInserted,
                    [workflow.name.as_str()],
                ))
                .await;
            }
        }
        for (model, uuid) in registered {
            sink.send(Message::with_args(
                MessageId::HookRegistered,
                [model, uuid.to_string()],
            ))
            .await;
        }
        Ok(())
    }
}

/// Give new hooks a uuid and bind every hook to its workflow.
/// Returns the hooks that were newly registered.
fn register_hooks(workflow: &mut Workflow) -> Vec<(String, Uuid)> {
    let project = workflow.project_key.to_string();
    let name = workflow.name.clone();
    let repository = workflow
        .root_application()
        .map(|a| (a.vcs_server.clone(), a.repository_fullname.clone()));

    let mut registered = Vec::new();
    for hook in &mut workflow.root.hooks {
        if hook.uuid.is_none() {
            let uuid = Uuid::new_v4();
            hook.uuid = Some(uuid);
            registered.push((hook.hook_model_name.clone(), uuid));
        }
        hook.config
            .insert(HOOK_CONFIG_PROJECT, HookConfigValue::fixed(project.as_str()));
        hook.config
            .insert(HOOK_CONFIG_WORKFLOW, HookConfigValue::fixed(name.as_str()));
        match &repository {
            Some((vcs, repo)) if hook.is_repository_webhook() => {
                hook.config
                    .insert(HOOK_CONFIG_VCS_SERVER, HookConfigValue::fixed(vcs.as_str()));
                hook.config
                    .insert(HOOK_CONFIG_REPO_FULLNAME, HookConfigValue::fixed(repo.as_str()));
            }
            _ => {}
        }
    }
    registered
}

fn next_workflow_id(root: &Path, key: &ProjectKey) -> Result<i64, StoreError> {
    Ok(registry::list_workflows_at(root, key)?
        .iter()
        .map(|w| w.id)
        .max()
        .unwrap_or(0)
        + 1)
}
