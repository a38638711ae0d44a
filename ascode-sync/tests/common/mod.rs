#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use ascode_core::operation::RepositoryInfo;
use ascode_core::{
    Actor, Application, BoxError, Environment, Message, MessageId, Operation, OperationStatus,
    Pipeline, Project, ProjectKey, Workflow,
};
use ascode_sync::store::{MessageSink, StoreError, WorkflowStore};
use ascode_sync::RepositoryAnalyzer;

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Answers status checks from a script; the last status repeats.
pub struct ScriptedAnalyzer {
    statuses: Mutex<VecDeque<OperationStatus>>,
    fetches: AtomicUsize,
    pub files: BTreeMap<String, Vec<u8>>,
    pub info: RepositoryInfo,
    pub error: String,
    pub fail_fetch: bool,
    pub fetch_delay: Option<Duration>,
}

impl ScriptedAnalyzer {
    pub fn new(statuses: &[OperationStatus]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            fetches: AtomicUsize::new(0),
            files: BTreeMap::new(),
            info: RepositoryInfo::default(),
            error: String::new(),
            fail_fetch: false,
            fetch_delay: None,
        }
    }

    pub fn with_files(mut self, files: &[(&str, &str)]) -> Self {
        self.files = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> OperationStatus {
        let mut statuses = self.statuses.lock().expect("lock");
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(OperationStatus::Processing)
        } else {
            statuses.front().copied().unwrap_or(OperationStatus::Processing)
        }
    }
}

#[async_trait]
impl RepositoryAnalyzer for ScriptedAnalyzer {
    async fn submit(&self, _project: &Project, operation: &mut Operation) -> Result<(), BoxError> {
        operation.uuid = Some(Uuid::new_v4());
        operation.status = OperationStatus::Pending;
        Ok(())
    }

    async fn fetch_status(&self, operation: &mut Operation) -> Result<(), BoxError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch {
            return Err("analysis service unavailable".into());
        }
        operation.status = self.next_status();
        match operation.status {
            OperationStatus::Done => {
                operation.load_files.results = self.files.clone();
                operation.repository_info = Some(self.info.clone());
            }
            OperationStatus::Error => operation.error = self.error.clone(),
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store that records calls and emits a fixed burst of messages.
pub struct RecordingStore {
    pub project: Mutex<Project>,
    pub workflow_calls: AtomicUsize,
    pub saved: Mutex<Vec<Workflow>>,
    pub extra_messages: Vec<Message>,
    pub reject: bool,
}

impl RecordingStore {
    pub fn new(project: Project) -> Self {
        Self {
            project: Mutex::new(project),
            workflow_calls: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            extra_messages: Vec::new(),
            reject: false,
        }
    }

    pub fn workflow_calls(&self) -> usize {
        self.workflow_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowStore for RecordingStore {
    async fn load_project(&self, _key: &ProjectKey) -> Result<Project, StoreError> {
        Ok(self.project.lock().expect("lock").clone())
    }

    async fn import_application(
        &self,
        _project: &Project,
        application: &Application,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        sink.send(Message::with_args(
            MessageId::ApplicationImported,
            [application.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_pipeline(
        &self,
        _project: &Project,
        pipeline: &Pipeline,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        sink.send(Message::with_args(
            MessageId::PipelineImported,
            [pipeline.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_environment(
        &self,
        _project: &Project,
        environment: &Environment,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        sink.send(Message::with_args(
            MessageId::EnvironmentImported,
            [environment.name.as_str()],
        ))
        .await;
        Ok(())
    }

    async fn import_workflow(
        &self,
        _project: &Project,
        previous: Option<&Workflow>,
        workflow: &mut Workflow,
        _actor: &Actor,
        _force: bool,
        sink: &MessageSink,
    ) -> Result<(), StoreError> {
        self.workflow_calls.fetch_add(1, Ordering::SeqCst);
        for message in &self.extra_messages {
            sink.send(message.clone()).await;
        }
        if self.reject {
            return Err(StoreError::AlreadyExists {
                workflow: workflow.name.clone(),
            });
        }
        for hook in workflow.root.hooks.iter_mut().filter(|h| h.uuid.is_none()) {
            hook.uuid = Some(Uuid::new_v4());
        }
        workflow.id = previous.map(|p| p.id).unwrap_or(1);
        self.saved.lock().expect("lock").push(workflow.clone());
        let id = if previous.is_some() {
            MessageId::WorkflowImportedUpdated
        } else {
            MessageId::WorkflowImportedInserted
        };
        sink.send(Message::with_args(id, [workflow.name.as_str()])).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Project ACME with application `api` (linked to `acme/api`) and pipeline `build`.
pub fn project() -> Project {
    Project {
        id: 1,
        key: ProjectKey::from("ACME"),
        name: "ACME".to_string(),
        applications: vec![Application {
            id: 1,
            name: "api".to_string(),
            vcs_server: "github".to_string(),
            repository_fullname: "acme/api".to_string(),
            ..Default::default()
        }],
        pipelines: vec![Pipeline {
            id: 1,
            name: "build".to_string(),
            stages: vec![],
        }],
        ..Default::default()
    }
}

pub const REPO_URL: &str = "https://github.com/acme/api.git";

pub const WORKFLOW_YAML: &str = "\
version: v1.0
name: release
workflow:
  build:
    pipeline: build
    application: api
hooks:
  build:
  - type: RepositoryWebHook
";

pub const APPLICATION_YAML: &str = "\
version: v1.0
name: api
vcs_server: github
repo: acme/api
";

pub const PIPELINE_YAML: &str = "\
version: v1.0
name: build
stages:
- name: compile
  jobs:
  - name: make
    steps: [make]
";
