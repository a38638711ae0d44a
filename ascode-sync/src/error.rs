//! Error types for ascode-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use ascode_core::{BoxError, ExportError, Message, MultiError, ProjectKey, RegistryError};

use crate::store::StoreError;
use crate::validator::ValidationError;

/// All errors that can arise while syncing a workflow from a repository.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("workflow name {name:?} does not match pattern {pattern}")]
    InvalidName {
        name: String,
        pattern: &'static str,
    },

    /// The caller asked for one workflow and the repository declares another.
    #[error("wrong workflow name: expected {expected} in project {project}, got {found}")]
    NameMismatch {
        project: ProjectKey,
        expected: String,
        found: String,
    },

    /// A VCS override was requested but the root application is unknown.
    #[error("workflow {workflow}: root application {application_id} is missing")]
    MissingApplicationContext {
        workflow: String,
        application_id: i64,
    },

    #[error("wrong request: {0}")]
    WrongRequest(String),

    #[error("invalid workflow definition: {0}")]
    Export(#[from] ExportError),

    /// Every per-file failure of an extraction, reported together.
    #[error("workflow invalid: {0}")]
    WorkflowInvalid(MultiError),

    #[error("unable to read tar file: {0}")]
    Archive(#[source] std::io::Error),

    #[error("unable to pack {file}: {source}")]
    Packing {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The tar writer accepted an entry but consumed none of its content.
    #[error("nothing written for {file}")]
    NothingWritten { file: String },

    /// The analysis service finished the operation in error.
    #[error("repository operation in error: {message} ({operation})")]
    OperationFailed { message: String, operation: String },

    #[error("timeout analyzing repository after {after:?}")]
    OperationTimeout { after: Duration },

    #[error("repository analysis cancelled")]
    Cancelled,

    #[error("unable to submit repository operation: {0}")]
    Submit(#[source] BoxError),

    /// The analysis service could not be reached or answered garbage.
    #[error("cannot get repository operation status: {0}")]
    Remote(#[source] BoxError),

    #[error("workflow is not valid: {0}")]
    Validation(#[from] ValidationError),

    #[error("unable to import {entity}: {source}")]
    Persistence {
        entity: String,
        #[source]
        source: StoreError,
    },

    #[error("message collector failed: {0}")]
    Collector(String),

    /// An error from the registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SyncError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::OperationTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    pub fn is_operation_failure(&self) -> bool {
        matches!(self, SyncError::OperationFailed { .. })
    }

    /// The structured message a collaborator attached to this failure, if any.
    pub fn message(&self) -> Option<Message> {
        match self {
            SyncError::Validation(e) => e.message.clone(),
            SyncError::Persistence { source, .. } => source.message(),
            _ => None,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// A failed import, with every message collected before it failed.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ImportFailure {
    #[source]
    pub source: SyncError,
    pub messages: Vec<Message>,
}

impl ImportFailure {
    pub fn new(source: SyncError, messages: Vec<Message>) -> Self {
        Self { source, messages }
    }
}

impl From<SyncError> for ImportFailure {
    fn from(source: SyncError) -> Self {
        let messages = source.message().into_iter().collect();
        Self { source, messages }
    }
}
