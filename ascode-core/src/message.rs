//! User-facing diagnostics produced while importing a workflow.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageId {
    WorkflowErrorBadCdsDir,
    WorkflowInvalid,
    WorkflowAlreadyExists,
    WorkflowImportedInserted,
    WorkflowImportedUpdated,
    WorkflowRenamed,
    ApplicationImported,
    PipelineImported,
    EnvironmentImported,
    HookRegistered,
}

impl MessageId {
    pub fn level(self) -> MessageLevel {
        match self {
            MessageId::WorkflowErrorBadCdsDir
            | MessageId::WorkflowInvalid
            | MessageId::WorkflowAlreadyExists => MessageLevel::Error,
            MessageId::WorkflowRenamed => MessageLevel::Warning,
            _ => MessageLevel::Info,
        }
    }
}

/// A structured diagnostic; `args` fill the placeholders of its template in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Message {
    pub fn new(id: MessageId) -> Self {
        Self { id, args: vec![] }
    }

    pub fn with_args<I, S>(id: MessageId, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn level(&self) -> MessageLevel {
        self.id.level()
    }

    fn arg(&self, i: usize) -> &str {
        self.args.get(i).map(String::as_str).unwrap_or("?")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            MessageId::WorkflowErrorBadCdsDir => {
                write!(f, "Unable to read the .cds directory of the repository")
            }
            MessageId::WorkflowInvalid => write!(f, "Workflow {} is invalid: {}", self.arg(0), self.arg(1)),
            MessageId::WorkflowAlreadyExists => {
                write!(f, "Workflow {} already exists", self.arg(0))
            }
            MessageId::WorkflowImportedInserted => {
                write!(f, "Workflow {} has been created", self.arg(0))
            }
            MessageId::WorkflowImportedUpdated => {
                write!(f, "Workflow {} has been updated", self.arg(0))
            }
            MessageId::WorkflowRenamed => {
                write!(f, "Workflow {} has been renamed to {}", self.arg(0), self.arg(1))
            }
            MessageId::ApplicationImported => {
                write!(f, "Application {} has been imported", self.arg(0))
            }
            MessageId::PipelineImported => write!(f, "Pipeline {} has been imported", self.arg(0)),
            MessageId::EnvironmentImported => {
                write!(f, "Environment {} has been imported", self.arg(0))
            }
            MessageId::HookRegistered => {
                write!(f, "Hook {} registered on workflow {}", self.arg(0), self.arg(1))
            }
        }
    }
}
