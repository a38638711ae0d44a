//! Remote repository-analysis operations.
//!
//! An [`Operation`] is created by the caller, mutated only by the remote
//! analysis service, and polled until it reaches a terminal status. It
//! carries repository credentials, so anything surfaced to logs or error
//! messages goes through [`Operation::redacted`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RepositoryStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Pending,
    Processing,
    Done,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Done | OperationStatus::Error)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Processing => write!(f, "processing"),
            OperationStatus::Done => write!(f, "done"),
            OperationStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCheckout {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub commit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSetup {
    #[serde(default)]
    pub checkout: OperationCheckout,
}

/// Files to retrieve and, once done, the retrieved files by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLoadFiles {
    pub pattern: String,
    #[serde(default)]
    pub results: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fetch_url: String,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub url: String,
    pub vcs_server: String,
    pub repo_full_name: String,
    #[serde(default)]
    pub repository_strategy: RepositoryStrategy,
    #[serde(default)]
    pub setup: OperationSetup,
    #[serde(default)]
    pub load_files: OperationLoadFiles,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_info: Option<RepositoryInfo>,
}

impl Operation {
    /// A view of this operation safe to log or embed in an error.
    pub fn redacted(&self) -> RedactedOperation<'_> {
        RedactedOperation(self)
    }
}

/// Display-only view of an [`Operation`] with credentials masked.
pub struct RedactedOperation<'a>(&'a Operation);

impl fmt::Display for RedactedOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.0;
        let strategy = &op.repository_strategy;
        write!(
            f,
            "operation {} on {}/{} (status {}, checkout branch={:?} tag={:?} commit={:?}, \
             strategy {} user={:?} ssh_key={:?} ssh_key_content=*** password=***)",
            op.uuid.map(|u| u.to_string()).unwrap_or_else(|| "-".to_string()),
            op.vcs_server,
            op.repo_full_name,
            op.status,
            op.setup.checkout.branch,
            op.setup.checkout.tag,
            op.setup.checkout.commit,
            strategy.connection_type,
            strategy.user,
            strategy.ssh_key,
        )
    }
}

impl fmt::Debug for RedactedOperation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
