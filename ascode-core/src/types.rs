//! Domain types shared by every ascode crate.
//!
//! All types are serializable/deserializable via serde + serde_yaml so the
//! registry can persist them as-is.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Pattern every project, application, pipeline and workflow name must match.
pub const NAME_PATTERN: &str = "^[a-zA-Z0-9._-]+$";

fn name_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(NAME_PATTERN).expect("NAME_PATTERN is a valid regex"))
}

/// Returns `true` when `name` respects [`NAME_PATTERN`].
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed project key (e.g. `PAYMENTS`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(pub String);

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The identity on whose behalf an import runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(pub String);

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Actor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Group permission level on a project or workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(pub u8);

impl Permission {
    pub const READ: Permission = Permission(4);
    pub const READ_EXECUTE: Permission = Permission(5);
    pub const READ_WRITE_EXECUTE: Permission = Permission(7);
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Permission::READ => write!(f, "read"),
            Permission::READ_EXECUTE => write!(f, "read-execute"),
            Permission::READ_WRITE_EXECUTE => write!(f, "read-write-execute"),
            Permission(other) => write!(f, "{other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// Credential material (SSH key content, password).
///
/// `Debug` and `Display` never show the value; only [`Secret::expose`] does.
/// Serialization writes the real value, since the remote analysis service
/// needs it, so callers must not serialize an operation for display.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop the secret value in place.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ---------------------------------------------------------------------------
// Applications, pipelines, environments
// ---------------------------------------------------------------------------

/// How the VCS repository of an application is reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStrategy {
    /// `https` or `ssh`.
    #[serde(default)]
    pub connection_type: String,
    /// Name of the project key used for ssh connections.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_key: String,
    #[serde(default, skip_serializing_if = "Secret::is_empty")]
    pub ssh_key_content: Secret,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Secret::is_empty")]
    pub password: Secret,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_branch: String,
}

impl RepositoryStrategy {
    /// Copy with every secret field blanked, for persistence and display.
    pub fn without_secrets(&self) -> Self {
        let mut copy = self.clone();
        copy.ssh_key_content.clear();
        copy.password.clear();
        copy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vcs_server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository_fullname: String,
    #[serde(default)]
    pub repository_strategy: RepositoryStrategy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

/// A pipeline job: an ordered list of script steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A group and its permission on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub group: String,
    pub permission: Permission,
}

/// A project: owner of workflows and of the entities they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: i64,
    pub key: ProjectKey,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub groups: Vec<ProjectGroup>,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl Project {
    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name == name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
