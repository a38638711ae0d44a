//! Error types for ascode-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.ascode/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The project index did not exist at the expected path.
    #[error("project not found at {path}")]
    ProjectNotFound { path: PathBuf },
}

/// Structural problems found while turning an exported workflow into a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("workflow {workflow}: no pipeline declared")]
    Empty { workflow: String },

    #[error("workflow {workflow}: short form (pipeline/application/environment) cannot be mixed with a `workflow` block")]
    MixedForms { workflow: String },

    #[error("workflow {workflow}: node {node} has no pipeline")]
    MissingPipeline { workflow: String, node: String },

    #[error("workflow {workflow}: no root node (every node depends on another)")]
    NoRoot { workflow: String },

    #[error("workflow {workflow}: several root nodes found: {}", nodes.join(", "))]
    MultipleRoots { workflow: String, nodes: Vec<String> },

    #[error("workflow {workflow}: node {node} depends on unknown node {parent}")]
    UnknownParent {
        workflow: String,
        node: String,
        parent: String,
    },

    #[error("workflow {workflow}: node {node} depends on more than one node; joins are not supported")]
    Join { workflow: String, node: String },

    #[error("workflow {workflow}: nodes {} are not reachable from the root", nodes.join(", "))]
    Unreachable { workflow: String, nodes: Vec<String> },

    #[error("workflow {workflow}: hooks are only allowed on the root node, found some on {node}")]
    HookOnChild { workflow: String, node: String },

    #[error("workflow {workflow}: hooks declared for unknown node {node}")]
    UnknownHookNode { workflow: String, node: String },
}
