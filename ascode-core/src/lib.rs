//! ascode core library: domain types, exported YAML entities, registry
//! persistence, errors.
//!
//! Public API surface:
//! - [`types`]: projects, applications, pipelines, permissions, secrets
//! - [`workflow`]: the workflow graph and its nodes
//! - [`hook`]: node hooks, hook models and their stable reference
//! - [`operation`]: remote repository-analysis operations
//! - [`message`]: user-facing import diagnostics
//! - [`multi_error`]: [`MultiError`] aggregate
//! - [`export`]: YAML wire entities and their conversion to a [`Workflow`]
//! - [`error`]: [`RegistryError`], [`ExportError`]
//! - [`registry`]: load / save projects and workflows on disk

pub mod error;
pub mod export;
pub mod hook;
pub mod message;
pub mod multi_error;
pub mod operation;
pub mod registry;
pub mod types;
pub mod workflow;

pub use error::{ExportError, RegistryError};
pub use hook::{HookConfig, HookConfigValue, HookModel, NodeHook};
pub use message::{Message, MessageId, MessageLevel};
pub use multi_error::{BoxError, MultiError};
pub use operation::{Operation, OperationStatus, RedactedOperation};
pub use types::{
    Actor, Application, Environment, Permission, Pipeline, Project, ProjectGroup, ProjectKey,
    RepositoryStrategy, Secret,
};
pub use workflow::{Node, NodeContext, Workflow};
