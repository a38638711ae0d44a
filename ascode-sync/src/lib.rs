//! ascode-sync: keeps repository-defined workflows in sync with the store.
//!
//! A sync runs in three steps:
//! 1. [`poller`] waits for the remote analysis of a repository to retrieve
//!    its `.cds` files.
//! 2. [`archive`] packs those files and extracts the exported entities.
//! 3. [`import`] parses, validates and reconciles the workflow with its
//!    previous version, then persists it through a [`store::WorkflowStore`].
//!
//! [`repository::WorkflowSync`] drives the three steps end to end.

pub mod analyzer;
pub mod archive;
pub mod config;
pub mod diff;
pub mod error;
pub mod import;
pub mod poller;
pub mod reconcile;
pub mod repository;
pub mod store;
pub mod validator;

pub use analyzer::RepositoryAnalyzer;
pub use archive::{extract_from_cds_files, read_cds_files, ExportedEntities};
pub use config::{PollerConfig, SyncConfig};
pub use diff::{workflow_diff, WorkflowDiff};
pub use error::{ImportFailure, SyncError};
pub use import::{parse_and_import, prepare_import, ImportOptions, ImportOutcome};
pub use poller::poll_repository_operation;
pub use repository::{push, RunTrigger, WorkflowSync};
pub use store::{FileStore, MessageSink, StoreError, WorkflowStore};
pub use validator::{LoadOptions, ProjectValidator, ValidationError, WorkflowValidator};
