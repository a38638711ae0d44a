//! The remote repository-analysis service.

use async_trait::async_trait;

use ascode_core::{BoxError, Operation, Project};

/// Checks out a repository and retrieves the files an [`Operation`] asks for.
#[async_trait]
pub trait RepositoryAnalyzer: Send + Sync {
    /// Register the operation; the service fills in its uuid and status.
    async fn submit(&self, project: &Project, operation: &mut Operation) -> Result<(), BoxError>;

    /// Refresh status, error, retrieved files and repository info in place.
    async fn fetch_status(&self, operation: &mut Operation) -> Result<(), BoxError>;
}
