use crate::domain::models::check_run::CheckRun;
use crate::domain::models::repository::RepositoryId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Whether a token is available. Without one no call should be attempted.
    fn has_credentials(&self) -> bool;

    /// SHA of the commit at the head of `branch`.
    async fn fetch_branch_head(
        &self,
        repository: &RepositoryId,
        branch: &str,
    ) -> Result<String, GitHubApiError>;

    async fn list_check_runs(
        &self,
        repository: &RepositoryId,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, GitHubApiError>;
}
