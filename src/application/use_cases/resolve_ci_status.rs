use crate::domain::external_apis::github::{GitHubApi, GitHubApiError};
use crate::domain::models::ci_status::{
    AggregateStatus, BRANCH_NOT_FOUND_DETAILS, FETCH_ERROR_DETAILS, INVALID_REPOSITORY_DETAILS,
};
use crate::domain::models::repository::RepositoryId;
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Branch whose head commit decides the status
pub const DEFAULT_BRANCH: &str = "main";

/// Name reported when the GitHub credential is missing
pub const CREDENTIAL_NAME: &str = "GITHUB_TOKEN";

/// Upper bound for a single GitHub call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Repositories resolved at the same time
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Distinct repositories accepted in one request
pub const MAX_REQUESTED_REPOSITORIES: usize = 100;

/// A request body that is not `{"repoIds": [<string>, ...]}`, or names too many repositories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("{0}")]
    InvalidBody(String),
    #[error("at most {max} distinct repositories per request, got {count}")]
    TooManyRepositories { count: usize, max: usize },
}

#[derive(Debug, Deserialize)]
struct CiStatusRequest {
    #[serde(rename = "repoIds")]
    repo_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveCiStatusUseCaseInput {
    pub repository_ids: Vec<String>,
    /// Bypass any cached answers and ask GitHub again.
    pub refresh: bool,
}

impl ResolveCiStatusUseCaseInput {
    pub fn new(repository_ids: Vec<String>) -> Self {
        Self {
            repository_ids,
            refresh: false,
        }
    }

    #[must_use]
    pub fn refreshed(mut self) -> Self {
        self.refresh = true;
        self
    }

    /// Reads `{"repoIds": [...]}`. Individual identifiers are not validated here.
    pub fn from_json(body: &Value) -> Result<Self, RequestError> {
        if !body.is_object() {
            return Err(RequestError::NotAnObject);
        }
        let request = CiStatusRequest::deserialize(body)
            .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        let input = Self::new(request.repo_ids);

        let count = input.distinct_ids().len();
        if count > MAX_REQUESTED_REPOSITORIES {
            return Err(RequestError::TooManyRepositories {
                count,
                max: MAX_REQUESTED_REPOSITORIES,
            });
        }
        Ok(input)
    }

    /// Identifiers in first-seen order with duplicates removed.
    pub fn distinct_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.repository_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ResolveCiStatusUseCaseOutput {
    pub statuses: HashMap<String, AggregateStatus>,
}

#[async_trait]
pub trait ResolveCiStatusUseCase: Send + Sync {
    async fn execute(&self, input: ResolveCiStatusUseCaseInput) -> ResolveCiStatusUseCaseOutput;
}

pub struct ResolveCiStatusInteractor<G: GitHubApi + 'static> {
    github_api: Arc<G>,
    request_timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl<G: GitHubApi + 'static> ResolveCiStatusInteractor<G> {
    pub fn new(github_api: Arc<G>) -> Self {
        Self {
            github_api,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_concurrency.max(1)));
        self
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, GitHubApiError>>,
    ) -> Result<T, GitHubApiError> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("timed out after {:?}", self.request_timeout).into()),
        }
    }

    #[tracing::instrument(name = "ResolveCiStatusInteractor::resolve_one", skip(self))]
    async fn resolve_one(&self, raw_id: &str) -> AggregateStatus {
        let Ok(repository) = RepositoryId::parse(raw_id) else {
            tracing::debug!("Rejected invalid repository identifier");
            return AggregateStatus::unknown(raw_id, INVALID_REPOSITORY_DETAILS);
        };

        // The semaphore is never closed, so acquire only fails in theory.
        let Ok(_permit) = self.limiter.acquire().await else {
            return AggregateStatus::unknown(raw_id, FETCH_ERROR_DETAILS);
        };

        let commit_sha = match self
            .call(self.github_api.fetch_branch_head(&repository, DEFAULT_BRANCH))
            .await
        {
            Ok(sha) => sha,
            Err(GitHubApiError::NotFound(what)) => {
                tracing::info!("{} not found", what);
                return AggregateStatus::unknown(raw_id, BRANCH_NOT_FOUND_DETAILS);
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} head for {}: {:#}", DEFAULT_BRANCH, repository, e);
                return AggregateStatus::unknown(raw_id, FETCH_ERROR_DETAILS);
            }
        };

        let check_runs = match self
            .call(self.github_api.list_check_runs(&repository, &commit_sha))
            .await
        {
            Ok(runs) => runs,
            Err(e) => {
                tracing::warn!("Failed to list check runs for {}@{}: {:#}", repository, commit_sha, e);
                return AggregateStatus::unknown(raw_id, FETCH_ERROR_DETAILS);
            }
        };

        let status = AggregateStatus::from_check_runs(raw_id, check_runs);
        tracing::debug!(state = ?status.state, total_checks = status.total_checks, "Resolved");
        status
    }
}

#[async_trait]
impl<G: GitHubApi + 'static> ResolveCiStatusUseCase for ResolveCiStatusInteractor<G> {
    #[tracing::instrument(
        name = "ResolveCiStatusInteractor::execute",
        skip_all,
        fields(requested = input.repository_ids.len())
    )]
    async fn execute(&self, input: ResolveCiStatusUseCaseInput) -> ResolveCiStatusUseCaseOutput {
        let repository_ids = input.distinct_ids();

        if !self.github_api.has_credentials() {
            tracing::warn!("{} is not set, skipping CI status lookup", CREDENTIAL_NAME);
            let details = format!("{CREDENTIAL_NAME} not configured");
            let statuses = repository_ids
                .into_iter()
                .map(|id| {
                    let status = AggregateStatus::unknown(id.clone(), details.clone());
                    (id, status)
                })
                .collect();
            return ResolveCiStatusUseCaseOutput { statuses };
        }

        let resolutions = repository_ids.into_iter().map(|id| async move {
            let status = self.resolve_one(&id).await;
            (id, status)
        });
        let statuses: HashMap<_, _> = join_all(resolutions).await.into_iter().collect();

        tracing::info!("Resolved CI status for {} repositories", statuses.len());
        ResolveCiStatusUseCaseOutput { statuses }
    }
}
