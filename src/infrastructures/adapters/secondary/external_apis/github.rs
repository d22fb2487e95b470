use crate::domain::external_apis::github::{GitHubApi, GitHubApiError};
use crate::domain::models::check_run::{CheckConclusion, CheckRun, CheckState, OwningApp};
use crate::domain::models::repository::RepositoryId;
use anyhow::{Context, Error, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Check runs requested per page (GitHub's maximum)
const CHECK_RUNS_PER_PAGE: u8 = 100;

/// Pages followed before giving up on the rest of a commit's check runs
const MAX_CHECK_RUN_PAGES: u32 = 5;

#[derive(Deserialize, Debug, Clone)]
struct GitHubBranchResponse {
    commit: GitHubCommitRefResponse,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubCommitRefResponse {
    sha: String,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum GitHubCheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubAppResponse {
    id: Option<u64>,
    slug: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubCheckRunResponse {
    id: u64,
    name: String,
    status: GitHubCheckStatus,
    conclusion: Option<CheckConclusion>, // Only set once status is "completed"
    started_at: Option<String>,          // ISO 8601 format, parsed during domain conversion
    completed_at: Option<String>,
    app: Option<GitHubAppResponse>,
}

// /commits/{ref}/check-runs wraps the runs in an object together with the
// total across all pages.
#[derive(Deserialize, Debug)]
struct GitHubCheckRunsApiResponse {
    total_count: usize,
    check_runs: Vec<GitHubCheckRunResponse>,
}

fn parse_timestamp(
    raw: Option<&str>,
    field: &str,
    run_id: u64,
) -> Result<Option<DateTime<Utc>>, Error> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Failed to parse {field} for check run {run_id}"))
            .map(|parsed| parsed.with_timezone(&Utc))
    })
    .transpose()
}

impl TryFrom<GitHubCheckRunResponse> for CheckRun {
    type Error = Error;

    fn try_from(run_res: GitHubCheckRunResponse) -> Result<Self, Self::Error> {
        let state = match (run_res.status, run_res.conclusion) {
            (GitHubCheckStatus::Completed, Some(conclusion)) => CheckState::Completed(conclusion),
            (GitHubCheckStatus::Completed, None) => {
                bail!("Check run {} is completed without a conclusion", run_res.id)
            }
            (GitHubCheckStatus::Queued, _) => CheckState::Queued,
            (GitHubCheckStatus::InProgress, _) => CheckState::InProgress,
            (GitHubCheckStatus::Waiting, _) => CheckState::Waiting,
            (GitHubCheckStatus::Requested, _) => CheckState::Requested,
            (GitHubCheckStatus::Pending, _) => CheckState::Pending,
        };

        let started_at = parse_timestamp(run_res.started_at.as_deref(), "started_at", run_res.id)?;
        let completed_at =
            parse_timestamp(run_res.completed_at.as_deref(), "completed_at", run_res.id)?;

        let app = run_res
            .app
            .map(|app| OwningApp {
                id: app.id,
                slug: app.slug,
                name: app.name,
            })
            .unwrap_or_default();

        Ok(CheckRun {
            name: run_res.name,
            state,
            app,
            started_at,
            completed_at,
        })
    }
}

pub struct GitHubApiAdapter {
    client: Client,
    base_url: String,
    github_token: Option<String>,
}

impl GitHubApiAdapter {
    pub fn new(
        base_url: String,
        github_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent("ci-status-resolver")
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            github_token,
        })
    }

    /// Issues a single GET. A 404 is reported as [`GitHubApiError::NotFound`].
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation_name: &str,
        url: &str,
    ) -> Result<T, GitHubApiError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.github_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request for {operation_name}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitHubApiError::NotFound(operation_name.to_string()));
        }

        let body = response
            .error_for_status()
            .with_context(|| format!("API returned an error for {operation_name}"))?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize response for {operation_name}"))?;
        Ok(body)
    }
}

#[async_trait]
impl GitHubApi for GitHubApiAdapter {
    fn has_credentials(&self) -> bool {
        self.github_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    #[tracing::instrument(name = "GitHubApiAdapter::fetch_branch_head", skip(self))]
    async fn fetch_branch_head(
        &self,
        repository: &RepositoryId,
        branch: &str,
    ) -> Result<String, GitHubApiError> {
        let url = format!(
            "{}/repos/{}/{}/branches/{}",
            self.base_url,
            repository.owner(),
            repository.name(),
            branch
        );

        let branch_res: GitHubBranchResponse = self
            .get_json(&format!("branch {branch} of {repository}"), &url)
            .await?;

        Ok(branch_res.commit.sha)
    }

    #[tracing::instrument(name = "GitHubApiAdapter::list_check_runs", skip(self))]
    async fn list_check_runs(
        &self,
        repository: &RepositoryId,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, GitHubApiError> {
        let mut check_runs = Vec::new();

        for page in 1..=MAX_CHECK_RUN_PAGES {
            let url = format!(
                "{}/repos/{}/{}/commits/{}/check-runs?per_page={}&page={}",
                self.base_url,
                repository.owner(),
                repository.name(),
                commit_sha,
                CHECK_RUNS_PER_PAGE,
                page
            );

            let api_response: GitHubCheckRunsApiResponse = self
                .get_json(&format!("check runs for {repository}@{commit_sha}"), &url)
                .await?;

            let fetched = api_response.check_runs.len();
            for run_res in api_response.check_runs {
                check_runs.push(CheckRun::try_from(run_res)?);
            }

            if fetched == 0 || check_runs.len() >= api_response.total_count {
                break;
            }
            if page == MAX_CHECK_RUN_PAGES {
                tracing::warn!(
                    "Stopped after {} pages with {} of {} check runs",
                    MAX_CHECK_RUN_PAGES,
                    check_runs.len(),
                    api_response.total_count
                );
            }
        }

        Ok(check_runs)
    }
}
