use crate::domain::external_apis::github::{GitHubApi, GitHubApiError};
use crate::domain::models::check_run::{CheckRun, CheckState, DEPENDABOT_APP_ID, OwningApp};
use crate::domain::models::repository::RepositoryId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) enum FakeBranch {
    Head(String),
    NotFound,
    Error,
    Hang,
}

pub(crate) enum FakeChecks {
    Runs(Vec<CheckRun>),
    Error,
    Hang,
}

/// In-memory GitHub port that counts the calls made against it.
pub(crate) struct FakeGitHubApi {
    credentials: bool,
    delay: Duration,
    branches: HashMap<String, FakeBranch>,
    checks: HashMap<String, FakeChecks>,
    pub(crate) branch_calls: AtomicUsize,
    pub(crate) check_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl FakeGitHubApi {
    pub(crate) fn new() -> Self {
        Self {
            credentials: true,
            delay: Duration::ZERO,
            branches: HashMap::new(),
            checks: HashMap::new(),
            branch_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_branch(mut self, repository: &str, branch: FakeBranch) -> Self {
        self.branches.insert(repository.to_string(), branch);
        self
    }

    /// Registers a repository whose head commit is `<repository>@head`.
    pub(crate) fn with_repo(self, repository: &str, checks: FakeChecks) -> Self {
        let sha = format!("{repository}@head");
        let mut this = self.with_branch(repository, FakeBranch::Head(sha.clone()));
        this.checks.insert(sha, checks);
        this
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.branch_calls.load(Ordering::SeqCst) + self.check_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GitHubApi for FakeGitHubApi {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn fetch_branch_head(
        &self,
        repository: &RepositoryId,
        branch: &str,
    ) -> Result<String, GitHubApiError> {
        self.branch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        match self.branches.get(repository.as_str()) {
            Some(FakeBranch::Head(sha)) => Ok(sha.clone()),
            Some(FakeBranch::Error) => Err(anyhow::anyhow!("502 Bad Gateway").into()),
            Some(FakeBranch::Hang) => std::future::pending().await,
            Some(FakeBranch::NotFound) | None => Err(GitHubApiError::NotFound(format!(
                "branch {branch} of {repository}"
            ))),
        }
    }

    async fn list_check_runs(
        &self,
        _repository: &RepositoryId,
        commit_sha: &str,
    ) -> Result<Vec<CheckRun>, GitHubApiError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        match self.checks.get(commit_sha) {
            Some(FakeChecks::Runs(runs)) => Ok(runs.clone()),
            Some(FakeChecks::Error) => Err(anyhow::anyhow!("API rate limit exceeded").into()),
            Some(FakeChecks::Hang) => std::future::pending().await,
            None => Ok(Vec::new()),
        }
    }
}

pub(crate) fn check_run(name: &str, state: CheckState) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        state,
        app: OwningApp {
            id: Some(15368),
            slug: Some("github-actions".to_string()),
            name: Some("GitHub Actions".to_string()),
        },
        started_at: None,
        completed_at: None,
    }
}

pub(crate) fn dependabot_run(state: CheckState) -> CheckRun {
    CheckRun {
        app: OwningApp {
            id: Some(DEPENDABOT_APP_ID),
            slug: Some("dependabot".to_string()),
            name: Some("Dependabot".to_string()),
        },
        ..check_run("Dependabot", state)
    }
}
