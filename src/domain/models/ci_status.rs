use crate::domain::models::check_run::{CheckRun, CheckState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INVALID_REPOSITORY_DETAILS: &str = "Invalid repository identifier";
pub const BRANCH_NOT_FOUND_DETAILS: &str = "Main branch not found";
pub const FETCH_ERROR_DETAILS: &str = "Error fetching status";
pub const NO_CI_DETAILS: &str = "No CI configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiState {
    Success,
    Failure,
    Pending,
    /// Reserved for callers; the resolver itself reports fetch problems as `Unknown`.
    Error,
    Unknown,
}

/// Build health of one repository, reduced from its check runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatus {
    #[serde(rename = "repositoryId")]
    pub repository_id: String,
    pub state: CiState,
    #[serde(rename = "totalChecks")]
    pub total_checks: usize,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub details: String,
}

impl AggregateStatus {
    pub fn unknown(repository_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            state: CiState::Unknown,
            total_checks: 0,
            updated_at: Utc::now(),
            details: details.into(),
        }
    }

    /// Reduces the check runs of a commit into a single status.
    ///
    /// Dependabot runs are dropped first. Over what remains, a failing
    /// conclusion anywhere wins over unfinished runs, which win over success.
    pub fn from_check_runs(repository_id: impl Into<String>, check_runs: Vec<CheckRun>) -> Self {
        let repository_id = repository_id.into();
        let considered: Vec<CheckRun> = check_runs
            .into_iter()
            .filter(|run| !run.app.is_dependabot())
            .collect();

        if considered.is_empty() {
            return Self::unknown(repository_id, NO_CI_DETAILS);
        }

        let mut any_failure = false;
        let mut any_pending = false;
        for run in &considered {
            match run.state {
                CheckState::Completed(conclusion) => any_failure |= conclusion.is_failing(),
                CheckState::Queued
                | CheckState::InProgress
                | CheckState::Waiting
                | CheckState::Requested
                | CheckState::Pending => any_pending = true,
            }
        }

        let state = if any_failure {
            CiState::Failure
        } else if any_pending {
            CiState::Pending
        } else {
            CiState::Success
        };

        let updated_at = considered
            .iter()
            .filter_map(CheckRun::last_transition)
            .max()
            .unwrap_or_else(Utc::now);

        Self {
            repository_id,
            state,
            total_checks: considered.len(),
            updated_at,
            details: format!("{} check(s)", considered.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::check_run::{CheckConclusion, DEPENDABOT_APP_ID, OwningApp};
    use chrono::TimeZone;

    fn run(state: CheckState) -> CheckRun {
        CheckRun {
            name: "build".to_string(),
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

    fn completed(conclusion: CheckConclusion) -> CheckRun {
        run(CheckState::Completed(conclusion))
    }

    fn dependabot(state: CheckState) -> CheckRun {
        CheckRun {
            app: OwningApp {
                id: Some(DEPENDABOT_APP_ID),
                slug: Some("dependabot".to_string()),
                name: Some("Dependabot".to_string()),
            },
            ..run(state)
        }
    }

    #[test]
    fn test_failure_dominates_pending() {
        let status = AggregateStatus::from_check_runs(
            "a/b",
            vec![completed(CheckConclusion::Failure), run(CheckState::InProgress)],
        );
        assert_eq!(status.state, CiState::Failure);
        assert_eq!(status.total_checks, 2);
        assert_eq!(status.details, "2 check(s)");
    }

    #[test]
    fn test_failure_is_not_order_dependent() {
        let status = AggregateStatus::from_check_runs(
            "a/b",
            vec![
                run(CheckState::Queued),
                completed(CheckConclusion::Success),
                completed(CheckConclusion::TimedOut),
            ],
        );
        assert_eq!(status.state, CiState::Failure);
    }

    #[test]
    fn test_unfinished_runs_are_pending() {
        for state in [
            CheckState::Queued,
            CheckState::InProgress,
            CheckState::Waiting,
            CheckState::Requested,
            CheckState::Pending,
        ] {
            let status = AggregateStatus::from_check_runs("a/b", vec![run(state)]);
            assert_eq!(status.state, CiState::Pending, "{state:?}");
        }
    }

    #[test]
    fn test_benign_conclusions_are_success() {
        let status = AggregateStatus::from_check_runs(
            "a/b",
            vec![
                completed(CheckConclusion::Success),
                completed(CheckConclusion::Skipped),
                completed(CheckConclusion::Neutral),
                completed(CheckConclusion::Cancelled),
                completed(CheckConclusion::Stale),
            ],
        );
        assert_eq!(status.state, CiState::Success);
        assert_eq!(status.total_checks, 5);
    }

    #[test]
    fn test_each_failing_conclusion_fails() {
        for conclusion in [
            CheckConclusion::Failure,
            CheckConclusion::TimedOut,
            CheckConclusion::ActionRequired,
            CheckConclusion::StartupFailure,
        ] {
            let status = AggregateStatus::from_check_runs(
                "a/b",
                vec![completed(CheckConclusion::Success), completed(conclusion)],
            );
            assert_eq!(status.state, CiState::Failure, "{conclusion:?}");
        }
    }

    #[test]
    fn test_dependabot_only_means_no_ci() {
        let status = AggregateStatus::from_check_runs(
            "a/b",
            vec![
                dependabot(CheckState::Completed(CheckConclusion::Failure)),
                dependabot(CheckState::InProgress),
            ],
        );
        assert_eq!(status.state, CiState::Unknown);
        assert_eq!(status.total_checks, 0);
        assert_eq!(status.details, NO_CI_DETAILS);
    }

    #[test]
    fn test_dependabot_failures_do_not_count() {
        let status = AggregateStatus::from_check_runs(
            "a/b",
            vec![
                dependabot(CheckState::Completed(CheckConclusion::Failure)),
                completed(CheckConclusion::Success),
            ],
        );
        assert_eq!(status.state, CiState::Success);
        assert_eq!(status.total_checks, 1);
        assert_eq!(status.details, "1 check(s)");
    }

    #[test]
    fn test_updated_at_is_latest_transition() {
        let t = |h| Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).single();
        let mut done = completed(CheckConclusion::Success);
        done.started_at = t(8);
        done.completed_at = t(9);
        let mut running = run(CheckState::InProgress);
        running.started_at = t(10);
        let mut bot = dependabot(CheckState::Completed(CheckConclusion::Success));
        bot.completed_at = t(23);

        let status = AggregateStatus::from_check_runs("a/b", vec![done, running, bot]);
        assert_eq!(Some(status.updated_at), t(10));
    }

    #[test]
    fn test_updated_at_falls_back_to_now() {
        let before = Utc::now();
        let status =
            AggregateStatus::from_check_runs("a/b", vec![completed(CheckConclusion::Success)]);
        assert!(status.updated_at >= before);
    }

    #[test]
    fn test_serializes_camel_case() -> Result<(), serde_json::Error> {
        let status = AggregateStatus::unknown("a/b", NO_CI_DETAILS);
        let json = serde_json::to_value(&status)?;
        assert_eq!(json["repositoryId"], "a/b");
        assert_eq!(json["state"], "unknown");
        assert_eq!(json["totalChecks"], 0);
        assert_eq!(json["details"], "No CI configured");
        assert!(json["updatedAt"].is_string());
        Ok(())
    }
}
