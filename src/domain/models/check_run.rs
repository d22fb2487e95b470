use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GitHub App id of Dependabot.
pub const DEPENDABOT_APP_ID: u64 = 29110;
const DEPENDABOT_APP_SLUG: &str = "dependabot";

/// Final outcome of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    StartupFailure,
    Stale,
}

impl CheckConclusion {
    /// Whether this conclusion marks the build as broken.
    pub fn is_failing(self) -> bool {
        match self {
            Self::Failure | Self::TimedOut | Self::ActionRequired | Self::StartupFailure => true,
            Self::Success | Self::Neutral | Self::Cancelled | Self::Skipped | Self::Stale => false,
        }
    }
}

/// Lifecycle of a check run. Only a completed run carries a conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Queued,
    InProgress,
    Waiting,
    Requested,
    Pending,
    Completed(CheckConclusion),
}

/// The automation that created a check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwningApp {
    pub id: Option<u64>,
    pub slug: Option<String>,
    pub name: Option<String>,
}

impl OwningApp {
    pub fn is_dependabot(&self) -> bool {
        self.id == Some(DEPENDABOT_APP_ID)
            || self
                .slug
                .as_deref()
                .is_some_and(|slug| slug.eq_ignore_ascii_case(DEPENDABOT_APP_SLUG))
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.to_ascii_lowercase().contains(DEPENDABOT_APP_SLUG))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRun {
    pub name: String,
    pub state: CheckState,
    pub app: OwningApp,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    /// Time of the most recent transition this run reports.
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        match self.state {
            CheckState::Completed(_) => self.completed_at.or(self.started_at),
            _ => self.started_at,
        }
    }
}
