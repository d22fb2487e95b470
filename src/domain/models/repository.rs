use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// A literal pattern; `None` would reject every identifier, which
// `test_pattern_compiles` catches.
static REPOSITORY_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").ok());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository identifier: {0:?}")]
pub struct InvalidRepositoryId(pub String);

/// A GitHub repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId {
    full_name: String,
    split_at: usize,
}

impl RepositoryId {
    /// Accepts `owner/name` where both halves use `[A-Za-z0-9_.-]` and neither
    /// is made of dots only, so the halves are always safe URL path segments.
    pub fn parse(raw: &str) -> Result<Self, InvalidRepositoryId> {
        let matches = REPOSITORY_ID_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(raw));
        match raw.find('/') {
            Some(split_at)
                if matches
                    && !is_dot_segment(&raw[..split_at])
                    && !is_dot_segment(&raw[split_at + 1..]) =>
            {
                Ok(Self {
                    full_name: raw.to_string(),
                    split_at,
                })
            }
            _ => Err(InvalidRepositoryId(raw.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.full_name[..self.split_at]
    }

    pub fn name(&self) -> &str {
        &self.full_name[self.split_at + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment.chars().all(|c| c == '.')
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = InvalidRepositoryId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepositoryId> for String {
    fn from(value: RepositoryId) -> Self {
        value.full_name
    }
}
