use crate::application::use_cases::resolve_ci_status::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_REQUEST_TIMEOUT,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    /// Zero disables caching.
    pub cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key lookup; unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let listen_addr: SocketAddr = parse_or(
            "LISTEN_ADDR",
            get("LISTEN_ADDR"),
            DEFAULT_LISTEN_ADDR.parse().ok(),
        )?;
        let request_timeout_secs = parse_or(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            Some(DEFAULT_REQUEST_TIMEOUT.as_secs()),
        )?;
        let max_concurrency: usize = parse_or(
            "MAX_CONCURRENT_REQUESTS",
            get("MAX_CONCURRENT_REQUESTS"),
            Some(DEFAULT_MAX_CONCURRENCY),
        )?;
        let cache_ttl_secs = parse_or(
            "CACHE_TTL_SECS",
            get("CACHE_TTL_SECS"),
            Some(DEFAULT_CACHE_TTL_SECS),
        )?;

        Ok(Self {
            github_token: get("GITHUB_TOKEN"),
            github_api_url: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            listen_addr,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_concurrency: max_concurrency.max(1),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

fn parse_or<T>(
    name: &'static str,
    raw: Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match (raw, default) {
        (Some(value), _) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
                value,
            })
        }
        (None, Some(default)) => Ok(default),
        (None, None) => Err(ConfigError::InvalidValue {
            name,
            value: String::new(),
            reason: "no default available".to_string(),
        }),
    }
}
