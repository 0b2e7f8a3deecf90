//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_GENERATION_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_MS: u64 = 250;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_NOTIFICATION_MS: u64 = 5000;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A URL setting is not an http(s) URL.
    #[error("invalid URL for {var}: {value}")]
    InvalidUrl { var: &'static str, value: String },

    /// The poll budget must allow at least one attempt.
    #[error("{var} must be greater than zero")]
    ZeroAttempts { var: &'static str },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "E_CONFIG_URL",
            Self::ZeroAttempts { .. } => "E_CONFIG_ATTEMPTS",
        }
    }
}

// =============================================================================
// POLL POLICY
// =============================================================================

/// Bounds for the generation poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive status polls.
    pub interval: Duration,
    /// Maximum number of status polls before giving up.
    pub max_attempts: u32,
    /// Extra tries for a single poll that failed with a retryable transport error.
    pub transport_retries: u32,
    /// Backoff unit; retry `n` waits `n * retry_base`.
    pub retry_base: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

// =============================================================================
// CLIENT CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the generation service (`/generate/...`).
    pub generation_url: String,
    /// Base URL of the dashboard API (`/api/...`).
    pub api_url: String,
    pub poll: PollPolicy,
    pub timeouts: HttpTimeouts,
    /// How long a notification stays visible before auto-dismissal.
    pub notification_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            generation_url: DEFAULT_GENERATION_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            poll: PollPolicy::default(),
            timeouts: HttpTimeouts::default(),
            notification_ttl: Duration::from_millis(DEFAULT_NOTIFICATION_MS),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `GENIFY_GENERATION_URL`: default `http://localhost:8000`
    /// - `GENIFY_API_URL`: default `http://localhost:8000`
    /// - `GENIFY_POLL_INTERVAL_MS`: default 1500
    /// - `GENIFY_POLL_MAX_ATTEMPTS`: default 10
    /// - `GENIFY_TRANSPORT_RETRIES`: default 2
    /// - `GENIFY_RETRY_BASE_MS`: default 250
    /// - `GENIFY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GENIFY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GENIFY_NOTIFICATION_MS`: default 5000
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is not http(s) or the attempt budget is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let generation_url = parse_url(
            "GENIFY_GENERATION_URL",
            std::env::var("GENIFY_GENERATION_URL").ok().as_deref(),
            DEFAULT_GENERATION_URL,
        )?;
        let api_url = parse_url("GENIFY_API_URL", std::env::var("GENIFY_API_URL").ok().as_deref(), DEFAULT_API_URL)?;

        let max_attempts = env_parse("GENIFY_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts { var: "GENIFY_POLL_MAX_ATTEMPTS" });
        }
        let poll = PollPolicy {
            interval: Duration::from_millis(env_parse("GENIFY_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            max_attempts,
            transport_retries: env_parse("GENIFY_TRANSPORT_RETRIES", DEFAULT_TRANSPORT_RETRIES),
            retry_base: Duration::from_millis(env_parse("GENIFY_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)),
        };
        let timeouts = HttpTimeouts {
            request_secs: env_parse("GENIFY_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("GENIFY_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let notification_ttl = Duration::from_millis(env_parse("GENIFY_NOTIFICATION_MS", DEFAULT_NOTIFICATION_MS));

        Ok(Self { generation_url, api_url, poll, timeouts, notification_ttl })
    }

    /// Replace both base URLs, validating them the same way `from_env` does.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL is not http(s).
    pub fn with_urls(mut self, generation_url: &str, api_url: &str) -> Result<Self, ConfigError> {
        self.generation_url = parse_url("generation_url", Some(generation_url), DEFAULT_GENERATION_URL)?;
        self.api_url = parse_url("api_url", Some(api_url), DEFAULT_API_URL)?;
        Ok(self)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_url(var: &'static str, raw: Option<&str>, default: &str) -> Result<String, ConfigError> {
    let value = raw.map_or(default, str::trim);
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl { var, value: value.to_string() });
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// `base` with `segments` appended as percent-encoded path segments.
///
/// Returns `None` for URLs that cannot carry a path (e.g. `mailto:`).
pub(crate) fn join_segments<I>(base: &reqwest::Url, segments: I) -> Option<reqwest::Url>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = base.clone();
    url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
    Some(url)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
