//! Monitor settings loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const ENV_TARGET_URL: &str = "VINTED_URL";
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_POLL_SECONDS: &str = "POLL_SECONDS";
pub const ENV_PROXY_FILE: &str = "PROXY_FILE";
pub const ENV_SEEN_FILE: &str = "SEEN_FILE";
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECS";

pub const DEFAULT_POLL_SECONDS: u64 = 15;
pub const DEFAULT_PROXY_FILE: &str = "proxies.txt";
pub const DEFAULT_SEEN_FILE: &str = "seen_items.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Waits applied by the detection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTiming {
    /// Sleep after every poll cycle.
    pub poll_interval: Duration,
    /// Sleep when the proxy pool is empty.
    pub no_proxy_backoff: Duration,
    /// Sleep between failed initial-sync attempts.
    pub retry_backoff: Duration,
    /// Gap between consecutive notifications in one batch.
    pub dispatch_delay: Duration,
}

impl Default for MonitorTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECONDS),
            no_proxy_backoff: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(2),
            dispatch_delay: Duration::from_millis(500),
        }
    }
}

impl MonitorTiming {
    /// All waits set to zero; handy for driving the loop in tests.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            no_proxy_backoff: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            dispatch_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub target_url: Url,
    pub notification_endpoint: Option<Url>,
    pub proxy_source_path: PathBuf,
    pub seen_store_path: PathBuf,
    pub request_timeout: Duration,
    pub timing: MonitorTiming,
}

impl MonitorConfig {
    pub fn new(target_url: Url) -> Self {
        Self {
            target_url,
            notification_endpoint: None,
            proxy_source_path: PathBuf::from(DEFAULT_PROXY_FILE),
            seen_store_path: PathBuf::from(DEFAULT_SEEN_FILE),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            timing: MonitorTiming::default(),
        }
    }

    /// Read settings from the process environment, after pulling in `.env`
    /// if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let target_url = get(ENV_TARGET_URL).ok_or(ConfigError::Missing(ENV_TARGET_URL))?;
        let mut config = Self::new(parse_url(ENV_TARGET_URL, &target_url)?);

        if let Some(webhook) = get(ENV_WEBHOOK_URL) {
            config.notification_endpoint = Some(parse_url(ENV_WEBHOOK_URL, &webhook)?);
        }
        if let Some(poll) = get(ENV_POLL_SECONDS) {
            config.timing.poll_interval = Duration::from_secs(parse_secs(ENV_POLL_SECONDS, &poll)?);
        }
        if let Some(path) = get(ENV_PROXY_FILE) {
            config.proxy_source_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_SEEN_FILE) {
            config.seen_store_path = PathBuf::from(path);
        }
        if let Some(timeout) = get(ENV_REQUEST_TIMEOUT) {
            config.request_timeout =
                Duration::from_secs(parse_secs(ENV_REQUEST_TIMEOUT, &timeout)?.max(1));
        }

        Ok(config)
    }

    pub fn with_notification_endpoint(mut self, endpoint: Url) -> Self {
        self.notification_endpoint = Some(endpoint);
        self
    }

    pub fn with_proxy_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.proxy_source_path = path.into();
        self
    }

    pub fn with_seen_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.seen_store_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_timing(mut self, timing: MonitorTiming) -> Self {
        self.timing = timing;
        self
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
