//! Loader configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Shortest interval the background refresh accepts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for fetching policy snapshots from the directory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Base URL of the directory/backend service.
    pub directory_url: String,
    /// Bearer token sent with every directory request.
    pub bearer_token: Option<String>,
    /// Upper bound for one complete fetch attempt.
    pub fetch_timeout: Duration,
    /// Attempts per refresh before giving up (at least 1).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub retry_backoff: Duration,
    /// Interval between background refreshes.
    pub refresh_interval: Duration,
    /// Age after which a snapshot is reported as stale.
    pub stale_after: Duration,
    /// Least privileged level still allowed to edit primary roles.
    pub primary_role_edit_level: i32,
    /// Hierarchy levels for roles the directory sends without one.
    pub level_overrides: HashMap<String, i32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            directory_url: "http://localhost:8080".to_string(),
            bearer_token: None,
            fetch_timeout: Duration::from_millis(5_000),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            refresh_interval: Duration::from_secs(300),
            stale_after: Duration::from_secs(900),
            primary_role_edit_level: 1,
            level_overrides: HashMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Read configuration from `WARDEN_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparseable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("WARDEN_DIRECTORY_URL") {
            config.directory_url = url;
        }
        config.bearer_token = lookup("WARDEN_DIRECTORY_TOKEN").filter(|t| !t.is_empty());

        if let Some(ms) = parsed::<u64>(&lookup, "WARDEN_FETCH_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parsed::<u32>(&lookup, "WARDEN_MAX_ATTEMPTS") {
            config.max_attempts = n.max(1);
        }
        if let Some(ms) = parsed::<u64>(&lookup, "WARDEN_RETRY_BACKOFF_MS") {
            config.retry_backoff = Duration::from_millis(ms);
        }
        match parsed::<u64>(&lookup, "WARDEN_REFRESH_INTERVAL_SECS") {
            Some(0) => {
                tracing::warn!(
                    key = "WARDEN_REFRESH_INTERVAL_SECS",
                    "refresh interval must be positive; keeping the default"
                );
            }
            Some(secs) => config.refresh_interval = Duration::from_secs(secs),
            None => {}
        }
        if let Some(secs) = parsed::<u64>(&lookup, "WARDEN_STALE_AFTER_SECS") {
            config.stale_after = Duration::from_secs(secs);
        }
        if let Some(level) = parsed::<i32>(&lookup, "WARDEN_PRIMARY_ROLE_EDIT_LEVEL") {
            config.primary_role_edit_level = level;
        }
        if let Some(raw) = lookup("WARDEN_ROLE_LEVELS") {
            config.level_overrides = parse_levels(&raw);
        }

        config
    }

    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Intervals below [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_level_override(mut self, role_id: impl Into<String>, level: i32) -> Self {
        self.level_overrides.insert(role_id.into(), level);
        self
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

/// Parse `"admin=0, sales_manager=2"`.
fn parse_levels(raw: &str) -> HashMap<String, i32> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let parsed = pair
                .split_once('=')
                .and_then(|(id, level)| {
                    Some((id.trim().to_string(), level.trim().parse::<i32>().ok()?))
                })
                .filter(|(id, _)| !id.is_empty());
            if parsed.is_none() {
                tracing::warn!(entry = pair, "ignoring malformed WARDEN_ROLE_LEVELS entry");
            }
            parsed
        })
        .collect()
}
