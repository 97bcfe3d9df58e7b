//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;

use ignite_shared::constants::{
    DEFAULT_DIRECTORY_REFRESH_SECS, DEFAULT_FRESHNESS_WINDOW_SECS, DEFAULT_HISTORY_LIMIT,
    DEFAULT_PRESENCE_INTERVAL_SECS, MAX_FRESHNESS_WINDOW_SECS,
};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// SQLite database file.
    /// Env: `IGNITE_DB_PATH`
    /// Default: platform data dir (`ignite.db`).
    pub db_path: Option<PathBuf>,

    /// Where the display name and session token are remembered.
    /// Env: `IGNITE_SESSION_PATH`
    /// Default: platform data dir (`session.json`).
    pub session_path: Option<PathBuf>,

    /// How long a membership stays active after its last announce.
    /// Env: `IGNITE_FRESHNESS_WINDOW_SECS`
    /// Default: 600, at most 30 days
    pub freshness_window: Duration,

    /// Presence announce period.
    /// Env: `IGNITE_PRESENCE_INTERVAL_SECS`
    /// Default: 30
    pub presence_interval: Duration,

    /// Room directory re-evaluation period.
    /// Env: `IGNITE_DIRECTORY_REFRESH_SECS`
    /// Default: 60
    pub directory_refresh: Duration,

    /// Messages backfilled when a room opens.
    /// Env: `IGNITE_HISTORY_LIMIT`
    /// Default: 100
    pub history_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            session_path: None,
            freshness_window: Duration::from_secs(DEFAULT_FRESHNESS_WINDOW_SECS),
            presence_interval: Duration::from_secs(DEFAULT_PRESENCE_INTERVAL_SECS),
            directory_refresh: Duration::from_secs(DEFAULT_DIRECTORY_REFRESH_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("IGNITE_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("IGNITE_SESSION_PATH") {
            config.session_path = Some(PathBuf::from(path));
        }

        match parse_positive(&lookup, "IGNITE_FRESHNESS_WINDOW_SECS") {
            Some(secs) if secs > MAX_FRESHNESS_WINDOW_SECS => {
                tracing::warn!(
                    secs,
                    max = MAX_FRESHNESS_WINDOW_SECS,
                    "Freshness window too large, using default"
                );
            }
            Some(secs) => config.freshness_window = Duration::from_secs(secs),
            None => {}
        }
        if let Some(secs) = parse_positive(&lookup, "IGNITE_PRESENCE_INTERVAL_SECS") {
            config.presence_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive(&lookup, "IGNITE_DIRECTORY_REFRESH_SECS") {
            config.directory_refresh = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_positive(&lookup, "IGNITE_HISTORY_LIMIT") {
            config.history_limit = limit.min(u32::MAX as u64) as u32;
        }

        config
    }

    /// The freshness window as a signed delta for timestamp arithmetic,
    /// clamped to [`MAX_FRESHNESS_WINDOW_SECS`].
    pub fn freshness(&self) -> TimeDelta {
        let max = Duration::from_secs(MAX_FRESHNESS_WINDOW_SECS);
        TimeDelta::from_std(self.freshness_window.min(max)).unwrap_or(TimeDelta::zero())
    }
}

/// Timers are built from these periods; a zero period would panic.
pub(crate) fn positive_interval(name: &str, period: Duration) -> Result<Duration, ClientError> {
    if period.is_zero() {
        return Err(ClientError::Config(format!("{name} must be positive")));
    }
    Ok(period)
}

/// Zero would mean a busy loop or an always-stale window, so it is rejected.
fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
