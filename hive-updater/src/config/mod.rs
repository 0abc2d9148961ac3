//! Process configuration read from environment variables.
//!
//! Call `dotenvy::dotenv()` first so a local `.env` file is honored.

use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Default SQLite database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:hive-updater.db?mode=rwc";

/// Default per-player consumer interval (5 minutes).
pub const DEFAULT_CONSUMER_MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default per-player poll interval for the kills board.
pub const DEFAULT_KILLS_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default per-player poll interval for the token board.
pub const DEFAULT_TOKENS_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub database_url: String,
    pub discord_webhook_url: Option<String>,
    pub webhook_url: Option<String>,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<String>,
    /// Overrides every updater's own tick when set.
    pub poll_tick: Option<Duration>,
    pub kills_interval: Duration,
    pub tokens_interval: Duration,
    pub consumer_min_interval: Duration,
    /// Composite cache entries idle for longer are evicted; never when unset.
    pub cache_max_idle: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: hive_api::DEFAULT_BASE_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            discord_webhook_url: None,
            webhook_url: None,
            log_dir: None,
            poll_tick: None,
            kills_interval: DEFAULT_KILLS_INTERVAL,
            tokens_interval: DEFAULT_TOKENS_INTERVAL,
            consumer_min_interval: DEFAULT_CONSUMER_MIN_INTERVAL,
            cache_max_idle: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_base_url: get("HIVE_API_URL").unwrap_or(defaults.api_base_url),
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            webhook_url: get("WEBHOOK_URL"),
            log_dir: get("LOG_DIR"),
            poll_tick: parse_secs("POLL_TICK_SECS", get("POLL_TICK_SECS"))?,
            kills_interval: parse_secs("KILLS_INTERVAL_SECS", get("KILLS_INTERVAL_SECS"))?
                .unwrap_or(defaults.kills_interval),
            tokens_interval: parse_secs("TOKENS_INTERVAL_SECS", get("TOKENS_INTERVAL_SECS"))?
                .unwrap_or(defaults.tokens_interval),
            consumer_min_interval: parse_secs(
                "CONSUMER_MIN_INTERVAL_SECS",
                get("CONSUMER_MIN_INTERVAL_SECS"),
            )?
            .unwrap_or(defaults.consumer_min_interval),
            cache_max_idle: parse_secs("CACHE_MAX_IDLE_SECS", get("CACHE_MAX_IDLE_SECS"))?,
        })
    }
}

fn parse_secs(key: &str, value: Option<String>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            u64::from_str(&v)
                .map(Duration::from_secs)
                .map_err(|e| Error::config(format!("{key}: invalid number of seconds '{v}': {e}")))
        })
        .transpose()
}
