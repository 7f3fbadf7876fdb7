//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream statistics API and pacing settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Hot tier settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Startup synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Periodic refresh settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Champion publication policy
    #[serde(default)]
    pub champions: ChampionsConfig,

    /// Durable tier settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.upstream.base_url)
            .map_err(|e| AppError::config(format!("upstream.base_url is invalid: {e}")))?;
        if self.upstream.user_agent.trim().is_empty() {
            return Err(AppError::config("upstream.user_agent is empty"));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(AppError::config("upstream.timeout_secs must be > 0"));
        }
        if self.upstream.min_spacing_ms > self.upstream.max_spacing_ms {
            return Err(AppError::config(
                "upstream.min_spacing_ms must not exceed upstream.max_spacing_ms",
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::config("cache.ttl_secs must be > 0"));
        }
        if self.sync.start_year < 1950 {
            return Err(AppError::config("sync.start_year must be >= 1950"));
        }
        if self.sync.batch_size == 0 {
            return Err(AppError::config("sync.batch_size must be > 0"));
        }
        if self.schedule.weekly_hour > 23 {
            return Err(AppError::config("schedule.weekly_hour must be 0-23"));
        }
        if self.schedule.hourly_interval_secs == 0 {
            return Err(AppError::config(
                "schedule.hourly_interval_secs must be > 0",
            ));
        }
        self.schedule.weekday()?;
        Ok(())
    }
}

/// Upstream HTTP client and rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the Ergast-compatible API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt of a logical GET
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Spacing between requests at startup
    #[serde(default = "defaults::initial_spacing")]
    pub initial_spacing_ms: u64,

    /// Floor the spacing decays back to
    #[serde(default = "defaults::min_spacing")]
    pub min_spacing_ms: u64,

    /// Ceiling for spacing after repeated 429s
    #[serde(default = "defaults::max_spacing")]
    pub max_spacing_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            initial_spacing_ms: defaults::initial_spacing(),
            min_spacing_ms: defaults::min_spacing(),
            max_spacing_ms: defaults::max_spacing(),
        }
    }
}

/// Hot tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to every hot-tier write
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,

    /// Upper bound on hot-tier entries
    #[serde(default = "defaults::max_entries")]
    pub max_entries: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
            max_entries: defaults::max_entries(),
        }
    }
}

/// Startup synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First season served
    #[serde(default = "defaults::start_year")]
    pub start_year: i32,

    /// Years fetched per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "defaults::batch_delay")]
    pub batch_delay_ms: u64,

    /// Delay before the single retry of a failed pass
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_year: defaults::start_year(),
            batch_size: defaults::batch_size(),
            batch_delay_ms: defaults::batch_delay(),
            retry_delay_secs: defaults::retry_delay(),
        }
    }
}

/// Periodic refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Day of the weekly race-winners refresh ("Mon", "Tue", ...)
    #[serde(default = "defaults::weekly_weekday")]
    pub weekly_weekday: String,

    /// UTC hour of the weekly refresh
    #[serde(default = "defaults::weekly_hour")]
    pub weekly_hour: u32,

    /// Interval of the current-season champion refresh
    #[serde(default = "defaults::hourly_interval")]
    pub hourly_interval_secs: u64,
}

impl ScheduleConfig {
    /// Parse the configured weekday.
    pub fn weekday(&self) -> Result<Weekday> {
        self.weekly_weekday.parse::<Weekday>().map_err(|_| {
            AppError::config(format!(
                "schedule.weekly_weekday '{}' is not a weekday",
                self.weekly_weekday
            ))
        })
    }

    pub fn hourly_interval(&self) -> Duration {
        Duration::from_secs(self.hourly_interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekly_weekday: defaults::weekly_weekday(),
            weekly_hour: defaults::weekly_hour(),
            hourly_interval_secs: defaults::hourly_interval(),
        }
    }
}

/// What to publish for a season that has not finished yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnfinishedSeasonPolicy {
    /// Blank name placeholders until the last round is in
    #[default]
    Blank,
    /// Publish whoever currently leads the standings
    ProvisionalLeader,
}

/// Champion publication settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChampionsConfig {
    #[serde(default)]
    pub unfinished_season: UnfinishedSeasonPolicy,
}

/// Durable tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory (relative to the storage dir) holding durable records
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Upstream defaults
    pub fn base_url() -> String {
        "https://api.jolpi.ca/ergast/f1".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; podium/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_spacing() -> u64 {
        2000
    }
    pub fn min_spacing() -> u64 {
        1500
    }
    pub fn max_spacing() -> u64 {
        10_000
    }

    // Cache defaults
    pub fn ttl() -> u64 {
        3600
    }
    pub fn max_entries() -> u64 {
        10_000
    }

    // Sync defaults
    pub fn start_year() -> i32 {
        2005
    }
    pub fn batch_size() -> usize {
        5
    }
    pub fn batch_delay() -> u64 {
        2000
    }
    pub fn retry_delay() -> u64 {
        300
    }

    // Schedule defaults: Mondays at 02:00 UTC, hourly checks
    pub fn weekly_weekday() -> String {
        "Mon".into()
    }
    pub fn weekly_hour() -> u32 {
        2
    }
    pub fn hourly_interval() -> u64 {
        3600
    }

    pub fn data_dir() -> String {
        "data".into()
    }
    pub fn log_level() -> String {
        "info".into()
    }
}
