//! Configuration management.

use crate::telemetry::TelemetryConfig;
use serde::Deserialize;

/// Main configuration for the adsync core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Report cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Job-status tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Fire-and-forget task runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Logging and metrics configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Prefix applied to every key written by this core
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Default TTL for cache entries, in seconds (key types may override)
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Processing ceiling: active-report entries expire after this many
    /// seconds so a crashed worker cannot leave a window stuck forever
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,

    /// Lookback window for an account's first sync, in days
    #[serde(default = "default_initial_lookback_days")]
    pub initial_lookback_days: u32,

    /// Lookback window for incremental syncs, in days
    #[serde(default = "default_incremental_lookback_days")]
    pub incremental_lookback_days: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            entry_ttl_secs: default_entry_ttl_secs(),
            initial_lookback_days: default_initial_lookback_days(),
            incremental_lookback_days: default_incremental_lookback_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of concurrently executing tasks
    #[serde(default = "default_runner_concurrency")]
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_runner_concurrency(),
        }
    }
}

// Default value functions
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_key_prefix() -> String {
    "adsync:".to_string()
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_entry_ttl_secs() -> u64 {
    21_600 // 6 hours; longest observed report turnaround plus slack
}
fn default_initial_lookback_days() -> u32 {
    365
}
fn default_incremental_lookback_days() -> u32 {
    7
}
fn default_runner_concurrency() -> usize {
    10
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ADSYNC").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ADSYNC").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
