//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the two category endpoints, an optional static mirror, request timing and
//! cache lifetime.
//!
//! Configuration is stored at `~/.config/compboard/config.json`. Environment
//! variables (`COMPBOARD_SCIENCE_URL`, `COMPBOARD_GEM_URL`,
//! `COMPBOARD_MIRROR_URL`, `COMPBOARD_CACHE_DIR`) override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "compboard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Deadline for a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Attempts made by the mirror request path before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between mirror attempts; attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Snapshot time-to-live.
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 60;

/// Gap between consecutive result requests during a preload.
pub const DEFAULT_PRELOAD_STAGGER_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub science_url: Option<String>,
    pub gem_url: Option<String>,
    pub mirror_url: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub cache_ttl_minutes: i64,
    pub preload_stagger_ms: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            science_url: None,
            gem_url: None,
            mirror_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            preload_stagger_ms: DEFAULT_PRELOAD_STAGGER_MS,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from environment-style lookups. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("COMPBOARD_SCIENCE_URL") {
            self.science_url = Some(url);
        }
        if let Some(url) = get("COMPBOARD_GEM_URL") {
            self.gem_url = Some(url);
        }
        if let Some(url) = get("COMPBOARD_MIRROR_URL") {
            self.mirror_url = Some(url);
        }
        if let Some(dir) = get("COMPBOARD_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn preload_stagger(&self) -> Duration {
        Duration::from_millis(self.preload_stagger_ms)
    }

    /// Snapshot lifetime. Values too large to represent fall back to the default.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.cache_ttl_minutes)
            .or_else(|| {
                warn!(
                    cache_ttl_minutes = self.cache_ttl_minutes,
                    "cache_ttl_minutes out of range, using default"
                );
                chrono::Duration::try_minutes(DEFAULT_CACHE_TTL_MINUTES)
            })
            .unwrap_or_else(|| chrono::Duration::hours(1))
    }

    /// Version tag stamped on persisted snapshots; a mismatch invalidates them.
    pub fn app_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
