//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// File-level configuration for the `ascension` binary
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub source: SourceConfig,
    pub workers: WorkersConfig,
    pub http: HttpConfig,
    pub persist: PersistConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scraped_achievements.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub start_id: u32,
    pub end_id: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://db.ascension.gg/".to_string(),
            start_id: 1,
            end_id: 400_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { default: 4, max: 16 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    pub timeout: u64,
    /// Pause after each request in milliseconds
    pub delay_ms: u64,
    /// Retries for network failures and title-less pages
    pub max_retries: u32,
    /// Seconds a maintenance-hit ID waits before the next attempt
    pub maintenance_backoff: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            delay_ms: 1000,
            max_retries: 3,
            maintenance_backoff: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Seconds between appends to the store
    pub flush_interval: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { flush_interval: 15 }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ascension.toml (current directory)
    /// 2. ~/.config/ascension/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ascension.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ascension") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Pipeline settings before command-line overrides
    pub fn pipeline(&self) -> ascension_achievements::Config {
        ascension_achievements::Config {
            base_url: self.source.base_url.clone(),
            start_id: self.source.start_id,
            end_id: self.source.end_id,
            workers: self.workers.default.min(self.workers.max),
            output: self.output.path.clone(),
            flush_interval: Duration::from_secs(self.persist.flush_interval),
            request_timeout: Duration::from_secs(self.http.timeout),
            request_delay: Duration::from_millis(self.http.delay_ms),
            maintenance_backoff: Duration::from_secs(self.http.maintenance_backoff),
            retry: ascension_core::RetryPolicy::new(self.http.max_retries),
            resume: false,
        }
    }
}
