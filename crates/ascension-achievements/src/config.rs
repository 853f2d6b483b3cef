//! Achievement pipeline configuration

use std::path::PathBuf;
use std::time::Duration;

use ascension_core::RetryPolicy;

/// Runtime configuration for the achievement pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Source endpoint; IDs are appended as `?achievement=<id>`
    pub base_url: String,
    /// First ID to fetch (inclusive)
    pub start_id: u32,
    /// Last ID to fetch (inclusive)
    pub end_id: u32,
    /// Number of concurrent workers
    pub workers: usize,
    /// CSV store path
    pub output: PathBuf,
    /// Time between persistence flushes
    pub flush_interval: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Pause after every request (rate limit)
    pub request_delay: Duration,
    /// How long a maintenance-hit ID waits before it is handed out again
    pub maintenance_backoff: Duration,
    /// Retry budget for transient failures
    pub retry: RetryPolicy,
    /// Keep rows of an existing store and skip their IDs
    pub resume: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://db.ascension.gg/".to_string(),
            start_id: 1,
            end_id: 400_000,
            workers: 4,
            output: PathBuf::from("scraped_achievements.csv"),
            flush_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            request_delay: Duration::from_secs(1),
            maintenance_backoff: Duration::from_secs(15 * 60),
            retry: RetryPolicy::default(),
            resume: false,
        }
    }
}

impl Config {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.start_id <= self.end_id,
            "Invalid ID range: start {} is after end {}",
            self.start_id,
            self.end_id
        );
        anyhow::ensure!(self.workers > 0, "At least one worker is required");
        anyhow::ensure!(
            !self.flush_interval.is_zero(),
            "Flush interval must be positive"
        );
        anyhow::ensure!(!self.base_url.is_empty(), "Base URL must not be empty");
        Ok(())
    }

    /// Number of IDs in the configured range
    pub fn id_count(&self) -> usize {
        (self.end_id - self.start_id) as usize + 1
    }
}
