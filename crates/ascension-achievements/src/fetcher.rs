//! Fetching and classifying a single achievement page

use std::time::Duration;

use crate::config::Config;
use crate::extract::extract_title;

/// Heading text the source serves with HTTP 503 during maintenance windows
pub const MAINTENANCE_MARKER: &str = "Ascension DB under maintenance";

/// Result of one fetch attempt for one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page exists; carries the trimmed achievement name
    Found(String),
    /// The source's "Achievement #<id>" placeholder page
    NotFound,
    /// Source is in a maintenance window; retry later
    Maintenance,
    /// Network failure, timeout, or a page without a usable title
    TransientError(String),
    /// Unexpected HTTP status; not retried
    FatalError(String),
}

/// Source of achievement pages, one ID at a time.
///
/// Implementations must be callable from several worker threads at once.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, id: u32) -> FetchOutcome;
}

/// Page URL for `id`: `<base>?achievement=<id>`
pub fn achievement_url(base_url: &str, id: u32) -> String {
    format!("{base_url}?achievement={id}")
}

/// Placeholder title the source renders for unknown IDs
fn is_placeholder(title: &str, id: u32) -> bool {
    title.contains(&format!("Achievement #{id}"))
}

/// Classify an HTTP response for `id`.
pub fn classify(id: u32, status: u16, body: &str) -> FetchOutcome {
    match status {
        200 => match extract_title(body) {
            Some(title) if is_placeholder(&title, id) => FetchOutcome::NotFound,
            Some(title) if title.is_empty() => {
                FetchOutcome::TransientError("HTTP 200 with empty <h1>".to_string())
            }
            Some(title) => FetchOutcome::Found(title),
            None => FetchOutcome::TransientError("HTTP 200 without <h1>".to_string()),
        },
        503 => match extract_title(body) {
            Some(title) if title.contains(MAINTENANCE_MARKER) => FetchOutcome::Maintenance,
            _ => FetchOutcome::FatalError("HTTP 503".to_string()),
        },
        other => FetchOutcome::FatalError(format!("HTTP {other}")),
    }
}

/// Fetcher backed by the shared HTTP client.
///
/// Sleeps `delay` after every request, whatever the outcome, to stay under
/// the source's rate limit.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    timeout: Duration,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration, delay: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.base_url.clone(),
            config.request_timeout,
            config.request_delay,
        )
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, id: u32) -> FetchOutcome {
        let url = achievement_url(&self.base_url, id);
        let outcome = match ascension_core::get_text(&url, self.timeout) {
            Ok((status, body)) => classify(id, status, &body),
            Err(e) => FetchOutcome::TransientError(e.to_string()),
        };
        std::thread::sleep(self.delay);
        outcome
    }
}
