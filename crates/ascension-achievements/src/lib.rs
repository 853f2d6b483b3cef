//! Ascension Achievements - achievement name scraper for db.ascension.gg
//!
//! Walks a contiguous range of achievement IDs with a fixed pool of
//! rate-limited workers and writes an ID-sorted `ID,Name` CSV.
//!
//! # Features
//!
//! - Maintenance windows (HTTP 503) re-queue the ID with a delay instead of
//!   stalling the pool
//! - Bounded exponential retry for network failures
//! - Periodic append-only flushes, so a crash loses at most one interval
//! - Final sorted, duplicate-free rewrite; resumable from an existing store
//!
//! # Example
//!
//! ```ignore
//! use ascension_achievements::{Config, run};
//! use ascension_core::ProgressContext;
//!
//! let config = Config {
//!     start_id: 1,
//!     end_id: 100,
//!     ..Default::default()
//! };
//!
//! let summary = run(&config, &ProgressContext::new())?;
//! println!("Found {} achievements", summary.found);
//! ```

pub mod config;
pub mod extract;
pub mod fetcher;
pub mod merge;
pub mod persist;
pub mod record;
pub mod runner;
pub mod sink;
pub mod store;
pub mod worker;

// Re-exports
pub use config::Config;
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher, classify};
pub use merge::merge_stores;
pub use record::{ResultRecord, WorkItem};
pub use runner::{Summary, run, run_with_fetcher};
pub use sink::ResultSink;
pub use store::{CsvStore, StoreError, read_records};
