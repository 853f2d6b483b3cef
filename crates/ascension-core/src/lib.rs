//! Ascension Core - Common infrastructure for the scraping pipeline
//!
//! Work distribution, retry policy, blocking HTTP, logging, progress
//! and shutdown handling. Nothing in here knows about achievements.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use http::{HttpError, SHARED_RUNTIME, get_text};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryPolicy, backoff_duration};
pub use shutdown::{install_signal_handlers, is_shutdown_requested};
pub use work_queue::{Claim, RetryQueue};
