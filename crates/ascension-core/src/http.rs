//! Blocking HTTP GET over a shared async client.
//!
//! Uses async reqwest on a shared tokio runtime, but presents a sync
//! interface so plain worker threads can call it.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP request failure (no response, or the body could not be read)
#[derive(Debug)]
pub struct HttpError {
    pub message: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP error: {}", self.message)
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            message: format!("request timed out after {}s", after.as_secs()),
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// GET `url` and read the whole body as text.
///
/// Any status code is returned as-is; only transport failures (connect,
/// timeout, body read) are errors. `timeout` bounds the whole request.
pub fn get_text(url: &str, timeout: Duration) -> Result<(u16, String), HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let request = async {
            let response = SHARED_CLIENT
                .get(url)
                .send()
                .await
                .map_err(|e| HttpError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::from_reqwest(&e))?;
            Ok::<_, HttpError>((status, body))
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::timed_out(timeout)),
        }
    })
}
