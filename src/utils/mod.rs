//! Utility modules supporting the download pipeline.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts and a user agent
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff for transient fetch errors
//! - [`KeyedLocks`]: per-identifier async mutual exclusion
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use arxiv_mcp::sources::SourceError;
//! use arxiv_mcp::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_page() -> Result<String, SourceError> { Ok("<p>hi</p>".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let html = with_retry(config, || fetch_page()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod keyed_lock;
mod retry;

pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use retry::{with_retry, RetryConfig};
