//! Utility modules supporting the ingestion pipeline.
//!
//! - [`deduplicate_records`]: Drop repeated records by provider-qualified identity
//! - [`HttpClient`]: HTTP client with a call timeout and a retry policy
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use research_harvest::utils::{with_retry, RetryConfig};
//! use research_harvest::sources::SourceError;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default();
//! let data = with_retry(&config, "fetch data", || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod retry;

pub use dedup::deduplicate_records;
pub use http::{HttpClient, HttpClientBuilder, DEFAULT_TIMEOUT};
pub use retry::{with_retry, RetryConfig, TransientError};
