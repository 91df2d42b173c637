//! Provider fetchers with a shared trait-based interface.
//!
//! Each provider implements [`Source`], turning a topic string into
//! [`NormalizedRecord`]s. The orchestrator only ever talks to the trait, which
//! keeps provider quirks (PubMed batching, Semantic Scholar pagination) inside
//! the provider module.
//!
//! - [`PubMedSource`]: NCBI E-utilities (esearch + batched efetch, XML)
//! - [`SemanticScholarSource`]: Semantic Scholar Graph API (paginated search +
//!   per-paper detail fetch, JSON)
//! - [`MockSource`]: canned responses for tests

pub mod mock;
mod pubmed;
mod semantic;

pub use mock::MockSource;
pub use pubmed::{PubMedSource, PUBMED_BATCH_SIZE, PUBMED_BASE_URL, PUBMED_MAX_RESULTS};
pub use semantic::{SemanticScholarSource, SEMANTIC_API_BASE};

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{NormalizedRecord, SourceKind};

/// A bibliographic provider that can be searched by topic
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// The record variant this source produces
    fn kind(&self) -> SourceKind;

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.kind().label()
    }

    /// Fetch every record matching the topic
    async fn fetch_topic(&self, topic: &str) -> Result<Vec<NormalizedRecord>, SourceError>;
}

/// Explicit waits between provider calls
///
/// Providers throttle aggressively, so the fetchers pause at fixed points
/// instead of sharing a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between PubMed efetch batches (not before the first)
    pub pubmed_batch_delay: Duration,

    /// Between Semantic Scholar search pages
    pub scholar_page_delay: Duration,

    /// After a detail fetch for a paper exposing an open-access PDF
    pub scholar_pdf_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            pubmed_batch_delay: Duration::from_millis(1000),
            scholar_page_delay: Duration::from_millis(2000),
            scholar_pdf_delay: Duration::from_millis(1000),
        }
    }
}

impl Pacing {
    /// No waits at all (tests)
    pub fn none() -> Self {
        Self {
            pubmed_batch_delay: Duration::ZERO,
            scholar_page_delay: Duration::ZERO,
            scholar_pdf_delay: Duration::ZERO,
        }
    }
}

/// Sleep unless the duration is zero
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection, timeout or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Parsing error (XML or JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters or client configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::RateLimit => Some(429),
            SourceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => SourceError::RateLimit,
            Some(status) => SourceError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SourceError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
