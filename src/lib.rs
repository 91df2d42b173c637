//! # Research Harvest
//!
//! Harvests healthcare research records from PubMed and Semantic Scholar for a
//! fixed list of topics, writes one deduplicated CSV per topic and uploads it
//! to object storage.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Record types, the topic list and the Scholar search cursor
//! - [`sources`]: Provider fetchers behind the [`Source`] trait
//! - [`utils`]: HTTP client, retry policy and deduplication
//! - [`export`]: CSV export
//! - [`storage`]: S3 upload and bucket clearing
//! - [`pipeline`]: Per-topic orchestration
//! - [`config`]: Configuration management
//! - [`logging`]: Tracing setup for the binaries

pub mod config;
pub mod export;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use models::NormalizedRecord;
pub use pipeline::{Orchestrator, RunContext, RunSummary};
pub use sources::Source;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
