//! Object storage for exported files.
//!
//! - [`S3Store`]: AWS S3 (or any S3-compatible endpoint)
//! - [`MemoryStore`]: in-process store for tests and dry runs

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store};

use async_trait::async_trait;
use std::path::Path;

/// Uploads files and clears buckets
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Upload a local file, returning its location URI
    async fn upload(&self, path: &Path) -> Result<String, StorageError>;

    /// Delete every object in the bucket, returning how many were removed
    async fn clear_bucket(&self) -> Result<usize, StorageError>;
}

/// Errors that can occur when talking to the object store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage is not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Object key for a local file: its file name
pub(crate) fn object_key(path: &Path) -> Result<String, StorageError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))
}
