//! Delimited export of a topic's record set.
//!
//! The pipeline only depends on the [`Exporter`] trait; [`CsvExporter`] is the
//! production implementation.

mod csv_file;

pub use csv_file::{export_row, CsvExporter, CSV_HEADER};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::NormalizedRecord;

/// Writes a record set under a target name and returns where it landed
#[async_trait]
pub trait Exporter: Send + Sync + std::fmt::Debug {
    async fn export(
        &self,
        records: &[NormalizedRecord],
        target: &str,
    ) -> Result<PathBuf, ExportError>;
}

/// Errors that can occur while exporting
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export target: {0}")]
    InvalidTarget(String),
}
