//! Deletes every object in the configured export bucket.

use anyhow::{Context, Result};
use clap::Parser;
use research_harvest::config::load_config;
use research_harvest::logging::{self, LogFormat};
use research_harvest::storage::{ObjectStore, S3Store};
use std::path::PathBuf;

/// Clear the research export bucket
#[derive(Parser, Debug)]
#[command(name = "clear-bucket")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Delete every object in the research export bucket", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bucket to clear (overrides S3_BUCKET_NAME)
    #[arg(long)]
    bucket: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, false, cli.log_format);

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bucket) = cli.bucket {
        config.storage.bucket = Some(bucket);
    }

    let settings = config.s3_settings()?;
    let bucket = settings.bucket.clone();
    let store = S3Store::new(settings).context("Failed to initialize S3 storage")?;

    let deleted = store
        .clear_bucket()
        .await
        .with_context(|| format!("Failed to clear bucket {}", bucket))?;

    println!("Deleted {} objects from {}", deleted, bucket);
    Ok(())
}
