//! Configuration management.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults, which also pick up the well-known environment
//!    variables (`SEMANTIC_SCHOLAR_API_KEY`, `AWS_*`, `S3_BUCKET_NAME`)
//! 2. An optional TOML file passed with `--config`
//! 3. `RESEARCH_HARVEST__<SECTION>__<KEY>` environment variables
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! semantic_scholar = "your-api-key"
//!
//! [http]
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//! max_jitter_ms = 1000
//!
//! [pacing]
//! pubmed_batch_delay_ms = 1000
//! scholar_page_delay_ms = 2000
//! scholar_pdf_delay_ms = 1000
//!
//! [output]
//! directory = "./exports"
//! cleanup_delay_secs = 5
//!
//! [storage]
//! bucket = "my-harvest-bucket"
//! region = "us-east-1"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sources::Pacing;
use crate::storage::S3Settings;
use crate::utils::RetryConfig;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "RESEARCH_HARVEST";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Retry policy for provider calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Waits between provider calls
    #[serde(default)]
    pub pacing: PacingSettings,

    /// Where exports are written
    #[serde(default)]
    pub output: OutputSettings,

    /// Object storage for uploads
    #[serde(default)]
    pub storage: StorageSettings,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default)]
    pub semantic_scholar: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            semantic_scholar: env_var("SEMANTIC_SCHOLAR_API_KEY"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the `research-harvest/<version>` user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Retry policy, delays in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

/// Pacing waits, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSettings {
    #[serde(default = "default_pubmed_batch_delay_ms")]
    pub pubmed_batch_delay_ms: u64,

    #[serde(default = "default_scholar_page_delay_ms")]
    pub scholar_page_delay_ms: u64,

    #[serde(default = "default_scholar_pdf_delay_ms")]
    pub scholar_pdf_delay_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            pubmed_batch_delay_ms: default_pubmed_batch_delay_ms(),
            scholar_page_delay_ms: default_scholar_page_delay_ms(),
            scholar_pdf_delay_ms: default_scholar_pdf_delay_ms(),
        }
    }
}

fn default_pubmed_batch_delay_ms() -> u64 {
    1000
}

fn default_scholar_page_delay_ms() -> u64 {
    2000
}

fn default_scholar_pdf_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// Seconds between upload and local file removal
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_cleanup_delay_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// S3-compatible endpoint, e.g. MinIO
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: env_var("S3_BUCKET_NAME"),
            region: env_var("AWS_REGION").unwrap_or_else(default_region),
            access_key_id: env_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: env_var("AWS_SECRET_ACCESS_KEY"),
            endpoint: env_var("S3_ENDPOINT"),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            max_jitter: Duration::from_millis(self.retry.max_jitter_ms),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            pubmed_batch_delay: Duration::from_millis(self.pacing.pubmed_batch_delay_ms),
            scholar_page_delay: Duration::from_millis(self.pacing.scholar_page_delay_ms),
            scholar_pdf_delay: Duration::from_millis(self.pacing.scholar_pdf_delay_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.output.cleanup_delay_secs)
    }

    /// S3 connection settings; fails when no bucket is configured
    pub fn s3_settings(&self) -> Result<S3Settings, ConfigError> {
        let bucket = self
            .storage
            .bucket
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or(ConfigError::MissingBucket)?;

        Ok(S3Settings {
            bucket,
            region: self.storage.region.clone(),
            access_key: self.storage.access_key_id.clone(),
            secret_key: self.storage.secret_access_key.clone(),
            endpoint: self.storage.endpoint.clone(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No S3 bucket configured (set S3_BUCKET_NAME)")]
    MissingBucket,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load configuration from defaults, an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?);

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
