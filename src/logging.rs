//! Tracing setup shared by the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Directive for a `-v` count when `RUST_LOG` is unset
fn default_directive(verbose: u8, quiet: bool) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    format!("research_harvest={level},clear_bucket={level}")
}

/// Filter directive for a `-v` count; `RUST_LOG` takes precedence
pub fn filter_directive(verbose: u8, quiet: bool) -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| default_directive(verbose, quiet))
}

/// Install the global subscriber
pub fn init(verbose: u8, quiet: bool, format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directive(verbose, quiet)))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
