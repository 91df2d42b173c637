use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use research_harvest::config::{load_config, Config};
use research_harvest::export::CsvExporter;
use research_harvest::logging::{self, LogFormat};
use research_harvest::models::{topic_file_stem, TOPICS};
use research_harvest::pipeline::{run_timestamp, Orchestrator, RunContext};
use research_harvest::storage::S3Store;
use std::path::PathBuf;
use std::sync::Arc;

/// Research Harvest - Collect healthcare research records into per-topic CSV exports
#[derive(Parser, Debug)]
#[command(name = "research-harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Harvest PubMed and Semantic Scholar records into per-topic CSV exports", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, deduplicate, export and upload every topic
    Run {
        /// Directory for CSV exports (overrides configuration)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Keep exports local and skip the upload
        #[arg(long)]
        no_upload: bool,
    },

    /// List the topics and their export file stems
    Topics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_format);

    match cli.command {
        Commands::Run {
            output_dir,
            no_upload,
        } => {
            let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
            run(config, output_dir, no_upload).await
        }
        Commands::Topics => {
            let ts = run_timestamp();
            for topic in TOPICS {
                println!("{:<45} {}.csv", topic, topic_file_stem(topic, &ts));
            }
            Ok(())
        }
    }
}

async fn run(config: Config, output_dir: Option<PathBuf>, no_upload: bool) -> Result<()> {
    let output_dir = output_dir.unwrap_or_else(|| config.output.directory.clone());
    let exporter = Arc::new(CsvExporter::new(&output_dir));

    let mut orchestrator =
        Orchestrator::new(exporter).with_cleanup_delay(config.cleanup_delay());

    if no_upload {
        tracing::info!("Upload disabled, exports stay in {}", output_dir.display());
    } else {
        let settings = config.s3_settings()?;
        let store = S3Store::new(settings).context("Failed to initialize S3 storage")?;
        orchestrator = orchestrator.with_store(Arc::new(store));
    }

    let ctx = RunContext::from_config(&config, run_timestamp())
        .context("Failed to build HTTP clients")?;

    let summary = orchestrator.run(&ctx).await;

    for outcome in summary.failed() {
        eprintln!(
            "{}: {}",
            outcome.topic,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "Run {}: {}/{} topics exported, {} records",
        summary.run_timestamp,
        summary.succeeded(),
        summary.topics.len(),
        summary.total_records()
    );

    Ok(())
}
