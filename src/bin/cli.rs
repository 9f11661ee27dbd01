//! stackflow CLI
//!
//! Local execution entry point: collection runs and analytics queries over
//! the corpus kept in the storage directory.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stackflow::{
    analysis::Analyzer,
    config,
    error::Result,
    models::Config,
    pipeline::{self, AnalysisRequest, Worker},
};

/// stackflow - Stack Overflow Q&A collector and analytics
#[derive(Parser, Debug)]
#[command(
    name = "stackflow",
    version,
    about = "Collects Stack Overflow questions and computes corpus analytics"
)]
struct Cli {
    /// Path to storage directory containing config and corpus files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the API into the corpus (Ctrl-C stops at the next pause)
    Collect,

    /// Questions per month for a tag
    Trend {
        /// Tag name
        #[arg(long)]
        tag: String,

        /// First month (YYYY-MM, inclusive)
        #[arg(long)]
        start: String,

        /// Last month (YYYY-MM, exclusive)
        #[arg(long)]
        end: String,
    },

    /// Most frequent co-occurring tag pairs
    Pairs {
        /// Number of pairs (1-100)
        #[arg(long, default_value = "10")]
        top: String,
    },

    /// Most frequent tags of a calendar month
    Monthly {
        /// Any date or date-time inside the month
        #[arg(long)]
        date: String,

        /// Number of tags (1-100)
        #[arg(long, default_value = "10")]
        top: String,
    },

    /// Term frequencies over the configured topic tags
    Terms,

    /// Compare solvable and hard questions
    Solvability,

    /// Validate configuration files
    Validate,

    /// Show corpus totals
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Log level from the config file, before the logger exists.
fn configured_level(storage_dir: &Path) -> String {
    Config::load(storage_dir.join("config.toml"))
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string())
}

async fn collect(config: Config, storage_dir: &Path) -> Result<()> {
    let store = pipeline::open_store(&config, storage_dir).await?;
    let worker = Worker::new();

    let accepted = pipeline::submit_collection(&worker, config, store);
    log::info!(
        "Job '{}' accepted at {}, running in background",
        accepted.job,
        accepted.accepted_at.format("%Y-%m-%d %H:%M:%S")
    );

    tokio::select! {
        _ = worker.drain() => {}
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupt received, stopping collection...");
            worker.shutdown().await;
        }
    }
    Ok(())
}

async fn analyze(config: Config, storage_dir: &Path, request: AnalysisRequest) -> Result<()> {
    let store = pipeline::open_store(&config, storage_dir).await?;
    let analyzer = Analyzer::new(store, config.analysis.clone());

    let value = pipeline::run_analysis(&analyzer, &request).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, &configured_level(&cli.storage_dir));

    log::debug!("stackflow starting...");

    if let Command::Validate = cli.command {
        pipeline::run_validate(&cli.storage_dir)?;
        log::info!("All validations passed!");
        return Ok(());
    }

    let config = config::load_all(&cli.storage_dir)?;
    log::debug!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Collect => collect(config, &cli.storage_dir).await?,

        Command::Trend { tag, start, end } => {
            analyze(
                config,
                &cli.storage_dir,
                AnalysisRequest::Trend { tag, start, end },
            )
            .await?
        }

        Command::Pairs { top } => {
            analyze(config, &cli.storage_dir, AnalysisRequest::Pairs { top }).await?
        }

        Command::Monthly { date, top } => {
            analyze(
                config,
                &cli.storage_dir,
                AnalysisRequest::Monthly { date, top },
            )
            .await?
        }

        Command::Terms => analyze(config, &cli.storage_dir, AnalysisRequest::Terms).await?,

        Command::Solvability => {
            analyze(config, &cli.storage_dir, AnalysisRequest::Solvability).await?
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            let store = pipeline::open_store(&config, &cli.storage_dir).await?;
            pipeline::run_info(store.as_ref()).await?;
        }

        Command::Validate => {}
    }

    Ok(())
}
