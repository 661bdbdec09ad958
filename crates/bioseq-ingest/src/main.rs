//! bioseq Ingest - CSV sequence loader

use anyhow::{Context, Result};
use bioseq_common::logging::{init_logging, LogConfig, LogLevel};
use bioseq_ingest::{
    AppConfig, ColumnVariant, DirectoryWatcher, IngestHandler, Ingestor, PgStoreProvider,
    TableMode,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bioseq-ingest")]
#[command(author, version, about = "Load biological sequence CSV files into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one file and exit
    Once {
        /// CSV file to ingest (defaults to BIOSEQ_INPUT_FILE)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Column set of the file: standard or project
        #[arg(long, default_value = "standard")]
        variant: ColumnVariant,

        /// Drop and recreate the target table first
        #[arg(long)]
        recreate: bool,
    },

    /// Ingest the initial file, then every new file in a directory
    Watch {
        /// Initial CSV file (defaults to BIOSEQ_INPUT_FILE)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory to watch (defaults to BIOSEQ_WATCH_DIR)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Column set of the files: standard or project
        #[arg(long, default_value = "project")]
        variant: ColumnVariant,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bioseq-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Once {
            file,
            variant,
            recreate,
        } => {
            if let Some(file) = file {
                config.ingest.input_file = file;
            }
            if recreate {
                config.ingest.table_mode = TableMode::Recreate;
            }
            config.validate()?;

            run_once(&config, variant).await
        },
        Command::Watch { file, dir, variant } => {
            if let Some(file) = file {
                config.ingest.input_file = file;
            }
            if let Some(dir) = dir {
                config.watch.dir = dir;
            }
            config.validate()?;

            run_watch(&config, variant).await
        },
    }
}

fn build_ingestor(config: &AppConfig) -> Result<Ingestor<PgStoreProvider>> {
    let provider = PgStoreProvider::new(config.database.clone())
        .context("Invalid database configuration")?;
    Ok(Ingestor::new(provider, Arc::new(config.ingest.clone())))
}

async fn run_once(config: &AppConfig, variant: ColumnVariant) -> Result<()> {
    let ingestor = build_ingestor(config)?;
    let path = &config.ingest.input_file;

    let summary = ingestor
        .ingest(path, variant)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    info!(
        inserted = summary.inserted,
        dropped = summary.dropped,
        rejected = summary.rejected,
        failed = summary.failed,
        "Done"
    );
    Ok(())
}

async fn run_watch(config: &AppConfig, variant: ColumnVariant) -> Result<()> {
    let ingestor = Arc::new(build_ingestor(config)?);

    // Registered first so files arriving during the initial load are queued
    let subscription = DirectoryWatcher::subscribe(&config.watch).with_context(|| {
        format!("Failed to watch {}", config.watch.dir.display())
    })?;

    let initial = &config.ingest.input_file;
    info!(path = %initial.display(), "Running initial ingestion");
    if let Err(e) = ingestor.ingest(initial, variant).await {
        error!(path = %initial.display(), error = %e, "Initial ingestion failed");
    }

    let shutdown = CancellationToken::new();
    let handler = IngestHandler::new(ingestor, variant);
    let mut watch_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { subscription.run(&handler, shutdown).await }
    });

    let stats = tokio::select! {
        _ = shutdown_signal() => {
            shutdown.cancel();
            (&mut watch_task).await
        },
        finished = &mut watch_task => finished,
    }
    .context("Watch loop terminated abnormally")?;

    info!(files_handled = stats.files_handled, "Shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping watcher");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping watcher");
        },
    }
}
