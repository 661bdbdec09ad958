//! Directory watcher
//!
//! The notification callback only filters events and forwards matching paths
//! into an unbounded channel. A single async loop ([`Subscription::run`])
//! consumes the channel and hands each path to a [`FileHandler`], one file
//! at a time, until the shutdown token is cancelled.

use async_trait::async_trait;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::db::StoreProvider;
use crate::models::ColumnVariant;
use crate::orchestrator::Ingestor;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to prepare watch directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to register watch: {0}")]
    Notify(#[from] notify::Error),
}

/// Receives the paths of newly created matching files
#[async_trait]
pub trait FileHandler: Send + Sync {
    async fn handle(&self, path: &Path);
}

/// Whether an event kind announces a new file in the directory
///
/// Files moved into the directory count as new; directory creation does not.
/// Rename pairs are ignored since the backend also reports their `To` half.
pub fn is_creation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Exact, case-sensitive extension match; `extension` has no leading dot
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(extension)
}

/// Paths of `event` worth handing to the consumer loop
pub fn matching_paths(event: &Event, extension: &str) -> Vec<PathBuf> {
    if !is_creation(&event.kind) {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| has_extension(path, extension) && !path.is_dir())
        .cloned()
        .collect()
}

/// Counters reported when the watch loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchStats {
    pub files_handled: u64,
    /// Paths gone or turned into directories by the time they were handled
    pub files_skipped: u64,
}

/// Registers watches on a directory
pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// Start watching `config.dir` (non-recursive), creating it if missing
    ///
    /// Events are buffered from this point on, so files created before
    /// [`Subscription::run`] is polled are not lost.
    pub fn subscribe(config: &WatchConfig) -> Result<Subscription, WatchError> {
        let dir = config.dir.clone();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|source| WatchError::Directory {
                path: dir.clone(),
                source,
            })?;
            info!(dir = %dir.display(), "Created watch directory");
        }
        if !dir.is_dir() {
            return Err(WatchError::NotADirectory(dir));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let extension = config.extension.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for path in matching_paths(&event, &extension) {
                        // receiver gone means the loop has stopped
                        let _ = tx.send(path);
                    }
                },
                Err(e) => error!(error = %e, "File system notification error"),
            })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(
            dir = %dir.display(),
            extension = %config.extension,
            "Watching directory for new files"
        );

        Ok(Subscription {
            watcher,
            dir,
            settle_delay: config.settle_delay(),
            paths: rx,
        })
    }
}

/// An active watch; consumed by [`Subscription::run`]
pub struct Subscription {
    watcher: RecommendedWatcher,
    dir: PathBuf,
    settle_delay: Duration,
    paths: mpsc::UnboundedReceiver<PathBuf>,
}

impl Subscription {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Consume matching paths until `shutdown` is cancelled
    ///
    /// A file being handled when shutdown arrives is finished first. The
    /// watch is released before returning.
    pub async fn run<H>(mut self, handler: &H, shutdown: CancellationToken) -> WatchStats
    where
        H: FileHandler + ?Sized,
    {
        let mut stats = WatchStats::default();

        loop {
            let path = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Stop requested, leaving watch loop");
                    break;
                },
                next = self.paths.recv() => match next {
                    Some(path) => path,
                    None => {
                        warn!("Notification channel closed");
                        break;
                    },
                },
            };

            debug!(path = %path.display(), "New file detected");

            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }

            if !path.is_file() {
                warn!(path = %path.display(), "File vanished before ingestion, skipping");
                stats.files_skipped += 1;
                continue;
            }

            info!(path = %path.display(), "New file detected, starting ingestion");
            handler.handle(&path).await;
            stats.files_handled += 1;
        }

        if let Err(e) = self.watcher.unwatch(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Failed to release watch");
        }
        info!(
            files_handled = stats.files_handled,
            files_skipped = stats.files_skipped,
            "Directory watcher stopped"
        );

        stats
    }
}

/// Ingests every detected file with a fixed column variant
///
/// Failures are logged and never stop the watch loop.
pub struct IngestHandler<P> {
    ingestor: Arc<Ingestor<P>>,
    variant: ColumnVariant,
}

impl<P> IngestHandler<P> {
    pub fn new(ingestor: Arc<Ingestor<P>>, variant: ColumnVariant) -> Self {
        Self { ingestor, variant }
    }
}

#[async_trait]
impl<P: StoreProvider> FileHandler for IngestHandler<P> {
    async fn handle(&self, path: &Path) {
        match self.ingestor.ingest(path, self.variant).await {
            Ok(summary) if !summary.is_clean() => {
                warn!(
                    path = %path.display(),
                    rejected = summary.rejected,
                    failed = summary.failed,
                    "File ingested with row errors"
                );
            },
            Ok(_) => {},
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to ingest file");
            },
        }
    }
}
