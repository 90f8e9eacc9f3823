//! Shared anchor engine.
//!
//! The engine owns the current [`Workspace`] snapshot, the parser built from
//! the config, and the channels that tell subscribers about changes. Every
//! update builds a complete new snapshot and swaps it in, so readers only
//! ever see a whole workspace.

use anchors_core::{
    BatchOutcome, DEFAULT_BATCH_SIZE, DocumentEnumerator, FsSource, Parser, Scan, ScanStatus,
    SourceError, TextSource, Workspace, index_document, load_document,
};
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Raised whenever the published workspace changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChanged {
    /// One document was re-parsed or removed
    Document(PathBuf),
    /// The whole workspace was rescanned or reset
    Workspace,
}

/// Outcome of a workspace scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub indexed: usize,
    pub failed: usize,
    /// Candidates left unvisited because the cap was reached
    pub skipped: usize,
    /// The scan was cancelled; its results were discarded
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// The anchor engine.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Engine {
    /// Current workspace snapshot
    workspace: Arc<RwLock<Arc<Workspace>>>,
    /// Sender for broadcasting snapshots to subscribers
    update_tx: watch::Sender<Arc<Workspace>>,
    /// Receiver for getting the current snapshot
    update_rx: watch::Receiver<Arc<Workspace>>,
    /// Change notifications
    events: broadcast::Sender<IndexChanged>,
    /// Parser built from the last valid config; `None` until one is valid
    parser: Arc<RwLock<Option<Arc<Parser>>>>,
    /// Current config (reloaded on changes)
    config: Arc<RwLock<Config>>,
    /// Current config error (if the config file or tag set has errors)
    config_error: Arc<RwLock<Option<String>>>,
    source: Arc<dyn TextSource + Send + Sync>,
    project_root: PathBuf,
    config_path: PathBuf,
    version: AtomicU64,
}

impl Engine {
    /// Create an engine reading documents from the filesystem
    pub async fn new(project_root: PathBuf, config_path: PathBuf) -> Result<Self> {
        Self::with_source(project_root, config_path, Arc::new(FsSource)).await
    }

    /// Create an engine reading documents through `source`.
    ///
    /// Config errors are recorded, not returned: the engine starts with the
    /// default config, or without a parser if the tags are unusable.
    pub async fn with_source(
        project_root: PathBuf,
        config_path: PathBuf,
        source: Arc<dyn TextSource + Send + Sync>,
    ) -> Result<Self> {
        if !project_root.is_dir() {
            eyre::bail!("Project root {} is not a directory", project_root.display());
        }

        let (config, mut config_error) = match load_config(&config_path).await {
            Ok(config) => (config, None),
            Err(e) => {
                let error_msg = format!("{:#}", e);
                warn!("{}", error_msg);
                (Config::default(), Some(error_msg))
            }
        };

        let parser = match config.parser() {
            Ok(parser) => Some(Arc::new(parser)),
            Err(e) => {
                error!("{}", e);
                config_error = Some(e.to_string());
                None
            }
        };

        let workspace = Arc::new(Workspace::new());
        let (update_tx, update_rx) = watch::channel(Arc::clone(&workspace));
        let (events, _) = broadcast::channel(256);

        Ok(Self {
            workspace: Arc::new(RwLock::new(workspace)),
            update_tx,
            update_rx,
            events,
            parser: Arc::new(RwLock::new(parser)),
            config: Arc::new(RwLock::new(config)),
            config_error: Arc::new(RwLock::new(config_error)),
            source,
            project_root,
            config_path,
            version: AtomicU64::new(0),
        })
    }

    /// Get the current workspace snapshot.
    pub async fn snapshot(&self) -> Arc<Workspace> {
        self.workspace.read().await.clone()
    }

    /// Get a receiver for snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Workspace>> {
        self.update_rx.clone()
    }

    /// Get a receiver for change notifications.
    pub fn events(&self) -> broadcast::Receiver<IndexChanged> {
        self.events.subscribe()
    }

    /// Number of snapshots published so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Get the current config error, if any.
    pub async fn config_error(&self) -> Option<String> {
        self.config_error.read().await.clone()
    }

    /// The parser in use, if the config ever produced a valid one
    pub async fn parser(&self) -> Option<Arc<Parser>> {
        self.parser.read().await.clone()
    }

    async fn require_parser(&self) -> Result<Arc<Parser>> {
        match self.parser().await {
            Some(parser) => Ok(parser),
            None => {
                let reason = self
                    .config_error()
                    .await
                    .unwrap_or_else(|| "no parser configured".to_string());
                Err(eyre::eyre!("Cannot parse documents: {}", reason))
            }
        }
    }

    /// Swap in a new snapshot and tell subscribers
    async fn publish(&self, workspace: Arc<Workspace>, change: IndexChanged) {
        {
            let mut current = self.workspace.write().await;
            *current = Arc::clone(&workspace);
        }
        self.version.fetch_add(1, Ordering::Relaxed);
        let _ = self.update_tx.send(workspace);
        let _ = self.events.send(change);
    }

    /// Apply `f` to a copy of the current snapshot and publish the result
    async fn update(&self, change: IndexChanged, f: impl FnOnce(&mut Workspace)) {
        let next = {
            let mut current = self.workspace.write().await;
            let mut next = (**current).clone();
            f(&mut next);
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            next
        };
        self.version.fetch_add(1, Ordering::Relaxed);
        let _ = self.update_tx.send(next);
        let _ = self.events.send(change);
    }

    /// Scan the workspace described by the config.
    ///
    /// Documents are processed in batches on the blocking thread pool;
    /// between batches the scan checks `cancel`. A cancelled scan discards its
    /// partial results and republishes the previous snapshot. Enumeration
    /// failures are returned with the previous snapshot restored.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanReport> {
        let start = Instant::now();
        let parser = self.require_parser().await?;
        let config = self.config().await;

        if !config.workspace.enabled {
            debug!("Workspace scanning is disabled");
            return Ok(ScanReport {
                indexed: 0,
                failed: 0,
                skipped: 0,
                cancelled: false,
                elapsed: start.elapsed(),
            });
        }

        let previous = self.snapshot().await;
        self.update(IndexChanged::Workspace, |ws| {
            ws.reset();
            ws.set_status(ScanStatus::Scanning);
        })
        .await;

        let walker = config.walker(&self.project_root);
        let documents = match tokio::task::spawn_blocking(move || walker.enumerate()).await {
            Ok(Ok(documents)) => documents,
            Ok(Err(e)) => {
                self.restore(previous).await;
                return Err(e).wrap_err("Failed to enumerate workspace documents");
            }
            Err(e) => {
                self.restore(previous).await;
                return Err(e).wrap_err("Document enumeration panicked");
            }
        };
        debug!("Found {} candidate documents", documents.len());

        let mut scan = Scan::new(documents, config.workspace.max_files, DEFAULT_BATCH_SIZE);
        loop {
            if cancel.is_cancelled() {
                info!("Workspace scan cancelled after {} documents", scan.indexed());
                self.restore(previous).await;
                return Ok(ScanReport {
                    indexed: scan.indexed(),
                    failed: scan.failed(),
                    skipped: scan.remaining(),
                    cancelled: true,
                    elapsed: start.elapsed(),
                });
            }

            // Reading is blocking I/O; each batch runs on the blocking pool
            let parser = Arc::clone(&parser);
            let source = Arc::clone(&self.source);
            let batch = tokio::task::spawn_blocking(move || {
                let outcome = scan.next_batch(&parser, source.as_ref());
                (scan, outcome)
            })
            .await;
            let outcome = match batch {
                Ok((returned, outcome)) => {
                    scan = returned;
                    outcome
                }
                Err(e) => {
                    self.restore(previous).await;
                    return Err(e).wrap_err("Workspace scan panicked");
                }
            };
            if outcome == BatchOutcome::Done {
                break;
            }
        }

        let report = ScanReport {
            indexed: scan.indexed(),
            failed: scan.failed(),
            skipped: scan.remaining(),
            cancelled: false,
            elapsed: start.elapsed(),
        };
        self.publish(Arc::new(Workspace::from_scan(scan)), IndexChanged::Workspace)
            .await;

        info!(
            "Scanned {} documents in {:?} ({} failed, {} skipped)",
            report.indexed, report.elapsed, report.failed, report.skipped
        );
        Ok(report)
    }

    async fn restore(&self, previous: Arc<Workspace>) {
        self.publish(previous, IndexChanged::Workspace).await;
    }

    /// Re-read `document` through the text source and replace its entry.
    ///
    /// A document that no longer exists is removed. Other read failures
    /// leave the previous entry untouched.
    pub async fn refresh_document(&self, document: &Path) -> Result<()> {
        let parser = self.require_parser().await?;
        let source = Arc::clone(&self.source);
        let path = document.to_path_buf();
        let loaded =
            tokio::task::spawn_blocking(move || load_document(&parser, source.as_ref(), &path))
                .await
                .wrap_err("Document refresh panicked")?;
        match loaded {
            Ok(index) => {
                let path = document.to_path_buf();
                self.update(IndexChanged::Document(path.clone()), |ws| {
                    ws.insert(path, index)
                })
                .await;
                Ok(())
            }
            Err(SourceError::NotFound(_)) => {
                self.remove_document(document).await;
                Ok(())
            }
            Err(e) => Err(e).wrap_err_with(|| format!("Failed to refresh {}", document.display())),
        }
    }

    /// Parse `text` as the new content of `document` (e.g. an unsaved buffer)
    pub async fn update_document(&self, document: &Path, text: &str) -> Result<()> {
        let parser = self.require_parser().await?;
        let index = index_document(&parser, document, text);
        let path = document.to_path_buf();
        self.update(IndexChanged::Document(path.clone()), |ws| {
            ws.insert(path, index)
        })
        .await;
        Ok(())
    }

    /// Drop a document from the workspace. Returns whether it was indexed.
    pub async fn remove_document(&self, document: &Path) -> bool {
        if !self.snapshot().await.contains(document) {
            return false;
        }
        let path = document.to_path_buf();
        self.update(IndexChanged::Document(path.clone()), |ws| {
            ws.remove(&path);
        })
        .await;
        true
    }

    /// Reload the config and rebuild the parser.
    ///
    /// An unreadable config or unusable tag set is recorded as the config
    /// error and the previous parser stays in use. On success the
    /// workspace is reset to `NotScanned`; callers rescan afterwards.
    pub async fn reload_config(&self) -> Result<Duration> {
        let start = Instant::now();

        let config = match load_config(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                let error_msg = format!("{:#}", e);
                warn!("{}", error_msg);
                *self.config_error.write().await = Some(error_msg);
                return Ok(start.elapsed());
            }
        };

        let parser = match config.parser() {
            Ok(parser) => parser,
            Err(e) => {
                error!("{}", e);
                *self.config_error.write().await = Some(e.to_string());
                return Ok(start.elapsed());
            }
        };

        *self.parser.write().await = Some(Arc::new(parser));
        *self.config.write().await = config;
        *self.config_error.write().await = None;

        self.update(IndexChanged::Workspace, Workspace::reset).await;

        let elapsed = start.elapsed();
        info!("Config reloaded in {:?}", elapsed);
        Ok(elapsed)
    }
}

async fn load_config(path: &Path) -> Result<Config> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || Config::load(&path))
        .await
        .wrap_err("Config loading panicked")?
}
