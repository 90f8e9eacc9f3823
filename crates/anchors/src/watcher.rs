//! File watcher that keeps the engine in sync with the disk.
//!
//! Instead of watching the entire project root and filtering events,
//! this module extracts directory prefixes from the configured
//! `match_files` globs and only watches those directories. Changed
//! documents are re-parsed one by one; a change to the config file or
//! `.gitignore` reloads the config and rescans the workspace.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anchors_core::PathFilter;
use eyre::{Result, WrapErr};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::Engine;

/// Events sent from the watcher to the update loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    /// Documents changed, were created or were deleted
    FilesChanged(Vec<PathBuf>),

    /// Config or gitignore changed - triggers a reload and rescan
    Reconfigure,
}

/// Turn a batch of changed paths into an event.
///
/// Any path in `triggers` turns the whole batch into a reconfiguration.
pub fn classify(paths: Vec<PathBuf>, triggers: &[PathBuf]) -> Option<WatcherEvent> {
    if paths.is_empty() {
        return None;
    }
    if paths.iter().any(|p| triggers.contains(p)) {
        Some(WatcherEvent::Reconfigure)
    } else {
        Some(WatcherEvent::FilesChanged(paths))
    }
}

/// Extract the directory prefix from a glob pattern.
///
/// This finds the longest path prefix before any glob metacharacter.
///
/// # Examples
///
/// ```ignore
/// glob_to_watch_dir("foo/bar/**/*.rs") => "foo/bar"
/// glob_to_watch_dir("src/*.rs") => "src"
/// glob_to_watch_dir("**/*") => "."
/// ```
pub fn glob_to_watch_dir(pattern: &str) -> PathBuf {
    let mut result = PathBuf::new();

    for component in Path::new(pattern).components() {
        let s = component.as_os_str().to_string_lossy();
        // Stop at the first component containing glob metacharacters
        if s.contains('*') || s.contains('?') || s.contains('[') || s.contains('{') {
            break;
        }
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Existing directories covering the config's `match_files` patterns
pub fn extract_watch_dirs(config: &Config, project_root: &Path) -> HashSet<PathBuf> {
    let mut dirs = HashSet::new();

    for pattern in &config.workspace.match_files {
        let full_path = project_root.join(glob_to_watch_dir(pattern));
        // Canonicalize to resolve .. components and get clean absolute paths
        match full_path.canonicalize() {
            Ok(canonical) if canonical.is_dir() => {
                dirs.insert(canonical);
            }
            Ok(canonical) => {
                if let Some(parent) = canonical.parent() {
                    dirs.insert(parent.to_path_buf());
                }
            }
            Err(_) => {
                debug!(
                    "Watch directory does not exist (yet): {}",
                    full_path.display()
                );
            }
        }
    }

    dirs
}

/// Manages file watching with dynamic reconfiguration.
pub struct WatcherManager {
    /// The underlying debounced watcher.
    debouncer: Debouncer<RecommendedWatcher>,

    /// Currently watched directories.
    watched_dirs: HashSet<PathBuf>,

    /// Project root for resolving relative paths.
    project_root: PathBuf,

    /// Config file path (always watched).
    config_path: PathBuf,

    /// Gitignore path (always watched if exists).
    gitignore_path: PathBuf,
}

impl WatcherManager {
    /// Create a new watcher manager.
    ///
    /// The watcher starts with no directories watched. Call `reconfigure()`
    /// after creation to set up watches based on config.
    pub fn new<F>(
        project_root: PathBuf,
        config_path: PathBuf,
        debounce_duration: Duration,
        event_handler: F,
    ) -> Result<Self>
    where
        F: Fn(DebounceEventResult) + Send + 'static,
    {
        let debouncer = new_debouncer(debounce_duration, event_handler)
            .wrap_err("Failed to create file watcher")?;

        let gitignore_path = project_root.join(".gitignore");

        let mut manager = Self {
            debouncer,
            watched_dirs: HashSet::new(),
            project_root,
            config_path,
            gitignore_path,
        };

        manager.watch_static_paths()?;

        Ok(manager)
    }

    /// Watch paths that are always monitored.
    fn watch_static_paths(&mut self) -> Result<()> {
        for path in [&self.config_path, &self.gitignore_path] {
            if !path.exists() {
                continue;
            }
            self.debouncer
                .watcher()
                .watch(path, RecursiveMode::NonRecursive)
                .wrap_err_with(|| format!("Failed to watch {}", path.display()))?;
            info!("Watching {}", path.display());
        }
        Ok(())
    }

    /// Reconfigure watches based on config patterns.
    ///
    /// This is called on startup and whenever config changes.
    /// It computes the new set of watch directories, removes watches
    /// for directories no longer needed, and adds watches for new ones.
    pub fn reconfigure(&mut self, config: &Config) -> Result<()> {
        let new_dirs = extract_watch_dirs(config, &self.project_root);

        let to_remove: Vec<_> = self.watched_dirs.difference(&new_dirs).cloned().collect();
        let to_add: Vec<_> = new_dirs.difference(&self.watched_dirs).cloned().collect();

        for dir in &to_remove {
            match self.debouncer.watcher().unwatch(dir) {
                Ok(()) => {
                    debug!("Stopped watching: {}", dir.display());
                }
                Err(e) => {
                    // Not fatal - directory might have been deleted
                    debug!(
                        "Failed to unwatch {} (may be deleted): {}",
                        dir.display(),
                        e
                    );
                }
            }
        }

        for dir in &to_add {
            match self
                .debouncer
                .watcher()
                .watch(dir, RecursiveMode::Recursive)
            {
                Ok(()) => {
                    info!("Watching directory: {}", dir.display());
                }
                Err(e) => {
                    warn!("Failed to watch {}: {}", dir.display(), e);
                }
            }
        }

        self.watched_dirs = new_dirs;

        if !to_remove.is_empty() || !to_add.is_empty() {
            info!(
                "Reconfigured watcher: {} directories ({} added, {} removed)",
                self.watched_dirs.len(),
                to_add.len(),
                to_remove.len()
            );
        }

        Ok(())
    }

    /// Get the currently watched directories, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.watched_dirs.iter().cloned().collect();
        dirs.sort();
        dirs
    }
}

/// Point the watcher and the document filter at a new config.
///
/// The filter is only replaced once the new one has been built.
fn apply_config(
    manager: &mut WatcherManager,
    filter: &mut PathFilter,
    config: &Config,
    project_root: &Path,
) -> Result<()> {
    let next = config.filter(project_root)?;
    manager.reconfigure(config)?;
    *filter = next;
    Ok(())
}

/// Watch the engine's project until `cancel` fires.
///
/// Changed documents accepted by the config's patterns are refreshed;
/// deleted ones are removed. Failures on single documents are logged and
/// do not stop the loop.
pub async fn run(engine: Arc<Engine>, cancel: CancellationToken) -> Result<()> {
    let project_root = engine.project_root().to_path_buf();
    let config_path = engine.config_path().to_path_buf();
    let config = engine.config().await;

    let (tx, mut rx) = mpsc::channel::<WatcherEvent>(16);
    let triggers = vec![config_path.clone(), project_root.join(".gitignore")];

    let mut manager = WatcherManager::new(
        project_root.clone(),
        config_path,
        Duration::from_millis(config.parse_delay_ms),
        move |result: DebounceEventResult| {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    warn!("File watcher error: {}", e);
                    return;
                }
            };
            let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
            let Some(event) = classify(paths, &triggers) else {
                return;
            };
            if tx.blocking_send(event).is_err() {
                debug!("Watcher channel closed");
            }
        },
    )?;
    manager.reconfigure(&config)?;
    let mut filter = config.filter(&project_root)?;

    info!(
        "File watcher started: {} directories",
        manager.watched_dirs().len()
    );

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            WatcherEvent::Reconfigure => {
                info!("Config or gitignore changed, reloading");
                engine.reload_config().await?;
                if let Some(e) = engine.config_error().await {
                    // The previous config stays in effect
                    error!("{}", e);
                    continue;
                }
                let config = engine.config().await;
                if let Err(e) = apply_config(&mut manager, &mut filter, &config, &project_root) {
                    error!("Keeping the previous watch setup: {:#}", e);
                }
                if let Err(e) = engine.scan(&cancel).await {
                    error!("Rescan failed: {:#}", e);
                }
            }

            WatcherEvent::FilesChanged(paths) => {
                let mut seen = HashSet::new();
                for path in paths {
                    if !seen.insert(path.clone()) || !filter.accepts(&path) {
                        continue;
                    }
                    if path.is_dir() {
                        continue;
                    }
                    if let Err(e) = engine.refresh_document(&path).await {
                        warn!("{:#}", e);
                    }
                }
            }
        }
    }

    debug!("File watcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_watch_dir_with_double_star() {
        assert_eq!(
            glob_to_watch_dir("foo/bar/**/*.rs"),
            PathBuf::from("foo/bar")
        );
    }

    #[test]
    fn test_glob_to_watch_dir_with_single_star() {
        assert_eq!(glob_to_watch_dir("src/*.rs"), PathBuf::from("src"));
    }

    #[test]
    fn test_glob_to_watch_dir_root_pattern() {
        assert_eq!(glob_to_watch_dir("**/*"), PathBuf::from("."));
    }

    #[test]
    fn test_glob_to_watch_dir_literal_path() {
        assert_eq!(glob_to_watch_dir("src/lib.rs"), PathBuf::from("src/lib.rs"));
    }

    #[test]
    fn test_glob_to_watch_dir_brackets_and_braces() {
        assert_eq!(glob_to_watch_dir("src/[abc].rs"), PathBuf::from("src"));
        assert_eq!(glob_to_watch_dir("src/{foo,bar}.rs"), PathBuf::from("src"));
    }

    #[test]
    fn test_extract_watch_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let mut config = Config::default();
        config.workspace.match_files = vec![
            "src/**/*.rs".into(),
            "missing/**".into(),
            "README.md".into(),
        ];
        let dirs = extract_watch_dirs(&config, dir.path());
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(dirs.contains(&root.join("src")));
        assert!(dirs.contains(&root));
    }

    #[test]
    fn test_config_filter_selects_documents() {
        let root = PathBuf::from("/repo");
        let mut config = Config::default();
        config.workspace.match_files = vec!["**/*.rs".into()];
        config.workspace.exclude_files = vec!["**/target/**".into()];
        let filter = config.filter(&root).unwrap();

        assert!(filter.accepts(Path::new("/repo/src/main.rs")));
        assert!(!filter.accepts(Path::new("/repo/src/main.ts")));
        assert!(!filter.accepts(Path::new("/repo/target/debug/gen.rs")));
        assert!(!filter.accepts(Path::new("/elsewhere/main.rs")));
    }

    #[test]
    fn test_bad_patterns_keep_previous_filter() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut config = Config::default();
        config.workspace.match_files = vec!["**/*.rs".into()];
        let mut filter = config.filter(&root).unwrap();
        let mut manager = WatcherManager::new(
            root.clone(),
            root.join("config.yaml"),
            Duration::from_millis(50),
            |_| {},
        )
        .unwrap();
        manager.reconfigure(&config).unwrap();

        let mut broken = config.clone();
        broken.workspace.match_files = vec!["src/[bad".into()];
        assert!(apply_config(&mut manager, &mut filter, &broken, &root).is_err());

        assert!(filter.accepts(&root.join("src/main.rs")));
        assert_eq!(manager.watched_dirs(), vec![root.clone()]);
    }

    #[test]
    fn test_classify() {
        let triggers = vec![PathBuf::from("/repo/.config/anchors/config.yaml")];

        assert_eq!(classify(Vec::new(), &triggers), None);
        assert_eq!(
            classify(vec![PathBuf::from("/repo/a.rs")], &triggers),
            Some(WatcherEvent::FilesChanged(vec![PathBuf::from("/repo/a.rs")]))
        );
        assert_eq!(
            classify(
                vec![
                    PathBuf::from("/repo/a.rs"),
                    PathBuf::from("/repo/.config/anchors/config.yaml")
                ],
                &triggers
            ),
            Some(WatcherEvent::Reconfigure)
        );
    }
}
