//! anchors - list, group and watch comment anchors across a codebase
//!
//! Anchors are marker comments such as `// TODO: ...` or `# SECTION: ...`.
//! This binary scans a project for them and prints per-file listings,
//! the workspace listing, epics, or a live view that follows the disk.

use anchors::config::default_config_path;
use anchors::engine::{Engine, IndexChanged};
use anchors::output::{
    OutputFormat, render_document, render_epic_completions, render_epics, render_folds,
    render_found, render_tag_completions, render_tags, render_workspace,
};
use anchors::watcher;
use anchors_core::{sort_nodes, tag_completions};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// List and track comment anchors
#[derive(Debug, Parser)]
#[command(name = "anchors", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project root (default: current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Path to config file (default: <root>/.config/anchors/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the anchors of a single file
    File {
        path: PathBuf,

        /// List every anchor at the top level instead of nesting regions
        #[arg(long, conflicts_with = "folds")]
        flat: bool,

        /// Print the line spans of closed regions instead
        #[arg(long)]
        folds: bool,
    },

    /// Scan the project and list workspace anchors per file
    Workspace,

    /// List epics, each ordered by sequence number
    Epics {
        /// Print the attribute text that continues each epic instead
        #[arg(long)]
        next: bool,
    },

    /// Show the effective tag registry
    Tags {
        /// Print insertable tag snippets instead
        #[arg(long)]
        completions: bool,
    },

    /// Locate the anchor carrying `id=<ID>`
    Find { id: String },

    /// Keep the index in sync with the disk and report changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));
    // Watcher events carry canonical paths; document ids must match them
    let root = root
        .canonicalize()
        .wrap_err_with(|| format!("Project root {} not found", root.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&root));

    let engine = Arc::new(Engine::new(root, config_path).await?);
    if let Some(e) = engine.config_error().await {
        eprintln!("{} {}", "warning:".yellow().bold(), e);
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::File { path, flat, folds } => {
            run_file(&engine, &path, flat, folds, cli.format).await
        }
        Command::Workspace => run_workspace(&engine, &cancel, cli.format).await,
        Command::Epics { next } => run_epics(&engine, &cancel, next, cli.format).await,
        Command::Tags { completions } => run_tags(&engine, completions, cli.format).await,
        Command::Find { id } => run_find(&engine, &cancel, &id, cli.format).await,
        Command::Watch => run_watch(engine, cancel).await,
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("anchors={0},anchors_core={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_file(
    engine: &Engine,
    path: &Path,
    flat: bool,
    folds: bool,
    format: OutputFormat,
) -> Result<()> {
    let document = path
        .canonicalize()
        .wrap_err_with(|| format!("File {} not found", path.display()))?;
    let text = std::fs::read_to_string(&document)
        .wrap_err_with(|| format!("Failed to read {}", document.display()))?;

    engine.update_document(&document, &text).await?;
    let snapshot = engine.snapshot().await;
    let config = engine.config().await;

    if folds {
        let ranges = snapshot
            .get(&document)
            .map(|index| index.fold_ranges())
            .unwrap_or_default();
        print!("{}", render_folds(&ranges, format)?);
        return Ok(());
    }

    let mut nodes = snapshot
        .get(&document)
        .map(|index| index.project(!flat))
        .unwrap_or_default();
    sort_nodes(&mut nodes, config.tags.sort_method);

    print!("{}", render_document(path, &nodes, format)?);
    Ok(())
}

/// Scan, returning `false` when the scan was interrupted
async fn scan(engine: &Engine, cancel: &CancellationToken) -> Result<bool> {
    let report = engine.scan(cancel).await?;
    if report.failed > 0 {
        warn!("{} documents could not be read", report.failed);
    }
    if report.skipped > 0 {
        eprintln!(
            "{} stopped after {} files (workspace.max_files), {} not scanned",
            "note:".cyan().bold(),
            report.indexed,
            report.skipped
        );
    }
    Ok(!report.cancelled)
}

async fn run_workspace(
    engine: &Engine,
    cancel: &CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    if !scan(engine, cancel).await? {
        return Ok(());
    }
    let config = engine.config().await;
    let snapshot = engine.snapshot().await;

    let mut views = snapshot.workspace_view(config.tags.display_hierarchy_in_workspace);
    for view in &mut views {
        sort_nodes(&mut view.anchors, config.tags.sort_method);
    }

    print!(
        "{}",
        render_workspace(
            &views,
            engine.project_root(),
            config.workspace.path_format,
            format
        )?
    );
    Ok(())
}

async fn run_epics(
    engine: &Engine,
    cancel: &CancellationToken,
    next: bool,
    format: OutputFormat,
) -> Result<()> {
    if !scan(engine, cancel).await? {
        return Ok(());
    }
    let snapshot = engine.snapshot().await;

    if next {
        let seq_step = engine.config().await.epic.seq_step;
        let completions = snapshot.epic_completions(seq_step);
        print!("{}", render_epic_completions(&completions, format)?);
        return Ok(());
    }

    let epics = snapshot.group_by_epic();
    print!("{}", render_epics(&epics, engine.project_root(), format)?);
    Ok(())
}

async fn run_tags(engine: &Engine, completions: bool, format: OutputFormat) -> Result<()> {
    let config = engine.config().await;
    if completions {
        let items = tag_completions(
            &config.registry(),
            &config.tags.separators,
            &config.tags.end_tag,
        );
        print!("{}", render_tag_completions(&items, format)?);
        return Ok(());
    }
    print!(
        "{}",
        render_tags(&config.registry(), &config.tags.end_tag, format)?
    );
    Ok(())
}

async fn run_find(
    engine: &Engine,
    cancel: &CancellationToken,
    id: &str,
    format: OutputFormat,
) -> Result<()> {
    if !scan(engine, cancel).await? {
        return Ok(());
    }
    let snapshot = engine.snapshot().await;

    let found = snapshot
        .documents()
        .find_map(|(_, index)| index.find_by_id(id));
    if let Some(anchor) = found {
        print!("{}", render_found(anchor, engine.project_root(), format)?);
        return Ok(());
    }

    let known: Vec<&str> = snapshot
        .documents()
        .flat_map(|(_, index)| index.flatten())
        .filter_map(|anchor| anchor.attributes.id.as_deref())
        .collect();
    match suggest(id, &known) {
        Some(similar) => eyre::bail!("No anchor with id {:?}. Did you mean {:?}?", id, similar),
        None => eyre::bail!("No anchor with id {:?}", id),
    }
}

/// Closest known id, if any is close enough
fn suggest<'a>(id: &str, known: &[&'a str]) -> Option<&'a str> {
    known
        .iter()
        .map(|candidate| (*candidate, strsim::jaro_winkler(id, candidate)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

async fn run_watch(engine: Arc<Engine>, cancel: CancellationToken) -> Result<()> {
    let config = engine.config().await;
    let mut events = engine.events();

    if config.workspace.lazy_load {
        debug!("Lazy loading enabled, skipping initial scan");
    } else if !scan(&engine, &cancel).await? {
        return Ok(());
    }

    let snapshot = engine.snapshot().await;
    eprintln!(
        "{} {} ({} documents indexed, Ctrl-C to stop)",
        "Watching".green().bold(),
        engine.project_root().display(),
        snapshot.len()
    );

    let mut watch_task = tokio::spawn(watcher::run(Arc::clone(&engine), cancel.clone()));

    let root = engine.project_root().to_path_buf();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            result = &mut watch_task => {
                return result.wrap_err("File watcher task panicked")?;
            }
            event = events.recv() => event,
        };
        match event {
            Ok(IndexChanged::Document(path)) => {
                let snapshot = engine.snapshot().await;
                let display = config.workspace.path_format.display(&path, &root);
                match snapshot.get(&path) {
                    Some(index) => println!(
                        "{} {} ({} anchors)",
                        "updated".cyan(),
                        display,
                        index.len()
                    ),
                    None => println!("{} {}", "removed".red(), display),
                }
            }
            Ok(IndexChanged::Workspace) => {
                let snapshot = engine.snapshot().await;
                println!(
                    "{} {} documents ({})",
                    "workspace".magenta(),
                    snapshot.len(),
                    snapshot.status()
                );
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!("Missed {} index notifications", n);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    cancel.cancel();
    watch_task.await.wrap_err("File watcher task panicked")??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_close_id() {
        let known = ["login-form", "logout", "billing"];
        assert_eq!(suggest("login-from", &known), Some("login-form"));
        assert_eq!(suggest("zzz", &known), None);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["anchors", "--format", "json", "find", "x"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Find { ref id } if id == "x"));

        let cli = Cli::try_parse_from(["anchors", "epics", "--next", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Epics { next: true }));

        let cli = Cli::try_parse_from(["anchors", "tags", "--completions"]).unwrap();
        assert!(matches!(cli.command, Command::Tags { completions: true }));
        assert!(Cli::try_parse_from(["anchors", "file", "a.rs", "--flat", "--folds"]).is_err());
    }
}
