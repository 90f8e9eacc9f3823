//! anchors - list, group and watch comment anchors across a codebase
//!
//! This crate is the host around [`anchors_core`]: it loads the YAML
//! config, owns the shared [`engine::Engine`] that keeps the workspace
//! index current, watches the disk for changes and renders listings.

pub mod config;
pub mod engine;
pub mod output;
pub mod watcher;

pub use config::{CONFIG_PATH, Config, PathFormat, default_config_path};
pub use engine::{Engine, IndexChanged, ScanReport};
pub use output::OutputFormat;
