#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anchors::config::CONFIG_PATH;

/// A throwaway project directory
pub struct Project {
    dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        // Watcher and walker paths are canonical
        let root = dir.path().canonicalize().expect("canonicalize temp dir");
        Self { dir, root }
    }

    /// A project that only scans `src/**/*.rs`
    pub fn with_sources() -> Self {
        let project = Self::new();
        project.config("workspace:\n  match_files: ['src/**/*.rs']\n");
        project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_PATH)
    }

    pub fn config(&self, yaml: &str) {
        self.write(CONFIG_PATH, yaml);
    }

    /// Write `content` to `relative`, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.root.join(relative)).expect("remove file");
    }
}
