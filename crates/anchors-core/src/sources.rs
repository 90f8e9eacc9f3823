//! Where document text and document lists come from

use crate::error::SourceError;
use eyre::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Supplies the text of a document by id
pub trait TextSource {
    fn read(&self, document: &Path) -> Result<String, SourceError>;
}

/// Lists the documents that make up a workspace
pub trait DocumentEnumerator {
    fn enumerate(&self) -> Result<Vec<PathBuf>>;
}

/// Reads documents straight from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl TextSource for FsSource {
    fn read(&self, document: &Path) -> Result<String, SourceError> {
        std::fs::read_to_string(document).map_err(|e| SourceError::from_io(document, e))
    }
}

/// In-memory documents (useful for testing, editors with unsaved buffers, etc.)
#[derive(Debug, Clone, Default)]
pub struct MemorySources(BTreeMap<PathBuf, String>);

impl MemorySources {
    /// Create empty memory sources
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add a document with content, replacing any previous content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.insert(path.into(), content.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.0.insert(path.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<PathBuf>, S: Into<String>> FromIterator<(P, S)> for MemorySources {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(path, text)| (path.into(), text.into()))
                .collect(),
        )
    }
}

impl TextSource for MemorySources {
    fn read(&self, document: &Path) -> Result<String, SourceError> {
        self.0
            .get(document)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(document.to_path_buf()))
    }
}

impl DocumentEnumerator for MemorySources {
    fn enumerate(&self) -> Result<Vec<PathBuf>> {
        Ok(self.0.keys().cloned().collect())
    }
}

/// Gitignore-aware directory walker with glob include/exclude patterns.
///
/// Patterns are matched against paths relative to the root, with `/`
/// separators. No include patterns means every file is included.
#[cfg(feature = "walk")]
#[derive(Debug, Clone)]
pub struct WalkSources {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
}

#[cfg(feature = "walk")]
impl WalkSources {
    /// Create a walker for the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Add include patterns (e.g., `["**/*.rs"]`)
    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add exclude patterns (e.g., `["**/target/**"]`)
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Include/exclude glob patterns over paths relative to a root.
///
/// No include patterns means every path is included. Excludes win over
/// includes. Paths outside the root are rejected.
#[cfg(feature = "walk")]
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    include: globset::GlobSet,
    exclude: globset::GlobSet,
    include_all: bool,
}

#[cfg(feature = "walk")]
impl PathFilter {
    pub fn new(root: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
            include_all: include.is_empty(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (under the root) passes the patterns
    pub fn accepts(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if self.exclude.is_match(&relative) {
            return false;
        }
        self.include_all || self.include.is_match(&relative)
    }
}

/// Compile `patterns` into one set; `\` separators are read as `/`
#[cfg(feature = "walk")]
fn build_globset(patterns: &[String]) -> Result<globset::GlobSet> {
    use eyre::WrapErr;

    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(&pattern.replace('\\', "/"))
            .wrap_err_with(|| format!("Invalid glob pattern {:?}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(feature = "walk")]
impl DocumentEnumerator for WalkSources {
    fn enumerate(&self) -> Result<Vec<PathBuf>> {
        use ignore::WalkBuilder;

        if !self.root.is_dir() {
            eyre::bail!("Workspace root {} is not a directory", self.root.display());
        }

        let filter = PathFilter::new(&self.root, &self.include, &self.exclude)?;

        let walker = WalkBuilder::new(&self.root)
            .follow_links(true)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build();

        let mut documents = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if filter.accepts(entry.path()) {
                documents.push(entry.path().to_path_buf());
            }
        }

        // The walker's order depends on the filesystem
        documents.sort();
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sources_read_and_enumerate() {
        let sources = MemorySources::new()
            .add("b.rs", "// TODO: b")
            .add("a.rs", "// TODO: a");

        assert_eq!(sources.read(Path::new("a.rs")).unwrap(), "// TODO: a");
        assert_eq!(
            sources.enumerate().unwrap(),
            vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")]
        );
    }

    #[test]
    fn test_memory_sources_missing_document() {
        let err = MemorySources::new().read(Path::new("nope.rs")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(p) if p == Path::new("nope.rs")));
    }

    #[test]
    fn test_fs_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsSource.read(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[cfg(feature = "walk")]
    mod walk_tests {
        use super::super::*;

        fn write(root: &Path, relative: &str, content: &str) {
            let path = root.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        #[test]
        fn test_walk_include_exclude() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            write(root, "src/main.rs", "// TODO: main");
            write(root, "src/lib.ts", "// TODO: lib");
            write(root, "target/out.rs", "// TODO: generated");
            write(root, "README.md", "nothing");

            let documents = WalkSources::new(root)
                .include(["**/*.rs", "**/*.ts"])
                .exclude(["target/**"])
                .enumerate()
                .unwrap();

            assert_eq!(
                documents,
                vec![root.join("src/lib.ts"), root.join("src/main.rs")]
            );
        }

        #[test]
        fn test_walk_without_patterns_lists_everything() {
            let dir = tempfile::tempdir().unwrap();
            write(dir.path(), "a.txt", "a");
            write(dir.path(), "nested/b.txt", "b");

            let documents = WalkSources::new(dir.path()).enumerate().unwrap();
            assert_eq!(documents.len(), 2);
        }

        #[test]
        fn test_walk_invalid_glob() {
            let dir = tempfile::tempdir().unwrap();
            let result = WalkSources::new(dir.path()).include(["a[b"]).enumerate();
            assert!(result.is_err());
        }

        #[test]
        fn test_path_filter() {
            let filter = PathFilter::new(
                "/repo",
                &["**/*.rs".to_string()],
                &["target/**".to_string()],
            )
            .unwrap();
            assert!(filter.accepts(Path::new("/repo/src/main.rs")));
            assert!(!filter.accepts(Path::new("/repo/src/main.ts")));
            assert!(!filter.accepts(Path::new("/repo/target/debug/gen.rs")));
            assert!(!filter.accepts(Path::new("/elsewhere/main.rs")));

            let all = PathFilter::new("/repo", &[], &[]).unwrap();
            assert!(all.accepts(Path::new("/repo/README")));
        }

        #[test]
        fn test_backslash_patterns_match_like_slashes() {
            let filter =
                PathFilter::new("/repo", &["src\\**\\*.rs".to_string()], &[]).unwrap();
            assert!(filter.accepts(Path::new("/repo/src/a/b.rs")));
        }

        #[test]
        fn test_walk_missing_root() {
            let dir = tempfile::tempdir().unwrap();
            let result = WalkSources::new(dir.path().join("gone")).enumerate();
            assert!(result.is_err());
        }
    }
}
