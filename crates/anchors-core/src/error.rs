//! Error types surfaced at the core's seams

use std::path::PathBuf;

/// Configuration problems that prevent building a [`Matcher`](crate::Matcher).
///
/// These are reported once per rebuild; the previous matcher stays in use
/// until the configuration is corrected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No tags are enabled
    #[error("at least one tag must be defined")]
    NoTags,

    /// The separator list is empty
    #[error("at least one separator must be defined")]
    NoSeparators,

    /// The composite pattern failed to compile
    #[error("failed to compile anchor matcher: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Failure to obtain a document's text from a [`TextSource`](crate::TextSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Classify an I/O error raised while reading `path`
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound(path)
        } else {
            SourceError::Io { path, source }
        }
    }
}
