//! Targets of link anchors
//!
//! A link anchor's comment names a file relative to the document it sits
//! in, optionally followed by a line number or an anchor id:
//!
//! ```text
//! // LINK: ../docs/setup.md
//! // LINK: src/main.rs:42
//! // LINK: notes.txt#intro
//! ```

use crate::anchor::Anchor;
use crate::tags::Behavior;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>.+?)(?P<position>:\d+|#[\w-]+)?$").expect("link pattern is valid")
});

/// Where inside the target file a link points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPosition {
    /// 1-indexed line
    Line(usize),
    /// Anchor carrying this `id` attribute
    Anchor(String),
}

/// A parsed link target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkTarget {
    pub path: PathBuf,
    pub position: Option<LinkPosition>,
}

impl LinkTarget {
    /// Parse the comment of a link anchor. Returns `None` for blank text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let caps = LINK.captures(text)?;
        let path = caps.name("path")?.as_str();
        let position = caps.name("position").and_then(|m| {
            let raw = m.as_str();
            if let Some(line) = raw.strip_prefix(':') {
                line.parse().ok().map(LinkPosition::Line)
            } else {
                raw.strip_prefix('#')
                    .map(|id| LinkPosition::Anchor(id.to_string()))
            }
        });
        Some(Self {
            path: PathBuf::from(path),
            position,
        })
    }

    /// The target of `anchor`, if it was written with a link tag
    pub fn from_anchor(anchor: &Anchor) -> Option<Self> {
        if anchor.behavior != Behavior::Link {
            return None;
        }
        Self::parse(&anchor.comment)
    }

    /// Full path of the target, relative to the directory of `document`
    pub fn resolve(&self, document: &Path) -> PathBuf {
        match document.parent() {
            Some(dir) => dir.join(&self.path),
            None => self.path.clone(),
        }
    }
}
