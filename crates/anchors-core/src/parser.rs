//! Document parser: turns raw text into a forest of anchors
//!
//! A single pass over the matcher's hits in source order. Open regions are
//! kept on a stack for the whole document; every anchor found while the stack
//! is non-empty becomes a child of the innermost open region. Nesting in the
//! forest stops at [`MAX_REGION_DEPTH`]: deeper regions are still matched
//! against their end markers but are attached to the region at the limit.

use crate::anchor::{Anchor, AnchorId, AnchorKind, Forest, RegionClose};
use crate::attributes::Attributes;
use crate::error::ConfigError;
use crate::matcher::{Matcher, MatcherHit};
use crate::tags::{Behavior, TagDefinition, TagRegistry};
use std::path::Path;

/// Deepest region nesting kept in the forest
pub const MAX_REGION_DEPTH: usize = 64;

/// Options that affect how anchors are labelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Labels read `TAG: text` instead of `text` (link tags excepted)
    pub show_tag_name: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            show_tag_name: true,
        }
    }
}

/// Result of parsing one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    pub forest: Forest,
    /// True iff the matcher hit at least once, stray end markers included
    pub anchors_found: bool,
}

/// Everything needed to parse documents: the tag registry, the matcher built
/// from it, and labelling options.
///
/// Parsing is pure: the same text always yields the same forest.
#[derive(Debug, Clone)]
pub struct Parser {
    registry: TagRegistry,
    matcher: Matcher,
    options: ParseOptions,
}

impl Parser {
    /// Build the matcher for `registry` and wrap both into a parser
    pub fn new(
        registry: TagRegistry,
        separators: &[String],
        end_tag: &str,
        match_case: bool,
        options: ParseOptions,
    ) -> Result<Self, ConfigError> {
        let matcher = Matcher::build(&registry, separators, end_tag, match_case)?;
        Ok(Self {
            registry,
            matcher,
            options,
        })
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse `text` belonging to `document`
    pub fn parse(&self, document: &Path, text: &str) -> ParseOutput {
        let lines = LineIndex::new(text);
        let mut forest = Forest::new();
        let mut regions: Vec<AnchorId> = Vec::new();
        let mut anchors_found = false;

        for hit in self.matcher.find_iter(text) {
            anchors_found = true;

            let (name, is_region_end) = self.matcher.strip_end_tag(hit.tag, |name| {
                self.registry.get(name).is_some_and(TagDefinition::is_region)
            });
            let Some(tag) = self.registry.get(name) else {
                tracing::warn!(
                    "Tag {:?} in {} is not registered, skipping",
                    hit.tag,
                    document.display()
                );
                continue;
            };

            if is_region_end {
                // Stray or mismatched end markers are ignored
                let Some(&open) = regions.last() else {
                    continue;
                };
                if forest.get(open).is_none_or(|region| region.tag != tag.name) {
                    continue;
                }
                regions.pop();
                if let Some(region) = forest.get_mut(open) {
                    region.set_close(RegionClose {
                        start: hit.tag_start,
                        end: hit.tag_start + hit.tag.len(),
                        line: lines.line_of(hit.tag_start),
                    });
                }
                continue;
            }

            let anchor = self.build_anchor(document, tag, &hit, &lines, text);
            let parent = regions[..regions.len().min(MAX_REGION_DEPTH)].last().copied();
            let id = forest.push(anchor, parent);
            if tag.is_region() {
                regions.push(id);
            }
        }

        ParseOutput {
            forest,
            anchors_found,
        }
    }

    fn build_anchor(
        &self,
        document: &Path,
        tag: &TagDefinition,
        hit: &MatcherHit<'_>,
        lines: &LineIndex,
        text: &str,
    ) -> Anchor {
        let start = hit.tag_start;
        let line = lines.line_of(start);
        let raw_comment = hit.comment.unwrap_or("").trim();

        let (comment, closer) = strip_comment_closer(raw_comment);

        let end = if tag.style_comment {
            // Highlight up to the last meaningful character of the comment
            let mut end = text[..hit.end].trim_end().len();
            if let Some(skip) = closer {
                let bytes = text.as_bytes();
                while end > start && skip.contains(&bytes[end - 1]) {
                    end -= 1;
                }
            }
            end.max(start + hit.tag.len())
        } else {
            start + hit.tag.len()
        };

        let text = if comment.is_empty() {
            tag.name.clone()
        } else if self.options.show_tag_name && tag.behavior != Behavior::Link {
            format!("{}: {}", tag.name, comment)
        } else {
            comment.to_string()
        };

        let mut attributes = Attributes::parse(hit.attributes, Attributes::with_seq(line as i64));
        if !tag.is_workspace_visible() {
            attributes.epic = None;
        }

        Anchor {
            tag: tag.name.clone(),
            text,
            comment: comment.to_string(),
            start,
            end,
            line,
            behavior: tag.behavior,
            scope: tag.scope,
            show_line: tag.display_line_number,
            document: document.to_path_buf(),
            attributes,
            kind: if tag.is_region() {
                AnchorKind::Region { close: None }
            } else {
                AnchorKind::Plain
            },
        }
    }
}

/// Remove a trailing `-->` or `*/` from a comment.
///
/// Returns the cleaned text and, when a closer was removed, the characters
/// to skip when retracting a highlight range.
fn strip_comment_closer(comment: &str) -> (&str, Option<&'static [u8]>) {
    const CLOSERS: [(&str, &[u8]); 2] = [("-->", b" -->" as &[u8]), ("*/", b" */" as &[u8])];

    for (closer, skip) in CLOSERS {
        if comment.ends_with(closer) {
            let cut = comment.rfind(closer).unwrap_or(comment.len());
            return (comment[..cut].trim(), Some(skip));
        }
    }
    (comment, None)
}

/// Line lookup by byte offset.
///
/// `\r\n`, `\r` and `\n` each count as one line break.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    line_starts.push(i + 2);
                    i += 2;
                    continue;
                }
                b'\r' | b'\n' => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self { line_starts }
    }

    /// 1-indexed line containing `offset`
    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}
