//! The anchor model
//!
//! Anchors live in an arena ([`Forest`]) and refer to their children by
//! [`AnchorId`]. Views that need owned trees (workspace listings, epics,
//! JSON output) are produced by projecting the arena into [`AnchorNode`]s,
//! so no view ever aliases the arena's child lists.

use crate::attributes::Attributes;
use crate::tags::{Behavior, Scope};
use serde::Serialize;
use std::path::PathBuf;

/// Position of an anchor inside its [`Forest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AnchorId(usize);

impl AnchorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Location of the end marker that closed a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionClose {
    /// Byte offset of the end tag token
    pub start: usize,
    /// Byte offset just past the end tag token
    pub end: usize,
    /// Line of the end marker (1-indexed)
    pub line: usize,
}

/// Whether an anchor is a plain marker or a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnchorKind {
    Plain,
    /// A region; `close` stays `None` while no matching end marker was found
    Region { close: Option<RegionClose> },
}

/// A parsed marker comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// Uppercased name of the tag
    pub tag: String,
    /// Display text; also the key of the per-document text index
    pub text: String,
    /// The free text after the separator, with comment closers removed
    pub comment: String,
    /// Byte offset of the tag token
    pub start: usize,
    /// Byte offset where the highlighted range ends
    pub end: usize,
    /// Line number (1-indexed)
    pub line: usize,
    pub behavior: Behavior,
    pub scope: Scope,
    /// Prefix labels with line numbers
    pub show_line: bool,
    /// Document the anchor was found in
    pub document: PathBuf,
    pub attributes: Attributes,
    #[serde(flatten)]
    pub kind: AnchorKind,
}

impl Anchor {
    pub fn is_region(&self) -> bool {
        matches!(self.kind, AnchorKind::Region { .. })
    }

    /// End marker location, if this is a closed region
    pub fn close(&self) -> Option<RegionClose> {
        match self.kind {
            AnchorKind::Region { close } => close,
            AnchorKind::Plain => None,
        }
    }

    pub fn is_visible_in_workspace(&self) -> bool {
        self.scope == Scope::Workspace
    }

    /// Record the end marker of a region. Has no effect on plain anchors.
    pub fn set_close(&mut self, close: RegionClose) {
        if let AnchorKind::Region { close: slot } = &mut self.kind {
            *slot = Some(close);
        }
    }

    /// Sidebar label: `[12] text`, `[12 - 30] text` for regions, or just
    /// `text` when line numbers are off
    pub fn label(&self) -> String {
        self.label_with(self.show_line)
    }

    pub fn label_with(&self, show_line: bool) -> String {
        if !show_line {
            return self.text.clone();
        }
        match self.kind {
            AnchorKind::Plain => format!("[{}] {}", self.line, self.text),
            AnchorKind::Region { close: None } => format!("[{} - ?] {}", self.line, self.text),
            AnchorKind::Region { close: Some(close) } => {
                format!("[{} - {}] {}", self.line, close.line, self.text)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    anchor: Anchor,
    children: Vec<AnchorId>,
}

/// Arena of anchors forming an ordered forest.
///
/// Root order and child order are source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    nodes: Vec<Node>,
    roots: Vec<AnchorId>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an anchor, either as a root or as the last child of `parent`
    pub fn push(&mut self, anchor: Anchor, parent: Option<AnchorId>) -> AnchorId {
        let id = AnchorId(self.nodes.len());
        self.nodes.push(Node {
            anchor,
            children: Vec::new(),
        });
        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.nodes.get(id.0).map(|n| &n.anchor)
    }

    pub fn get_mut(&mut self, id: AnchorId) -> Option<&mut Anchor> {
        self.nodes.get_mut(id.0).map(|n| &mut n.anchor)
    }

    /// Root-level anchors in source order
    pub fn roots(&self) -> &[AnchorId] {
        &self.roots
    }

    pub fn children(&self, id: AnchorId) -> &[AnchorId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Total number of anchors at every depth
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every anchor reachable from `ids`, pre-order, each exactly once
    pub fn flatten(&self, ids: &[AnchorId]) -> Vec<AnchorId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        // Reversed so that popping yields source order
        let mut stack: Vec<AnchorId> = ids.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(flag) = seen.get_mut(id.0) else {
                continue;
            };
            if *flag {
                continue;
            }
            *flag = true;
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Pre-order walk over the whole forest
    pub fn iter_preorder(&self) -> impl Iterator<Item = (AnchorId, &Anchor)> {
        self.flatten(&self.roots)
            .into_iter()
            .filter_map(move |id| self.get(id).map(|a| (id, a)))
    }

    /// Deep-copy the anchors under `ids` into owned nodes.
    ///
    /// With `hierarchy` the tree shape is kept and an anchor rejected by
    /// `keep` drops its whole subtree; without it every anchor (at any
    /// depth) that passes `keep` becomes a childless top-level node.
    /// `show_line` overrides each anchor's line-number display.
    pub fn project(
        &self,
        ids: &[AnchorId],
        hierarchy: bool,
        show_line: Option<bool>,
        keep: &dyn Fn(&Anchor) -> bool,
    ) -> Vec<AnchorNode> {
        if hierarchy {
            ids.iter()
                .filter_map(|&id| self.project_tree(id, show_line, keep))
                .collect()
        } else {
            self.flatten(ids)
                .into_iter()
                .filter_map(|id| self.get(id))
                .filter(|a| keep(a))
                .map(|a| AnchorNode::leaf(a.clone(), show_line))
                .collect()
        }
    }

    fn project_tree(
        &self,
        root: AnchorId,
        show_line: Option<bool>,
        keep: &dyn Fn(&Anchor) -> bool,
    ) -> Option<AnchorNode> {
        let anchor = self.get(root).filter(|a| keep(a))?;
        // Each frame holds a node under construction and its unvisited children
        let mut stack = vec![(
            AnchorNode::leaf(anchor.clone(), show_line),
            self.children(root),
        )];
        loop {
            let (_, pending) = stack.last_mut()?;
            let remaining: &[AnchorId] = *pending;
            match remaining.split_first() {
                Some((&child, rest)) => {
                    *pending = rest;
                    if let Some(anchor) = self.get(child).filter(|a| keep(a)) {
                        stack.push((
                            AnchorNode::leaf(anchor.clone(), show_line),
                            self.children(child),
                        ));
                    }
                }
                None => {
                    let (node, _) = stack.pop()?;
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(node),
                        None => return Some(node),
                    }
                }
            }
        }
    }
}

/// An owned copy of an anchor and, optionally, its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorNode {
    pub label: String,
    #[serde(flatten)]
    pub anchor: Anchor,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AnchorNode>,
}

impl AnchorNode {
    fn leaf(mut anchor: Anchor, show_line: Option<bool>) -> Self {
        if let Some(show) = show_line {
            anchor.show_line = show;
        }
        Self {
            label: anchor.label(),
            anchor,
            children: Vec::new(),
        }
    }
}

/// Ordering applied to anchor listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    /// Source position
    #[default]
    Line,
    /// Tag name, then source position
    Type,
}

/// Sort a listing in place, recursively
pub fn sort_nodes(nodes: &mut [AnchorNode], method: SortMethod) {
    match method {
        SortMethod::Line => nodes.sort_by_key(|n| n.anchor.start),
        SortMethod::Type => nodes.sort_by(|a, b| a.anchor.tag.cmp(&b.anchor.tag)),
    }
    for node in nodes.iter_mut() {
        sort_nodes(&mut node.children, method);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn anchor(tag: &str, text: &str, line: usize, region: bool) -> Anchor {
        Anchor {
            tag: tag.to_string(),
            text: text.to_string(),
            comment: text.to_string(),
            start: line * 10,
            end: line * 10 + tag.len(),
            line,
            behavior: if region { Behavior::Region } else { Behavior::Marker },
            scope: Scope::Workspace,
            show_line: true,
            document: PathBuf::from("test.rs"),
            attributes: Attributes::with_seq(line as i64),
            kind: if region {
                AnchorKind::Region { close: None }
            } else {
                AnchorKind::Plain
            },
        }
    }

    fn nested() -> Forest {
        let mut forest = Forest::new();
        let outer = forest.push(anchor("SECTION", "outer", 1, true), None);
        let inner = forest.push(anchor("SECTION", "inner", 2, true), Some(outer));
        forest.push(anchor("TODO", "deep", 3, false), Some(inner));
        forest.push(anchor("NOTE", "sibling", 4, false), Some(outer));
        forest.push(anchor("TODO", "root", 9, false), None);
        forest
    }

    #[test]
    fn test_labels() {
        let mut region = anchor("SECTION", "setup", 3, true);
        assert_eq!(region.label(), "[3 - ?] setup");
        region.set_close(RegionClose {
            start: 80,
            end: 90,
            line: 5,
        });
        assert_eq!(region.label(), "[3 - 5] setup");
        assert_eq!(region.label_with(false), "setup");

        let plain = anchor("TODO", "later", 7, false);
        assert_eq!(plain.label(), "[7] later");
    }

    #[test]
    fn test_set_close_ignored_on_plain() {
        let mut plain = anchor("TODO", "later", 7, false);
        plain.set_close(RegionClose {
            start: 1,
            end: 2,
            line: 9,
        });
        assert_eq!(plain.close(), None);
    }

    #[test]
    fn test_flatten_visits_every_anchor_once() {
        let forest = nested();
        let flat = forest.flatten(forest.roots());
        let texts: Vec<_> = flat.iter().map(|&id| forest.get(id).unwrap().text.as_str()).collect();
        assert_eq!(texts, ["outer", "inner", "deep", "sibling", "root"]);

        // Flattening an already flat list changes nothing
        assert_eq!(forest.flatten(&flat), flat);
    }

    #[test]
    fn test_project_hierarchy_filters_subtrees() {
        let forest = nested();
        let nodes = forest.project(forest.roots(), true, None, &|a| a.text != "inner");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].anchor.text, "outer");
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].children[0].anchor.text, "sibling");
    }

    #[test]
    fn test_project_flat_overrides_show_line() {
        let forest = nested();
        let nodes = forest.project(forest.roots(), false, Some(false), &|a| a.tag == "TODO");
        let labels: Vec<_> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["deep", "root"]);
        assert!(nodes.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn test_sort_by_type() {
        let forest = nested();
        let mut nodes = forest.project(forest.roots(), false, None, &|_| true);
        sort_nodes(&mut nodes, SortMethod::Type);
        let tags: Vec<_> = nodes.iter().map(|n| n.anchor.tag.as_str()).collect();
        assert_eq!(tags, ["NOTE", "SECTION", "SECTION", "TODO", "TODO"]);
    }
}
