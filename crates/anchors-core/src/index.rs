//! Per-document anchor index

use crate::anchor::{Anchor, AnchorId, AnchorNode, Forest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

static EMPTY: LazyLock<Arc<AnchorIndex>> =
    LazyLock::new(|| Arc::new(AnchorIndex::build(PathBuf::new(), Forest::new())));

/// The anchors of one document plus a lookup by anchor text.
///
/// Immutable once built; an edit to the document builds a new index.
/// Two anchors with the same text collide in the text lookup and the later
/// one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorIndex {
    document: PathBuf,
    forest: Forest,
    by_text: HashMap<String, AnchorId>,
}

impl AnchorIndex {
    /// Index a parsed forest with a full pre-order walk
    pub fn build(document: impl Into<PathBuf>, forest: Forest) -> Self {
        let mut by_text = HashMap::new();
        for (id, anchor) in forest.iter_preorder() {
            by_text.insert(anchor.text.clone(), id);
        }
        Self {
            document: document.into(),
            forest,
            by_text,
        }
    }

    /// Shared empty index, standing for "not parsed yet" or "no anchors"
    pub fn empty() -> Arc<AnchorIndex> {
        Arc::clone(&EMPTY)
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Root-level anchors in source order
    pub fn roots(&self) -> impl Iterator<Item = &Anchor> {
        self.forest.roots().iter().filter_map(|&id| self.forest.get(id))
    }

    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.forest.get(id)
    }

    pub fn children(&self, id: AnchorId) -> impl Iterator<Item = &Anchor> {
        self.forest.children(id).iter().filter_map(|&c| self.forest.get(c))
    }

    /// Number of anchors at every depth
    pub fn len(&self) -> usize {
        self.forest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }

    /// Look up the (last) anchor whose text is `text`
    pub fn find_by_text(&self, text: &str) -> Option<&Anchor> {
        self.by_text.get(text).and_then(|&id| self.forest.get(id))
    }

    /// First anchor, in pre-order, whose `id` attribute equals `id`
    pub fn find_by_id(&self, id: &str) -> Option<&Anchor> {
        self.forest
            .iter_preorder()
            .map(|(_, anchor)| anchor)
            .find(|anchor| anchor.attributes.id.as_deref() == Some(id))
    }

    /// Every anchor, pre-order
    pub fn flatten(&self) -> Vec<&Anchor> {
        self.forest.iter_preorder().map(|(_, a)| a).collect()
    }

    /// Line spans `(open, close)` of closed regions, suitable for folding
    pub fn fold_ranges(&self) -> Vec<(usize, usize)> {
        self.forest
            .iter_preorder()
            .filter_map(|(_, a)| a.close().map(|close| (a.line, close.line)))
            .collect()
    }

    /// Root-level anchors visible in the workspace listing
    pub fn visible_count(&self) -> usize {
        self.roots().filter(|a| a.is_visible_in_workspace()).count()
    }

    /// Root-level anchors hidden from the workspace listing
    pub fn hidden_count(&self) -> usize {
        self.roots().filter(|a| !a.is_visible_in_workspace()).count()
    }

    /// Owned copy of the whole document, hierarchical or flat
    pub fn project(&self, hierarchy: bool) -> Vec<AnchorNode> {
        self.forest
            .project(self.forest.roots(), hierarchy, None, &|_| true)
    }

    /// Owned copy restricted to workspace-visible anchors
    pub fn project_workspace(&self, hierarchy: bool) -> Vec<AnchorNode> {
        self.forest.project(
            self.forest.roots(),
            hierarchy,
            None,
            &Anchor::is_visible_in_workspace,
        )
    }
}
