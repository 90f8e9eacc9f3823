//! Workspace aggregation: every indexed document, the scan that fills them
//! in, and the cross-document epic view.

use crate::anchor::{Anchor, AnchorNode};
use crate::error::SourceError;
use crate::index::AnchorIndex;
use crate::parser::Parser;
use crate::sources::{MemorySources, TextSource};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Documents processed between two yield points of a scan
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Progress of the workspace-wide scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    NotScanned,
    Scanning,
    Loaded,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::NotScanned => "not scanned",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Loaded => "loaded",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `text` and index the result
pub fn index_document(parser: &Parser, document: &Path, text: &str) -> AnchorIndex {
    let output = parser.parse(document, text);
    AnchorIndex::build(document, output.forest)
}

/// Read a document through `source`, then parse and index it
pub fn load_document(
    parser: &Parser,
    source: &dyn TextSource,
    document: &Path,
) -> Result<AnchorIndex, SourceError> {
    let text = source.read(document)?;
    Ok(index_document(parser, document, &text))
}

/// Indexed documents keyed by id, plus the scan status.
///
/// Keys are ordered so that every derived view (epics, listings) is
/// deterministic regardless of the order documents were parsed in.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    documents: BTreeMap<PathBuf, Arc<AnchorIndex>>,
    status: ScanStatus,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loaded workspace holding the documents of a finished scan
    pub fn from_scan(scan: Scan) -> Self {
        Self {
            documents: scan.indexed,
            status: ScanStatus::Loaded,
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ScanStatus) {
        self.status = status;
    }

    /// Back to `NotScanned`, keeping the documents
    pub fn reset(&mut self) {
        self.status = ScanStatus::NotScanned;
    }

    /// Clear the map and enter `Scanning`
    pub fn begin_scan(&mut self) {
        self.documents.clear();
        self.status = ScanStatus::Scanning;
    }

    pub fn finish_scan(&mut self) {
        self.status = ScanStatus::Loaded;
    }

    /// Store a document's index; a newer parse replaces the old one
    pub fn insert(&mut self, document: impl Into<PathBuf>, index: impl Into<Arc<AnchorIndex>>) {
        self.documents.insert(document.into(), index.into());
    }

    pub fn remove(&mut self, document: &Path) -> Option<Arc<AnchorIndex>> {
        self.documents.remove(document)
    }

    pub fn get(&self, document: &Path) -> Option<&Arc<AnchorIndex>> {
        self.documents.get(document)
    }

    pub fn contains(&self, document: &Path) -> bool {
        self.documents.contains_key(document)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in id order
    pub fn documents(&self) -> impl Iterator<Item = (&Path, &Arc<AnchorIndex>)> {
        self.documents.iter().map(|(p, i)| (p.as_path(), i))
    }

    /// Scan `(id, text)` pairs in input order, replacing the current
    /// contents. At most `max_files` documents are indexed.
    pub fn scan<P, S>(
        &mut self,
        parser: &Parser,
        documents: impl IntoIterator<Item = (P, S)>,
        max_files: usize,
    ) where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let documents: Vec<(PathBuf, String)> = documents
            .into_iter()
            .map(|(id, text)| (id.into(), text.into()))
            .collect();
        let ids = documents.iter().map(|(id, _)| id.clone()).collect();
        let sources: MemorySources = documents.into_iter().collect();
        self.scan_from(parser, &sources, ids, max_files);
    }

    /// Scan `documents` read through `source`, replacing the current contents
    pub fn scan_from(
        &mut self,
        parser: &Parser,
        source: &dyn TextSource,
        documents: Vec<PathBuf>,
        max_files: usize,
    ) {
        self.begin_scan();
        let mut scan = Scan::new(documents, max_files, DEFAULT_BATCH_SIZE);
        while scan.next_batch(parser, source) == BatchOutcome::More {}
        *self = Workspace::from_scan(scan);
    }

    /// Epics by name: root-level, workspace-scoped anchors carrying an
    /// `epic` attribute, ascending by `seq`. Equal `seq` values keep
    /// discovery order.
    pub fn group_by_epic(&self) -> BTreeMap<String, Vec<&Anchor>> {
        let mut epics: BTreeMap<String, Vec<&Anchor>> = BTreeMap::new();
        for index in self.documents.values() {
            for anchor in index.roots() {
                if !anchor.is_visible_in_workspace() {
                    continue;
                }
                if let Some(epic) = &anchor.attributes.epic {
                    epics.entry(epic.clone()).or_default().push(anchor);
                }
            }
        }
        for anchors in epics.values_mut() {
            anchors.sort_by_key(|a| a.attributes.seq);
        }
        epics
    }

    /// Attribute completions that append to each known epic
    pub fn epic_completions(&self, seq_step: i64) -> Vec<EpicCompletion> {
        self.group_by_epic()
            .into_iter()
            .map(|(epic, anchors)| {
                let max_seq = anchors.iter().map(|a| a.attributes.seq).max().unwrap_or(0);
                EpicCompletion {
                    epic,
                    next_seq: max_seq.saturating_add(seq_step),
                }
            })
            .collect()
    }

    /// Workspace listing: every document with at least one
    /// workspace-visible root anchor, projected to owned trees
    pub fn workspace_view(&self, hierarchy: bool) -> Vec<DocumentView> {
        self.documents
            .iter()
            .filter(|(_, index)| index.visible_count() > 0)
            .map(|(document, index)| DocumentView {
                document: document.clone(),
                visible: index.visible_count(),
                hidden: index.hidden_count(),
                anchors: index.project_workspace(hierarchy),
            })
            .collect()
    }
}

/// Suggested attribute text for continuing an epic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpicCompletion {
    pub epic: String,
    pub next_seq: i64,
}

impl std::fmt::Display for EpicCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "epic={},seq={}", self.epic, self.next_seq)
    }
}

/// One document in the workspace listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub document: PathBuf,
    /// Root anchors shown in the workspace
    pub visible: usize,
    /// Root anchors only shown for the document itself
    pub hidden: usize,
    pub anchors: Vec<AnchorNode>,
}

/// Whether a scan has work left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    More,
    Done,
}

/// A workspace scan processed in batches.
///
/// The caller drives it with [`Scan::next_batch`] and may yield or cancel
/// between batches. The scan stops once `max_files` documents have been
/// indexed; documents that cannot be read are logged and skipped.
#[derive(Debug)]
pub struct Scan {
    pending: VecDeque<PathBuf>,
    indexed: BTreeMap<PathBuf, Arc<AnchorIndex>>,
    max_files: usize,
    batch_size: usize,
    failed: usize,
}

impl Scan {
    pub fn new(documents: Vec<PathBuf>, max_files: usize, batch_size: usize) -> Self {
        Self {
            pending: documents.into(),
            indexed: BTreeMap::new(),
            max_files,
            batch_size: batch_size.max(1),
            failed: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty() || self.indexed.len() >= self.max_files
    }

    /// Documents indexed so far
    pub fn indexed(&self) -> usize {
        self.indexed.len()
    }

    /// Documents that could not be read
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Documents not visited yet
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Process up to one batch of documents
    pub fn next_batch(&mut self, parser: &Parser, source: &dyn TextSource) -> BatchOutcome {
        for _ in 0..self.batch_size {
            if self.is_done() {
                break;
            }
            let Some(document) = self.pending.pop_front() else {
                break;
            };
            match load_document(parser, source, &document) {
                Ok(index) => {
                    self.indexed.insert(document, Arc::new(index));
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", document.display(), e);
                    self.failed += 1;
                }
            }
        }

        if self.is_done() {
            BatchOutcome::Done
        } else {
            BatchOutcome::More
        }
    }
}
