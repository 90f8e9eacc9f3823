//! anchors-core - Comment anchor parsing and indexing
//!
//! Comment anchors are marker comments such as `// TODO: ...` or
//! `# SECTION: ...` written in any text document. This crate provides:
//! - A configurable tag registry ([`TagRegistry`]) and the single composite
//!   [`Matcher`] built from it
//! - A tolerant [`Parser`] producing a forest of anchors, with regions that
//!   own the anchors found between their start and end markers
//! - A per-document [`AnchorIndex`] and the workspace-wide [`Workspace`]
//!   with batched scanning and epic grouping
//!
//! # Features
//!
//! - `walk` - Enable [`WalkSources`] for gitignore-aware directory walking and the
//!   [`PathFilter`] it shares with file watchers (brings in `ignore` and `globset`)
//!
//! # Anchor syntax
//!
//! ```text
//! // TODO: plain marker
//! // FIXME[epic=Auth,seq=2]: marker with attributes
//! // SECTION: region start
//! // NOTE: child of the region
//! // !SECTION
//! ```
//!
//! # Parsing a document
//!
//! ```
//! use anchors_core::{Parser, ParseOptions, TagRegistry};
//! use std::path::Path;
//!
//! let separators = vec![" - ".to_string(), ": ".to_string(), " ".to_string()];
//! let parser = Parser::new(
//!     TagRegistry::with_defaults(),
//!     &separators,
//!     "!",
//!     false,
//!     ParseOptions::default(),
//! )
//! .unwrap();
//!
//! let output = parser.parse(
//!     Path::new("main.rs"),
//!     "// SECTION: setup\n// TODO: wire it up\n// !SECTION\n",
//! );
//! assert!(output.anchors_found);
//! assert_eq!(output.forest.roots().len(), 1);
//! assert_eq!(output.forest.len(), 2);
//! ```
//!
//! # Scanning a workspace
//!
//! ```
//! use anchors_core::{Parser, ParseOptions, TagRegistry, Workspace};
//!
//! let separators = vec![": ".to_string(), " ".to_string()];
//! let parser = Parser::new(
//!     TagRegistry::with_defaults(),
//!     &separators,
//!     "!",
//!     false,
//!     ParseOptions::default(),
//! )
//! .unwrap();
//!
//! let mut workspace = Workspace::new();
//! workspace.scan(
//!     &parser,
//!     [
//!         ("a.rs", "// TODO[epic=Login,seq=2]: submit"),
//!         ("b.rs", "// TODO[epic=Login,seq=1]: form"),
//!     ],
//!     50,
//! );
//!
//! let epics = workspace.group_by_epic();
//! assert_eq!(epics["Login"][0].comment, "form");
//! ```

pub mod anchor;
pub mod attributes;
pub mod completion;
pub mod error;
pub mod index;
pub mod link;
pub mod matcher;
pub mod parser;
pub mod sources;
pub mod tags;
pub mod workspace;

pub use anchor::{
    Anchor, AnchorId, AnchorKind, AnchorNode, Forest, RegionClose, SortMethod, sort_nodes,
};
pub use attributes::Attributes;
pub use completion::{TagCompletion, tag_completions};
pub use error::{ConfigError, SourceError};
pub use index::AnchorIndex;
pub use link::{LinkPosition, LinkTarget};
pub use matcher::{Matcher, MatcherHit};
pub use parser::{MAX_REGION_DEPTH, ParseOptions, ParseOutput, Parser};
#[cfg(feature = "walk")]
pub use sources::{PathFilter, WalkSources};
pub use sources::{DocumentEnumerator, FsSource, MemorySources, TextSource};
pub use tags::{Behavior, IconColor, Scope, TagDefinition, TagOverride, TagRegistry};
pub use workspace::{
    BatchOutcome, DEFAULT_BATCH_SIZE, DocumentView, EpicCompletion, Scan, ScanStatus, Workspace,
    index_document, load_document,
};
