//! Tag definitions and the registry that holds them
//!
//! A tag is a named marker kind (`TODO`, `NOTE`, `SECTION`, ...). Tags are
//! identified case-insensitively by their uppercased name. The registry starts
//! from a default set and user overrides are merged on top of it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#([\da-f]{3}){1,2}$").expect("hex color pattern is valid")
});

/// How anchors of a tag behave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// A single standalone marker
    #[default]
    #[serde(alias = "anchor")]
    Marker,
    /// Opens a region closed by the matching end tag; owns nested anchors
    Region,
    /// Marker whose text points at another file or anchor
    Link,
}

impl Behavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Behavior::Marker => "marker",
            Behavior::Region => "region",
            Behavior::Link => "link",
        }
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where anchors of a tag are visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only listed for the document containing them
    #[serde(alias = "file")]
    Document,
    /// Listed workspace-wide and eligible for epics
    #[default]
    Workspace,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Document => "document",
            Scope::Workspace => "workspace",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved icon color of a tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconColor {
    /// Theme-dependent default icon
    #[default]
    Auto,
    /// Lowercase hex color without the leading `#`
    Hex(String),
}

impl IconColor {
    /// Resolve a configured color: palette names, `default`/`auto`, or `#rgb`/`#rrggbb`.
    ///
    /// Returns `None` for anything else.
    pub fn resolve(raw: &str) -> Option<Self> {
        let hex = match raw {
            "default" | "auto" => return Some(IconColor::Auto),
            "blue" => "#3ea8ff",
            "blurple" => "#7d5afc",
            "red" => "#f44336",
            "purple" => "#ba68c8",
            "teal" => "#00cec9",
            "orange" => "#ffa100",
            "green" => "#64dd17",
            "pink" => "#e84393",
            "emerald" => "#2ecc71",
            "yellow" => "#f4d13d",
            other if HEX_COLOR.is_match(other) => other,
            _ => return None,
        };
        Some(IconColor::Hex(hex[1..].to_ascii_lowercase()))
    }
}

/// A configured tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDefinition {
    /// Uppercased tag name, the tag's identity
    pub name: String,
    pub behavior: Behavior,
    pub scope: Scope,
    /// Prefix sidebar labels with `[line]`
    pub display_line_number: bool,
    /// Highlight the whole comment instead of only the tag token
    pub style_comment: bool,
    pub icon_color: IconColor,
    pub highlight_color: Option<String>,
    pub background_color: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl TagDefinition {
    /// Create a tag with default display options
    pub fn new(name: &str, behavior: Behavior, scope: Scope) -> Self {
        Self {
            name: name.to_uppercase(),
            behavior,
            scope,
            display_line_number: true,
            style_comment: false,
            icon_color: IconColor::Auto,
            highlight_color: None,
            background_color: None,
            bold: true,
            italic: true,
        }
    }

    fn colored(mut self, icon: &str, highlight: &str) -> Self {
        self.icon_color = IconColor::resolve(icon).unwrap_or_default();
        self.highlight_color = Some(highlight.to_string());
        self
    }

    pub fn is_region(&self) -> bool {
        self.behavior == Behavior::Region
    }

    pub fn is_workspace_visible(&self) -> bool {
        self.scope == Scope::Workspace
    }
}

/// A user-supplied tag entry, merged onto the registry
///
/// Every field except `tag` is optional; absent fields keep the value of the
/// default tag with the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagOverride {
    pub tag: String,
    pub enabled: Option<bool>,
    pub behavior: Option<Behavior>,
    /// Legacy flag, equivalent to `behavior: region`
    pub is_region: Option<bool>,
    pub scope: Option<Scope>,
    pub display_line_number: Option<bool>,
    pub style_comment: Option<bool>,
    pub icon_color: Option<String>,
    pub highlight_color: Option<String>,
    pub background_color: Option<String>,
    pub is_bold: Option<bool>,
    pub is_italic: Option<bool>,
}

impl TagOverride {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }
}

/// The set of known tags, keyed by uppercased name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRegistry {
    tags: BTreeMap<String, TagDefinition>,
}

impl TagRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the default tag set
    pub fn with_defaults() -> Self {
        use Behavior::*;
        use Scope::*;

        let mut registry = Self::new();
        for tag in [
            TagDefinition::new("ANCHOR", Marker, Document).colored("default", "#A8C023"),
            TagDefinition::new("TODO", Marker, Workspace).colored("blue", "#3ea8ff"),
            TagDefinition::new("FIXME", Marker, Workspace).colored("red", "#F44336"),
            TagDefinition::new("STUB", Marker, Document).colored("purple", "#BA68C8"),
            TagDefinition::new("NOTE", Marker, Document).colored("teal", "#00cec9"),
            TagDefinition::new("REVIEW", Marker, Workspace).colored("green", "#64DD17"),
            TagDefinition::new("SECTION", Region, Workspace).colored("blurple", "#896afc"),
            TagDefinition::new("LINK", Link, Workspace).colored("emerald", "#2ecc71"),
        ] {
            registry.insert(tag);
        }
        registry
    }

    /// Insert or replace a tag
    pub fn insert(&mut self, mut tag: TagDefinition) {
        tag.name = tag.name.to_uppercase();
        self.tags.insert(tag.name.clone(), tag);
    }

    /// Remove a tag by name
    pub fn remove(&mut self, name: &str) -> Option<TagDefinition> {
        self.tags.remove(&name.to_uppercase())
    }

    /// Look a tag up by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.get(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.values()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Merge user overrides onto the registry.
    ///
    /// An override with `enabled: false` removes the tag. Otherwise its set
    /// fields replace those of the existing tag (or of a fresh workspace
    /// marker when the name is new). Invalid icon colors are reported and
    /// reset to [`IconColor::Auto`].
    pub fn merge<'a>(&mut self, overrides: impl IntoIterator<Item = &'a TagOverride>) {
        for entry in overrides {
            let name = entry.tag.trim().to_uppercase();
            if name.is_empty() {
                tracing::warn!("Ignoring tag override without a name");
                continue;
            }

            if entry.enabled == Some(false) {
                self.tags.remove(&name);
                continue;
            }

            let existing = self.tags.remove(&name);
            let is_new = existing.is_none();
            let mut tag = existing
                .unwrap_or_else(|| TagDefinition::new(&name, Behavior::Marker, Scope::Workspace));

            if let Some(behavior) = entry.behavior {
                tag.behavior = behavior;
            }
            if entry.is_region == Some(true) {
                tag.behavior = Behavior::Region;
            }
            if let Some(scope) = entry.scope {
                tag.scope = scope;
            }
            if let Some(show) = entry.display_line_number {
                tag.display_line_number = show;
            }
            if let Some(style) = entry.style_comment {
                tag.style_comment = style;
            }
            if let Some(bold) = entry.is_bold {
                tag.bold = bold;
            }
            if let Some(italic) = entry.is_italic {
                tag.italic = italic;
            }
            if entry.highlight_color.is_some() {
                tag.highlight_color = entry.highlight_color.clone();
            }
            if entry.background_color.is_some() {
                tag.background_color = entry.background_color.clone();
            }

            // New tags take their icon from the highlight color unless given explicitly
            let icon = match (&entry.icon_color, is_new) {
                (Some(raw), _) => Some(raw),
                (None, true) => entry.highlight_color.as_ref(),
                (None, false) => None,
            };
            if let Some(raw) = icon {
                tag.icon_color = match IconColor::resolve(raw) {
                    Some(color) => color,
                    None => {
                        tracing::warn!("Invalid color for tag {}: {}", name, raw);
                        IconColor::Auto
                    }
                };
            }

            self.tags.insert(name, tag);
        }
    }

    /// Apply a display-line-number default to every tag
    pub fn set_display_line_number(&mut self, show: bool) {
        for tag in self.tags.values_mut() {
            tag.display_line_number = show;
        }
    }
}
