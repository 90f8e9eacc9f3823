//! Insertable anchor snippets

use crate::tags::TagRegistry;
use serde::Serialize;

/// One completion item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCompletion {
    /// Shown in the completion list, e.g. `TODO Anchor`
    pub label: String,
    /// Text inserted on accept, e.g. `TODO: `
    pub insert: String,
}

/// Completions for every registered tag, followed by the first separator.
/// Region tags also get their end form.
pub fn tag_completions(
    registry: &TagRegistry,
    separators: &[String],
    end_tag: &str,
) -> Vec<TagCompletion> {
    let separator = separators.first().map(String::as_str).unwrap_or(" ");
    let mut items = Vec::new();
    for tag in registry.iter() {
        items.push(TagCompletion {
            label: format!("{} Anchor", tag.name),
            insert: format!("{}{}", tag.name, separator),
        });
        if tag.is_region() {
            let end = format!("{}{}", end_tag, tag.name);
            items.push(TagCompletion {
                label: format!("{} Anchor", end),
                insert: format!("{}{}", end, separator),
            });
        }
    }
    items
}
