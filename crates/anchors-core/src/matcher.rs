//! Composite pattern recognising every configured tag
//!
//! One regular expression is built from the tag registry, the separator list
//! and the region end prefix:
//!
//! ```text
//! [^\w](TAGS)(\[attrs\])?((SEPARATORS)(free text))?$
//! ```
//!
//! It runs over the raw document text in multi-line mode; there is no
//! per-language comment awareness.

use crate::error::ConfigError;
use crate::tags::TagRegistry;
use regex::{Captures, Regex, RegexBuilder};

/// Compiled anchor matcher.
///
/// Immutable once built. A configuration change builds a new matcher that
/// replaces the old one as a whole.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    end_tag: String,
    match_case: bool,
}

/// One occurrence of a tag in a document
#[derive(Debug, Clone, Copy)]
pub struct MatcherHit<'t> {
    /// The tag token as written, e.g. `todo` or `!SECTION`
    pub tag: &'t str,
    /// Byte offset of the tag token
    pub tag_start: usize,
    /// Contents of the attribute brackets, without the brackets
    pub attributes: Option<&'t str>,
    /// Text after the separator, up to the end of the line
    pub comment: Option<&'t str>,
    /// Byte offset where the comment text starts
    pub comment_start: Option<usize>,
    /// Byte offset where the whole match ends
    pub end: usize,
}

impl Matcher {
    /// Build the matcher for the tags in `registry`.
    ///
    /// Region tags are also matched in their end form (`end_tag + name`).
    /// Fails when there are no tags or no non-empty separators.
    pub fn build(
        registry: &TagRegistry,
        separators: &[String],
        end_tag: &str,
        match_case: bool,
    ) -> Result<Self, ConfigError> {
        let mut names: Vec<String> = Vec::new();
        for tag in registry.iter() {
            names.push(tag.name.clone());
            if tag.is_region() {
                names.push(format!("{}{}", end_tag, tag.name));
            }
        }
        if names.is_empty() {
            return Err(ConfigError::NoTags);
        }

        // The regex engine prefers the leftmost alternative, so longer tags
        // must come before shorter tags sharing their prefix
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let separators: Vec<String> = separators
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| regex::escape(s).replace(' ', " +"))
            .collect();
        if separators.is_empty() {
            return Err(ConfigError::NoSeparators);
        }

        let tags = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"[^\w](?P<tag>{})(?P<attrs>\[[^\]\r\n]*\])?(?:(?:{})(?P<comment>.*))?$",
            tags,
            separators.join("|")
        );

        let regex = RegexBuilder::new(&pattern)
            .multi_line(true)
            .crlf(true)
            .case_insensitive(!match_case)
            .build()?;

        tracing::debug!("Using matcher {}", regex.as_str());

        Ok(Self {
            regex,
            end_tag: end_tag.to_string(),
            match_case,
        })
    }

    /// Iterate over non-overlapping tag occurrences in source order
    pub fn find_iter<'a>(&'a self, text: &'a str) -> impl Iterator<Item = MatcherHit<'a>> + 'a {
        self.regex.captures_iter(text).filter_map(hit_from_captures)
    }

    /// Split a matched tag token into its base name and whether it carries
    /// the end prefix. The prefix is only honoured when `is_region` says the
    /// remaining name belongs to a region tag.
    pub fn strip_end_tag<'t>(
        &self,
        token: &'t str,
        is_region: impl Fn(&str) -> bool,
    ) -> (&'t str, bool) {
        if self.end_tag.is_empty() || token.len() <= self.end_tag.len() {
            return (token, false);
        }
        let Some(prefix) = token.get(..self.end_tag.len()) else {
            return (token, false);
        };
        let has_prefix = if self.match_case {
            prefix == self.end_tag
        } else {
            prefix.to_uppercase() == self.end_tag.to_uppercase()
        };
        let rest = &token[self.end_tag.len()..];
        if has_prefix && is_region(rest) {
            (rest, true)
        } else {
            (token, false)
        }
    }
}

fn hit_from_captures<'t>(caps: Captures<'t>) -> Option<MatcherHit<'t>> {
    let whole = caps.get(0)?;
    let tag = caps.name("tag")?;
    let attributes = caps.name("attrs").map(|m| {
        let raw = m.as_str();
        &raw[1..raw.len() - 1]
    });
    let comment = caps.name("comment");
    Some(MatcherHit {
        tag: tag.as_str(),
        tag_start: tag.start(),
        attributes,
        comment: comment.map(|m| m.as_str()),
        comment_start: comment.map(|m| m.start()),
        end: whole.end(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Behavior, Scope, TagDefinition};

    fn separators() -> Vec<String> {
        vec![" - ".into(), ": ".into(), " ".into()]
    }

    fn registry() -> TagRegistry {
        let mut registry = TagRegistry::new();
        registry.insert(TagDefinition::new("NOTE", Behavior::Marker, Scope::Workspace));
        registry.insert(TagDefinition::new("REGION", Behavior::Region, Scope::Workspace));
        registry
    }

    #[test]
    fn test_empty_tags_rejected() {
        let err = Matcher::build(&TagRegistry::new(), &separators(), "END", false).unwrap_err();
        assert!(matches!(err, ConfigError::NoTags));
    }

    #[test]
    fn test_empty_separators_rejected() {
        let err = Matcher::build(&registry(), &[], "END", false).unwrap_err();
        assert!(matches!(err, ConfigError::NoSeparators));

        let err = Matcher::build(&registry(), &["".into()], "END", false).unwrap_err();
        assert!(matches!(err, ConfigError::NoSeparators));
    }

    #[test]
    fn test_matches_tag_attrs_and_comment() {
        let matcher = Matcher::build(&registry(), &separators(), "END", false).unwrap();
        let hits: Vec<_> = matcher
            .find_iter("// note[epic=Init,seq=2]: hello world\n")
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tag, "note");
        assert_eq!(hits[0].tag_start, 3);
        assert_eq!(hits[0].attributes, Some("epic=Init,seq=2"));
        assert_eq!(hits[0].comment, Some("hello world"));
    }

    #[test]
    fn test_end_tag_preferred_over_shorter_prefix() {
        let matcher = Matcher::build(&registry(), &separators(), "END", false).unwrap();
        let hits: Vec<_> = matcher.find_iter("// ENDREGION: done").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tag, "ENDREGION");
    }

    #[test]
    fn test_tag_needs_separator_or_line_end() {
        let matcher = Matcher::build(&registry(), &separators(), "END", false).unwrap();
        assert_eq!(matcher.find_iter("// NOTES are fine").count(), 0);
        assert_eq!(matcher.find_iter("// NOTE").count(), 1);
        assert_eq!(matcher.find_iter("XNOTE: glued").count(), 0);
    }

    #[test]
    fn test_match_case() {
        let matcher = Matcher::build(&registry(), &separators(), "END", true).unwrap();
        assert_eq!(matcher.find_iter("// note: lower").count(), 0);
        assert_eq!(matcher.find_iter("// NOTE: upper").count(), 1);
    }

    #[test]
    fn test_separator_spaces_are_flexible() {
        let matcher = Matcher::build(&registry(), &[" - ".into()], "END", false).unwrap();
        let hit = matcher.find_iter("# NOTE   -  spaced").next().unwrap();
        assert_eq!(hit.comment, Some("spaced"));
    }

    #[test]
    fn test_crlf_line_ends() {
        let matcher = Matcher::build(&registry(), &separators(), "END", false).unwrap();
        let hits: Vec<_> = matcher.find_iter("// NOTE: one\r\n// NOTE: two\r\n").collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].comment, Some("one"));
        assert_eq!(hits[1].comment, Some("two"));
    }

    #[test]
    fn test_strip_end_tag() {
        let matcher = Matcher::build(&registry(), &separators(), "end", false).unwrap();
        let is_region = |name: &str| name.eq_ignore_ascii_case("REGION");
        assert_eq!(matcher.strip_end_tag("ENDREGION", is_region), ("REGION", true));
        assert_eq!(matcher.strip_end_tag("EndRegion", is_region), ("Region", true));
        assert_eq!(matcher.strip_end_tag("REGION", is_region), ("REGION", false));
        assert_eq!(matcher.strip_end_tag("ENDNOTE", is_region), ("ENDNOTE", false));
    }
}
