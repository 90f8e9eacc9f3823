//! Anchor attributes written in brackets after the tag
//!
//! ```text
//! // TODO[epic=Auth,seq=3,id=login]: wire up the login form
//! ```

use serde::Serialize;

/// Structured attributes of an anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attributes {
    /// Epic this anchor belongs to
    pub epic: Option<String>,
    /// Position within the epic; defaults to the anchor's line number
    pub seq: i64,
    /// Identifier that link anchors can target with `#id`
    pub id: Option<String>,
}

impl Attributes {
    /// Attributes carrying only a sequence number
    pub fn with_seq(seq: i64) -> Self {
        Self {
            epic: None,
            seq,
            id: None,
        }
    }

    /// Parse a raw `key=value,key=value` list on top of `defaults`.
    ///
    /// Absent or blank input returns `defaults` unchanged. Recognised keys are
    /// `epic`, `seq` and `id`; anything else is ignored. A `seq` that is not
    /// an integer keeps the default `seq`.
    pub fn parse(raw: Option<&str>, defaults: Attributes) -> Attributes {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return defaults;
        };

        let mut result = defaults;
        for pair in raw.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                tracing::debug!("Ignoring malformed anchor attribute: {:?}", pair);
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "epic" => result.epic = non_empty(value),
                "id" => result.id = non_empty(value),
                "seq" => match value.parse::<i64>() {
                    Ok(seq) => result.seq = seq,
                    Err(_) => {
                        tracing::debug!("Ignoring non-numeric seq attribute: {:?}", value);
                    }
                },
                _ => {}
            }
        }
        result
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
