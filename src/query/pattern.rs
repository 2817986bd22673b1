//! Path patterns.

use crate::error::{RequestError, Result, StructuralError};
use crate::tree::{Entry, Node};

/// One segment of a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Exact child name.
    Literal(String),
    /// `*`: every child at this level.
    Wildcard,
    /// `**`: this level and everything below it. Final segment only.
    Recursive,
}

/// A `/`-delimited path pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern string.
    ///
    /// Returns `Ok(None)` for a pattern with a trailing empty segment, which
    /// callers drop silently.
    pub fn parse(pattern: &str) -> Result<Option<Pattern>> {
        if pattern.is_empty() {
            return Err(RequestError::EmptyPattern.into());
        }
        let parts: Vec<&str> = pattern.split('/').collect();
        if parts.last().map_or(true, |last| last.is_empty()) {
            return Ok(None);
        }

        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            let segment = match part {
                "**" if i != last => {
                    return Err(StructuralError::RecursiveWildcardNotLast {
                        pattern: pattern.to_string(),
                    }
                    .into())
                }
                "**" => Segment::Recursive,
                "*" => Segment::Wildcard,
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }
        Ok(Some(Pattern { segments }))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The literal segments before the first wildcard.
    pub fn literal_prefix(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map_while(|segment| match segment {
            Segment::Literal(name) => Some(name.as_str()),
            Segment::Wildcard | Segment::Recursive => None,
        })
    }
}

/// Children of `node` selected by `segment`.
pub(crate) fn matching<'a>(node: &'a Node, segment: &'a Segment) -> Vec<(&'a str, &'a Entry)> {
    match segment {
        Segment::Literal(name) => node
            .get(name)
            .map(|entry| (name.as_str(), entry))
            .into_iter()
            .collect(),
        Segment::Wildcard | Segment::Recursive => node
            .children()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect(),
    }
}
