//! Value templates for generated fields.
//!
//! A template is literal text with directory attribute names in braces,
//! e.g. `{uid}@example.org` or `{givenName} {sn}`. Rendering substitutes the
//! first value of each referenced attribute and fails if one is missing.

use crate::directory::DirectoryEntry;
use crate::error::SchemaError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Attribute(String),
}

/// A parsed field template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FieldTemplate {
    /// Parses a template.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(invalid("nested opening brace")),
                            Some(ch) => name.push(ch),
                            None => return Err(invalid("unterminated attribute reference")),
                        }
                    }
                    if name.trim().is_empty() {
                        return Err(invalid("empty attribute reference"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Attribute(name.trim().to_string()));
                }
                '}' => return Err(invalid("unmatched closing brace")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Attribute names referenced by the template.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Attribute(a) => Some(a.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Renders the template against a directory entry.
    #[must_use]
    pub fn render(&self, entry: &DirectoryEntry) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Attribute(name) => out.push_str(entry.first_text(name)?),
            }
        }
        Some(out)
    }
}

impl fmt::Display for FieldTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
