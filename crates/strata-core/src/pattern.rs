//! Save-as and URL patterns.
//!
//! Patterns are plain strings with `{placeholder}` segments, e.g.
//! `article/{date:%Y}/{slug}.html`. Only `date` accepts a format spec, which is
//! interpreted as a `chrono` strftime string. `{{` and `}}` produce literal braces.

use std::{collections::BTreeMap, fmt};

use chrono::{
    DateTime, Utc,
    format::{Item, StrftimeItems},
};
use serde::{Serialize, Serializer};

/// Default rendering of `{date}` without a format spec.
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, format: Option<String> },
}

/// A parsed destination pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern string.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(format!("unclosed '{{' in pattern '{source}'"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&inner, source)?);
                }
                '}' => return Err(format!("unmatched '}}' in pattern '{source}'")),
                c => literal.push(c),
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

    /// The original pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of every placeholder used by the pattern, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Check that every placeholder is one of `allowed`.
    pub fn check(&self, allowed: &[&str]) -> Result<(), String> {
        match self.placeholders().find(|name| !allowed.contains(name)) {
            Some(name) => Err(format!(
                "pattern '{}' references undefined placeholder {{{name}}} (allowed: {})",
                self.source,
                allowed.join(", ")
            )),
            None => Ok(()),
        }
    }

    /// Render the pattern with the given values.
    pub fn render(&self, values: &PatternValues) -> Result<String, String> {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, format } if name == "date" => {
                    let date = values.date.ok_or_else(|| {
                        format!("pattern '{}' needs a date", self.source)
                    })?;
                    let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                    out.push_str(&date.format(format).to_string());
                }
                Segment::Placeholder { name, .. } => {
                    let value = values.text.get(name.as_str()).ok_or_else(|| {
                        format!("pattern '{}' needs a value for {{{name}}}", self.source)
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_placeholder(inner: &str, source: &str) -> Result<Segment, String> {
    let (name, format) = match inner.split_once(':') {
        Some((name, format)) => (name.trim(), Some(format.to_string())),
        None => (inner.trim(), None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid placeholder '{{{inner}}}' in pattern '{source}'"));
    }

    if let Some(format) = &format {
        if name != "date" {
            return Err(format!(
                "placeholder {{{name}}} does not take a format in pattern '{source}'"
            ));
        }
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date format '{format}' in pattern '{source}'"));
        }
    }

    Ok(Segment::Placeholder {
        name: name.to_string(),
        format,
    })
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Values available while rendering a pattern.
#[derive(Debug, Clone, Default)]
pub struct PatternValues<'a> {
    text: BTreeMap<&'a str, String>,
    date: Option<DateTime<Utc>>,
}

impl<'a> PatternValues<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text value.
    #[must_use]
    pub fn with(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.text.insert(name, value.into());
        self
    }

    /// Add a text value when present.
    #[must_use]
    pub fn with_opt(self, name: &'a str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Set the value used by `{date}`.
    #[must_use]
    pub fn with_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.date = date;
        self
    }
}
