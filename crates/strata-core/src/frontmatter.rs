//! Content reading: front matter into a metadata mapping.
//!
//! The pipeline only depends on the [`ContentReader`] trait. [`FrontmatterReader`]
//! is the stock implementation: YAML front matter delimited by `---` or TOML
//! delimited by `+++`, followed by an uninterpreted body.

use std::path::Path;

use crate::{
    content::{MetaValue, Metadata},
    error::{CoreError, Result},
};

/// Metadata and body read from one content file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContent {
    pub metadata: Metadata,
    pub body: String,
}

/// Reads a content file into metadata and body.
pub trait ContentReader: Send + Sync {
    /// File extensions this reader handles, lower case, without the dot.
    fn extensions(&self) -> &[&str];

    /// Whether the reader handles the given file.
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }

    /// Read one file. Malformed input is a [`CoreError::Read`].
    fn read(&self, path: &Path) -> Result<RawContent>;
}

/// Delimiter types for frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// YAML frontmatter delimited by `---`.
    Yaml,
    /// TOML frontmatter delimited by `+++`.
    Toml,
}

impl FrontmatterFormat {
    /// Get the delimiter string for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }
}

/// Split content into frontmatter and body.
///
/// Delimiters must sit on their own line.
pub fn split_frontmatter(content: &str) -> Option<(FrontmatterFormat, &str, &str)> {
    let content = content.trim_start_matches('\u{feff}').trim_start();

    let format = if content.starts_with("---") {
        FrontmatterFormat::Yaml
    } else if content.starts_with("+++") {
        FrontmatterFormat::Toml
    } else {
        return None;
    };

    let delimiter = format.delimiter();
    let rest = &content[delimiter.len()..];
    let after_first = rest.strip_prefix('\r').unwrap_or(rest).strip_prefix('\n')?;

    let mut offset = 0;
    for line in after_first.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            let frontmatter = after_first[..offset].trim();
            let body = after_first[offset + line.len()..].trim_start();
            return Some((format, frontmatter, body));
        }
        offset += line.len();
    }

    None
}

/// Parse frontmatter from a string into a metadata mapping and body.
pub fn parse_frontmatter(content: &str, path: &Path) -> Result<(Metadata, String)> {
    let Some((format, fm_str, body)) = split_frontmatter(content) else {
        return Ok((Metadata::new(), content.to_string()));
    };

    let metadata = match format {
        FrontmatterFormat::Yaml => yaml_metadata(fm_str, path)?,
        FrontmatterFormat::Toml => toml_metadata(fm_str, path)?,
    };

    Ok((metadata, body.to_string()))
}

fn yaml_metadata(source: &str, path: &Path) -> Result<Metadata> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| CoreError::read(path, e.to_string()))?;

    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Metadata::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(CoreError::read(path, "front matter must be a mapping")),
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = yaml_scalar(&key)
            .ok_or_else(|| CoreError::read(path, "front matter keys must be scalars"))?;
        let value = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::Sequence(items) => {
                MetaValue::List(items.iter().map(yaml_item).collect())
            }
            other => MetaValue::Text(yaml_item(&other)),
        };
        metadata.insert(key.to_lowercase(), value);
    }
    Ok(metadata)
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        _ => None,
    }
}

fn yaml_item(value: &serde_yaml::Value) -> String {
    yaml_scalar(value)
        .or_else(|| serde_json::to_string(value).ok())
        .unwrap_or_default()
}

fn toml_metadata(source: &str, path: &Path) -> Result<Metadata> {
    let table: toml::Table = source
        .parse()
        .map_err(|e: toml::de::Error| CoreError::read(path, e.to_string()))?;

    let mut metadata = Metadata::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::Array(items) => MetaValue::List(items.iter().map(toml_item).collect()),
            other => MetaValue::Text(toml_item(&other)),
        };
        metadata.insert(key.to_lowercase(), value);
    }
    Ok(metadata)
}

fn toml_item(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Stock content reader for front-matter files.
#[derive(Debug, Clone, Default)]
pub struct FrontmatterReader;

impl FrontmatterReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContentReader for FrontmatterReader {
    fn extensions(&self) -> &[&str] {
        &["md", "markdown", "html", "txt"]
    }

    fn read(&self, path: &Path) -> Result<RawContent> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::read(path, e.to_string()))?;
        let (metadata, body) = parse_frontmatter(&content, path)?;
        Ok(RawContent { metadata, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yaml_frontmatter() {
        let content = r#"---
title: "Hello World"
date: 2024-01-14
---

This is the body content."#;

        let (format, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(format, FrontmatterFormat::Yaml);
        assert!(fm.contains("title:"));
        assert!(body.starts_with("This is the body"));
    }

    #[test]
    fn test_split_toml_frontmatter() {
        let content = r#"+++
title = "Hello World"
date = 2024-01-14
+++

This is the body content."#;

        let (format, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(format, FrontmatterFormat::Toml);
        assert!(fm.contains("title ="));
        assert!(body.starts_with("This is the body"));
    }

    #[test]
    fn test_dashes_inside_body_are_not_a_delimiter() {
        let content = "---\ntitle: x\n---\nintro --- more\n---\n";
        let (_, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(fm, "title: x");
        assert!(body.starts_with("intro --- more"));
    }

    #[test]
    fn test_no_frontmatter() {
        assert!(split_frontmatter("Just some content.").is_none());

        let (metadata, body) =
            parse_frontmatter("Just some content.", Path::new("a.md")).expect("parse");
        assert!(metadata.is_empty());
        assert_eq!(body, "Just some content.");
    }

    #[test]
    fn test_parse_yaml_metadata() {
        let content = r#"---
Title: "Test Post"
date: 2024-01-14
draft: false
weight: 3
tags:
  - rust
  - test
extra:
  colour: blue
---

Content here."#;

        let (metadata, body) = parse_frontmatter(content, Path::new("test.md")).expect("parse");

        assert_eq!(metadata["title"], MetaValue::from("Test Post"));
        assert_eq!(metadata["date"], MetaValue::from("2024-01-14"));
        assert_eq!(metadata["draft"], MetaValue::from("false"));
        assert_eq!(metadata["weight"], MetaValue::from("3"));
        assert_eq!(metadata["tags"].as_list(), vec!["rust", "test"]);
        assert!(metadata["extra"].as_text().contains("blue"));
        assert_eq!(body, "Content here.");
    }

    #[test]
    fn test_parse_toml_metadata() {
        let content = r#"+++
title = "Test Post"
date = 2024-01-14
tags = ["rust", "test"]
+++

Content here."#;

        let (metadata, body) = parse_frontmatter(content, Path::new("test.md")).expect("parse");

        assert_eq!(metadata["title"].as_text(), "Test Post");
        assert_eq!(metadata["date"].as_text(), "2024-01-14");
        assert_eq!(metadata["tags"].as_list(), vec!["rust", "test"]);
        assert_eq!(body, "Content here.");
    }

    #[test]
    fn test_malformed_frontmatter_is_read_error() {
        let content = "---\ntitle: [unclosed\n---\nbody";
        let err = parse_frontmatter(content, Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, CoreError::Read { .. }));
        assert!(err.to_string().contains("bad.md"));

        let err = parse_frontmatter("---\n- a\n- b\n---\n", Path::new("list.md")).unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn test_reader_accepts_by_extension() {
        let reader = FrontmatterReader::new();
        assert!(reader.accepts(Path::new("a/post.md")));
        assert!(reader.accepts(Path::new("a/post.MD")));
        assert!(!reader.accepts(Path::new("a/image.png")));
        assert!(!reader.accepts(Path::new("a/README")));
    }

    #[test]
    fn test_reader_reads_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("post.md");
        std::fs::write(&path, "---\ntitle: Hi\n---\nBody\n").expect("write");

        let raw = FrontmatterReader::new().read(&path).expect("read");
        assert_eq!(raw.metadata["title"].as_text(), "Hi");
        assert_eq!(raw.body, "Body\n");

        let missing = FrontmatterReader::new().read(&dir.path().join("nope.md"));
        assert!(matches!(missing, Err(CoreError::Read { .. })));
    }
}
