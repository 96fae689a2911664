//! Content types and structures.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metadata value as produced by a content reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    List(Vec<String>),
}

impl MetaValue {
    /// The value as a single string. Lists are joined with `", "`.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join(", "),
        }
    }

    /// The value as a list. Text is split on commas.
    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::List(items) => items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Whether the value carries no content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Metadata mapping of one content file. Keys are lower case.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Publication status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Published,
    Draft,
}

impl Status {
    /// Parse a status string, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "published" => Some(Self::Published),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published => f.write_str("published"),
            Self::Draft => f.write_str("draft"),
        }
    }
}

/// A tag, category or author label with its URL slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Taxon {
    pub name: String,
    pub slug: String,
}

impl Taxon {
    /// Create a label, deriving its slug from the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self { name, slug }
    }
}

/// Link between members of a translation cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationLink {
    pub lang: String,
    pub slug: String,
    pub url: String,
    pub source_path: PathBuf,
}

/// One classified content item.
///
/// Entities are built once by the entity builder and are immutable afterwards,
/// apart from the translation links set while clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Name of the entity type this entity belongs to.
    pub entity_type: String,

    /// Source path relative to the content directory.
    pub source_path: PathBuf,

    /// Metadata as read, merged with path-derived metadata.
    pub metadata: Metadata,

    /// Raw body text.
    pub body: String,

    pub status: Status,

    /// Language code (site default when unspecified).
    pub lang: String,

    pub slug: String,

    pub title: String,

    #[serde(default)]
    pub category: Option<Taxon>,

    #[serde(default)]
    pub tags: Vec<Taxon>,

    #[serde(default)]
    pub authors: Vec<Taxon>,

    /// Date used for ordering and archive bucketing.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    /// Last modification date.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,

    /// Template used to render this entity's page.
    pub template: String,

    /// Output path relative to the output directory.
    pub save_as: PathBuf,

    /// Site-relative URL.
    pub url: String,

    /// Whether `save_as` came from the entity's own metadata.
    #[serde(default)]
    pub override_save_as: bool,

    /// Other-language versions (set on the cluster representative).
    #[serde(default)]
    pub translations: Vec<TranslationLink>,

    /// The representative this entity translates (set on non-representatives).
    #[serde(default)]
    pub translation_of: Option<TranslationLink>,
}

impl Entity {
    /// Look up a metadata value.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Link pointing at this entity, used for translation back-references.
    #[must_use]
    pub fn link(&self) -> TranslationLink {
        TranslationLink {
            lang: self.lang.clone(),
            slug: self.slug.clone(),
            url: self.url.clone(),
            source_path: self.source_path.clone(),
        }
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.status == Status::Draft
    }
}

/// Convert a label or file name into a URL slug.
///
/// The value is transliterated to ASCII first. ASCII alphanumerics are kept
/// (lower-cased); every other run of characters becomes a single `-`, with
/// none at either end.
#[must_use]
pub fn slugify(value: &str) -> String {
    let ascii = deunicode::deunicode(value);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Parse a metadata date.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM` (with either a
/// space or `T` separator) and `YYYY-MM-DD`. Naive values are taken as UTC.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Some(date.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Split a trailing language code off a file stem.
///
/// `hello.fr` → (`hello`, Some("fr")); `hello` → (`hello`, None). Only 2-3
/// lower-case ASCII letters count as a language code.
#[must_use]
pub fn split_language_suffix(stem: &str) -> (&str, Option<&str>) {
    if let Some(dot_pos) = stem.rfind('.') {
        let candidate = &stem[dot_pos + 1..];
        if (2..=3).contains(&candidate.len()) && candidate.chars().all(|c| c.is_ascii_lowercase())
        {
            return (&stem[..dot_pos], Some(candidate));
        }
    }
    (stem, None)
}

/// Render a relative path with `/` separators.
#[must_use]
pub fn path_to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_meta_value_list_and_text() {
        let tags = MetaValue::from("rust, web ,, static");
        assert_eq!(tags.as_list(), vec!["rust", "web", "static"]);

        let list = MetaValue::from(vec!["a".to_string(), " b ".to_string()]);
        assert_eq!(list.as_list(), vec!["a", "b"]);
        assert_eq!(list.as_text(), "a,  b ");

        assert!(MetaValue::from("   ").is_blank());
        assert!(MetaValue::List(vec![]).is_blank());
        assert!(!MetaValue::from("x").is_blank());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(Status::parse("Published"), Some(Status::Published));
        assert_eq!(Status::parse(" draft "), Some(Status::Draft));
        assert_eq!(Status::parse("hidden"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust  &  WebAssembly "), "rust-webassembly");
        assert_eq!(slugify("C++"), "c");
        assert_eq!(slugify("Café déjà vu"), "cafe-deja-vu");
        assert_eq!(slugify("Résumé"), "resume");
        assert!(slugify("已经").is_ascii());
        assert_eq!(slugify("2020 Review"), "2020-review");
    }

    #[test]
    fn test_taxon_shares_slug_across_case() {
        assert_eq!(Taxon::new("Rust").slug, Taxon::new("rust").slug);
    }

    #[test]
    fn test_parse_date_formats() {
        let date = parse_date("2020-06-01").expect("date only");
        assert_eq!((date.year(), date.month(), date.day()), (2020, 6, 1));

        let date = parse_date("2020-06-01 10:30").expect("minutes");
        assert_eq!((date.hour(), date.minute()), (10, 30));

        let date = parse_date("2020-06-01T10:30:15").expect("seconds");
        assert_eq!(date.second(), 15);

        let date = parse_date("2020-06-01T10:30:00+02:00").expect("rfc3339");
        assert_eq!(date.hour(), 8);

        assert!(parse_date("June 1st").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_split_language_suffix() {
        assert_eq!(split_language_suffix("hello.fr"), ("hello", Some("fr")));
        assert_eq!(split_language_suffix("hello"), ("hello", None));
        assert_eq!(split_language_suffix("v1.2"), ("v1.2", None));
        assert_eq!(split_language_suffix("notes.draft"), ("notes.draft", None));
    }

    #[test]
    fn test_path_to_slash() {
        let path = Path::new("article").join("rust").join("post.md");
        assert_eq!(path_to_slash(&path), "article/rust/post.md");
    }
}
