//! Resolved per-entity-type configuration.
//!
//! Resolution layers three mappings, later ones winning key by key: built-in
//! defaults, the global `[settings]` table and the type's own table. Keys are
//! case-insensitive. Keys that are not recognised end up in
//! [`EntityTypeConfig::extra`] and are handed to templates unchanged.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use regex::Regex;
use serde::Serialize;

use crate::{
    config::SiteConfig,
    error::{CoreError, Result},
    pattern::Pattern,
};

/// Default regex applied to file stems to extract metadata.
pub const DEFAULT_FILENAME_METADATA: &str = r"^(?P<date>\d{4}-\d{2}-\d{2})[-_](?P<slug>.+)$";

/// Default destination of page N≥2 of a paginated sequence.
pub const DEFAULT_PAGINATED_SAVE_AS: &str = "{base}{number}{ext}";

const DEFAULT_PAGE_SIZE: usize = 10;

const ENTITY_PLACEHOLDERS: &[&str] = &["slug", "lang", "category", "author", "date", "entity_type"];
const INDEX_PLACEHOLDERS: &[&str] = &["slug", "name", "entity_type"];
const ARCHIVE_PLACEHOLDERS: &[&str] = &["entity_type"];
const PERIOD_PLACEHOLDERS: &[&str] = &["date", "entity_type"];
const DIRECT_PLACEHOLDERS: &[&str] = &["name", "entity_type"];
const PAGINATED_PLACEHOLDERS: &[&str] = &["base", "number", "ext"];
const TRANSLATION_FEED_PLACEHOLDERS: &[&str] = &["lang", "entity_type"];

/// Syndication format of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Atom,
    Rss,
}

impl FeedFormat {
    fn key_suffix(self) -> &'static str {
        match self {
            Self::Atom => "ATOM",
            Self::Rss => "RSS",
        }
    }
}

/// Which entities a feed covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScope {
    /// Published entities in their representative language.
    Published,
    /// Published entities plus their translations.
    All,
    /// One feed per category.
    Category,
    /// One feed per tag.
    Tag,
    /// One feed per author.
    Author,
    /// One feed per language.
    Translation,
}

impl FeedScope {
    pub const SCOPES: [FeedScope; 6] = [
        Self::Published,
        Self::All,
        Self::Category,
        Self::Tag,
        Self::Author,
        Self::Translation,
    ];

    fn key_prefix(self) -> &'static str {
        match self {
            Self::Published => "FEED",
            Self::All => "FEED_ALL",
            Self::Category => "CATEGORY_FEED",
            Self::Tag => "TAG_FEED",
            Self::Author => "AUTHOR_FEED",
            Self::Translation => "TRANSLATION_FEED",
        }
    }

    fn placeholders(self) -> &'static [&'static str] {
        match self {
            Self::Published | Self::All => ARCHIVE_PLACEHOLDERS,
            Self::Category | Self::Tag | Self::Author => INDEX_PLACEHOLDERS,
            Self::Translation => TRANSLATION_FEED_PLACEHOLDERS,
        }
    }
}

/// Kind of page a destination pattern applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteKind {
    Entity,
    EntityLang,
    Draft,
    DraftLang,
    Category,
    Tag,
    Author,
    Archive,
    YearArchive,
    MonthArchive,
    DayArchive,
    Paginated,
    Feed(FeedScope, FeedFormat),
}

impl RouteKind {
    fn placeholders(self) -> &'static [&'static str] {
        match self {
            Self::Entity | Self::EntityLang | Self::Draft | Self::DraftLang => ENTITY_PLACEHOLDERS,
            Self::Category | Self::Tag | Self::Author => INDEX_PLACEHOLDERS,
            Self::Archive => ARCHIVE_PLACEHOLDERS,
            Self::YearArchive | Self::MonthArchive | Self::DayArchive => PERIOD_PLACEHOLDERS,
            Self::Paginated => PAGINATED_PLACEHOLDERS,
            Self::Feed(scope, _) => scope.placeholders(),
        }
    }

    /// Settings key of the save-as pattern, for a type whose upper-case name is `upper`.
    #[must_use]
    pub fn save_as_key(self, upper: &str) -> String {
        self.keys(upper).0
    }

    /// Settings keys holding the save-as and URL patterns.
    fn keys(self, upper: &str) -> (String, String) {
        let stem = match self {
            Self::Entity => upper.to_string(),
            Self::EntityLang => format!("{upper}_LANG"),
            Self::Draft => format!("DRAFT_{upper}"),
            Self::DraftLang => format!("DRAFT_{upper}_LANG"),
            Self::Category => "CATEGORY".to_string(),
            Self::Tag => "TAG".to_string(),
            Self::Author => "AUTHOR".to_string(),
            Self::Archive => "ARCHIVE".to_string(),
            Self::YearArchive => "YEAR_ARCHIVE".to_string(),
            Self::MonthArchive => "MONTH_ARCHIVE".to_string(),
            Self::DayArchive => "DAY_ARCHIVE".to_string(),
            Self::Paginated => "PAGINATED".to_string(),
            Self::Feed(scope, format) => {
                let key = format!("{}_{}", scope.key_prefix(), format.key_suffix());
                let url = format!("{key}_URL");
                return (key, url);
            }
        };
        (format!("{stem}_SAVE_AS"), format!("{stem}_URL"))
    }
}

/// Save-as and URL patterns of one page kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub save_as: Pattern,
    pub url: Pattern,
}

/// A configured direct template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectTemplate {
    /// Template name, also the page name.
    pub name: String,
    pub route: Route,
    /// Rendered once per page of the published entity list.
    pub paginated: bool,
    /// For paginated templates, an extra unpaginated page.
    pub all: Option<Route>,
}

/// How an entity sequence is ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SorterSpec {
    /// Multi-key sort on the named attributes; `reverse` sorts descending.
    Attributes {
        attributes: Vec<String>,
        reverse: bool,
    },
    /// A sorter registered under this name.
    Named(String),
}

impl Default for SorterSpec {
    fn default() -> Self {
        Self::Attributes {
            attributes: vec!["date".to_string()],
            reverse: true,
        }
    }
}

impl fmt::Display for SorterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributes {
                attributes,
                reverse,
            } => {
                let order = if *reverse { "descending" } else { "ascending" };
                write!(f, "[{}] {order}", attributes.join(", "))
            }
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Tie-break between translation-cluster members of equal language priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranslationTieBreak {
    /// Lexicographically smallest source path.
    #[default]
    Path,
    /// First discovered.
    Discovery,
}

/// Fully resolved configuration of one entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeConfig {
    /// Declared type name, e.g. `Article`.
    pub name: String,
    /// Lower-case name; the type's key in the generated context.
    pub namespace: String,

    pub paths: Vec<String>,
    pub excludes: Vec<String>,
    pub ignore_files: Vec<String>,

    pub routes: BTreeMap<RouteKind, Route>,
    pub direct_templates: Vec<DirectTemplate>,

    pub mandatory_properties: BTreeSet<String>,
    pub sorter: SorterSpec,

    pub default_template: String,
    pub archive_template: Option<String>,
    pub period_archive_template: Option<String>,
    pub category_template: Option<String>,
    pub tag_template: Option<String>,
    pub author_template: Option<String>,

    /// Name of the registered sub-generator implementation.
    pub subgenerator: String,

    /// Page size; `0` disables pagination.
    pub page_size: usize,
    pub feed_max_items: Option<usize>,

    pub filename_metadata: Option<Regex>,
    pub path_metadata: Option<Regex>,
    pub use_folder_as_category: bool,
    pub default_category: Option<String>,
    pub reverse_category_order: bool,
    pub newest_first_archives: bool,

    pub default_lang: String,
    /// Language priority, highest first.
    pub languages: Vec<String>,
    pub translation_tie_break: TranslationTieBreak,

    /// Unrecognised settings, passed through to templates.
    pub extra: BTreeMap<String, toml::Value>,
}

impl EntityTypeConfig {
    /// Resolve the configuration of `name` from the global settings and the
    /// type's overrides.
    pub fn resolve(
        name: &str,
        site: &SiteConfig,
        global: &toml::Table,
        overrides: &toml::Table,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::configuration("entity type name cannot be empty"));
        }

        let upper = name.to_uppercase();
        let lower = name.to_lowercase();
        let mut settings = Settings::new(name, &[global, overrides]);

        let mandatory_properties = resolve_mandatory(name, global, overrides)?;
        settings.remove("MANDATORY_PROPERTIES");
        settings.remove("MANDATORY_PROPERTIES_REPLACE");

        let paths = settings
            .list("PATHS")?
            .unwrap_or_else(|| vec![lower.clone()])
            .into_iter()
            .map(|p| p.trim_matches('/').to_string())
            .collect();
        let excludes = settings.list("EXCLUDES")?.unwrap_or_default();
        let ignore_files = settings
            .list("IGNORE_FILES")?
            .unwrap_or_else(|| vec![".#*".to_string()]);

        let mut routes = BTreeMap::new();
        let defaults = [
            (RouteKind::Entity, Some(format!("{lower}/{{slug}}.html"))),
            (RouteKind::EntityLang, Some(format!("{lower}/{{slug}}-{{lang}}.html"))),
            (RouteKind::Draft, Some(format!("drafts/{lower}/{{slug}}.html"))),
            (
                RouteKind::DraftLang,
                Some(format!("drafts/{lower}/{{slug}}-{{lang}}.html")),
            ),
            (RouteKind::Category, Some(format!("{lower}/category/{{slug}}.html"))),
            (RouteKind::Tag, Some(format!("{lower}/tag/{{slug}}.html"))),
            (RouteKind::Author, Some(format!("{lower}/author/{{slug}}.html"))),
            (RouteKind::Archive, Some(format!("{lower}/archives.html"))),
            (RouteKind::YearArchive, None),
            (RouteKind::MonthArchive, None),
            (RouteKind::DayArchive, None),
            (RouteKind::Paginated, Some(DEFAULT_PAGINATED_SAVE_AS.to_string())),
        ];
        for (kind, default) in defaults {
            if let Some(route) = settings.route(kind, &upper, default)? {
                routes.insert(kind, route);
            }
        }
        for scope in FeedScope::SCOPES {
            for format in [FeedFormat::Atom, FeedFormat::Rss] {
                let kind = RouteKind::Feed(scope, format);
                if let Some(route) = settings.route(kind, &upper, None)? {
                    routes.insert(kind, route);
                }
            }
        }

        let direct_templates = settings.direct_templates(&lower)?;

        let sorter = settings.sorter()?;

        let default_template = settings
            .string("DEFAULT_TEMPLATE")?
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| lower.clone());
        let archive_template = settings.string("ARCHIVE_TEMPLATE")?.filter(|t| !t.is_empty());
        let period_archive_template = settings
            .string("PERIOD_ARCHIVE_TEMPLATE")?
            .filter(|t| !t.is_empty())
            .or_else(|| archive_template.clone());
        let category_template = settings.template("CATEGORY_TEMPLATE", "category")?;
        let tag_template = settings.template("TAG_TEMPLATE", "tag")?;
        let author_template = settings.template("AUTHOR_TEMPLATE", "author")?;

        let subgenerator = settings
            .string("SUBGENERATOR_CLASS")?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let page_size = settings
            .size("DEFAULT_PAGINATION")?
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let feed_max_items = settings.size("FEED_MAX_ITEMS")?;

        let filename_metadata = settings.regex("FILENAME_METADATA", Some(DEFAULT_FILENAME_METADATA))?;
        let path_metadata = settings.regex("PATH_METADATA", None)?;
        let use_folder_as_category = settings.flag("USE_FOLDER_AS_CATEGORY")?.unwrap_or(true);
        let default_category = settings.string("DEFAULT_CATEGORY")?.filter(|c| !c.is_empty());
        let reverse_category_order = settings.flag("REVERSE_CATEGORY_ORDER")?.unwrap_or(false);
        let newest_first_archives = settings.flag("NEWEST_FIRST_ARCHIVES")?.unwrap_or(true);

        let translation_tie_break = match settings.string("TRANSLATION_TIE_BREAK")?.as_deref() {
            None | Some("path") => TranslationTieBreak::Path,
            Some("discovery") => TranslationTieBreak::Discovery,
            Some(other) => {
                return Err(settings.error(
                    "TRANSLATION_TIE_BREAK",
                    format!("expected \"path\" or \"discovery\", got \"{other}\""),
                ));
            }
        };

        Ok(Self {
            name: name.to_string(),
            namespace: lower,
            paths,
            excludes,
            ignore_files,
            routes,
            direct_templates,
            mandatory_properties,
            sorter,
            default_template,
            archive_template,
            period_archive_template,
            category_template,
            tag_template,
            author_template,
            subgenerator,
            page_size,
            feed_max_items,
            filename_metadata,
            path_metadata,
            use_folder_as_category,
            default_category,
            reverse_category_order,
            newest_first_archives,
            default_lang: site.default_lang.clone(),
            languages: site.languages.clone(),
            translation_tie_break,
            extra: settings.into_extra(),
        })
    }

    /// The route configured for a page kind, if any.
    #[must_use]
    pub fn route(&self, kind: RouteKind) -> Option<&Route> {
        self.routes.get(&kind)
    }

    /// Configured feeds in emission order.
    pub fn feeds(&self) -> impl Iterator<Item = (FeedScope, FeedFormat, &Route)> {
        self.routes.iter().filter_map(|(kind, route)| match kind {
            RouteKind::Feed(scope, format) => Some((*scope, *format, route)),
            _ => None,
        })
    }

    /// Whether any feed of the given scope is configured.
    #[must_use]
    pub fn has_feed(&self, scope: FeedScope) -> bool {
        self.feeds().any(|(s, _, _)| s == scope)
    }

    /// Priority rank of a language; unlisted languages rank after all listed ones.
    #[must_use]
    pub fn language_rank(&self, lang: &str) -> usize {
        self.languages
            .iter()
            .position(|l| l == lang)
            .unwrap_or(self.languages.len())
    }

    /// Pass-through settings as JSON, for template contexts.
    #[must_use]
    pub fn settings_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.extra).unwrap_or(serde_json::Value::Null)
    }
}

fn resolve_mandatory(
    entity_type: &str,
    global: &toml::Table,
    overrides: &toml::Table,
) -> Result<BTreeSet<String>> {
    let mut properties = BTreeSet::from(["date".to_string()]);

    for layer in [global, overrides] {
        let mut settings = Settings::new(entity_type, &[layer]);
        let replace = settings.flag("MANDATORY_PROPERTIES_REPLACE")?.unwrap_or(false);
        if let Some(values) = settings.list("MANDATORY_PROPERTIES")? {
            if replace {
                properties.clear();
            }
            properties.extend(values.into_iter().map(|v| v.to_lowercase()));
        } else if replace {
            properties.clear();
        }
    }

    Ok(properties)
}

/// Merged settings of one entity type, consumed key by key.
struct Settings<'a> {
    entity_type: &'a str,
    values: BTreeMap<String, toml::Value>,
}

impl<'a> Settings<'a> {
    fn new(entity_type: &'a str, layers: &[&toml::Table]) -> Self {
        let mut values = BTreeMap::new();
        for layer in layers {
            for (key, value) in layer.iter() {
                values.insert(key.to_uppercase(), value.clone());
            }
        }
        Self {
            entity_type,
            values,
        }
    }

    fn error(&self, key: &str, message: impl fmt::Display) -> CoreError {
        CoreError::type_configuration(self.entity_type, format!("{key}: {message}"))
    }

    fn remove(&mut self, key: &str) -> Option<toml::Value> {
        self.values.remove(key)
    }

    /// A string setting. `false` reads as the empty string.
    fn string(&mut self, key: &str) -> Result<Option<String>> {
        match self.remove(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s)),
            Some(toml::Value::Boolean(false)) => Ok(Some(String::new())),
            Some(other) => Err(self.error(key, format!("expected a string, got {}", other.type_str()))),
        }
    }

    /// A list of strings. A single string reads as a one-element list.
    fn list(&mut self, key: &str) -> Result<Option<Vec<String>>> {
        match self.remove(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(vec![s])),
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s),
                    other => Err(self.error(
                        key,
                        format!("expected a list of strings, found {}", other.type_str()),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.error(key, format!("expected a list, got {}", other.type_str()))),
        }
    }

    fn flag(&mut self, key: &str) -> Result<Option<bool>> {
        match self.remove(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(b)),
            Some(other) => Err(self.error(key, format!("expected a boolean, got {}", other.type_str()))),
        }
    }

    /// A non-negative size. Negative numbers and `false` read as zero.
    fn size(&mut self, key: &str) -> Result<Option<usize>> {
        match self.remove(key) {
            None => Ok(None),
            Some(toml::Value::Integer(n)) => Ok(Some(usize::try_from(n).unwrap_or(0))),
            Some(toml::Value::Boolean(false)) => Ok(Some(0)),
            Some(other) => Err(self.error(key, format!("expected an integer, got {}", other.type_str()))),
        }
    }

    /// A template name with a default; the empty string disables it.
    fn template(&mut self, key: &str, default: &str) -> Result<Option<String>> {
        Ok(match self.string(key)? {
            None => Some(default.to_string()),
            Some(t) if t.is_empty() => None,
            Some(t) => Some(t),
        })
    }

    fn regex(&mut self, key: &str, default: Option<&str>) -> Result<Option<Regex>> {
        let source = match self.string(key)? {
            Some(s) if s.is_empty() => return Ok(None),
            Some(s) => s,
            None => match default {
                Some(d) => d.to_string(),
                None => return Ok(None),
            },
        };
        Regex::new(&source)
            .map(Some)
            .map_err(|e| self.error(key, format!("invalid regex: {e}")))
    }

    fn pattern(&self, key: &str, source: &str, allowed: &[&str]) -> Result<Pattern> {
        let pattern = Pattern::parse(source).map_err(|e| self.error(key, e))?;
        pattern.check(allowed).map_err(|e| self.error(key, e))?;
        Ok(pattern)
    }

    /// Resolve a save-as/URL pair. An empty save-as disables the route.
    fn route(&mut self, kind: RouteKind, upper: &str, default: Option<String>) -> Result<Option<Route>> {
        let (save_key, url_key) = kind.keys(upper);
        let save_as = match self.string(&save_key)?.or(default) {
            Some(s) if !s.is_empty() => s,
            _ => {
                self.remove(&url_key);
                return Ok(None);
            }
        };
        let url = self
            .string(&url_key)?
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| save_as.clone());

        let allowed = kind.placeholders();
        Ok(Some(Route {
            save_as: self.pattern(&save_key, &save_as, allowed)?,
            url: self.pattern(&url_key, &url, allowed)?,
        }))
    }

    fn direct_templates(&mut self, lower: &str) -> Result<Vec<DirectTemplate>> {
        let names = self.list("DIRECT_TEMPLATES")?.unwrap_or_default();
        let paginated = self.list("PAGINATED_DIRECT_TEMPLATES")?.unwrap_or_default();

        if let Some(stray) = paginated.iter().find(|p| !names.contains(p)) {
            return Err(self.error(
                "PAGINATED_DIRECT_TEMPLATES",
                format!("\"{stray}\" is not listed in DIRECT_TEMPLATES"),
            ));
        }

        let mut templates = Vec::with_capacity(names.len());
        for name in names {
            let prefix: String = name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();

            let save_key = format!("{prefix}_SAVE_AS");
            let url_key = format!("{prefix}_URL");
            let save_as = self
                .string(&save_key)?
                .unwrap_or_else(|| format!("{lower}/{name}.html"));
            let url = self.string(&url_key)?.filter(|u| !u.is_empty());
            let all_save = self
                .string(&format!("{prefix}_ALL_SAVE_AS"))?
                .filter(|s| !s.is_empty());
            let all_url = self
                .string(&format!("{prefix}_ALL_URL"))?
                .filter(|u| !u.is_empty());

            if save_as.is_empty() {
                tracing::debug!(entity_type = self.entity_type, template = %name, "direct template disabled");
                continue;
            }

            let route = Route {
                save_as: self.pattern(&save_key, &save_as, DIRECT_PLACEHOLDERS)?,
                url: self.pattern(&url_key, url.as_deref().unwrap_or(&save_as), DIRECT_PLACEHOLDERS)?,
            };
            let is_paginated = paginated.contains(&name);
            let all = match (is_paginated, all_save) {
                (true, Some(save)) => Some(Route {
                    save_as: self.pattern(&format!("{prefix}_ALL_SAVE_AS"), &save, DIRECT_PLACEHOLDERS)?,
                    url: self.pattern(
                        &format!("{prefix}_ALL_URL"),
                        all_url.as_deref().unwrap_or(&save),
                        DIRECT_PLACEHOLDERS,
                    )?,
                }),
                _ => None,
            };

            templates.push(DirectTemplate {
                name,
                route,
                paginated: is_paginated,
                all,
            });
        }
        Ok(templates)
    }

    fn sorter(&mut self) -> Result<SorterSpec> {
        match self.remove("SORTER") {
            None => Ok(SorterSpec::default()),
            Some(toml::Value::String(name)) if !name.is_empty() => Ok(SorterSpec::Named(name)),
            Some(toml::Value::Array(items)) => {
                let attributes = attribute_names(items).map_err(|e| self.error("SORTER", e))?;
                Ok(SorterSpec::Attributes {
                    attributes,
                    reverse: true,
                })
            }
            Some(toml::Value::Table(mut table)) => {
                let attributes = match table.remove("attributes") {
                    Some(toml::Value::Array(items)) => {
                        attribute_names(items).map_err(|e| self.error("SORTER", e))?
                    }
                    _ => return Err(self.error("SORTER", "table form needs an `attributes` list")),
                };
                let reverse = match table.remove("reverse") {
                    None => true,
                    Some(toml::Value::Boolean(b)) => b,
                    Some(_) => return Err(self.error("SORTER", "`reverse` must be a boolean")),
                };
                Ok(SorterSpec::Attributes {
                    attributes,
                    reverse,
                })
            }
            Some(other) => Err(self.error(
                "SORTER",
                format!("expected a sorter name, list or table, got {}", other.type_str()),
            )),
        }
    }

    fn into_extra(self) -> BTreeMap<String, toml::Value> {
        self.values
    }
}

fn attribute_names(items: Vec<toml::Value>) -> std::result::Result<Vec<String>, String> {
    let names = items
        .into_iter()
        .map(|item| match item {
            toml::Value::String(s) if !s.is_empty() => Ok(s),
            _ => Err("attribute names must be non-empty strings".to_string()),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if names.is_empty() {
        return Err("attribute list cannot be empty".to_string());
    }
    Ok(names)
}
