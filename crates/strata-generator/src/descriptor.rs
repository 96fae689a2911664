//! Page descriptors: the output units handed to the writer.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;
use serde_json::{Map, Value, json};
use strata_core::{Entity, FeedFormat, FeedScope, Pattern, PatternValues, Route};

use crate::paginator::{Page, Paginator};

/// What a descriptor renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Entity,
    Translation,
    Draft,
    Archive,
    PeriodArchive,
    Category,
    Tag,
    Author,
    Direct,
    Feed,
}

impl PageKind {
    /// Built-in template used when the configured one is not available.
    #[must_use]
    pub fn fallback_template(self) -> &'static str {
        match self {
            Self::Entity | Self::Translation | Self::Draft => "entity",
            Self::Direct => "direct",
            Self::Feed => "feed",
            Self::Archive
            | Self::PeriodArchive
            | Self::Category
            | Self::Tag
            | Self::Author => "listing",
        }
    }
}

/// Feed settings carried by a feed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSpec {
    pub scope: FeedScope,
    pub format: FeedFormat,
    pub title: String,
    /// Label slug or language the feed is restricted to.
    pub label: Option<String>,
}

/// One output page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDescriptor {
    pub kind: PageKind,
    pub entity_type: String,
    pub template: String,
    /// Destination relative to the output directory.
    pub destination: PathBuf,
    pub url: String,
    /// Set for direct-template pages.
    pub direct: bool,
    /// Template context (a JSON object).
    pub context: Value,
    /// Entities listed on the page, in display order.
    pub entities: Vec<Arc<Entity>>,
    pub feed: Option<FeedSpec>,
}

impl PageDescriptor {
    pub fn new(
        kind: PageKind,
        entity_type: impl Into<String>,
        template: impl Into<String>,
        destination: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_type: entity_type.into(),
            template: template.into(),
            destination: destination.into(),
            url: url.into(),
            direct: false,
            context: Value::Object(Map::new()),
            entities: Vec::new(),
            feed: None,
        }
    }

    /// Insert a context value.
    #[must_use]
    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        if let Value::Object(map) = &mut self.context {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// Set the listed entities and expose them as `entities` in the context.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<Arc<Entity>>) -> Self {
        let value = serde_json::to_value(&entities).unwrap_or(Value::Null);
        self.entities = entities;
        self.with_context("entities", value)
    }

    #[must_use]
    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }

    #[must_use]
    pub fn with_feed(mut self, feed: FeedSpec) -> Self {
        self.feed = Some(feed);
        self
    }
}

/// One page of a paginated sequence with its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedPage {
    pub page: Page<Arc<Entity>>,
    pub destination: PathBuf,
    pub url: String,
    /// The `page` context object.
    pub context: Value,
}

/// Split a destination into (base, extension) at the last `.` of its final segment.
fn split_extension(destination: &str) -> (&str, &str) {
    let file_start = destination.rfind('/').map_or(0, |i| i + 1);
    match destination[file_start..].rfind('.') {
        Some(dot) if dot > 0 => destination.split_at(file_start + dot),
        _ => (destination, ""),
    }
}

/// Destination of page `number`; page 1 lives at the base destination.
pub fn page_destination(base: &str, number: usize, pattern: &Pattern) -> Result<String, String> {
    if number <= 1 {
        return Ok(base.to_string());
    }
    let (stem, ext) = split_extension(base);
    pattern.render(
        &PatternValues::new()
            .with("base", stem)
            .with("number", number.to_string())
            .with("ext", ext),
    )
}

/// Paginate `entities` and compute each page's destination, URL and context.
///
/// `paginated` holds the patterns of pages N≥2; without it every entity lands
/// on a single page.
pub fn paginate_destinations(
    entities: &[Arc<Entity>],
    paginator: &Paginator,
    base_save_as: &str,
    base_url: &str,
    paginated: Option<&Route>,
) -> Result<Vec<PaginatedPage>, String> {
    let pages = match paginated {
        Some(_) => paginator.paginate(entities),
        None => Paginator::new(0).paginate(entities),
    };
    let url_at = |number: usize| {
        paginated.map_or_else(
            || Ok(base_url.to_string()),
            |route| page_destination(base_url, number, &route.url),
        )
    };
    let save_as_at = |number: usize| {
        paginated.map_or_else(
            || Ok(base_save_as.to_string()),
            |route| page_destination(base_save_as, number, &route.save_as),
        )
    };
    let urls = (1..=pages.len()).map(url_at).collect::<Result<Vec<_>, _>>()?;

    pages
        .into_iter()
        .map(|page| {
            let destination = save_as_at(page.number)?;
            let url = urls[page.number - 1].clone();
            let context = json!({
                "number": page.number,
                "total_pages": page.total_pages,
                "previous": page.previous,
                "next": page.next,
                "previous_url": page.previous.map(|n| urls[n - 1].clone()),
                "next_url": page.next.map(|n| urls[n - 1].clone()),
                "url": url,
                "items": page.items,
            });
            Ok(PaginatedPage {
                page,
                destination: PathBuf::from(destination),
                url,
                context,
            })
        })
        .collect()
}
