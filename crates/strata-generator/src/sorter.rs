//! Entity ordering strategies.

use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use strata_core::{Entity, SorterSpec, content::path_to_slash};

/// A sortable attribute value. Variants order as `Missing < Number < Date < Text`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Number(i64),
    Date(DateTime<Utc>),
    Text(String),
}

impl SortValue {
    /// Resolve an attribute of an entity.
    #[must_use]
    pub fn of(entity: &Entity, attribute: &str) -> Self {
        match attribute {
            "date" => entity.date.map_or(Self::Missing, Self::Date),
            "modified" => entity.modified.map_or(Self::Missing, Self::Date),
            "title" => Self::Text(entity.title.clone()),
            "slug" => Self::Text(entity.slug.clone()),
            "lang" => Self::Text(entity.lang.clone()),
            "category" => entity
                .category
                .as_ref()
                .map_or(Self::Missing, |c| Self::Text(c.name.clone())),
            "source_path" => Self::Text(path_to_slash(&entity.source_path)),
            other => match entity.meta(other) {
                Some(value) if !value.is_blank() => {
                    let text = value.as_text();
                    text.trim()
                        .parse::<i64>()
                        .map_or(Self::Text(text), Self::Number)
                }
                _ => Self::Missing,
            },
        }
    }
}

/// Orders a sequence of entities in place. Implementations must be stable.
pub trait SortStrategy: Send + Sync {
    fn sort(&self, entities: &mut [Arc<Entity>]);
}

impl<F> SortStrategy for F
where
    F: Fn(&mut [Arc<Entity>]) + Send + Sync,
{
    fn sort(&self, entities: &mut [Arc<Entity>]) {
        self(entities);
    }
}

/// Multi-key sort on entity attributes.
///
/// Missing values compare lowest, so they come last when `reverse` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSorter {
    attributes: Vec<String>,
    reverse: bool,
}

impl AttributeSorter {
    #[must_use]
    pub fn new(attributes: Vec<String>, reverse: bool) -> Self {
        Self {
            attributes,
            reverse,
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        self.attributes
            .iter()
            .map(|attr| SortValue::of(a, attr).cmp(&SortValue::of(b, attr)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl SortStrategy for AttributeSorter {
    fn sort(&self, entities: &mut [Arc<Entity>]) {
        entities.sort_by(|a, b| {
            let ord = self.compare(a, b);
            if self.reverse { ord.reverse() } else { ord }
        });
    }
}

/// Named sorters available to `SORTER = "<name>"`.
#[derive(Clone)]
pub struct SorterRegistry {
    sorters: BTreeMap<String, Arc<dyn SortStrategy>>,
}

impl fmt::Debug for SorterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SorterRegistry")
            .field("sorters", &self.sorters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for SorterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SorterRegistry {
    /// Create a registry holding the built-in `date` and `title` sorters.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            sorters: BTreeMap::new(),
        };
        registry.register("date", AttributeSorter::new(vec!["date".to_string()], true));
        registry.register("title", AttributeSorter::new(vec!["title".to_string()], false));
        registry
    }

    /// Register a sorter, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, sorter: impl SortStrategy + 'static) {
        self.sorters.insert(name.into(), Arc::new(sorter));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sorters.contains_key(name)
    }

    /// Resolve a sorter specification.
    pub fn resolve(&self, spec: &SorterSpec) -> Result<Arc<dyn SortStrategy>, String> {
        match spec {
            SorterSpec::Attributes {
                attributes,
                reverse,
            } => Ok(Arc::new(AttributeSorter::new(attributes.clone(), *reverse))),
            SorterSpec::Named(name) => self.sorters.get(name).cloned().ok_or_else(|| {
                format!(
                    "unknown sorter '{name}' (registered: {})",
                    self.sorters.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use strata_core::{MetaValue, Status};

    use super::*;

    fn entity(slug: &str, date: Option<(i32, u32, u32)>) -> Arc<Entity> {
        Arc::new(Entity {
            entity_type: "Article".to_string(),
            source_path: PathBuf::from(format!("article/{slug}.md")),
            metadata: Default::default(),
            body: String::new(),
            status: Status::Published,
            lang: "en".to_string(),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            category: None,
            tags: Vec::new(),
            authors: Vec::new(),
            date: date.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()),
            modified: None,
            template: "article".to_string(),
            save_as: PathBuf::new(),
            url: String::new(),
            override_save_as: false,
            translations: Vec::new(),
            translation_of: None,
        })
    }

    fn slugs(entities: &[Arc<Entity>]) -> Vec<&str> {
        entities.iter().map(|e| e.slug.as_str()).collect()
    }

    #[test]
    fn test_date_descending_with_missing_last() {
        let mut entities = vec![
            entity("old", Some((2020, 1, 1))),
            entity("none", None),
            entity("new", Some((2020, 6, 1))),
        ];
        AttributeSorter::new(vec!["date".to_string()], true).sort(&mut entities);
        assert_eq!(slugs(&entities), vec!["new", "old", "none"]);
    }

    #[test]
    fn test_equal_keys_keep_input_order() {
        let mut entities = vec![
            entity("a", Some((2020, 1, 1))),
            entity("b", Some((2020, 1, 1))),
            entity("c", Some((2021, 1, 1))),
            entity("d", Some((2020, 1, 1))),
        ];
        let sorter = AttributeSorter::new(vec!["date".to_string()], true);
        sorter.sort(&mut entities);
        assert_eq!(slugs(&entities), vec!["c", "a", "b", "d"]);

        let first = entities.clone();
        sorter.sort(&mut entities);
        assert_eq!(entities, first);
    }

    #[test]
    fn test_metadata_numbers_sort_numerically() {
        let with_weight = |slug: &str, weight: &str| {
            let mut e = (*entity(slug, None)).clone();
            e.metadata.insert("weight".to_string(), MetaValue::from(weight));
            Arc::new(e)
        };
        let mut entities = vec![with_weight("ten", "10"), with_weight("two", "2"), entity("none", None)];
        AttributeSorter::new(vec!["weight".to_string()], false).sort(&mut entities);
        assert_eq!(slugs(&entities), vec!["none", "two", "ten"]);
    }

    #[test]
    fn test_registry_resolves_named_and_custom_sorters() {
        let mut registry = SorterRegistry::new();
        assert!(registry.contains("date"));
        assert!(registry.resolve(&SorterSpec::Named("missing".to_string())).is_err());

        registry.register("reverse-slug", |entities: &mut [Arc<Entity>]| {
            entities.sort_by(|a, b| b.slug.cmp(&a.slug));
        });
        let sorter = registry
            .resolve(&SorterSpec::Named("reverse-slug".to_string()))
            .expect("registered");

        let mut entities = vec![entity("a", None), entity("c", None), entity("b", None)];
        sorter.sort(&mut entities);
        assert_eq!(slugs(&entities), vec!["c", "b", "a"]);

        let title = registry.resolve(&SorterSpec::Named("title".to_string())).expect("built-in");
        title.sort(&mut entities);
        assert_eq!(slugs(&entities), vec!["a", "b", "c"]);
    }
}
