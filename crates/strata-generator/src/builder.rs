//! Entity building and translation clustering.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use strata_core::{
    CoreError, Diagnostics, Entity, EntityTypeConfig, MetaValue, Metadata, PatternValues, Result,
    RouteKind, Status, Taxon, TranslationTieBreak,
    content::{parse_date, path_to_slash, slugify, split_language_suffix},
};
use tracing::{debug, info, warn};

use crate::discovery::{RawRecord, contains_path};

/// One representative entity plus its other-language versions.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationCluster {
    pub representative: Entity,
    pub translations: Vec<Entity>,
}

impl TranslationCluster {
    /// Number of entities in the cluster. Never zero.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        1 + self.translations.len()
    }
}

/// Output of entity building: published and draft clusters in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub published: Vec<TranslationCluster>,
    pub drafts: Vec<TranslationCluster>,
}

impl Classified {
    /// Representatives of the published clusters.
    pub fn representatives(&self) -> impl Iterator<Item = &Entity> {
        self.published.iter().map(|c| &c.representative)
    }

    /// Total number of entities, drafts included.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.published
            .iter()
            .chain(&self.drafts)
            .map(TranslationCluster::len)
            .sum()
    }
}

/// Builds entities of one type from raw records.
pub struct EntityBuilder<'a> {
    config: &'a EntityTypeConfig,
}

impl<'a> EntityBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a EntityTypeConfig) -> Self {
        Self { config }
    }

    /// Validate every record, build entities and cluster translations.
    ///
    /// Invalid records are skipped and their errors pushed to `diagnostics`.
    pub fn build(&self, records: Vec<RawRecord>, diagnostics: &mut Diagnostics) -> Classified {
        let mut published = Vec::new();
        let mut drafts = Vec::new();

        for record in records {
            match self.build_entity(record) {
                Ok(entity) if entity.is_draft() => drafts.push(entity),
                Ok(entity) => published.push(entity),
                Err(e) => {
                    warn!(entity_type = %self.config.name, error = %e, "skipping invalid record");
                    diagnostics.push(e);
                }
            }
        }

        let classified = Classified {
            published: self.cluster(published, diagnostics),
            drafts: self.cluster(drafts, diagnostics),
        };

        info!(
            entity_type = %self.config.name,
            published = classified.published.len(),
            drafts = classified.drafts.len(),
            entities = classified.entity_count(),
            "classified entities"
        );

        classified
    }

    /// Build a single entity from one record.
    pub fn build_entity(&self, record: RawRecord) -> Result<Entity> {
        let RawRecord {
            source_path,
            mut metadata,
            body,
            ..
        } = record;
        let error_path = source_path.clone();
        let invalid =
            |message: String| CoreError::validation(&self.config.name, &error_path, message);

        let derived_stem = self.apply_path_metadata(&source_path, &mut metadata);

        let missing: Vec<&str> = self
            .config
            .mandatory_properties
            .iter()
            .filter(|key| metadata.get(key.as_str()).is_none_or(MetaValue::is_blank))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "missing mandatory properties: {}",
                missing.join(", ")
            )));
        }

        let status = match text(&metadata, "status") {
            Some(value) => Status::parse(&value)
                .ok_or_else(|| invalid(format!("unknown status '{value}'")))?,
            None if text(&metadata, "draft").is_some_and(|d| is_truthy(&d)) => Status::Draft,
            None => Status::Published,
        };

        let slug = match text(&metadata, "slug") {
            Some(slug) => slug,
            None => slugify(&derived_stem),
        };
        if slug.is_empty() {
            return Err(invalid("cannot derive a slug from the file name".to_string()));
        }

        let lang = text(&metadata, "lang").unwrap_or_else(|| self.config.default_lang.clone());
        let title = text(&metadata, "title").unwrap_or_else(|| slug.clone());

        let date = parse_optional_date(&metadata, "date").map_err(invalid)?;
        let modified = match parse_optional_date(&metadata, "modified").map_err(invalid)? {
            Some(date) => Some(date),
            None => parse_optional_date(&metadata, "updated").map_err(invalid)?,
        };

        let category = text(&metadata, "category")
            .or_else(|| self.folder_category(&source_path))
            .or_else(|| self.config.default_category.clone())
            .map(Taxon::new);
        let tags = labels(&metadata, &["tags"]);
        let authors = labels(&metadata, &["authors", "author"]);

        let template = text(&metadata, "template")
            .unwrap_or_else(|| self.config.default_template.clone());

        let mut entity = Entity {
            entity_type: self.config.name.clone(),
            source_path,
            metadata,
            body,
            status,
            lang,
            slug,
            title,
            category,
            tags,
            authors,
            date,
            modified,
            template,
            save_as: PathBuf::new(),
            url: String::new(),
            override_save_as: false,
            translations: Vec::new(),
            translation_of: None,
        };

        self.assign_destination(&mut entity).map_err(invalid)?;
        Ok(entity)
    }

    /// Fill metadata from the file name and path. Returns the stem a slug is
    /// derived from, with extracted segments removed.
    fn apply_path_metadata(&self, source_path: &Path, metadata: &mut Metadata) -> String {
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (base, lang) = split_language_suffix(&stem);
        if let Some(lang) = lang {
            metadata
                .entry("lang".to_string())
                .or_insert_with(|| MetaValue::from(lang));
        }

        let mut derived = base.to_string();
        if let Some(regex) = &self.config.filename_metadata
            && let Some(captures) = regex.captures(base)
        {
            for name in regex.capture_names().flatten() {
                if let Some(value) = captures.name(name) {
                    metadata
                        .entry(name.to_lowercase())
                        .or_insert_with(|| MetaValue::from(value.as_str()));
                }
            }
            derived = match captures.name("slug") {
                Some(slug) => slug.as_str().to_string(),
                None => {
                    let mut rest = base.to_string();
                    for name in regex.capture_names().flatten() {
                        if let Some(value) = captures.name(name) {
                            rest = rest.replacen(value.as_str(), "", 1);
                        }
                    }
                    rest
                }
            };
        }

        if let Some(regex) = &self.config.path_metadata {
            let path = path_to_slash(source_path);
            if let Some(captures) = regex.captures(&path) {
                for name in regex.capture_names().flatten() {
                    if let Some(value) = captures.name(name) {
                        metadata
                            .entry(name.to_lowercase())
                            .or_insert_with(|| MetaValue::from(value.as_str()));
                    }
                }
            }
        }

        derived
    }

    /// Name of the directory holding the file, when it is below its source path.
    fn folder_category(&self, source_path: &Path) -> Option<String> {
        if !self.config.use_folder_as_category {
            return None;
        }
        let parent = path_to_slash(source_path.parent()?);
        let root = self
            .config
            .paths
            .iter()
            .filter(|root| contains_path(root, &parent))
            .max_by_key(|root| root.len())?;
        if &parent == root {
            return None;
        }
        parent.rsplit('/').next().map(str::to_string)
    }

    fn assign_destination(&self, entity: &mut Entity) -> std::result::Result<(), String> {
        let in_default_lang = entity.lang == self.config.default_lang;
        let kinds = match (entity.is_draft(), in_default_lang) {
            (false, true) => [RouteKind::Entity, RouteKind::Entity],
            (false, false) => [RouteKind::EntityLang, RouteKind::Entity],
            (true, true) => [RouteKind::Draft, RouteKind::Draft],
            (true, false) => [RouteKind::DraftLang, RouteKind::Draft],
        };

        let save_override = text(&entity.metadata, "save_as");
        let url_override = text(&entity.metadata, "url");

        if let Some(route) = kinds.iter().find_map(|kind| self.config.route(*kind)) {
            let values = PatternValues::new()
                .with("slug", entity.slug.as_str())
                .with("lang", entity.lang.as_str())
                .with("entity_type", self.config.namespace.as_str())
                .with_opt("category", entity.category.as_ref().map(|c| c.slug.as_str()))
                .with_opt("author", entity.authors.first().map(|a| a.slug.as_str()))
                .with_date(entity.date);
            if save_override.is_none() {
                entity.save_as = PathBuf::from(route.save_as.render(&values)?);
            }
            if url_override.is_none() {
                entity.url = route.url.render(&values)?;
            }
        } else {
            debug!(entity_type = %self.config.name, slug = %entity.slug, "entity pages disabled");
        }

        if let Some(save_as) = save_override {
            entity.override_save_as = true;
            entity.save_as = PathBuf::from(&save_as);
            if url_override.is_none() {
                entity.url = save_as;
            }
        }
        if let Some(url) = url_override {
            entity.url = url;
        }
        Ok(())
    }

    /// Group entities by (slug, category) and pick a representative per group.
    fn cluster(&self, entities: Vec<Entity>, diagnostics: &mut Diagnostics) -> Vec<TranslationCluster> {
        let mut groups: Vec<Vec<(usize, Entity)>> = Vec::new();
        let mut by_key: BTreeMap<(String, Option<String>), usize> = BTreeMap::new();

        for (position, entity) in entities.into_iter().enumerate() {
            let key = (entity.slug.clone(), entity.category.as_ref().map(|c| c.slug.clone()));
            let group = *by_key.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });

            if let Some((_, existing)) = groups[group].iter().find(|(_, e)| e.lang == entity.lang) {
                let error = CoreError::validation(
                    &self.config.name,
                    &entity.source_path,
                    format!(
                        "ambiguous translation: same slug '{}', category and language '{}' as {}",
                        entity.slug,
                        entity.lang,
                        existing.source_path.display()
                    ),
                );
                warn!(entity_type = %self.config.name, error = %error, "skipping duplicate entity");
                diagnostics.push(error);
                continue;
            }
            groups[group].push((position, entity));
        }

        groups
            .into_iter()
            .filter(|members| !members.is_empty())
            .map(|members| self.pick_representative(members))
            .collect()
    }

    fn pick_representative(&self, mut members: Vec<(usize, Entity)>) -> TranslationCluster {
        let chosen = members
            .iter()
            .enumerate()
            .min_by(|(_, (pos_a, a)), (_, (pos_b, b))| {
                let rank = self
                    .config
                    .language_rank(&a.lang)
                    .cmp(&self.config.language_rank(&b.lang));
                rank.then_with(|| match self.config.translation_tie_break {
                    TranslationTieBreak::Path => a.source_path.cmp(&b.source_path),
                    TranslationTieBreak::Discovery => pos_a.cmp(pos_b),
                })
            })
            .map_or(0, |(index, _)| index);

        let (_, mut representative) = members.remove(chosen);
        let mut translations: Vec<Entity> = members.into_iter().map(|(_, e)| e).collect();

        let back_link = representative.link();
        representative.translations = translations.iter().map(Entity::link).collect();
        for translation in &mut translations {
            translation.translation_of = Some(back_link.clone());
        }

        TranslationCluster {
            representative,
            translations,
        }
    }
}

fn text(metadata: &Metadata, key: &str) -> Option<String> {
    metadata
        .get(key)
        .filter(|v| !v.is_blank())
        .map(|v| v.as_text().trim().to_string())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

fn labels(metadata: &Metadata, keys: &[&str]) -> Vec<Taxon> {
    let Some(value) = keys.iter().find_map(|key| metadata.get(*key)) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    value
        .as_list()
        .into_iter()
        .map(Taxon::new)
        .filter(|taxon| {
            if taxon.slug.is_empty() || seen.contains(&taxon.slug) {
                false
            } else {
                seen.push(taxon.slug.clone());
                true
            }
        })
        .collect()
}

fn parse_optional_date(
    metadata: &Metadata,
    key: &str,
) -> std::result::Result<Option<chrono::DateTime<chrono::Utc>>, String> {
    match text(metadata, key) {
        None => Ok(None),
        Some(value) => parse_date(&value)
            .map(Some)
            .ok_or_else(|| format!("invalid {key} '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use strata_core::SiteConfig;

    use super::*;

    fn config(overrides: &str) -> EntityTypeConfig {
        let site = SiteConfig {
            name: "Test".to_string(),
            url: String::new(),
            default_lang: "en".to_string(),
            languages: vec!["en".to_string(), "fr".to_string()],
            description: None,
            author: None,
        };
        let overrides: toml::Table = overrides.parse().expect("valid toml");
        EntityTypeConfig::resolve("Article", &site, &toml::Table::new(), &overrides)
            .expect("resolve")
    }

    fn record(path: &str, meta: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            source_path: PathBuf::from(path),
            full_path: PathBuf::from(path),
            metadata: meta
                .iter()
                .map(|(k, v)| (k.to_string(), MetaValue::from(*v)))
                .collect(),
            body: String::new(),
        }
    }

    #[test]
    fn test_builds_entity_from_metadata() {
        let config = config("");
        let entity = EntityBuilder::new(&config)
            .build_entity(record(
                "article/hello.md",
                &[
                    ("title", "Hello"),
                    ("date", "2020-06-01"),
                    ("tags", "Rust, web"),
                    ("author", "Ann"),
                ],
            ))
            .expect("valid record");

        assert_eq!(entity.slug, "hello");
        assert_eq!(entity.title, "Hello");
        assert_eq!(entity.lang, "en");
        assert_eq!(entity.status, Status::Published);
        assert_eq!(entity.date.map(|d| d.month()), Some(6));
        assert_eq!(entity.tags.len(), 2);
        assert_eq!(entity.authors[0].slug, "ann");
        assert!(entity.category.is_none());
        assert_eq!(entity.save_as, PathBuf::from("article/hello.html"));
        assert_eq!(entity.url, "article/hello.html");
        assert_eq!(entity.template, "article");
    }

    #[test]
    fn test_filename_metadata_fills_missing_keys() {
        let config = config("");
        let entity = EntityBuilder::new(&config)
            .build_entity(record("article/2020-01-01-first-post.fr.md", &[]))
            .expect("valid record");

        assert_eq!(entity.slug, "first-post");
        assert_eq!(entity.lang, "fr");
        assert_eq!(entity.date.map(|d| d.year()), Some(2020));
        assert_eq!(entity.save_as, PathBuf::from("article/first-post-fr.html"));

        let entity = EntityBuilder::new(&config)
            .build_entity(record(
                "article/2020-01-01-first-post.md",
                &[("date", "2021-02-02"), ("slug", "custom")],
            ))
            .expect("valid record");
        assert_eq!(entity.slug, "custom");
        assert_eq!(entity.date.map(|d| d.year()), Some(2021));
    }

    #[test]
    fn test_path_metadata_regex() {
        let config = config(r#"PATH_METADATA = "article/(?P<series>[^/]+)/.*""#);
        let entity = EntityBuilder::new(&config)
            .build_entity(record("article/rust/post.md", &[("date", "2020-01-01")]))
            .expect("valid record");
        assert_eq!(entity.meta("series").map(MetaValue::as_text).as_deref(), Some("rust"));
    }

    #[test]
    fn test_missing_mandatory_property_fails_record() {
        let config = config("MANDATORY_PROPERTIES = [\"title\"]");
        let err = EntityBuilder::new(&config)
            .build_entity(record("article/a.md", &[("title", " ")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(err.to_string().contains("date, title"));
    }

    #[test]
    fn test_status_and_draft_flag() {
        let config = config("");
        let builder = EntityBuilder::new(&config);

        let draft = builder
            .build_entity(record("article/a.md", &[("date", "2020-01-01"), ("status", "Draft")]))
            .expect("valid");
        assert!(draft.is_draft());
        assert_eq!(draft.save_as, PathBuf::from("drafts/article/a.html"));

        let draft = builder
            .build_entity(record("article/b.md", &[("date", "2020-01-01"), ("draft", "true")]))
            .expect("valid");
        assert!(draft.is_draft());

        let err = builder
            .build_entity(record("article/c.md", &[("date", "2020-01-01"), ("status", "hidden")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown status 'hidden'"));
    }

    #[test]
    fn test_invalid_date_is_validation_error() {
        let config = config("");
        let err = EntityBuilder::new(&config)
            .build_entity(record("article/a.md", &[("date", "last tuesday")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(err.to_string().contains("invalid date"));
    }

    #[test]
    fn test_folder_category_and_default_category() {
        let config = config("");
        let builder = EntityBuilder::new(&config);
        let entity = builder
            .build_entity(record("article/Rust Tips/a.md", &[("date", "2020-01-01")]))
            .expect("valid");
        assert_eq!(entity.category.map(|c| c.slug), Some("rust-tips".to_string()));

        let config = super::tests::config(
            "USE_FOLDER_AS_CATEGORY = false\nDEFAULT_CATEGORY = \"misc\"",
        );
        let entity = EntityBuilder::new(&config)
            .build_entity(record("article/rust/a.md", &[("date", "2020-01-01")]))
            .expect("valid");
        assert_eq!(entity.category.map(|c| c.name), Some("misc".to_string()));
    }

    #[test]
    fn test_save_as_override() {
        let config = config("");
        let entity = EntityBuilder::new(&config)
            .build_entity(record(
                "article/a.md",
                &[("date", "2020-01-01"), ("save_as", "special/index.html")],
            ))
            .expect("valid");
        assert!(entity.override_save_as);
        assert_eq!(entity.save_as, PathBuf::from("special/index.html"));
        assert_eq!(entity.url, "special/index.html");
    }

    #[test]
    fn test_missing_placeholder_value_is_validation_error() {
        let config = config("ARTICLE_SAVE_AS = \"{category}/{slug}.html\"");
        let err = EntityBuilder::new(&config)
            .build_entity(record("article/a.md", &[("date", "2020-01-01")]))
            .unwrap_err();
        assert!(err.to_string().contains("{category}"));
    }

    #[test]
    fn test_translation_cluster_picks_default_language() {
        let config = config("");
        let mut diagnostics = Diagnostics::new();
        let classified = EntityBuilder::new(&config).build(
            vec![
                record("article/a.fr.md", &[("date", "2020-01-01")]),
                record("article/a.md", &[("date", "2020-01-01")]),
                record("article/b.md", &[("date", "2020-02-01")]),
            ],
            &mut diagnostics,
        );

        assert!(diagnostics.is_empty());
        assert_eq!(classified.published.len(), 2);

        let cluster = &classified.published[0];
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster.representative.lang, "en");
        assert_eq!(cluster.translations[0].lang, "fr");
        assert_eq!(cluster.representative.translations[0].lang, "fr");
        assert_eq!(
            cluster.translations[0].translation_of.as_ref().map(|l| l.lang.as_str()),
            Some("en")
        );
        assert_eq!(classified.published[1].representative.slug, "b");
        assert!(classified.published[1].translations.is_empty());
        assert_eq!(classified.published[1].len(), 1);
    }

    #[test]
    fn test_duplicate_slug_and_language_is_reported() {
        let config = config("");
        let mut diagnostics = Diagnostics::new();
        let classified = EntityBuilder::new(&config).build(
            vec![
                record("article/a.md", &[("date", "2020-01-01")]),
                record("article/a.fr.md", &[("date", "2020-01-01")]),
                record("article/other.md", &[("date", "2020-01-01"), ("slug", "a")]),
            ],
            &mut diagnostics,
        );

        assert_eq!(classified.published.len(), 1);
        assert_eq!(classified.published[0].len(), 2);
        assert_eq!(
            classified.published[0].representative.source_path,
            PathBuf::from("article/a.md")
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.to_string().contains("other.md"));
    }

    #[test]
    fn test_tie_break_between_unlisted_languages() {
        let records = || {
            vec![
                record("article/z.md", &[("date", "2020-01-01"), ("slug", "s"), ("lang", "de")]),
                record("article/a.md", &[("date", "2020-01-01"), ("slug", "s"), ("lang", "it")]),
            ]
        };

        let config = config("");
        let classified = EntityBuilder::new(&config).build(records(), &mut Diagnostics::new());
        assert_eq!(classified.published[0].representative.lang, "it");

        let config = super::tests::config("TRANSLATION_TIE_BREAK = \"discovery\"");
        let classified = EntityBuilder::new(&config).build(records(), &mut Diagnostics::new());
        assert_eq!(classified.published[0].representative.lang, "de");
    }

    #[test]
    fn test_drafts_cluster_separately() {
        let config = config("");
        let classified = EntityBuilder::new(&config).build(
            vec![
                record("article/a.md", &[("date", "2020-01-01")]),
                record("article/a.fr.md", &[("date", "2020-01-01"), ("status", "draft")]),
            ],
            &mut Diagnostics::new(),
        );
        assert_eq!(classified.published.len(), 1);
        assert_eq!(classified.drafts.len(), 1);
        assert!(classified.published[0].translations.is_empty());
        assert_eq!(classified.entity_count(), 2);
    }
}
