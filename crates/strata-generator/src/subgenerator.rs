//! Per-entity-type pipelines.
//!
//! A sub-generator drives one entity type through
//! `Created → Discovered → Classified → Indexed → PagesBuilt → Finalized`.
//! Each stage method fails with [`CoreError::InvalidTransition`] when called
//! out of order. There is no reset: a new run needs a new sub-generator.

use std::{
    collections::BTreeMap,
    fmt, mem,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Value, json};
use strata_core::{
    ContentReader, CoreError, Diagnostics, Entity, EntityTypeConfig, FeedScope, PatternValues,
    Result, Route, RouteKind, SiteConfig, Stage, Taxon,
};
use tracing::{debug, info};

use crate::{
    builder::{Classified, EntityBuilder, TranslationCluster},
    context::{EntityTypeContext, SiteContext},
    descriptor::{FeedSpec, PageDescriptor, PageKind, paginate_destinations},
    discovery::{ContentDiscovery, RawRecord},
    hooks::Hooks,
    index::{EntityIndices, Index},
    paginator::Paginator,
    sorter::SortStrategy,
};

/// Shared services handed to every sub-generator.
#[derive(Clone)]
pub struct PipelineEnv {
    pub site: SiteConfig,
    pub content_dir: PathBuf,
    pub reader: Arc<dyn ContentReader>,
    pub hooks: Arc<Hooks>,
    /// The entity type's resolved sorter.
    pub sorter: Arc<dyn SortStrategy>,
    /// Once set, no new stage is started.
    pub cancel: Arc<AtomicBool>,
}

impl fmt::Debug for PipelineEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEnv")
            .field("site", &self.site.name)
            .field("content_dir", &self.content_dir)
            .field("hooks", &self.hooks)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Fail unless `to` directly follows `from`.
pub fn check_transition(entity_type: &str, from: Stage, to: Stage) -> Result<()> {
    if from.next() == Some(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            entity_type: entity_type.to_string(),
            from,
            to,
        })
    }
}

/// The pipeline of one entity type.
pub trait EntitySubGenerator: Send {
    fn config(&self) -> &EntityTypeConfig;

    fn stage(&self) -> Stage;

    /// Enumerate and read content files.
    fn discover(&mut self) -> Result<()>;

    /// Validate records, build entities and cluster translations.
    fn classify(&mut self) -> Result<()>;

    /// Sort entities and build indices.
    fn index(&mut self) -> Result<()>;

    /// Snapshot of the indexed data, available from `Indexed` on.
    fn context(&self) -> Result<EntityTypeContext>;

    /// Emit page descriptors. `site` holds every type's indexed data.
    fn build_pages(&mut self, site: &SiteContext) -> Result<()>;

    /// Hand the descriptors over. Reached once per sub-generator.
    fn finalize(&mut self) -> Result<Vec<PageDescriptor>>;

    /// Take the non-fatal errors collected so far.
    fn take_diagnostics(&mut self) -> Diagnostics;

    /// Run every stage up to `Indexed`.
    fn prepare(&mut self) -> Result<()> {
        self.discover()?;
        self.classify()?;
        self.index()
    }
}

/// Constructs a sub-generator for one entity type.
pub type SubGeneratorFactory =
    Arc<dyn Fn(EntityTypeConfig, PipelineEnv) -> Box<dyn EntitySubGenerator> + Send + Sync>;

/// Sub-generator implementations selectable with `SUBGENERATOR_CLASS`.
#[derive(Clone)]
pub struct SubGeneratorRegistry {
    factories: BTreeMap<String, SubGeneratorFactory>,
}

impl fmt::Debug for SubGeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubGeneratorRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for SubGeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubGeneratorRegistry {
    /// Create a registry holding the `default` implementation.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("default", DefaultSubGenerator::boxed);
        registry
    }

    /// Register a factory, replacing any previous one with the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(EntityTypeConfig, PipelineEnv) -> Box<dyn EntitySubGenerator>
        + Send
        + Sync
        + 'static,
    ) -> &mut Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the sub-generator registered under `name`.
    pub fn create(
        &self,
        name: &str,
        config: EntityTypeConfig,
        env: PipelineEnv,
    ) -> Option<Box<dyn EntitySubGenerator>> {
        self.factories.get(name).map(|factory| factory(config, env))
    }
}

/// Archive granularity.
#[derive(Debug, Clone, Copy)]
enum Period {
    Year,
    Month,
    Day,
}

impl Period {
    fn route_kind(self) -> RouteKind {
        match self {
            Self::Year => RouteKind::YearArchive,
            Self::Month => RouteKind::MonthArchive,
            Self::Day => RouteKind::DayArchive,
        }
    }

    /// Bucket key; unused components are zero.
    fn key(self, date: DateTime<Utc>) -> (i32, u32, u32) {
        match self {
            Self::Year => (date.year(), 0, 0),
            Self::Month => (date.year(), date.month(), 0),
            Self::Day => (date.year(), date.month(), date.day()),
        }
    }

    fn context(self, (year, month, day): (i32, u32, u32)) -> Value {
        match self {
            Self::Year => json!({ "year": year }),
            Self::Month => json!({ "year": year, "month": month }),
            Self::Day => json!({ "year": year, "month": month, "day": day }),
        }
    }
}

/// Label index a page or feed is built from.
#[derive(Debug, Clone, Copy)]
enum Label {
    Category,
    Tag,
    Author,
}

impl Label {
    fn page_kind(self) -> PageKind {
        match self {
            Self::Category => PageKind::Category,
            Self::Tag => PageKind::Tag,
            Self::Author => PageKind::Author,
        }
    }

    fn route_kind(self) -> RouteKind {
        match self {
            Self::Category => RouteKind::Category,
            Self::Tag => RouteKind::Tag,
            Self::Author => RouteKind::Author,
        }
    }

    fn context_key(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Author => "author",
        }
    }
}

/// One listing page sequence to emit.
struct Listing<'a> {
    kind: PageKind,
    template: &'a str,
    entities: &'a [Arc<Entity>],
    save_as: String,
    url: String,
    paginated: bool,
    extra: Vec<(&'static str, Value)>,
}

/// The built-in pipeline.
pub struct DefaultSubGenerator {
    config: EntityTypeConfig,
    env: PipelineEnv,
    stage: Stage,
    records: Vec<RawRecord>,
    classified: Classified,
    data: EntityTypeContext,
    descriptors: Vec<PageDescriptor>,
    diagnostics: Diagnostics,
}

impl fmt::Debug for DefaultSubGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultSubGenerator")
            .field("entity_type", &self.config.name)
            .field("stage", &self.stage)
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl DefaultSubGenerator {
    #[must_use]
    pub fn new(config: EntityTypeConfig, env: PipelineEnv) -> Self {
        Self {
            config,
            env,
            stage: Stage::Created,
            records: Vec::new(),
            classified: Classified::default(),
            data: EntityTypeContext::default(),
            descriptors: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Factory registered as `default`.
    #[must_use]
    pub fn boxed(config: EntityTypeConfig, env: PipelineEnv) -> Box<dyn EntitySubGenerator> {
        Box::new(Self::new(config, env))
    }

    fn enter(&self, to: Stage) -> Result<()> {
        check_transition(&self.config.name, self.stage, to)?;
        if self.env.cancel.load(Ordering::Relaxed) {
            return Err(CoreError::Cancelled {
                entity_type: self.config.name.clone(),
            });
        }
        Ok(())
    }

    fn upper(&self) -> String {
        self.config.name.to_uppercase()
    }

    fn pattern_error(&self, key: &str, message: String) -> CoreError {
        CoreError::type_configuration(&self.config.name, format!("{key}: {message}"))
    }

    fn values(&self) -> PatternValues<'_> {
        PatternValues::new().with("entity_type", self.config.namespace.as_str())
    }

    /// Render a route to (save_as, url).
    fn render(&self, key: &str, route: &Route, values: &PatternValues<'_>) -> Result<(String, String)> {
        let save_as = route
            .save_as
            .render(values)
            .map_err(|e| self.pattern_error(key, e))?;
        let url = route
            .url
            .render(values)
            .map_err(|e| self.pattern_error(key, e))?;
        Ok((save_as, url))
    }

    fn descriptor(
        &self,
        kind: PageKind,
        template: &str,
        destination: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> PageDescriptor {
        PageDescriptor::new(kind, &self.config.name, template, destination, url)
            .with_context("entity_type", json!(self.config.name))
            .with_context("settings", self.data.settings.clone())
    }

    fn listing(&self, out: &mut Vec<PageDescriptor>, listing: Listing<'_>) -> Result<()> {
        let paginator = Paginator::new(if listing.paginated { self.config.page_size } else { 0 });
        let pages = paginate_destinations(
            listing.entities,
            &paginator,
            &listing.save_as,
            &listing.url,
            self.config.route(RouteKind::Paginated),
        )
        .map_err(|e| self.pattern_error(&RouteKind::Paginated.save_as_key(&self.upper()), e))?;

        for page in pages {
            let mut descriptor = self
                .descriptor(listing.kind, listing.template, page.destination, page.url)
                .with_entities(page.page.items)
                .with_context("page", page.context);
            for (key, value) in &listing.extra {
                descriptor = descriptor.with_context(key, value.clone());
            }
            if listing.kind == PageKind::Direct {
                descriptor = descriptor.direct();
            }
            out.push(descriptor);
        }
        Ok(())
    }

    fn entity_pages(&self, out: &mut Vec<PageDescriptor>) {
        let groups = [
            (PageKind::Entity, &self.data.entities),
            (PageKind::Translation, &self.data.translations),
            (PageKind::Draft, &self.data.drafts),
            (PageKind::Draft, &self.data.draft_translations),
        ];
        for (kind, entities) in groups {
            for entity in entities {
                if entity.save_as.as_os_str().is_empty() {
                    continue;
                }
                let context = serde_json::to_value(entity.as_ref()).unwrap_or(Value::Null);
                let mut descriptor = self
                    .descriptor(kind, &entity.template, entity.save_as.clone(), entity.url.clone())
                    .with_context("entity", context);
                descriptor.entities = vec![Arc::clone(entity)];
                out.push(descriptor);
            }
        }
    }

    fn archive_pages(&self, out: &mut Vec<PageDescriptor>) -> Result<()> {
        let (Some(template), Some(route)) = (
            self.config.archive_template.as_deref(),
            self.config.route(RouteKind::Archive),
        ) else {
            return Ok(());
        };
        let key = RouteKind::Archive.save_as_key(&self.upper());
        let (save_as, url) = self.render(&key, route, &self.values())?;
        self.listing(
            out,
            Listing {
                kind: PageKind::Archive,
                template,
                entities: &self.data.entities,
                save_as,
                url,
                paginated: true,
                extra: Vec::new(),
            },
        )
    }

    fn period_archive_pages(&self, out: &mut Vec<PageDescriptor>) -> Result<()> {
        let Some(template) = self.config.period_archive_template.as_deref() else {
            return Ok(());
        };

        for period in [Period::Year, Period::Month, Period::Day] {
            let Some(route) = self.config.route(period.route_kind()) else {
                continue;
            };
            let key = period.route_kind().save_as_key(&self.upper());

            let mut buckets: BTreeMap<(i32, u32, u32), Vec<Arc<Entity>>> = BTreeMap::new();
            for entity in &self.data.entities {
                if let Some(date) = entity.date {
                    buckets.entry(period.key(date)).or_default().push(Arc::clone(entity));
                }
            }
            let mut buckets: Vec<_> = buckets.into_iter().collect();
            if self.config.newest_first_archives {
                buckets.reverse();
            }

            for (bucket, entities) in buckets {
                let date = entities.first().and_then(|e| e.date);
                let (save_as, url) = self.render(&key, route, &self.values().with_date(date))?;
                self.listing(
                    out,
                    Listing {
                        kind: PageKind::PeriodArchive,
                        template,
                        entities: &entities,
                        save_as,
                        url,
                        paginated: true,
                        extra: vec![("period", period.context(bucket))],
                    },
                )?;
            }
        }
        Ok(())
    }

    fn label_pages(
        &self,
        out: &mut Vec<PageDescriptor>,
        label: Label,
        template: Option<&str>,
        index: &Index,
        reverse: bool,
    ) -> Result<()> {
        let (Some(template), Some(route)) = (template, self.config.route(label.route_kind())) else {
            return Ok(());
        };
        let key = label.route_kind().save_as_key(&self.upper());

        let mut buckets: Vec<_> = index.iter().collect();
        if reverse {
            buckets.reverse();
        }
        for bucket in buckets {
            let values = self
                .values()
                .with("slug", bucket.taxon.slug.as_str())
                .with("name", bucket.taxon.name.as_str());
            let (save_as, url) = self.render(&key, route, &values)?;
            let taxon = serde_json::to_value(&bucket.taxon).unwrap_or(Value::Null);
            self.listing(
                out,
                Listing {
                    kind: label.page_kind(),
                    template,
                    entities: &bucket.entities,
                    save_as,
                    url,
                    paginated: true,
                    extra: vec![(label.context_key(), taxon)],
                },
            )?;
        }
        Ok(())
    }

    fn direct_pages(&self, out: &mut Vec<PageDescriptor>) -> Result<()> {
        for direct in &self.config.direct_templates {
            let values = self.values().with("name", direct.name.as_str());
            let prefix = direct.name.to_uppercase();
            let (save_as, url) = self.render(&format!("{prefix}_SAVE_AS"), &direct.route, &values)?;
            self.listing(
                out,
                Listing {
                    kind: PageKind::Direct,
                    template: &direct.name,
                    entities: &self.data.entities,
                    save_as,
                    url,
                    paginated: direct.paginated,
                    extra: vec![("name", json!(direct.name))],
                },
            )?;

            if let Some(all) = &direct.all {
                let (save_as, url) = self.render(&format!("{prefix}_ALL_SAVE_AS"), all, &values)?;
                self.listing(
                    out,
                    Listing {
                        kind: PageKind::Direct,
                        template: &direct.name,
                        entities: &self.data.entities,
                        save_as,
                        url,
                        paginated: false,
                        extra: vec![("name", json!(direct.name))],
                    },
                )?;
            }
        }
        Ok(())
    }

    fn feed_pages(&self, out: &mut Vec<PageDescriptor>) -> Result<()> {
        let site_name = &self.env.site.name;
        for (scope, format, route) in self.config.feeds() {
            let key = RouteKind::Feed(scope, format).save_as_key(&self.upper());
            let feed = |title: String, label: Option<&str>| FeedSpec {
                scope,
                format,
                title,
                label: label.map(str::to_string),
            };

            match scope {
                FeedScope::Published => {
                    let (save_as, url) = self.render(&key, route, &self.values())?;
                    let spec = feed(site_name.clone(), None);
                    self.push_feed(out, spec, save_as, url, self.data.entities.clone());
                }
                FeedScope::All => {
                    let (save_as, url) = self.render(&key, route, &self.values())?;
                    let mut entities: Vec<_> = self
                        .data
                        .entities
                        .iter()
                        .chain(&self.data.translations)
                        .cloned()
                        .collect();
                    self.env.sorter.sort(&mut entities);
                    self.push_feed(out, feed(site_name.clone(), None), save_as, url, entities);
                }
                FeedScope::Category | FeedScope::Tag | FeedScope::Author => {
                    let index = match scope {
                        FeedScope::Category => &self.data.categories,
                        FeedScope::Tag => &self.data.tags,
                        _ => &self.data.authors,
                    };
                    for bucket in index.iter() {
                        let Taxon { name, slug } = &bucket.taxon;
                        let values = self
                            .values()
                            .with("slug", slug.as_str())
                            .with("name", name.as_str());
                        let (save_as, url) = self.render(&key, route, &values)?;
                        let spec = feed(format!("{site_name} - {name}"), Some(slug));
                        self.push_feed(out, spec, save_as, url, bucket.entities.clone());
                    }
                }
                FeedScope::Translation => {
                    let mut by_lang: BTreeMap<&str, Vec<Arc<Entity>>> = BTreeMap::new();
                    for entity in self.data.entities.iter().chain(&self.data.translations) {
                        by_lang
                            .entry(entity.lang.as_str())
                            .or_default()
                            .push(Arc::clone(entity));
                    }
                    for (lang, mut entities) in by_lang {
                        self.env.sorter.sort(&mut entities);
                        let values = self.values().with("lang", lang);
                        let (save_as, url) = self.render(&key, route, &values)?;
                        let spec = feed(format!("{site_name} ({lang})"), Some(lang));
                        self.push_feed(out, spec, save_as, url, entities);
                    }
                }
            }
        }
        Ok(())
    }

    fn push_feed(
        &self,
        out: &mut Vec<PageDescriptor>,
        spec: FeedSpec,
        save_as: String,
        url: String,
        mut entities: Vec<Arc<Entity>>,
    ) {
        if let Some(max) = self.config.feed_max_items {
            entities.truncate(max);
        }
        let feed = json!({ "title": spec.title, "format": spec.format, "label": spec.label });
        out.push(
            self.descriptor(PageKind::Feed, PageKind::Feed.fallback_template(), save_as, url)
                .with_context("feed", feed)
                .with_entities(entities)
                .with_feed(spec),
        );
    }
}

/// Split clusters into (representatives, translations), both in cluster order.
fn split_clusters(clusters: Vec<TranslationCluster>) -> (Vec<Arc<Entity>>, Vec<Arc<Entity>>) {
    let mut representatives = Vec::with_capacity(clusters.len());
    let mut translations = Vec::new();
    for cluster in clusters {
        representatives.push(Arc::new(cluster.representative));
        translations.extend(cluster.translations.into_iter().map(Arc::new));
    }
    (representatives, translations)
}

impl EntitySubGenerator for DefaultSubGenerator {
    fn config(&self) -> &EntityTypeConfig {
        &self.config
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn discover(&mut self) -> Result<()> {
        self.enter(Stage::Discovered)?;
        let discovered = ContentDiscovery::new(
            &self.config,
            &self.env.content_dir,
            self.env.reader.as_ref(),
            &self.env.cancel,
        )
        .discover()?;
        self.records = discovered.records;
        self.diagnostics.extend(discovered.diagnostics);
        self.stage = Stage::Discovered;
        Ok(())
    }

    fn classify(&mut self) -> Result<()> {
        self.enter(Stage::Classified)?;
        let mut records = mem::take(&mut self.records);
        self.env.hooks.pre_validation(&self.config, &mut records);
        self.classified = EntityBuilder::new(&self.config).build(records, &mut self.diagnostics);
        self.stage = Stage::Classified;
        Ok(())
    }

    fn index(&mut self) -> Result<()> {
        self.enter(Stage::Indexed)?;
        let mut classified = mem::take(&mut self.classified);
        self.env.hooks.pre_index(&self.config, &mut classified);

        let (entities, translations) = split_clusters(classified.published);
        let (drafts, draft_translations) = split_clusters(classified.drafts);

        let sorter = self.env.sorter.as_ref();
        let mut indices = EntityIndices::build(&entities);
        indices.sort(sorter);
        let sorted = |mut list: Vec<Arc<Entity>>| {
            sorter.sort(&mut list);
            list
        };

        self.data = EntityTypeContext {
            name: self.config.name.clone(),
            namespace: self.config.namespace.clone(),
            entities: sorted(entities),
            translations: sorted(translations),
            drafts: sorted(drafts),
            draft_translations: sorted(draft_translations),
            tags: indices.tags,
            categories: indices.categories,
            authors: indices.authors,
            archives: indices.archive,
            settings: self.config.settings_json(),
        };

        info!(
            entity_type = %self.config.name,
            entities = self.data.entities.len(),
            translations = self.data.translations.len(),
            drafts = self.data.drafts.len(),
            tags = self.data.tags.len(),
            categories = self.data.categories.len(),
            authors = self.data.authors.len(),
            "built indices"
        );
        self.stage = Stage::Indexed;
        Ok(())
    }

    fn context(&self) -> Result<EntityTypeContext> {
        if self.stage < Stage::Indexed {
            return Err(CoreError::InvalidTransition {
                entity_type: self.config.name.clone(),
                from: self.stage,
                to: Stage::Indexed,
            });
        }
        Ok(self.data.clone())
    }

    fn build_pages(&mut self, site: &SiteContext) -> Result<()> {
        self.enter(Stage::PagesBuilt)?;
        debug!(entity_type = %self.config.name, types = site.len(), "building page descriptors");

        let mut descriptors = Vec::new();
        self.entity_pages(&mut descriptors);
        self.archive_pages(&mut descriptors)?;
        self.period_archive_pages(&mut descriptors)?;
        self.label_pages(
            &mut descriptors,
            Label::Category,
            self.config.category_template.as_deref(),
            &self.data.categories,
            self.config.reverse_category_order,
        )?;
        self.label_pages(
            &mut descriptors,
            Label::Tag,
            self.config.tag_template.as_deref(),
            &self.data.tags,
            false,
        )?;
        self.label_pages(
            &mut descriptors,
            Label::Author,
            self.config.author_template.as_deref(),
            &self.data.authors,
            false,
        )?;
        self.direct_pages(&mut descriptors)?;
        self.feed_pages(&mut descriptors)?;

        info!(
            entity_type = %self.config.name,
            descriptors = descriptors.len(),
            "built page descriptors"
        );
        self.descriptors = descriptors;
        self.stage = Stage::PagesBuilt;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<PageDescriptor>> {
        self.enter(Stage::Finalized)?;
        let mut descriptors = mem::take(&mut self.descriptors);
        self.env.hooks.pages_ready(&self.config, &mut descriptors);
        self.stage = Stage::Finalized;
        Ok(descriptors)
    }

    fn take_diagnostics(&mut self) -> Diagnostics {
        mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use strata_core::FrontmatterReader;
    use tempfile::TempDir;

    use super::*;
    use crate::sorter::AttributeSorter;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "Test Site".to_string(),
            url: "https://example.com".to_string(),
            default_lang: "en".to_string(),
            languages: vec!["en".to_string(), "fr".to_string()],
            description: None,
            author: None,
        }
    }

    fn config(overrides: &str) -> EntityTypeConfig {
        let overrides: toml::Table = overrides.parse().expect("valid toml");
        EntityTypeConfig::resolve("Article", &site(), &toml::Table::new(), &overrides)
            .expect("resolve")
    }

    fn env(content_dir: &Path, hooks: Hooks) -> PipelineEnv {
        PipelineEnv {
            site: site(),
            content_dir: content_dir.to_path_buf(),
            reader: Arc::new(FrontmatterReader::new()),
            hooks: Arc::new(hooks),
            sorter: Arc::new(AttributeSorter::new(vec!["date".to_string()], true)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn write(dir: &Path, path: &str, frontmatter: &str) {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, format!("---\n{frontmatter}\n---\nBody\n")).expect("write");
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "article/one.md", "title: One\ndate: 2020-01-01\ntags: [rust]");
        write(dir.path(), "article/one.fr.md", "title: Un\ndate: 2020-01-01");
        write(dir.path(), "article/news/two.md", "title: Two\ndate: 2020-06-01\ntags: [rust, web]");
        write(dir.path(), "article/three.md", "title: Three\ndate: 2021-03-01\nstatus: draft");
        dir
    }

    fn run(generator: &mut DefaultSubGenerator) -> Vec<PageDescriptor> {
        generator.prepare().expect("prepare");
        let site = SiteContext::new([generator.context().expect("context")]);
        generator.build_pages(&site).expect("build pages");
        generator.finalize().expect("finalize")
    }

    fn kinds(descriptors: &[PageDescriptor]) -> Vec<PageKind> {
        descriptors.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_stages_must_run_in_order() {
        let dir = fixture();
        let mut generator = DefaultSubGenerator::new(config(""), env(dir.path(), Hooks::new()));

        let err = generator.index().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: Stage::Created,
                to: Stage::Indexed,
                ..
            }
        ));
        assert!(generator.context().is_err());

        generator.discover().expect("discover");
        assert_eq!(generator.stage(), Stage::Discovered);
        assert!(generator.discover().is_err());
    }

    #[test]
    fn test_finalized_only_once() {
        let dir = fixture();
        let mut generator = DefaultSubGenerator::new(config(""), env(dir.path(), Hooks::new()));
        run(&mut generator);
        assert_eq!(generator.stage(), Stage::Finalized);
        assert!(generator.finalize().is_err());
    }

    #[test]
    fn test_descriptor_order() {
        let dir = fixture();
        let config = config(
            r#"
            ARCHIVE_TEMPLATE = "archives"
            DIRECT_TEMPLATES = ["index"]
            FEED_ATOM = "feeds/article.atom.xml"
            "#,
        );
        let mut generator = DefaultSubGenerator::new(config, env(dir.path(), Hooks::new()));
        let descriptors = run(&mut generator);

        assert_eq!(
            kinds(&descriptors),
            vec![
                PageKind::Entity,
                PageKind::Entity,
                PageKind::Translation,
                PageKind::Draft,
                PageKind::Archive,
                PageKind::Category,
                PageKind::Tag,
                PageKind::Tag,
                PageKind::Direct,
                PageKind::Feed,
            ]
        );

        assert_eq!(descriptors[0].destination, PathBuf::from("article/two.html"));
        assert_eq!(descriptors[2].destination, PathBuf::from("article/one-fr.html"));
        assert_eq!(descriptors[3].destination, PathBuf::from("drafts/article/three.html"));
        assert_eq!(descriptors[5].destination, PathBuf::from("article/category/news.html"));
        assert_eq!(descriptors[6].context["tag"]["slug"], "rust");
        assert_eq!(descriptors[6].entities.len(), 2);
        assert!(descriptors[8].direct);
        assert_eq!(descriptors[8].destination, PathBuf::from("article/index.html"));
        assert_eq!(descriptors[8].context["name"], "index");
        assert_eq!(descriptors[9].feed.as_ref().map(|f| f.title.as_str()), Some("Test Site"));
        assert_eq!(descriptors[9].context["entity_type"], "Article");
    }

    #[test]
    fn test_period_archives_newest_first() {
        let dir = fixture();
        let config = config(
            r#"
            ARCHIVE_TEMPLATE = "archives"
            CATEGORY_TEMPLATE = ""
            TAG_TEMPLATE = ""
            AUTHOR_TEMPLATE = ""
            YEAR_ARCHIVE_SAVE_AS = "article/{date:%Y}/index.html"
            MONTH_ARCHIVE_SAVE_AS = "article/{date:%Y}/{date:%m}/index.html"
            "#,
        );
        let mut generator = DefaultSubGenerator::new(config, env(dir.path(), Hooks::new()));
        let periods: Vec<_> = run(&mut generator)
            .into_iter()
            .filter(|d| d.kind == PageKind::PeriodArchive)
            .map(|d| d.destination)
            .collect();

        assert_eq!(
            periods,
            vec![
                PathBuf::from("article/2020/index.html"),
                PathBuf::from("article/2020/06/index.html"),
                PathBuf::from("article/2020/01/index.html"),
            ]
        );
    }

    #[test]
    fn test_per_label_and_translation_feeds() {
        let dir = fixture();
        let config = config(
            r#"
            TAG_FEED_RSS = "feeds/{slug}.rss.xml"
            TRANSLATION_FEED_ATOM = "feeds/all-{lang}.atom.xml"
            FEED_MAX_ITEMS = 1
            "#,
        );
        let mut generator = DefaultSubGenerator::new(config, env(dir.path(), Hooks::new()));
        let feeds: Vec<_> = run(&mut generator)
            .into_iter()
            .filter(|d| d.kind == PageKind::Feed)
            .collect();

        let destinations: Vec<_> = feeds.iter().map(|d| d.destination.clone()).collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("feeds/rust.rss.xml"),
                PathBuf::from("feeds/web.rss.xml"),
                PathBuf::from("feeds/all-en.atom.xml"),
                PathBuf::from("feeds/all-fr.atom.xml"),
            ]
        );
        assert!(feeds.iter().all(|d| d.entities.len() == 1));
        assert_eq!(feeds[0].feed.as_ref().and_then(|f| f.label.as_deref()), Some("rust"));
        assert_eq!(feeds[0].entities[0].slug, "two");
    }

    #[test]
    fn test_hooks_see_and_modify_phase_data() {
        let dir = fixture();
        let mut hooks = Hooks::new();
        hooks
            .on_pre_validation(|_, records| {
                records.retain(|r| !r.source_path.ends_with("three.md"));
            })
            .on_pre_index(|_, classified| {
                assert!(classified.drafts.is_empty());
            })
            .on_pages_ready(|config, descriptors| {
                descriptors.push(PageDescriptor::new(
                    PageKind::Direct,
                    &config.name,
                    "extra",
                    "extra.html",
                    "extra.html",
                ));
            });

        let mut generator = DefaultSubGenerator::new(config(""), env(dir.path(), hooks));
        let descriptors = run(&mut generator);
        assert!(!descriptors.iter().any(|d| d.kind == PageKind::Draft));
        assert_eq!(
            descriptors.last().map(|d| d.destination.clone()),
            Some(PathBuf::from("extra.html"))
        );
    }

    #[test]
    fn test_cancelled_run_starts_no_stage() {
        let dir = fixture();
        let env = env(dir.path(), Hooks::new());
        env.cancel.store(true, Ordering::SeqCst);
        let mut generator = DefaultSubGenerator::new(config(""), env);
        assert!(matches!(generator.discover(), Err(CoreError::Cancelled { .. })));
        assert_eq!(generator.stage(), Stage::Created);
    }

    #[test]
    fn test_registry_creates_registered_generators() {
        let dir = fixture();
        let mut registry = SubGeneratorRegistry::new();
        registry.register("plain", DefaultSubGenerator::boxed);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["default", "plain"]);
        assert!(registry.contains("plain"));

        let generator = registry
            .create("plain", config(""), env(dir.path(), Hooks::new()))
            .expect("registered");
        assert_eq!(generator.config().name, "Article");
        assert!(
            registry
                .create("missing", config(""), env(dir.path(), Hooks::new()))
                .is_none()
        );
    }
}
