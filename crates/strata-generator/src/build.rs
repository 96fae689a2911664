//! Build orchestration.
//!
//! Runs the entity generator, then renders and writes every page descriptor.

use std::{fs, sync::Arc, time::Instant};

use rayon::prelude::*;
use strata_core::{Config, ContentReader, CoreError, Diagnostics, FrontmatterReader, Result};
use tracing::{debug, info, warn};

use crate::{
    descriptor::{PageDescriptor, PageKind},
    feed::{FeedSerializer, SyndicationSerializer},
    generator::{EntityGenerator, GeneratorOutput},
    hooks::Hooks,
    sorter::SorterRegistry,
    subgenerator::SubGeneratorRegistry,
    template::{TemplateRegistry, TemplateRenderer},
    writer::{FsWriter, Writer},
};

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of entity types built.
    pub entity_types: usize,

    /// Number of published entities across all types.
    pub entities: usize,

    /// Number of pages written, feeds excluded.
    pub pages: usize,

    /// Number of feeds written.
    pub feeds: usize,

    /// Number of outputs that failed to render or write.
    pub failed: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Outcome of a build that got as far as writing.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub stats: BuildStats,
    /// Records skipped during generation.
    pub diagnostics: Diagnostics,
    /// Outputs that could not be rendered or written.
    pub write_errors: Vec<CoreError>,
}

impl BuildReport {
    /// Whether any error was collected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty() || !self.write_errors.is_empty()
    }
}

/// Site builder that orchestrates the build process.
pub struct Builder {
    config: Config,
    reader: Arc<dyn ContentReader>,
    hooks: Hooks,
    sorters: SorterRegistry,
    subgenerators: SubGeneratorRegistry,
    templates: Arc<dyn TemplateRenderer>,
    feeds: Arc<dyn FeedSerializer>,
    writer: Arc<dyn Writer>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("content_dir", &self.config.build.content_dir)
            .field("output_dir", &self.config.build.output_dir)
            .field("hooks", &self.hooks)
            .field("sorters", &self.sorters)
            .field("subgenerators", &self.subgenerators)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a builder with the default collaborators.
    ///
    /// Templates from `build.templates_dir` override the built-in ones.
    pub fn new(config: Config) -> Result<Self> {
        let mut templates = TemplateRegistry::new();
        if let Some(dir) = &config.build.templates_dir {
            let loaded = templates
                .load_dir(dir)
                .map_err(|e| CoreError::read(dir, e.to_string()))?;
            debug!(dir = %dir.display(), loaded, "loaded template overrides");
        }

        Ok(Self {
            reader: Arc::new(FrontmatterReader::new()),
            hooks: Hooks::new(),
            sorters: SorterRegistry::new(),
            subgenerators: SubGeneratorRegistry::new(),
            templates: Arc::new(templates),
            feeds: Arc::new(SyndicationSerializer::new(config.clone())),
            writer: Arc::new(FsWriter::new(&config.build.output_dir)),
            config,
        })
    }

    #[must_use]
    pub fn with_reader(mut self, reader: impl ContentReader + 'static) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_sorters(mut self, sorters: SorterRegistry) -> Self {
        self.sorters = sorters;
        self
    }

    #[must_use]
    pub fn with_subgenerators(mut self, subgenerators: SubGeneratorRegistry) -> Self {
        self.subgenerators = subgenerators;
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: impl TemplateRenderer + 'static) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    #[must_use]
    pub fn with_feed_serializer(mut self, feeds: impl FeedSerializer + 'static) -> Self {
        self.feeds = Arc::new(feeds);
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: impl Writer + 'static) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the generator without rendering or writing anything.
    pub fn generate(&self) -> Result<GeneratorOutput> {
        EntityGenerator::new(
            &self.config,
            Arc::clone(&self.reader),
            self.hooks.clone(),
            &self.sorters,
            &self.subgenerators,
        )?
        .run()
    }

    /// Execute the full build process.
    pub fn build(&self) -> Result<BuildReport> {
        let start = Instant::now();

        info!(
            content = %self.config.build.content_dir.display(),
            output = %self.config.build.output_dir.display(),
            "starting build"
        );

        let output = self.generate()?;

        if self.config.build.delete_output_directory {
            self.clean_output()?;
        }

        let site = output.site.to_json();
        let results: Vec<Result<PageKind>> = output
            .descriptors
            .par_iter()
            .map(|descriptor| {
                let bytes = self.render(descriptor, site)?;
                self.writer.write(&descriptor.destination, &bytes)?;
                Ok(descriptor.kind)
            })
            .collect();

        let mut stats = BuildStats {
            entity_types: output.site.len(),
            entities: output.site.iter().map(|t| t.entities.len()).sum(),
            ..Default::default()
        };
        let mut write_errors = Vec::new();
        for result in results {
            match result {
                Ok(PageKind::Feed) => stats.feeds += 1,
                Ok(_) => stats.pages += 1,
                Err(e) => {
                    warn!(error = %e, "output not written");
                    write_errors.push(e);
                }
            }
        }
        stats.failed = write_errors.len();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pages = stats.pages,
            feeds = stats.feeds,
            failed = stats.failed,
            diagnostics = output.diagnostics.len(),
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(BuildReport {
            stats,
            diagnostics: output.diagnostics,
            write_errors,
        })
    }

    /// Render one descriptor: feeds through the serializer, everything else
    /// through its template or the built-in for its kind.
    fn render(&self, descriptor: &PageDescriptor, site: &serde_json::Value) -> Result<Vec<u8>> {
        if let Some(feed) = &descriptor.feed {
            return Ok(self
                .feeds
                .serialize(&descriptor.entities, feed, &descriptor.url)
                .into_bytes());
        }

        let template = if self.templates.contains(&descriptor.template) {
            descriptor.template.as_str()
        } else {
            let fallback = descriptor.kind.fallback_template();
            debug!(
                template = %descriptor.template,
                fallback,
                path = %descriptor.destination.display(),
                "template not found, using built-in"
            );
            fallback
        };

        self.templates
            .render(template, &descriptor.context, site)
            .map(String::into_bytes)
            .map_err(|e| CoreError::write(&descriptor.destination, e.to_string()))
    }

    /// Remove the output directory's contents.
    fn clean_output(&self) -> Result<()> {
        let output_dir = &self.config.build.output_dir;
        if output_dir.exists() {
            debug!(path = %output_dir.display(), "cleaning output directory");
            fs::remove_dir_all(output_dir)?;
        }
        fs::create_dir_all(output_dir)?;
        Ok(())
    }
}
