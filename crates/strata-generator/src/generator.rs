//! The entity generator.
//!
//! Owns one sub-generator per declared entity type and runs them in two
//! phases. Phase one takes every type to `Indexed` in parallel; the
//! cross-type [`SiteContext`] is built only once all of them got there.
//! Phase two builds and finalizes page descriptors against that snapshot.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rayon::prelude::*;
use strata_core::{Config, ContentReader, CoreError, Diagnostics, EntityTypeConfig, Result};
use tracing::{debug, info, warn};

use crate::{
    context::SiteContext,
    descriptor::PageDescriptor,
    discovery::check_overlap,
    hooks::Hooks,
    sorter::SorterRegistry,
    subgenerator::{EntitySubGenerator, PipelineEnv, SubGeneratorRegistry},
};

/// Everything a run produces.
#[derive(Debug)]
pub struct GeneratorOutput {
    /// Cross-type context handed to renderers.
    pub site: SiteContext,
    /// Page descriptors of every type, in type order.
    pub descriptors: Vec<PageDescriptor>,
    /// Non-fatal errors, in type order.
    pub diagnostics: Diagnostics,
}

/// Drives every entity type's sub-generator.
pub struct EntityGenerator {
    subgenerators: Vec<Box<dyn EntitySubGenerator>>,
    hooks: Arc<Hooks>,
    cancel: Arc<AtomicBool>,
    strict: bool,
}

impl std::fmt::Debug for EntityGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGenerator")
            .field(
                "entity_types",
                &self.entity_types().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl EntityGenerator {
    /// Resolve every declared entity type and construct its sub-generator.
    ///
    /// Fails with a configuration error when two types share a namespace, when
    /// their paths overlap, or when a sorter or sub-generator name is unknown.
    pub fn new(
        config: &Config,
        reader: Arc<dyn ContentReader>,
        hooks: Hooks,
        sorters: &SorterRegistry,
        registry: &SubGeneratorRegistry,
    ) -> Result<Self> {
        let mut configs = config
            .entity_types
            .iter()
            .map(|(name, overrides)| {
                EntityTypeConfig::resolve(name, &config.site, &config.settings, overrides)
            })
            .collect::<Result<Vec<_>>>()?;

        hooks.generator_init(&mut configs);
        if configs.is_empty() {
            warn!("no entity types declared");
        }

        let mut namespaces: BTreeMap<&str, &str> = BTreeMap::new();
        for type_config in &configs {
            if let Some(previous) = namespaces.insert(&type_config.namespace, &type_config.name) {
                return Err(CoreError::configuration(format!(
                    "entity types {previous} and {} share the namespace '{}'",
                    type_config.name, type_config.namespace
                )));
            }
        }
        for (i, a) in configs.iter().enumerate() {
            for b in &configs[i + 1..] {
                check_overlap(a, b)?;
            }
        }

        let hooks = Arc::new(hooks);
        let cancel = Arc::new(AtomicBool::new(false));
        let mut subgenerators = Vec::with_capacity(configs.len());

        for type_config in configs {
            let sorter = sorters.resolve(&type_config.sorter).map_err(|e| {
                CoreError::type_configuration(&type_config.name, format!("SORTER: {e}"))
            })?;
            let implementation = type_config.subgenerator.clone();
            if !registry.contains(&implementation) {
                return Err(CoreError::type_configuration(
                    &type_config.name,
                    format!(
                        "SUBGENERATOR_CLASS: unknown sub-generator '{implementation}' (registered: {})",
                        registry.names().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
            debug!(
                entity_type = %type_config.name,
                subgenerator = %implementation,
                sorter = %type_config.sorter,
                "constructing sub-generator"
            );

            let env = PipelineEnv {
                site: config.site.clone(),
                content_dir: config.build.content_dir.clone(),
                reader: Arc::clone(&reader),
                hooks: Arc::clone(&hooks),
                sorter,
                cancel: Arc::clone(&cancel),
            };
            let name = type_config.name.clone();
            let subgenerator = registry
                .create(&implementation, type_config, env)
                .ok_or_else(|| {
                    CoreError::type_configuration(name, "sub-generator could not be constructed")
                })?;
            subgenerators.push(subgenerator);
        }

        info!(types = subgenerators.len(), "entity generator ready");

        Ok(Self {
            subgenerators,
            hooks,
            cancel,
            strict: config.build.strict,
        })
    }

    /// Resolved configurations, in type order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeConfig> {
        self.subgenerators.iter().map(|s| s.config())
    }

    /// Run every sub-generator to completion.
    ///
    /// With `strict` set, collected errors are escalated at each barrier, so
    /// the resulting `Strict` error carries the errors of every type.
    pub fn run(mut self) -> Result<GeneratorOutput> {
        let start = Instant::now();
        let strict = self.strict;
        let cancel = Arc::clone(&self.cancel);
        let names: Vec<String> = self.entity_types().map(|c| c.name.clone()).collect();

        let prepared: Vec<Result<Diagnostics>> = self
            .subgenerators
            .par_iter_mut()
            .map(|subgenerator| {
                let outcome = subgenerator.prepare();
                settle(subgenerator.as_mut(), outcome, &cancel)
            })
            .collect();
        let mut diagnostics = merge(&names, collect(prepared)?, strict)?;

        let contexts = self
            .subgenerators
            .iter()
            .map(|s| s.context())
            .collect::<Result<Vec<_>>>()?;
        let site = SiteContext::new(contexts);
        debug!(types = site.len(), "built site context");

        let built: Vec<Result<(Vec<PageDescriptor>, Diagnostics)>> = self
            .subgenerators
            .par_iter_mut()
            .map(|subgenerator| {
                let mut descriptors = Vec::new();
                let outcome = subgenerator.build_pages(&site).and_then(|()| {
                    descriptors = subgenerator.finalize()?;
                    Ok(())
                });
                settle(subgenerator.as_mut(), outcome, &cancel)
                    .map(|diagnostics| (descriptors, diagnostics))
            })
            .collect();

        let mut descriptors = Vec::new();
        let mut per_type = Vec::with_capacity(built.len());
        let mut failures = Vec::new();
        for result in built {
            match result {
                Ok((mut type_descriptors, type_diagnostics)) => {
                    descriptors.append(&mut type_descriptors);
                    per_type.push(type_diagnostics);
                }
                Err(e) => failures.push(e),
            }
        }
        if let Some(error) = first_failure(failures) {
            return Err(error);
        }
        let mut built_diagnostics = merge(&names, per_type, strict)?;
        diagnostics.append(&mut built_diagnostics);

        self.hooks.generator_finalized(&site, &mut descriptors);
        warn_duplicate_destinations(&descriptors);

        info!(
            types = site.len(),
            descriptors = descriptors.len(),
            diagnostics = diagnostics.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation complete"
        );

        Ok(GeneratorOutput {
            site,
            descriptors,
            diagnostics,
        })
    }
}

/// Annotate a failed stage and stop new work after any fatal error.
fn settle(
    subgenerator: &mut dyn EntitySubGenerator,
    outcome: Result<()>,
    cancel: &AtomicBool,
) -> Result<Diagnostics> {
    let name = subgenerator.config().name.clone();
    let diagnostics = subgenerator.take_diagnostics();

    match outcome {
        Ok(()) => Ok(diagnostics),
        Err(e) => {
            let stage = subgenerator.stage();
            let error = e.in_phase(&name, stage.next().unwrap_or(stage));
            if !matches!(error, CoreError::Cancelled { .. }) {
                warn!(entity_type = %name, error = %error, "entity type failed, cancelling remaining work");
            }
            cancel.store(true, Ordering::SeqCst);
            Err(error)
        }
    }
}

/// Per-type diagnostics in type order, failing with the first real failure.
fn collect(results: Vec<Result<Diagnostics>>) -> Result<Vec<Diagnostics>> {
    let mut per_type = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(diagnostics) => per_type.push(diagnostics),
            Err(e) => failures.push(e),
        }
    }
    match first_failure(failures) {
        Some(error) => Err(error),
        None => Ok(per_type),
    }
}

/// Merge per-type diagnostics. In strict mode a non-empty result becomes one
/// `Strict` error naming every type that contributed to it.
fn merge(names: &[String], per_type: Vec<Diagnostics>, strict: bool) -> Result<Diagnostics> {
    let mut merged = Diagnostics::new();
    let mut failing = Vec::new();
    for (name, mut diagnostics) in names.iter().zip(per_type) {
        if !diagnostics.is_empty() {
            failing.push(name.as_str());
        }
        merged.append(&mut diagnostics);
    }
    if strict {
        merged.escalate(&failing.join(", "))?;
    }
    Ok(merged)
}

/// The first error that is not a cancellation caused by another failure.
fn first_failure(failures: Vec<CoreError>) -> Option<CoreError> {
    let position = failures
        .iter()
        .position(|e| !matches!(e, CoreError::Cancelled { .. }))
        .unwrap_or(0);
    failures.into_iter().nth(position)
}

fn warn_duplicate_destinations(descriptors: &[PageDescriptor]) {
    let mut seen: BTreeSet<&PathBuf> = BTreeSet::new();
    for descriptor in descriptors {
        if !seen.insert(&descriptor.destination) {
            warn!(
                destination = %descriptor.destination.display(),
                entity_type = %descriptor.entity_type,
                "several pages share a destination, the last one written wins"
            );
        }
    }
}
