//! Lifecycle hooks.
//!
//! Callbacks run in registration order and receive the in-progress data of
//! their phase by mutable reference.

use std::{fmt, sync::Arc};

use strata_core::EntityTypeConfig;
use tracing::debug;

use crate::{
    builder::Classified, context::SiteContext, descriptor::PageDescriptor, discovery::RawRecord,
};

/// Runs before sub-generators are constructed.
pub type GeneratorInitHook = Arc<dyn Fn(&mut Vec<EntityTypeConfig>) + Send + Sync>;

/// Runs on discovered records before they are validated.
pub type PreValidationHook = Arc<dyn Fn(&EntityTypeConfig, &mut Vec<RawRecord>) + Send + Sync>;

/// Runs on the published/draft partitions before indices are built.
pub type PreIndexHook = Arc<dyn Fn(&EntityTypeConfig, &mut Classified) + Send + Sync>;

/// Runs on one type's complete descriptor list.
pub type PagesReadyHook = Arc<dyn Fn(&EntityTypeConfig, &mut Vec<PageDescriptor>) + Send + Sync>;

/// Runs once every type is finalized, on the full descriptor list.
pub type GeneratorFinalizedHook = Arc<dyn Fn(&SiteContext, &mut Vec<PageDescriptor>) + Send + Sync>;

/// Registered lifecycle callbacks.
#[derive(Clone, Default)]
pub struct Hooks {
    generator_init: Vec<GeneratorInitHook>,
    pre_validation: Vec<PreValidationHook>,
    pre_index: Vec<PreIndexHook>,
    pages_ready: Vec<PagesReadyHook>,
    generator_finalized: Vec<GeneratorFinalizedHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("generator_init", &self.generator_init.len())
            .field("pre_validation", &self.pre_validation.len())
            .field("pre_index", &self.pre_index.len())
            .field("pages_ready", &self.pages_ready.len())
            .field("generator_finalized", &self.generator_finalized.len())
            .finish()
    }
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_generator_init(
        &mut self,
        hook: impl Fn(&mut Vec<EntityTypeConfig>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.generator_init.push(Arc::new(hook));
        self
    }

    pub fn on_pre_validation(
        &mut self,
        hook: impl Fn(&EntityTypeConfig, &mut Vec<RawRecord>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.pre_validation.push(Arc::new(hook));
        self
    }

    pub fn on_pre_index(
        &mut self,
        hook: impl Fn(&EntityTypeConfig, &mut Classified) + Send + Sync + 'static,
    ) -> &mut Self {
        self.pre_index.push(Arc::new(hook));
        self
    }

    pub fn on_pages_ready(
        &mut self,
        hook: impl Fn(&EntityTypeConfig, &mut Vec<PageDescriptor>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.pages_ready.push(Arc::new(hook));
        self
    }

    pub fn on_generator_finalized(
        &mut self,
        hook: impl Fn(&SiteContext, &mut Vec<PageDescriptor>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.generator_finalized.push(Arc::new(hook));
        self
    }

    pub(crate) fn generator_init(&self, configs: &mut Vec<EntityTypeConfig>) {
        if !self.generator_init.is_empty() {
            debug!(hooks = self.generator_init.len(), "running generator_init hooks");
        }
        for hook in &self.generator_init {
            hook(configs);
        }
    }

    pub(crate) fn pre_validation(&self, config: &EntityTypeConfig, records: &mut Vec<RawRecord>) {
        if !self.pre_validation.is_empty() {
            debug!(entity_type = %config.name, hooks = self.pre_validation.len(), "running pre_validation hooks");
        }
        for hook in &self.pre_validation {
            hook(config, records);
        }
    }

    pub(crate) fn pre_index(&self, config: &EntityTypeConfig, classified: &mut Classified) {
        if !self.pre_index.is_empty() {
            debug!(entity_type = %config.name, hooks = self.pre_index.len(), "running pre_index hooks");
        }
        for hook in &self.pre_index {
            hook(config, classified);
        }
    }

    pub(crate) fn pages_ready(&self, config: &EntityTypeConfig, descriptors: &mut Vec<PageDescriptor>) {
        if !self.pages_ready.is_empty() {
            debug!(entity_type = %config.name, hooks = self.pages_ready.len(), "running pages_ready hooks");
        }
        for hook in &self.pages_ready {
            hook(config, descriptors);
        }
    }

    pub(crate) fn generator_finalized(&self, site: &SiteContext, descriptors: &mut Vec<PageDescriptor>) {
        if !self.generator_finalized.is_empty() {
            debug!(hooks = self.generator_finalized.len(), "running generator_finalized hooks");
        }
        for hook in &self.generator_finalized {
            hook(site, descriptors);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_hooks_run_in_registration_order() {
        let mut hooks = Hooks::new();
        hooks
            .on_generator_init(|configs| configs.clear())
            .on_generator_init(|configs| assert!(configs.is_empty()));

        let mut configs = Vec::new();
        hooks.generator_init(&mut configs);
        assert!(configs.is_empty());
    }

    #[test]
    fn test_cloned_hooks_share_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut hooks = Hooks::new();
        hooks.on_generator_init(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cloned = hooks.clone();
        hooks.generator_init(&mut Vec::new());
        cloned.generator_init(&mut Vec::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(format!("{hooks:?}").contains("generator_init: 1"));
    }
}
