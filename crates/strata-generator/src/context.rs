//! Cross-type context snapshot.
//!
//! Built once every entity type has reached `Indexed`, then shared read-only
//! with every sub-generator and renderer.

use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock},
};

use serde::Serialize;
use serde_json::Value;
use strata_core::Entity;

use crate::index::{ArchiveIndex, Index};

/// Indexed data of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityTypeContext {
    pub name: String,
    pub namespace: String,
    /// Published representatives, sorted.
    pub entities: Vec<Arc<Entity>>,
    /// Published non-representative cluster members.
    pub translations: Vec<Arc<Entity>>,
    pub drafts: Vec<Arc<Entity>>,
    pub draft_translations: Vec<Arc<Entity>>,
    pub tags: Index,
    pub categories: Index,
    pub authors: Index,
    pub archives: ArchiveIndex,
    /// Pass-through settings of the type.
    pub settings: Value,
}

/// Every entity type's context, keyed by namespace.
#[derive(Debug, Default)]
pub struct SiteContext {
    types: BTreeMap<String, EntityTypeContext>,
    json: OnceLock<Value>,
}

impl SiteContext {
    #[must_use]
    pub fn new(types: impl IntoIterator<Item = EntityTypeContext>) -> Self {
        Self {
            types: types
                .into_iter()
                .map(|context| (context.namespace.clone(), context))
                .collect(),
            json: OnceLock::new(),
        }
    }

    /// Context of the type with the given namespace.
    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<&EntityTypeContext> {
        self.types.get(namespace)
    }

    /// Types in namespace order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityTypeContext> {
        self.types.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// JSON form handed to templates as `site`, serialised on first use.
    pub fn to_json(&self) -> &Value {
        self.json
            .get_or_init(|| serde_json::to_value(&self.types).unwrap_or(Value::Null))
    }
}

impl PartialEq for SiteContext {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}
