//! Tag, category, author and archive indices.
//!
//! Indices reference entities through `Arc`; the published list owns them.
//! Building preserves input order. Sorting is a separate step.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Datelike;
use serde::{Serialize, Serializer, ser::SerializeSeq};
use strata_core::{Entity, Taxon};

use crate::sorter::SortStrategy;

/// Entities sharing one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBucket {
    pub taxon: Taxon,
    pub entities: Vec<Arc<Entity>>,
}

/// Label → entities, keyed by label slug.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    buckets: BTreeMap<String, IndexBucket>,
}

impl Index {
    fn insert(&mut self, taxon: &Taxon, entity: &Arc<Entity>) {
        self.buckets
            .entry(taxon.slug.clone())
            .or_insert_with(|| IndexBucket {
                taxon: taxon.clone(),
                entities: Vec::new(),
            })
            .entities
            .push(Arc::clone(entity));
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&IndexBucket> {
        self.buckets.get(slug)
    }

    /// Buckets in slug order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &IndexBucket> {
        self.buckets.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn sort(&mut self, sorter: &dyn SortStrategy) {
        for bucket in self.buckets.values_mut() {
            sorter.sort(&mut bucket.entities);
        }
    }
}

impl Serialize for Index {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.buckets.len()))?;
        for bucket in self.buckets.values() {
            seq.serialize_element(bucket)?;
        }
        seq.end()
    }
}

/// Archive bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Serialize)]
struct ArchiveBucket<'a> {
    year: i32,
    month: u32,
    entities: &'a [Arc<Entity>],
}

/// (year, month) → entities dated in that month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveIndex {
    buckets: BTreeMap<YearMonth, Vec<Arc<Entity>>>,
}

impl ArchiveIndex {
    #[must_use]
    pub fn get(&self, year: i32, month: u32) -> Option<&[Arc<Entity>]> {
        self.buckets
            .get(&YearMonth { year, month })
            .map(Vec::as_slice)
    }

    /// Buckets in chronological order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&YearMonth, &Vec<Arc<Entity>>)> {
        self.buckets.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Serialize for ArchiveIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.buckets.len()))?;
        for (key, entities) in &self.buckets {
            seq.serialize_element(&ArchiveBucket {
                year: key.year,
                month: key.month,
                entities,
            })?;
        }
        seq.end()
    }
}

/// Every index of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityIndices {
    pub tags: Index,
    pub categories: Index,
    pub authors: Index,
    pub archive: ArchiveIndex,
}

impl EntityIndices {
    /// Build indices over published representatives, in input order.
    #[must_use]
    pub fn build(entities: &[Arc<Entity>]) -> Self {
        let mut indices = Self::default();
        for entity in entities {
            for tag in &entity.tags {
                indices.tags.insert(tag, entity);
            }
            if let Some(category) = &entity.category {
                indices.categories.insert(category, entity);
            }
            for author in &entity.authors {
                indices.authors.insert(author, entity);
            }
            if let Some(date) = entity.date {
                indices
                    .archive
                    .buckets
                    .entry(YearMonth {
                        year: date.year(),
                        month: date.month(),
                    })
                    .or_default()
                    .push(Arc::clone(entity));
            }
        }
        indices
    }

    /// Order every bucket with the same sorter.
    pub fn sort(&mut self, sorter: &dyn SortStrategy) {
        self.tags.sort(sorter);
        self.categories.sort(sorter);
        self.authors.sort(sorter);
        for entities in self.archive.buckets.values_mut() {
            sorter.sort(entities);
        }
    }
}
