//! Property tests for pagination, sorting and indexing.

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use strata_core::{Entity, Status, Taxon};
use strata_generator::{AttributeSorter, EntityIndices, Paginator, SortStrategy};

const TAGS: [&str; 4] = ["rust", "web", "cli", "db"];

fn entity(id: usize, day: Option<u32>, tags: &[usize]) -> Arc<Entity> {
    Arc::new(Entity {
        entity_type: "Article".to_string(),
        source_path: PathBuf::from(format!("article/{id}.md")),
        metadata: Default::default(),
        body: String::new(),
        status: Status::Published,
        lang: "en".to_string(),
        slug: format!("post-{id}"),
        title: format!("Post {id}"),
        category: None,
        tags: tags.iter().map(|&t| Taxon::new(TAGS[t])).collect(),
        authors: Vec::new(),
        date: day.map(|d| Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()),
        modified: None,
        template: "article".to_string(),
        save_as: PathBuf::new(),
        url: String::new(),
        override_save_as: false,
        translations: Vec::new(),
        translation_of: None,
    })
}

/// Entities with few distinct dates, so ties are common.
fn entities() -> impl Strategy<Value = Vec<Arc<Entity>>> {
    prop::collection::vec(
        (
            prop::option::weighted(0.8, 1u32..4),
            prop::collection::btree_set(0usize..TAGS.len(), 0..3),
        ),
        0..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(id, (day, tags))| entity(id, day, &tags.into_iter().collect::<Vec<_>>()))
            .collect()
    })
}

fn slugs(entities: &[Arc<Entity>]) -> Vec<String> {
    entities.iter().map(|e| e.slug.clone()).collect()
}

proptest! {
    #[test]
    fn pagination_covers_sequence(len in 0usize..200, size in 1usize..20) {
        let items: Vec<usize> = (0..len).collect();
        let pages = Paginator::new(size).paginate(&items);

        let expected = if len == 0 { 1 } else { len.div_ceil(size) };
        prop_assert_eq!(pages.len(), expected);
        for (i, page) in pages.iter().enumerate() {
            prop_assert_eq!(page.number, i + 1);
            prop_assert_eq!(page.total_pages, expected);
            prop_assert!(page.items.len() <= size);
        }
        let joined: Vec<usize> = pages.into_iter().flat_map(|p| p.items).collect();
        prop_assert_eq!(joined, items);
    }

    #[test]
    fn sorting_is_stable_and_repeatable(input in entities()) {
        let sorter = AttributeSorter::new(vec!["date".to_string()], true);

        let mut once = input.clone();
        sorter.sort(&mut once);
        let mut twice = once.clone();
        sorter.sort(&mut twice);
        prop_assert_eq!(slugs(&once), slugs(&twice));

        // Newest first, undated last, ties in input order.
        let position = |e: &Arc<Entity>| input.iter().position(|x| Arc::ptr_eq(x, e));
        for pair in once.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            match (a.date, b.date) {
                (Some(x), Some(y)) => {
                    prop_assert!(x >= y);
                    if x == y {
                        prop_assert!(position(a) < position(b));
                    }
                }
                (None, Some(_)) => prop_assert!(false, "undated entity before dated one"),
                (None, None) => prop_assert!(position(a) < position(b)),
                (Some(_), None) => {}
            }
        }
    }

    #[test]
    fn tag_index_matches_tagged_entities(input in entities()) {
        let mut indices = EntityIndices::build(&input);
        indices.sort(&AttributeSorter::new(vec!["date".to_string()], true));

        for entity in &input {
            for tag in &entity.tags {
                let bucket = indices.tags.get(&tag.slug);
                prop_assert!(bucket.is_some_and(|b| b.entities.iter().any(|e| Arc::ptr_eq(e, entity))));
            }
        }

        let indexed: BTreeSet<String> = indices
            .tags
            .iter()
            .flat_map(|bucket| bucket.entities.iter().map(|e| e.slug.clone()))
            .collect();
        let tagged: BTreeSet<String> = input
            .iter()
            .filter(|e| !e.tags.is_empty())
            .map(|e| e.slug.clone())
            .collect();
        prop_assert_eq!(indexed, tagged);

        let archived: usize = indices.archive.iter().map(|(_, entities)| entities.len()).sum();
        prop_assert_eq!(archived, input.iter().filter(|e| e.date.is_some()).count());
    }
}
