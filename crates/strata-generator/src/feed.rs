//! Atom and RSS serialisation of feed descriptors.

use std::sync::Arc;

use atom_syndication::{
    Category as AtomCategory, Content as AtomContent, Entry, Feed, Link, Person, Text,
};
use chrono::{DateTime, Utc};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use strata_core::{Config, Entity, FeedFormat, FeedScope};
use tracing::debug;

use crate::descriptor::FeedSpec;

/// Turns the entities of a feed descriptor into a feed document.
pub trait FeedSerializer: Send + Sync {
    /// `url` is the feed's own site-relative URL.
    fn serialize(&self, entities: &[Arc<Entity>], target: &FeedSpec, url: &str) -> String;
}

/// Serialiser backed by `atom_syndication` and `rss`.
#[derive(Debug, Clone)]
pub struct SyndicationSerializer {
    config: Config,
}

impl SyndicationSerializer {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Feed timestamp: the newest entity date, or the epoch for an empty feed.
    ///
    /// Never wall-clock time, so repeated builds produce identical feeds.
    fn updated(entities: &[Arc<Entity>]) -> DateTime<Utc> {
        entities
            .iter()
            .filter_map(|entity| entity.modified.or(entity.date))
            .max()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    fn description(&self) -> &str {
        self.config
            .site
            .description
            .as_deref()
            .unwrap_or(&self.config.site.name)
    }

    fn language<'a>(&'a self, target: &'a FeedSpec) -> &'a str {
        match target.scope {
            FeedScope::Translation => {
                target.label.as_deref().unwrap_or(&self.config.site.default_lang)
            }
            _ => &self.config.site.default_lang,
        }
    }

    fn atom(&self, entities: &[Arc<Entity>], target: &FeedSpec, url: &str) -> String {
        let mut feed = Feed::default();
        feed.set_title(target.title.as_str());
        feed.set_subtitle(Some(Text::plain(self.description())));
        feed.set_id(self.config.url_for(url));
        feed.set_updated(Self::updated(entities));

        let mut self_link = Link::default();
        self_link.set_href(self.config.url_for(url));
        self_link.set_rel("self");
        self_link.set_mime_type(Some("application/atom+xml".to_string()));
        let mut site_link = Link::default();
        site_link.set_href(self.config.url_for(""));
        feed.set_links(vec![self_link, site_link]);

        feed.set_entries(
            entities
                .iter()
                .map(|entity| self.atom_entry(entity))
                .collect::<Vec<_>>(),
        );
        feed.to_string()
    }

    fn atom_entry(&self, entity: &Entity) -> Entry {
        let url = self.config.url_for(&entity.url);
        let mut entry = Entry::default();
        entry.set_title(entity.title.as_str());
        entry.set_id(url.clone());

        let mut link = Link::default();
        link.set_href(url);
        link.set_mime_type(Some("text/html".to_string()));
        link.set_hreflang(Some(entity.lang.clone()));
        entry.set_links(vec![link]);

        let mut content = AtomContent::default();
        content.set_value(Some(entity.body.clone()));
        content.set_content_type(Some("html".to_string()));
        entry.set_content(Some(content));

        if let Some(date) = entity.date {
            entry.set_published(Some(date.fixed_offset()));
        }
        let updated = entity.modified.or(entity.date).unwrap_or(DateTime::UNIX_EPOCH);
        entry.set_updated(updated.fixed_offset());

        entry.set_authors(
            entity
                .authors
                .iter()
                .map(|author| {
                    let mut person = Person::default();
                    person.set_name(author.name.as_str());
                    person
                })
                .collect::<Vec<_>>(),
        );
        entry.set_categories(
            entity
                .category
                .iter()
                .chain(&entity.tags)
                .map(|taxon| {
                    let mut category = AtomCategory::default();
                    category.set_term(taxon.slug.as_str());
                    category.set_label(Some(taxon.name.clone()));
                    category
                })
                .collect::<Vec<_>>(),
        );
        entry
    }

    fn rss(&self, entities: &[Arc<Entity>], target: &FeedSpec) -> String {
        let items: Vec<Item> = entities.iter().map(|entity| self.rss_item(entity)).collect();

        ChannelBuilder::default()
            .title(target.title.clone())
            .link(self.config.url_for(""))
            .description(self.description().to_string())
            .language(Some(self.language(target).to_string()))
            .last_build_date(Some(Self::updated(entities).to_rfc2822()))
            .items(items)
            .build()
            .to_string()
    }

    fn rss_item(&self, entity: &Entity) -> Item {
        let url = self.config.url_for(&entity.url);
        let guid = GuidBuilder::default().value(url.clone()).permalink(true).build();

        let mut builder = ItemBuilder::default();
        builder.title(Some(entity.title.clone()));
        builder.link(Some(url));
        builder.guid(Some(guid));
        builder.description(Some(entity.body.clone()));

        if let Some(date) = entity.date {
            builder.pub_date(Some(date.to_rfc2822()));
        }
        if let Some(author) = entity.authors.first() {
            builder.author(Some(author.name.clone()));
        }

        let categories: Vec<_> = entity
            .category
            .iter()
            .chain(&entity.tags)
            .map(|taxon| CategoryBuilder::default().name(taxon.name.clone()).build())
            .collect();
        if !categories.is_empty() {
            builder.categories(categories);
        }

        builder.build()
    }
}

impl FeedSerializer for SyndicationSerializer {
    fn serialize(&self, entities: &[Arc<Entity>], target: &FeedSpec, url: &str) -> String {
        debug!(
            title = %target.title,
            format = ?target.format,
            count = entities.len(),
            "serialising feed"
        );
        match target.format {
            FeedFormat::Atom => self.atom(entities, target, url),
            FeedFormat::Rss => self.rss(entities, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use strata_core::{Status, Taxon, content::parse_date};

    use super::*;

    fn config() -> Config {
        Config::from_toml(
            r#"
[site]
name = "Test Blog"
url = "https://example.com"
description = "A test blog"
"#,
        )
        .unwrap()
    }

    fn entity(title: &str, date: &str) -> Arc<Entity> {
        let slug = title.to_lowercase();
        Arc::new(Entity {
            entity_type: "Article".to_string(),
            source_path: PathBuf::from(format!("article/{slug}.md")),
            metadata: Default::default(),
            body: format!("<p>{title}</p>"),
            status: Status::Published,
            lang: "en".to_string(),
            title: title.to_string(),
            category: None,
            tags: vec![Taxon::new("Rust")],
            authors: vec![Taxon::new("Ann")],
            date: parse_date(date),
            modified: None,
            template: "article".to_string(),
            save_as: PathBuf::from(format!("article/{slug}.html")),
            url: format!("article/{slug}.html"),
            slug,
            override_save_as: false,
            translations: Vec::new(),
            translation_of: None,
        })
    }

    fn target(format: FeedFormat) -> FeedSpec {
        FeedSpec {
            scope: FeedScope::Published,
            format,
            title: "Test Blog".to_string(),
            label: None,
        }
    }

    #[test]
    fn test_atom_feed() {
        let serializer = SyndicationSerializer::new(config());
        let entities = vec![entity("Second", "2020-06-01"), entity("First", "2020-01-01")];

        let xml = serializer.serialize(&entities, &target(FeedFormat::Atom), "feeds/all.atom.xml");

        assert!(xml.contains("Test Blog"));
        assert!(xml.contains("https://example.com/feeds/all.atom.xml"));
        assert!(xml.contains("https://example.com/article/second.html"));
        assert!(xml.contains("2020-06-01T00:00:00+00:00"));
        assert!(xml.contains("<name>Ann</name>"));
        assert!(xml.find("Second") < xml.find("First"));
    }

    #[test]
    fn test_rss_feed() {
        let serializer = SyndicationSerializer::new(config());
        let entities = vec![entity("Only", "2020-01-01")];

        let xml = serializer.serialize(&entities, &target(FeedFormat::Rss), "feeds/all.rss.xml");

        assert!(xml.contains("<title>Test Blog</title>"));
        assert!(xml.contains("<link>https://example.com/article/only.html</link>"));
        assert!(xml.contains("<category>Rust</category>"));
        assert!(xml.contains("<description>A test blog</description>"));
    }

    #[test]
    fn test_feed_output_is_stable() {
        let serializer = SyndicationSerializer::new(config());
        let entities = vec![entity("Only", "2020-01-01")];
        let first = serializer.serialize(&entities, &target(FeedFormat::Rss), "rss.xml");
        let second = serializer.serialize(&entities, &target(FeedFormat::Rss), "rss.xml");
        assert_eq!(first, second);

        let empty = serializer.serialize(&[], &target(FeedFormat::Atom), "atom.xml");
        assert!(empty.contains("1970-01-01T00:00:00+00:00"));
    }
}
