//! Strata Core Library
//!
//! Core types, settings resolution, content reading and error handling for the
//! Strata entity generator.

pub mod config;
pub mod content;
pub mod entity_type;
pub mod error;
pub mod frontmatter;
pub mod pattern;
pub mod stage;

pub use config::{BuildConfig, Config, SiteConfig};
pub use content::{Entity, MetaValue, Metadata, Status, Taxon, TranslationLink};
pub use entity_type::{
    DirectTemplate, EntityTypeConfig, FeedFormat, FeedScope, Route, RouteKind, SorterSpec,
    TranslationTieBreak,
};
pub use error::{CoreError, Diagnostics, Result};
pub use frontmatter::{ContentReader, FrontmatterReader, RawContent};
pub use pattern::{Pattern, PatternValues};
pub use stage::Stage;
