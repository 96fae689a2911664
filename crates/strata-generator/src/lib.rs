//! Strata Generator Library
//!
//! Entity classification, indexing and page generation engine for Strata.
//!
//! # Modules
//!
//! - [`discovery`] - Content discovery per entity type
//! - [`builder`] - Entity construction, validation and translation clustering
//! - [`index`] - Tag, category, author and date-archive indices
//! - [`sorter`] - Pluggable sort strategies
//! - [`paginator`] - Fixed-size pagination
//! - [`descriptor`] - Page descriptors handed to the writer
//! - [`hooks`] - Lifecycle extension points
//! - [`subgenerator`] - Per-type pipeline state machine
//! - [`generator`] - Two-phase orchestration across entity types
//! - [`template`] - Template rendering with variable interpolation
//! - [`feed`] - Atom and RSS serialisation
//! - [`writer`] - Atomic output writing
//! - [`build`] - Build orchestration

pub mod build;
pub mod builder;
pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod feed;
pub mod generator;
pub mod hooks;
pub mod index;
pub mod paginator;
pub mod sorter;
pub mod subgenerator;
pub mod template;
pub mod writer;

pub use build::{BuildReport, BuildStats, Builder};
pub use builder::{Classified, EntityBuilder, TranslationCluster};
pub use context::{EntityTypeContext, SiteContext};
pub use descriptor::{FeedSpec, PageDescriptor, PageKind};
pub use discovery::{ContentDiscovery, Discovered, RawRecord};
pub use feed::{FeedSerializer, SyndicationSerializer};
pub use generator::{EntityGenerator, GeneratorOutput};
pub use hooks::Hooks;
pub use index::{ArchiveIndex, EntityIndices, Index, IndexBucket};
pub use paginator::{Page, Paginator};
pub use sorter::{AttributeSorter, SortStrategy, SortValue, SorterRegistry};
pub use subgenerator::{
    DefaultSubGenerator, EntitySubGenerator, PipelineEnv, SubGeneratorRegistry,
};
pub use template::{Template, TemplateError, TemplateRegistry, TemplateRenderer};
pub use writer::{FsWriter, Writer};
