//! Sub-generator lifecycle stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of one entity type's pipeline.
///
/// Stages only move forward, one step at a time:
/// `Created → Discovered → Classified → Indexed → PagesBuilt → Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    Discovered,
    Classified,
    Indexed,
    PagesBuilt,
    Finalized,
}

impl Stage {
    /// The stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Discovered),
            Self::Discovered => Some(Self::Classified),
            Self::Classified => Some(Self::Indexed),
            Self::Indexed => Some(Self::PagesBuilt),
            Self::PagesBuilt => Some(Self::Finalized),
            Self::Finalized => None,
        }
    }

    /// Human-readable description of the work that produces this stage.
    #[must_use]
    pub fn activity(self) -> &'static str {
        match self {
            Self::Created => "initialising",
            Self::Discovered => "discovering content",
            Self::Classified => "classifying entities",
            Self::Indexed => "building indices",
            Self::PagesBuilt => "building page descriptors",
            Self::Finalized => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.activity())
    }
}
