//! Error types for the Strata core library.
//!
//! Errors fall into two groups. Per-record problems (`Validation`, `Read`) are
//! collected into [`Diagnostics`] and reported at the end of a run; everything
//! else aborts the phase it occurred in.

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::stage::Stage;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for Strata.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid or inconsistent configuration. Always fatal.
    #[error("configuration error in {}: {message}", .entity_type.as_deref().unwrap_or("site"))]
    Configuration {
        entity_type: Option<String>,
        message: String,
    },

    /// A content record failed validation and was skipped.
    #[error("validation error in {entity_type} {}: {message}", .path.display())]
    Validation {
        entity_type: String,
        path: PathBuf,
        message: String,
    },

    /// A content file could not be read and was skipped.
    #[error("read error in {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// A single output could not be rendered or written.
    #[error("write error for {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// A fatal error annotated with the entity type and phase that raised it.
    #[error("{entity_type} failed while {stage}: {source}")]
    Phase {
        entity_type: String,
        stage: Stage,
        #[source]
        source: Box<CoreError>,
    },

    /// Strict mode escalated collected per-record errors to a fatal error.
    #[error("strict mode: {} error(s) in {entity_type}{}", .errors.len(), render_list(.errors))]
    Strict {
        entity_type: String,
        errors: Vec<CoreError>,
    },

    /// A sub-generator stage was called out of order.
    #[error("{entity_type}: cannot move from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        from: Stage,
        to: Stage,
    },

    /// Work for an entity type was not started because the run was cancelled.
    #[error("{entity_type}: cancelled after a failure elsewhere in the run")]
    Cancelled { entity_type: String },

    /// File system I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic configuration crate error.
    #[error("config crate error: {0}")]
    ConfigCrate(#[from] config::ConfigError),
}

fn render_list(errors: &[CoreError]) -> String {
    errors.iter().map(|e| format!("\n  - {e}")).collect()
}

impl CoreError {
    /// Create a site-level configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            entity_type: None,
            message: message.into(),
        }
    }

    /// Create a configuration error scoped to one entity type.
    pub fn type_configuration(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity_type: Some(entity_type.into()),
            message: message.into(),
        }
    }

    /// Create a validation error for one content record.
    pub fn validation(
        entity_type: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity_type: entity_type.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a read error for one content file.
    pub fn read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a write error for one output.
    pub fn write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a fatal error with the entity type and stage it happened in.
    ///
    /// Errors that already carry that context are returned unchanged.
    pub fn in_phase(self, entity_type: impl Into<String>, stage: Stage) -> Self {
        match self {
            Self::Phase { .. } | Self::Strict { .. } | Self::Cancelled { .. } => self,
            other => Self::Phase {
                entity_type: entity_type.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Whether this error aborts the run rather than being collected.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation { .. } | Self::Read { .. })
    }
}

/// Non-fatal errors collected during a run, in the order they occurred.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CoreError>,
}

impl Diagnostics {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn push(&mut self, error: CoreError) {
        self.errors.push(error);
    }

    /// Move every error from `other` into this collection.
    pub fn append(&mut self, other: &mut Diagnostics) {
        self.errors.append(&mut other.errors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreError> {
        self.errors.iter()
    }

    /// Take the collected errors, leaving the collection empty.
    pub fn take(&mut self) -> Vec<CoreError> {
        std::mem::take(&mut self.errors)
    }

    /// Turn the collection into a fatal strict-mode error if it is not empty.
    pub fn escalate(&mut self, entity_type: &str) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(CoreError::Strict {
            entity_type: entity_type.to_string(),
            errors: self.take(),
        })
    }
}

impl IntoIterator for Diagnostics {
    type Item = CoreError;
    type IntoIter = std::vec::IntoIter<CoreError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl Extend<CoreError> for Diagnostics {
    fn extend<T: IntoIterator<Item = CoreError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_entity_type() {
        let err = CoreError::type_configuration("Article", "unknown placeholder {foo}");
        let msg = err.to_string();
        assert!(msg.contains("configuration error in Article"));
        assert!(msg.contains("{foo}"));

        let err = CoreError::configuration("site.name cannot be empty");
        assert!(err.to_string().contains("configuration error in site"));
    }

    #[test]
    fn test_validation_error_is_not_fatal() {
        let err = CoreError::validation("Article", "article/post.md", "missing date");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("article/post.md"));

        assert!(!CoreError::read("a.md", "bad yaml").is_fatal());
        assert!(CoreError::write("out.html", "denied").is_fatal());
        assert!(CoreError::configuration("x").is_fatal());
    }

    #[test]
    fn test_in_phase_wraps_once() {
        let err = CoreError::configuration("bad").in_phase("Article", Stage::Discovered);
        assert!(matches!(err, CoreError::Phase { .. }));
        assert!(err.to_string().contains("Article failed while"));

        let again = err.in_phase("Page", Stage::Indexed);
        match again {
            CoreError::Phase { entity_type, .. } => assert_eq!(entity_type, "Article"),
            other => panic!("expected phase error, got {other:?}"),
        }
    }

    #[test]
    fn test_diagnostics_escalate_reports_every_error() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.escalate("Article").is_ok());

        diagnostics.push(CoreError::validation("Article", "a.md", "missing date"));
        diagnostics.push(CoreError::read("b.md", "bad front matter"));
        assert_eq!(diagnostics.len(), 2);

        let err = diagnostics.escalate("Article").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2 error(s) in Article"));
        assert!(msg.contains("a.md"));
        assert!(msg.contains("b.md"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(err.to_string().contains("IO error"));
        assert!(err.is_fatal());
    }
}
