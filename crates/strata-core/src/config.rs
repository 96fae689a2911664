//! Site configuration management.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for Strata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Entity-type settings applied to every declared type.
    #[serde(default)]
    pub settings: toml::Table,

    /// Declared entity types and their overrides, keyed by type name.
    #[serde(default)]
    pub entity_types: BTreeMap<String, toml::Table>,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name.
    pub name: String,

    /// Base URL for the site (e.g., "https://example.com").
    #[serde(default)]
    pub url: String,

    /// Default language code.
    #[serde(default = "default_lang")]
    pub default_lang: String,

    /// Supported languages in priority order.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Site description for feeds and meta tags.
    #[serde(default)]
    pub description: Option<String>,

    /// Site author name.
    #[serde(default)]
    pub author: Option<String>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory content paths are resolved against.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Output directory for the generated site.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory of `*.html` template overrides.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Escalate collected per-record errors to a fatal error.
    #[serde(default)]
    pub strict: bool,

    /// Remove the output directory before writing.
    #[serde(default)]
    pub delete_output_directory: bool,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            templates_dir: None,
            strict: false,
            delete_output_directory: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            CoreError::Toml(e) => CoreError::configuration(format!(
                "failed to parse config file {}: {e}",
                path.display()
            )),
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment overrides (`STRATA_BUILD__STRICT=true`).
    ///
    /// The `config` crate folds keys to lower case; entity-type settings are
    /// case-insensitive so this only affects how type names are displayed.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("STRATA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, filling in derived defaults.
    fn validate(&mut self) -> Result<()> {
        if self.site.name.trim().is_empty() {
            return Err(CoreError::configuration("site.name cannot be empty"));
        }

        if self.site.default_lang.trim().is_empty() {
            return Err(CoreError::configuration("site.default_lang cannot be empty"));
        }

        if self.site.url.ends_with('/') {
            tracing::warn!("site.url should not have a trailing slash");
        }

        if self.site.languages.is_empty() {
            self.site.languages.push(self.site.default_lang.clone());
        } else if !self.site.languages.contains(&self.site.default_lang) {
            tracing::warn!(
                default_lang = %self.site.default_lang,
                "site.languages does not list the default language, appending it"
            );
            self.site.languages.push(self.site.default_lang.clone());
        }

        Ok(())
    }

    /// Resolve `content_dir` and `output_dir` against the directory holding the config file.
    pub fn relative_to(&mut self, root: &Path) {
        if self.build.content_dir.is_relative() {
            self.build.content_dir = root.join(&self.build.content_dir);
        }
        if self.build.output_dir.is_relative() {
            self.build.output_dir = root.join(&self.build.output_dir);
        }
        if let Some(templates) = &self.build.templates_dir
            && templates.is_relative()
        {
            self.build.templates_dir = Some(root.join(templates));
        }
    }

    /// Get the full URL for a site-relative path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
