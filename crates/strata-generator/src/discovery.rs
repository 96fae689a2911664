//! Content discovery.
//!
//! Walks the source paths of one entity type and reads every accepted file
//! through the configured [`ContentReader`].

use std::{
    collections::BTreeSet,
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use rayon::prelude::*;
use regex::Regex;
use strata_core::{
    ContentReader, CoreError, Diagnostics, EntityTypeConfig, Metadata, Result,
    content::path_to_slash,
};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// One file as read, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Path relative to the content directory.
    pub source_path: PathBuf,
    /// Absolute (or caller-relative) path on disk.
    pub full_path: PathBuf,
    pub metadata: Metadata,
    pub body: String,
}

/// Records read by discovery plus the files that failed.
#[derive(Debug, Default)]
pub struct Discovered {
    pub records: Vec<RawRecord>,
    pub diagnostics: Diagnostics,
}

/// Glob-style path filter.
///
/// A pattern containing `/` matches that relative path or anything below it.
/// A pattern without `/` matches any single path component. `*` matches within
/// a component and `**` across components.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<(String, Regex)>,
}

impl PathFilter {
    /// Compile a list of patterns.
    pub fn new(patterns: &[String]) -> std::result::Result<Self, String> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let trimmed = pattern.trim_matches('/');
                if trimmed.is_empty() {
                    return Err(format!("empty exclude pattern '{pattern}'"));
                }
                let glob = glob_to_regex(trimmed);
                let source = if trimmed.contains('/') {
                    format!("^{glob}(/.*)?$")
                } else {
                    format!("(^|/){glob}(/|$)")
                };
                Regex::new(&source)
                    .map(|regex| (pattern.clone(), regex))
                    .map_err(|e| format!("invalid pattern '{pattern}': {e}"))
            })
            .collect::<std::result::Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// The first pattern matching a `/`-separated relative path.
    #[must_use]
    pub fn matches(&self, relative: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(relative))
            .map(|(pattern, _)| pattern.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Matches single file or directory names against glob patterns.
#[derive(Debug, Clone, Default)]
struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    fn new(patterns: &[String]) -> std::result::Result<Self, String> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^{}$", glob_to_regex(p)))
                    .map_err(|e| format!("invalid pattern '{p}': {e}"))
            })
            .collect::<std::result::Result<_, _>>()?;
        Ok(Self { patterns })
    }

    fn is_ignored(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        name.starts_with('.') || self.patterns.iter().any(|p| p.is_match(&name))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out
}

/// Whether `ancestor` (a `/`-separated content path) is equal to or contains `path`.
#[must_use]
pub fn contains_path(ancestor: &str, path: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Check that two entity types cannot classify the same file.
///
/// A path of one type that contains a path of the other is allowed only when
/// the containing type excludes the nested path.
pub fn check_overlap(a: &EntityTypeConfig, b: &EntityTypeConfig) -> Result<()> {
    for (outer, inner) in [(a, b), (b, a)] {
        let excludes = PathFilter::new(&outer.excludes)
            .map_err(|e| CoreError::type_configuration(&outer.name, format!("EXCLUDES: {e}")))?;
        for outer_path in &outer.paths {
            for inner_path in &inner.paths {
                if !contains_path(outer_path, inner_path) {
                    continue;
                }
                if outer_path != inner_path && excludes.matches(inner_path).is_some() {
                    continue;
                }
                return Err(CoreError::type_configuration(
                    &inner.name,
                    format!(
                        "path '{inner_path}' is also claimed by entity type {} (path '{outer_path}'); \
                         add it to {}'s EXCLUDES",
                        outer.name, outer.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Discovers and reads the content of one entity type.
pub struct ContentDiscovery<'a> {
    config: &'a EntityTypeConfig,
    content_dir: &'a Path,
    reader: &'a dyn ContentReader,
    cancel: &'a AtomicBool,
}

impl<'a> ContentDiscovery<'a> {
    #[must_use]
    pub fn new(
        config: &'a EntityTypeConfig,
        content_dir: &'a Path,
        reader: &'a dyn ContentReader,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            config,
            content_dir,
            reader,
            cancel,
        }
    }

    /// Enumerate and read every content file of the entity type.
    pub fn discover(&self) -> Result<Discovered> {
        let mut discovered = Discovered::default();
        let files = self.find_files(&mut discovered.diagnostics)?;
        info!(
            entity_type = %self.config.name,
            count = files.len(),
            "found content files"
        );

        let results: Vec<Option<Result<RawRecord>>> = files
            .par_iter()
            .map(|(relative, full)| {
                if self.cancel.load(Ordering::Relaxed) {
                    return None;
                }
                Some(self.read_file(relative, full))
            })
            .collect();

        for result in results {
            match result {
                Some(Ok(record)) => discovered.records.push(record),
                Some(Err(e)) => {
                    warn!(entity_type = %self.config.name, error = %e, "failed to read file");
                    discovered.diagnostics.push(e);
                }
                None => {
                    return Err(CoreError::Cancelled {
                        entity_type: self.config.name.clone(),
                    });
                }
            }
        }

        Ok(discovered)
    }

    fn read_file(&self, relative: &Path, full: &Path) -> Result<RawRecord> {
        let content = self.reader.read(full).map_err(|e| match e {
            CoreError::Read { message, .. } => CoreError::read(relative, message),
            other => CoreError::read(relative, other.to_string()),
        })?;
        trace!(path = %relative.display(), "read content file");
        Ok(RawRecord {
            source_path: relative.to_path_buf(),
            full_path: full.to_path_buf(),
            metadata: content.metadata,
            body: content.body,
        })
    }

    /// Walk the configured paths, returning (relative, full) pairs in walk order.
    fn find_files(&self, diagnostics: &mut Diagnostics) -> Result<Vec<(PathBuf, PathBuf)>> {
        let name = &self.config.name;
        let excludes = PathFilter::new(&self.config.excludes)
            .map_err(|e| CoreError::type_configuration(name, format!("EXCLUDES: {e}")))?;
        let ignored = NameFilter::new(&self.config.ignore_files)
            .map_err(|e| CoreError::type_configuration(name, format!("IGNORE_FILES: {e}")))?;

        let mut seen = BTreeSet::new();
        let mut files = Vec::new();

        for source in &self.config.paths {
            let root = if source.is_empty() {
                self.content_dir.to_path_buf()
            } else {
                self.content_dir.join(source)
            };
            if !root.exists() {
                debug!(entity_type = %name, path = %root.display(), "source path does not exist");
                continue;
            }

            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !ignored.is_ignored(entry.file_name()));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().unwrap_or(&root).to_path_buf();
                        warn!(entity_type = %name, path = %path.display(), error = %e, "failed to walk path");
                        diagnostics.push(CoreError::read(path, e.to_string()));
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let full = entry.path();
                if !self.reader.accepts(full) {
                    trace!(path = %full.display(), "skipping file with unhandled extension");
                    continue;
                }

                let relative = full.strip_prefix(self.content_dir).unwrap_or(full);
                let relative_str = path_to_slash(relative);
                if !seen.insert(relative_str.clone()) {
                    continue;
                }
                if let Some(pattern) = excludes.matches(&relative_str) {
                    debug!(entity_type = %name, path = %relative_str, pattern, "excluded");
                    continue;
                }

                files.push((relative.to_path_buf(), full.to_path_buf()));
            }
        }

        Ok(files)
    }
}
