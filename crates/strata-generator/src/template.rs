//! Template rendering for page descriptors.
//!
//! A small interpolation language over JSON contexts:
//!
//! - `{{ path.to.value }}` inserts a value; a missing value is an error.
//! - `{{ path? }}` inserts a value or nothing.
//! - `{{#each path}}…{{/each}}` repeats its body per list item. Inside, paths
//!   resolve against the item first, then the enclosing scopes; `this` is
//!   the item itself.
//! - Paths starting with `site.` resolve against the cross-type context.

use std::{collections::BTreeMap, fs, path::Path};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Invalid template syntax.
    #[error("invalid template syntax in {template}: {message}")]
    InvalidSyntax { template: String, message: String },

    /// IO error while loading templates.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Renders a named template against a page context.
pub trait TemplateRenderer: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    /// `site` is the JSON form of the cross-type context.
    fn render(&self, name: &str, context: &Value, site: &Value) -> Result<String>;
}

/// One named template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, context: &Value, site: &Value) -> Result<String> {
        let mut out = String::with_capacity(self.content.len());
        self.render_into(&mut out, &self.content, &[context], site)?;
        Ok(out)
    }

    fn syntax_error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::InvalidSyntax {
            template: self.name.clone(),
            message: message.into(),
        }
    }

    fn render_into(
        &self,
        out: &mut String,
        source: &str,
        scopes: &[&Value],
        site: &Value,
    ) -> Result<()> {
        let mut rest = source;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| self.syntax_error("unclosed {{ delimiter"))?;
            let tag = after[..end].trim();
            rest = &after[end + 2..];

            if let Some(path) = tag.strip_prefix("#each") {
                let path = path.trim();
                let (body, remaining) = self.split_block(rest)?;
                rest = remaining;
                match lookup(path, scopes, site) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            let mut inner = scopes.to_vec();
                            inner.push(item);
                            self.render_into(out, body, &inner, site)?;
                        }
                    }
                    Some(Value::Null) | None => {}
                    Some(_) => {
                        return Err(self.syntax_error(format!("'{path}' is not a list")));
                    }
                }
            } else if tag == "/each" {
                return Err(self.syntax_error("{{/each}} without {{#each}}"));
            } else {
                let (path, optional) = match tag.strip_suffix('?') {
                    Some(stripped) => (stripped.trim(), true),
                    None => (tag, false),
                };
                match lookup(path, scopes, site) {
                    Some(value) if !value.is_null() => push_value(out, value),
                    _ if optional => {}
                    _ => return Err(TemplateError::MissingVariable(path.to_string())),
                }
            }
        }
        out.push_str(rest);
        Ok(())
    }

    /// Split at the `{{/each}}` closing the current block: (body, rest).
    fn split_block<'s>(&self, source: &'s str) -> Result<(&'s str, &'s str)> {
        let mut depth = 0usize;
        let mut pos = 0;
        while let Some(offset) = source[pos..].find("{{") {
            let start = pos + offset;
            let end = source[start..]
                .find("}}")
                .map(|e| start + e + 2)
                .ok_or_else(|| self.syntax_error("unclosed {{ delimiter"))?;
            let tag = source[start + 2..end - 2].trim();
            if tag.starts_with("#each") {
                depth += 1;
            } else if tag == "/each" {
                if depth == 0 {
                    return Ok((&source[..start], &source[end..]));
                }
                depth -= 1;
            }
            pos = end;
        }
        Err(self.syntax_error("{{#each}} without {{/each}}"))
    }
}

/// Resolve a dotted path against the scopes (innermost first) or the site.
fn lookup<'v>(path: &str, scopes: &[&'v Value], site: &'v Value) -> Option<&'v Value> {
    if path == "this" {
        return scopes.last().copied();
    }
    if let Some(site_path) = path.strip_prefix("site.") {
        return descend(site, site_path);
    }
    if path == "site" {
        return Some(site);
    }
    scopes.iter().rev().find_map(|scope| descend(scope, path))
}

fn descend<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

/// Named templates, with built-ins for every page kind.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    /// Create a registry holding the built-in templates.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Template::new("entity", DEFAULT_ENTITY_TEMPLATE));
        registry.register(Template::new("listing", DEFAULT_LISTING_TEMPLATE));
        registry.register(Template::new("direct", DEFAULT_DIRECT_TEMPLATE));
        registry
    }

    /// Register a template, replacing any previous one with the same name.
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Register every `*.html` file in `dir` under its file stem.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "html"))
            .collect();
        paths.sort();

        for path in &paths {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            debug!(template = %name, path = %path.display(), "loaded template");
            self.register(Template::new(name, fs::read_to_string(path)?));
        }
        Ok(paths.len())
    }
}

impl TemplateRenderer for TemplateRegistry {
    fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    fn render(&self, name: &str, context: &Value, site: &Value) -> Result<String> {
        self.get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?
            .render(context, site)
    }
}

/// Built-in template for entity pages.
pub const DEFAULT_ENTITY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ entity.lang }}">
<head>
    <meta charset="UTF-8">
    <title>{{ entity.title }}</title>
</head>
<body>
<article>
    <h1>{{ entity.title }}</h1>
    <time datetime="{{ entity.date? }}">{{ entity.date? }}</time>
    {{ entity.body }}
    <ul class="translations">{{#each entity.translations}}
        <li><a href="/{{ url }}" hreflang="{{ lang }}">{{ lang }}</a></li>{{/each}}
    </ul>
</article>
</body>
</html>
"#;

/// Built-in template for archive, period, category, tag and author pages.
pub const DEFAULT_LISTING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{ entity_type }}</title>
</head>
<body>
<section>
    <h1>{{ entity_type }} {{ category.name? }}{{ tag.name? }}{{ author.name? }}</h1>
    <ul>{{#each page.items}}
        <li><a href="/{{ url }}">{{ title }}</a> <time>{{ date? }}</time></li>{{/each}}
    </ul>
    <nav>
        <a href="/{{ page.previous_url? }}">previous</a>
        {{ page.number }} / {{ page.total_pages }}
        <a href="/{{ page.next_url? }}">next</a>
    </nav>
</section>
</body>
</html>
"#;

/// Built-in template for direct templates.
pub const DEFAULT_DIRECT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{ name }}</title>
</head>
<body>
<main>
    <ul>{{#each page.items}}
        <li><a href="/{{ url }}">{{ title }}</a></li>{{/each}}
    </ul>
    <p>{{ page.number }} / {{ page.total_pages }}</p>
</main>
</body>
</html>
"#;
