//! Check command - resolve configuration and run generation without writing

use std::{collections::BTreeMap, path::Path};

use color_eyre::eyre::{Result, WrapErr, bail};
use strata_generator::Builder;

use super::{load_config, print_errors};

/// Run the check command.
///
/// Resolves every entity type, runs the generator and reports what a build
/// would write.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration and content");

    println!("Checking configuration...");
    let mut config = load_config(config_path)?;
    config.build.strict |= strict;
    let builder = Builder::new(config).wrap_err("Configuration invalid")?;
    println!("  ✓ Configuration valid");

    println!("\nGenerating...");
    let output = builder.generate().wrap_err("Generation failed")?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for descriptor in &output.descriptors {
        *counts.entry(descriptor.entity_type.as_str()).or_default() += 1;
    }
    for context in output.site.iter() {
        println!(
            "  {}: {} published, {} translations, {} drafts, {} outputs",
            context.name,
            context.entities.len(),
            context.translations.len(),
            context.drafts.len(),
            counts.get(context.name.as_str()).copied().unwrap_or(0)
        );
    }

    let errors = print_errors(output.diagnostics.iter());
    if errors > 0 {
        bail!("Check failed with {errors} error(s)");
    }

    println!();
    println!("✓ All checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn site(post: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[site]\nname = \"Test\"\n\n[entity_types.Article]\nTAG_TEMPLATE = \"\"\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("content/article")).unwrap();
        fs::write(dir.path().join("content/article/post.md"), post).unwrap();
        dir
    }

    #[test]
    fn test_check_passes_on_valid_content() {
        let dir = site("---\ntitle: Post\ndate: 2020-01-01\n---\nBody");
        run(&dir.path().join("config.toml"), false).unwrap();
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn test_check_fails_on_collected_errors() {
        let dir = site("---\ntitle: Post\n---\nBody");
        assert!(run(&dir.path().join("config.toml"), false).is_err());
    }

    #[test]
    fn test_check_fails_on_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(run(&dir.path().join("config.toml"), false).is_err());
    }
}
