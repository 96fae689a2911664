//! Build command - generates the site

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr, bail};
use strata_generator::Builder;

use super::{load_config, print_errors};

/// Run the build command.
///
/// Generates every entity type and writes the rendered pages and feeds.
pub fn run(config_path: &Path, output: Option<&Path>, strict: bool) -> Result<()> {
    let start = Instant::now();
    tracing::info!(?config_path, ?output, strict, "Starting build");

    let mut config = load_config(config_path)?;
    if let Some(output) = output {
        config.build.output_dir = output.to_path_buf();
    }
    config.build.strict |= strict;
    let output_dir = config.build.output_dir.clone();

    let report = Builder::new(config)
        .wrap_err("Failed to prepare build")?
        .build()
        .wrap_err("Build failed")?;
    let stats = &report.stats;

    println!();
    println!("  Entity types: {}", stats.entity_types);
    println!("  Entities:     {}", stats.entities);
    println!("  Pages:        {}", stats.pages);
    println!("  Feeds:        {}", stats.feeds);
    println!();
    println!("  Duration:     {:.2}s", start.elapsed().as_secs_f64());
    println!("  Output:       {}", output_dir.display());

    let errors = print_errors(report.diagnostics.iter().chain(&report.write_errors));
    println!();

    tracing::info!(?stats, "Build finished");

    if errors > 0 {
        bail!("Build finished with {errors} error(s)");
    }
    println!("  Build completed successfully!");
    Ok(())
}
