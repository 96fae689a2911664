//! Command implementations.

pub mod build;
pub mod check;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use strata_core::{Config, CoreError};

/// Load the configuration with `STRATA_*` environment overrides and resolve
/// its directories against the configuration file's directory.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let mut config = Config::load_with_env(config_path)
        .wrap_err_with(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(root) = config_path.parent() {
        config.relative_to(root);
    }
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

/// Print a consolidated error list.
fn print_errors<'a>(errors: impl IntoIterator<Item = &'a CoreError>) -> usize {
    let mut count = 0;
    for error in errors {
        if count == 0 {
            println!();
            println!("  Errors:");
        }
        println!("  ✗ {error}");
        count += 1;
    }
    count
}
