//! Strata CLI
//!
//! Builds static sites from entity-typed content trees.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Strata.
#[derive(Parser)]
#[command(name = "strata", version, about = "An entity-based static site generator")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the site
    Build {
        /// Output directory, overriding `build.output_dir`
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// Fail on any collected content error
        #[arg(long)]
        strict: bool,
    },
    /// Resolve configuration and run generation without writing
    Check {
        /// Fail on any collected content error
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    strata::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build { output, strict } => {
            strata::cmd::build::run(&cli.config, output.as_deref(), strict)?;
        }
        Commands::Check { strict } => {
            strata::cmd::check::run(&cli.config, strict)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_cli_build_command_parsing() {
        let cli = Cli::parse_from(["strata", "build", "--output", "dist"]);

        assert_eq!(cli.config, std::path::PathBuf::from("config.toml"));
        assert_eq!(cli.verbose, 0);

        match cli.command {
            Commands::Build { output, strict } => {
                assert_eq!(output, Some(std::path::PathBuf::from("dist")));
                assert!(!strict);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_cli_build_defaults_to_configured_output() {
        let cli = Cli::parse_from(["strata", "build", "--strict"]);

        match cli.command {
            Commands::Build { output, strict } => {
                assert!(output.is_none());
                assert!(strict);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_cli_check_command_parsing() {
        let cli = Cli::parse_from(["strata", "check", "--strict"]);

        match cli.command {
            Commands::Check { strict } => assert!(strict),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_verbosity_and_config_flags() {
        let cli = Cli::parse_from(["strata", "-vv", "--config", "site.toml", "check"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, std::path::PathBuf::from("site.toml"));
    }
}
