//! Command-line argument definitions for the ontolink CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. A subcommand selects the operation; the configuration
//! file and logging verbosity are global options.

use clap::{Parser, Subcommand};

/// Command-line arguments for the ontolink tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate every relationship against the link registry
    Validate(ValidateArgs),
    /// Reconcile raw, unique and bidirectional relationship counts
    Catalog(CatalogArgs),
    /// Print link registry statistics
    Registry(RegistryArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct ValidateArgs {
    /// Validate a single layer instead of the whole tree
    #[arg(short, long)]
    pub layer: Option<String>,

    /// Fail on warnings as well as errors
    #[arg(long)]
    pub strict: bool,

    /// Root of the specification tree
    #[arg(long)]
    pub spec_root: Option<String>,

    /// Directory to write the reports to
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(clap::Args, Debug, Default)]
pub struct CatalogArgs {
    /// Root of the specification tree
    #[arg(long)]
    pub spec_root: Option<String>,

    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct RegistryArgs {
    /// Root of the specification tree
    #[arg(long)]
    pub spec_root: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::parse_from([
            "ontolink",
            "validate",
            "--layer",
            "business",
            "--strict",
            "--log-level",
            "debug",
        ]);

        assert_eq!(args.log_level, "debug");
        match args.command {
            Command::Validate(validate) => {
                assert_eq!(validate.layer.as_deref(), Some("business"));
                assert!(validate.strict);
                assert!(validate.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_catalog_json_flag() {
        let args = Args::parse_from(["ontolink", "--config", "ontolink.toml", "catalog", "--json"]);

        assert_eq!(args.config.as_deref(), Some("ontolink.toml"));
        assert!(matches!(args.command, Command::Catalog(CatalogArgs { json: true, .. })));
    }
}
