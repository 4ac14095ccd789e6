//! CLI logic for the ontolink tool.
//!
//! Each subcommand loads the configuration, applies its command-line
//! overrides and calls into the [`ontolink`] library. [`run`] returns the
//! process exit code.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, CatalogArgs, Command, RegistryArgs, ValidateArgs};

use log::info;

use ontolink::{LinkValidator, OntologyError, config::AppConfig, registry::LinkRegistry};

/// Run the ontolink CLI application
///
/// # Errors
///
/// Returns `OntologyError` for:
/// - Configuration loading errors
/// - Registry loading errors
/// - A missing layers directory or an unknown layer
/// - Report writing errors
pub fn run(args: &Args) -> Result<i32, OntologyError> {
    let app_config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Validate(cmd) => validate(app_config, cmd),
        Command::Catalog(cmd) => catalog(app_config, cmd),
        Command::Registry(cmd) => registry(app_config, cmd),
    }
}

fn with_spec_root(config: AppConfig, spec_root: Option<&str>) -> AppConfig {
    match spec_root {
        Some(spec_root) => config.with_spec_root(spec_root),
        None => config,
    }
}

fn validate(config: AppConfig, cmd: &ValidateArgs) -> Result<i32, OntologyError> {
    let mut config = with_spec_root(config, cmd.spec_root.as_deref());
    if let Some(output) = &cmd.output {
        config = config.with_output_dir(output);
    }
    let strict = cmd.strict || config.validation().strict();

    let validator = LinkValidator::new(config)?;
    let report = validator.validate(cmd.layer.as_deref())?;
    let paths = validator.write_reports(&report)?;

    for issue in report.issues() {
        println!("{issue}");
        if let Some(suggestion) = issue.suggestion() {
            println!("  help: {suggestion}");
        }
    }
    println!(
        "{}: {} errors, {} warnings, {} info ({} links in {} layers)",
        if report.validation_passed() { "PASSED" } else { "FAILED" },
        report.errors().len(),
        report.warnings().len(),
        report.info().len(),
        report.links_validated(),
        report.layers_validated()
    );

    info!(
        markdown:? = paths.markdown,
        json:? = paths.json,
        strict;
        "Validation reports exported"
    );
    Ok(report.exit_code(strict))
}

fn catalog(config: AppConfig, cmd: &CatalogArgs) -> Result<i32, OntologyError> {
    let config = with_spec_root(config, cmd.spec_root.as_deref());
    let validator = LinkValidator::new(config)?;
    let catalog = validator.catalog()?;

    if cmd.json {
        println!("{}", catalog.to_json()?);
    } else {
        print!("{catalog}");
    }

    info!(divergent = catalog.divergent_layers().count(); "Catalog printed");
    Ok(0)
}

fn registry(config: AppConfig, cmd: &RegistryArgs) -> Result<i32, OntologyError> {
    let config = with_spec_root(config, cmd.spec_root.as_deref());
    let registry = LinkRegistry::load(config.paths().registry_path())?;
    let stats = registry.statistics();

    println!("Link types: {}", stats.total);
    println!("  with predicates: {}", stats.with_predicates);
    println!("  with inverse predicates: {}", stats.with_inverse_predicates);
    println!("  bidirectional: {}", stats.bidirectional);
    println!("  required: {}", stats.required);
    println!("  with examples: {}", stats.with_examples);
    println!("  registry gaps: {}", stats.registry_gaps);
    println!("Categories:");
    for (category, count) in &stats.category_counts {
        println!("  {category}: {count}");
    }
    if !stats.strength_counts.is_empty() {
        println!("Strengths:");
        for (strength, count) in &stats.strength_counts {
            println!("  {strength}: {count}");
        }
    }

    let without_examples = registry.links_without_examples();
    if !without_examples.is_empty() {
        let ids: Vec<&str> = without_examples.iter().map(|link| link.id()).collect();
        println!("Without examples: {}", ids.join(", "));
    }
    let without_predicates = registry.links_without_predicates();
    if !without_predicates.is_empty() {
        let ids: Vec<&str> = without_predicates.iter().map(|link| link.id()).collect();
        println!("Without predicates: {}", ids.join(", "));
    }
    for gap in registry.registry_gaps() {
        println!("Gap: `{}` accepts any source type in layer `{}`", gap.link_id(), gap.layer());
    }

    Ok(0)
}
