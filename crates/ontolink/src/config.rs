//! Configuration types for ontolink runs.
//!
//! All types implement [`serde::Deserialize`] and every field has a default,
//! so an empty TOML file is a valid configuration.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`PathsConfig`] - Where the specification tree, registry and reports live.
//! - [`ValidationConfig`] - Strictness and additional layer names.
//! - [`CatalogConfig`] - Count reconciliation settings.
//!
//! # Example
//!
//! ```
//! # use ontolink::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.paths().registry_path().to_str(), Some("./link-registry.json"));
//! assert_eq!(config.catalog().divergence_tolerance(), 0);
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level ontolink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Paths section.
    #[serde(default)]
    paths: PathsConfig,

    /// Validation section.
    #[serde(default)]
    validation: ValidationConfig,

    /// Catalog section.
    #[serde(default)]
    catalog: CatalogConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(paths: PathsConfig, validation: ValidationConfig, catalog: CatalogConfig) -> Self {
        Self {
            paths,
            validation,
            catalog,
        }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    pub fn validation(&self) -> &ValidationConfig {
        &self.validation
    }

    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// Overrides the specification root.
    pub fn with_spec_root(mut self, spec_root: impl Into<PathBuf>) -> Self {
        self.paths.spec_root = spec_root.into();
        self
    }

    /// Overrides the report output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.paths.output_dir = Some(output_dir.into());
        self
    }

    /// Overrides strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.validation.strict = strict;
        self
    }
}

/// Locations of the inputs and outputs of a run.
///
/// `layers_dir` and `registry_file` are relative to `spec_root` unless
/// absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    spec_root: PathBuf,
    layers_dir: PathBuf,
    registry_file: PathBuf,
    /// Defaults to `spec_root` when unset.
    output_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            spec_root: PathBuf::from("."),
            layers_dir: PathBuf::from("layers"),
            registry_file: PathBuf::from("link-registry.json"),
            output_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn spec_root(&self) -> &Path {
        &self.spec_root
    }

    /// Directory holding the layer documents.
    pub fn layers_path(&self) -> PathBuf {
        self.spec_root.join(&self.layers_dir)
    }

    /// Path of the link registry JSON file.
    pub fn registry_path(&self) -> PathBuf {
        self.spec_root.join(&self.registry_file)
    }

    /// Directory the report files are written to.
    pub fn output_path(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => self.spec_root.join(dir),
            None => self.spec_root.clone(),
        }
    }
}

/// Validation behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Treat warnings as failures for the exit code.
    strict: bool,
    /// Layer names accepted as `<layer>.<field>` prefixes besides the
    /// canonical ones and those found in the tree.
    extra_layers: Vec<String>,
}

impl ValidationConfig {
    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn extra_layers(&self) -> &[String] {
        &self.extra_layers
    }
}

/// Count reconciliation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Largest accepted difference between the bidirectional count and its
    /// expected value before a layer is flagged.
    divergence_tolerance: usize,
}

impl CatalogConfig {
    pub fn divergence_tolerance(&self) -> usize {
        self.divergence_tolerance
    }
}
