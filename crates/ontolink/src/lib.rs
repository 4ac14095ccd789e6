//! Ontolink - registry matching, validation and link counting for
//! multi-layer architecture specifications.
//!
//! Layer documents declare entities and typed relationships in several
//! notations. This crate loads the Link Registry, parses the layer
//! documents of a specification tree, cross-checks every relationship
//! against the registry and the declared entities, and reconciles the
//! relationship counts.

pub mod catalog;
pub mod config;
pub mod entity_index;
pub mod registry;
pub mod report;
pub mod spec_tree;

mod error;
mod format;
mod validator;

pub use ontolink_core::{entity, layer, link_type, relationship};

pub use error::OntologyError;

use log::{debug, info};

use ontolink_core::layer::LayerSet;
use ontolink_parser::ParseResult;

use catalog::{LinkCatalog, LinkInstanceCatalog};
use config::AppConfig;
use entity_index::EntityIndex;
use registry::LinkRegistry;
use report::{ReportPaths, ValidationReport};
use spec_tree::{LayerDocument, SpecTree, display_path};
use validator::Validator;

/// Entry point for validating and cataloging a specification tree.
///
/// The registry is read once, on construction. Every call to
/// [`LinkValidator::validate`] or [`LinkValidator::catalog`] re-reads the
/// layer documents, so edits between runs are always seen.
///
/// # Examples
///
/// ```rust,no_run
/// use ontolink::{LinkValidator, config::AppConfig};
///
/// let config = AppConfig::default().with_spec_root("spec");
/// let validator = LinkValidator::new(config).expect("Failed to load spec tree");
///
/// let report = validator.validate(None).expect("Failed to validate");
/// validator.write_reports(&report).expect("Failed to write reports");
///
/// std::process::exit(report.exit_code(false));
/// ```
#[derive(Debug)]
pub struct LinkValidator {
    config: AppConfig,
    registry: LinkRegistry,
}

impl LinkValidator {
    /// Load the registry named by `config` and check that its layers
    /// directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::RegistryLoad`] if the registry cannot be
    /// loaded, or [`OntologyError::MissingLayersDir`] if the layers directory
    /// is absent.
    pub fn new(config: AppConfig) -> Result<Self, OntologyError> {
        let registry = LinkRegistry::load(config.paths().registry_path())?;

        let layers_dir = config.paths().layers_path();
        if !layers_dir.is_dir() {
            return Err(OntologyError::MissingLayersDir(layers_dir));
        }

        info!(link_types = registry.len(), layers_dir:? = layers_dir; "Validator ready");
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    /// Validate the whole tree, or one layer.
    ///
    /// A layer run parses the layer's documents plus the documents its
    /// records target, and only checks the selected layer. Count divergence
    /// is reported in full runs only.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::UnknownLayer`] if `layer` has no document in
    /// the tree, or the errors of [`SpecTree::load`].
    pub fn validate(&self, layer: Option<&str>) -> Result<ValidationReport, OntologyError> {
        let tree = self.load_tree()?;
        if let Some(unknown) = layer.filter(|layer| !tree.contains_layer(layer)) {
            return Err(OntologyError::UnknownLayer {
                layer: unknown.to_string(),
                known: tree.layers().join(", "),
            });
        }

        info!(layer:? = layer; "Validating relationships");

        let known_layers = self.known_layers(&tree);
        let results = match layer {
            Some(layer) => tree.parse_layer(layer, &known_layers),
            None => tree.parse_all(&known_layers),
        };
        let in_scope = |candidate: &str| layer.is_none_or(|layer| layer == candidate);
        let layers_validated: Vec<String> = match layer {
            Some(layer) => vec![layer.to_string()],
            None => tree.layers().into_iter().map(str::to_string).collect(),
        };

        let index = EntityIndex::build(&results);
        let mut checker = Validator::new(&self.registry, &index);
        for result in results.iter().filter(|result| in_scope(result.layer())) {
            for record in result.relationships() {
                checker.check_record(record);
            }
        }
        for layer in &layers_validated {
            checker.check_required(layer);
        }
        let links_validated = checker.checked();

        let mut issues = checker.into_issues();
        issues.extend(validator::duplicate_issues(&index, in_scope));
        issues.extend(
            results
                .iter()
                .filter(|result| in_scope(result.layer()))
                .flat_map(validator::parser_warning_issues),
        );

        let registry_file = display_path(self.config.paths().spec_root(), self.registry.path());
        issues.extend(validator::registry_gap_issues(&self.registry, &registry_file, in_scope));

        if layer.is_none() {
            let catalog = self.reconcile(&results);
            issues.extend(validator::divergence_issues(&catalog, &tree));
        }

        let documents: Vec<&str> = tree.documents().iter().map(LayerDocument::display_path).collect();
        validator::sort_issues(&mut issues, &documents);
        let report = ValidationReport::new(issues, layers_validated, links_validated);

        info!(
            passed = report.validation_passed(),
            errors = report.errors().len(),
            warnings = report.warnings().len(),
            notes = report.info().len(),
            links = links_validated;
            "Validation finished"
        );
        Ok(report)
    }

    /// Reconcile the relationship counts of the whole tree.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SpecTree::load`].
    pub fn catalog(&self) -> Result<LinkInstanceCatalog, OntologyError> {
        info!("Reconciling link counts");
        let tree = self.load_tree()?;
        let results = tree.parse_all(&self.known_layers(&tree));
        Ok(self.reconcile(&results))
    }

    fn load_tree(&self) -> Result<SpecTree, OntologyError> {
        let tree = SpecTree::load(self.config.paths())?;
        debug!(documents = tree.documents().len(); "Layer documents read");
        Ok(tree)
    }

    fn known_layers(&self, tree: &SpecTree) -> LayerSet {
        tree.known_layers(self.config.validation().extra_layers())
    }

    fn reconcile(&self, results: &[ParseResult]) -> LinkInstanceCatalog {
        let catalog = LinkCatalog::reconcile(
            results,
            &self.registry,
            self.config.catalog().divergence_tolerance(),
        );
        debug!(divergent = catalog.divergent_layers().count(); "Catalog built");
        catalog
    }

    /// Write `validation-report.md` and `validation-report.json` into the
    /// configured output directory.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::Io`] if a report cannot be written.
    pub fn write_reports(&self, report: &ValidationReport) -> Result<ReportPaths, OntologyError> {
        report::write_reports(report, &self.config.paths().output_path())
    }
}
