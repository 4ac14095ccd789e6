//! Discovery and loading of the layer documents of a specification tree.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, trace, warn};
use walkdir::WalkDir;

use ontolink_core::layer::LayerSet;
use ontolink_parser::{ParseResult, document_layer, parse_all_formats};

use crate::{config::PathsConfig, error::OntologyError};

/// One layer document, read into memory.
#[derive(Debug, Clone)]
pub struct LayerDocument {
    path: PathBuf,
    display_path: String,
    layer: String,
    source: String,
}

impl LayerDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the spec root with `/` separators, as used in
    /// issue locations.
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parse(&self, known_layers: &LayerSet) -> ParseResult {
        trace!(file = self.display_path.as_str(), layer = self.layer.as_str(); "Parsing layer document");
        parse_all_formats(&self.source, &self.layer, &self.display_path, known_layers)
    }
}

/// Path of `path` relative to `root`, with `/` separators.
pub(crate) fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// The layer documents of a tree, sorted by file name.
#[derive(Debug, Clone)]
pub struct SpecTree {
    documents: Vec<LayerDocument>,
}

impl SpecTree {
    /// Read every `*.md` file directly inside the layers directory.
    ///
    /// Files whose layer cannot be determined are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::MissingLayersDir`] if the layers directory
    /// does not exist, or [`OntologyError::Io`] if it or a document cannot be
    /// read.
    pub fn load(paths: &PathsConfig) -> Result<Self, OntologyError> {
        let layers_dir = paths.layers_path();
        if !layers_dir.is_dir() {
            return Err(OntologyError::MissingLayersDir(layers_dir));
        }

        let mut documents = Vec::new();
        let walker = WalkDir::new(&layers_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file()
                || entry.path().extension().is_none_or(|ext| ext != "md")
            {
                continue;
            }

            let path = entry.path().to_path_buf();
            let display_path = display_path(paths.spec_root(), &path);
            let source = fs::read_to_string(&path)?;
            let file_name = entry.file_name().to_string_lossy();

            let Some(layer) = document_layer(&source, &file_name) else {
                warn!(file = display_path.as_str(); "Cannot determine the layer of document, skipping");
                continue;
            };

            debug!(file = display_path.as_str(), layer = layer.as_str(); "Found layer document");
            documents.push(LayerDocument {
                path,
                display_path,
                layer,
                source,
            });
        }

        debug!(documents = documents.len(); "Spec tree loaded");
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[LayerDocument] {
        &self.documents
    }

    /// Distinct layers of the tree in document order.
    pub fn layers(&self) -> Vec<&str> {
        self.documents
            .iter()
            .map(LayerDocument::layer)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains_layer(&self, layer: &str) -> bool {
        self.documents.iter().any(|doc| doc.layer == layer)
    }

    /// Canonical layers, the tree's layers and `extra`.
    pub fn known_layers(&self, extra: &[String]) -> LayerSet {
        let mut known = LayerSet::canonical();
        known.extend(self.documents.iter().map(LayerDocument::layer));
        known.extend(extra.iter().map(String::as_str));
        known
    }

    /// Parse every document, in tree order.
    pub fn parse_all(&self, known_layers: &LayerSet) -> Vec<ParseResult> {
        self.documents
            .iter()
            .map(|doc| doc.parse(known_layers))
            .collect()
    }

    /// Parse the documents of `layer` plus the documents of every layer
    /// their records target, in tree order.
    pub fn parse_layer(&self, layer: &str, known_layers: &LayerSet) -> Vec<ParseResult> {
        let mut parsed: Vec<(usize, ParseResult)> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.layer == layer)
            .map(|(idx, doc)| (idx, doc.parse(known_layers)))
            .collect();

        let targets: IndexSet<&str> = parsed
            .iter()
            .flat_map(|(_, result)| result.relationships())
            .map(|record| record.target_layer())
            .filter(|target| *target != layer)
            .collect();

        let referenced: Vec<(usize, ParseResult)> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| targets.contains(doc.layer.as_str()))
            .map(|(idx, doc)| (idx, doc.parse(known_layers)))
            .collect();

        debug!(
            layer,
            documents = parsed.len(),
            referenced = referenced.len();
            "Parsed layer with referenced documents"
        );

        parsed.extend(referenced);
        parsed.sort_by_key(|(idx, _)| *idx);
        parsed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::config::AppConfig;

    use super::*;

    fn tree_with(files: &[(&str, &str)]) -> (TempDir, AppConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("layers")).unwrap();
        for (name, content) in files {
            fs::write(dir.path().join("layers").join(name), content).unwrap();
        }
        let config = AppConfig::default().with_spec_root(dir.path());
        (dir, config)
    }

    #[test]
    fn test_documents_sorted_by_file_name() {
        let (_dir, config) = tree_with(&[
            ("02-business-layer.md", "# Business"),
            ("01-motivation-layer.md", "# Motivation"),
            ("notes.txt", "ignored"),
            ("03-custom.md", "---\nlayer: security\n---\n"),
        ]);
        let tree = SpecTree::load(config.paths()).unwrap();

        let files: Vec<_> = tree.documents().iter().map(LayerDocument::display_path).collect();
        assert_eq!(
            files,
            [
                "layers/01-motivation-layer.md",
                "layers/02-business-layer.md",
                "layers/03-custom.md"
            ]
        );
        assert_eq!(tree.layers(), ["motivation", "business", "security"]);
    }

    #[test]
    fn test_missing_layers_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default().with_spec_root(dir.path());

        let err = SpecTree::load(config.paths()).unwrap_err();
        assert!(matches!(err, OntologyError::MissingLayersDir(_)));
    }

    #[test]
    fn test_known_layers_include_tree_and_extra() {
        let (_dir, config) = tree_with(&[("10-governance-layer.md", "# Governance")]);
        let tree = SpecTree::load(config.paths()).unwrap();

        let known = tree.known_layers(&["risk".to_string()]);
        assert!(known.contains("business"));
        assert!(known.contains("governance"));
        assert!(known.contains("risk"));
    }

    #[test]
    fn test_parse_layer_pulls_in_target_layers() {
        let (_dir, config) = tree_with(&[
            ("01-motivation-layer.md", "<element id=\"motivation.goal.grow\"/>"),
            (
                "02-business-layer.md",
                "```yaml\nid: biz.service.billing\nmotivation.supports-goals: motivation.goal.grow\n```\n",
            ),
            ("04-application-layer.md", "<element id=\"app.component.crm\"/>"),
        ]);
        let tree = SpecTree::load(config.paths()).unwrap();
        let known = tree.known_layers(&[]);

        let layers: Vec<_> = tree
            .parse_layer("business", &known)
            .iter()
            .map(|result| result.layer().to_string())
            .collect();
        assert_eq!(layers, ["motivation", "business"]);
        assert_eq!(tree.parse_all(&known).len(), 3);
    }
}
