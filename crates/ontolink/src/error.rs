//! Error types for ontolink operations.
//!
//! This module provides the main error type [`OntologyError`]. Every variant
//! is fatal: a run that hits one stops before any report is produced.
//! Problems found in the documents themselves are validation issues, not
//! errors.

use std::{io, path::PathBuf};

use thiserror::Error;

use ontolink_parser::error::Diagnostic;

/// The main error type for ontolink operations.
///
/// # Diagnostic Variants
///
/// `RegistryLoad` carries the registry text and, when the failure has a
/// position (malformed JSON, a missing field, a duplicate id), a
/// [`Diagnostic`] whose spans point into that text.
#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to load link registry `{}`: {message}", .path.display())]
    RegistryLoad {
        path: PathBuf,
        message: String,
        diagnostic: Option<Box<Diagnostic>>,
        src: String,
    },

    #[error("layers directory `{}` does not exist", .0.display())]
    MissingLayersDir(PathBuf),

    #[error("unknown layer `{layer}` (known layers: {known})")]
    UnknownLayer { layer: String, known: String },

    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

impl OntologyError {
    /// Create a `RegistryLoad` error without a source position.
    pub fn registry_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RegistryLoad {
            path: path.into(),
            message: message.into(),
            diagnostic: None,
            src: String::new(),
        }
    }

    /// Create a `RegistryLoad` error pointing into the registry text.
    pub fn registry_diagnostic(
        path: impl Into<PathBuf>,
        diagnostic: Diagnostic,
        src: impl Into<String>,
    ) -> Self {
        Self::RegistryLoad {
            path: path.into(),
            message: diagnostic.message().to_string(),
            diagnostic: Some(Box::new(diagnostic)),
            src: src.into(),
        }
    }
}
