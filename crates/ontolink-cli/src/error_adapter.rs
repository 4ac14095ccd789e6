//! Renders [`OntologyError`]s as miette diagnostics.
//!
//! Registry load failures that carry a position are shown with a snippet of
//! the registry file. Every other fatal error is shown as a message with a
//! stable code and, where one exists, a hint.

use std::{error::Error, fmt};

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};

use ontolink::OntologyError;
use ontolink_parser::{Span, error::Diagnostic};

/// A registry diagnostic over the registry text.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    source: NamedSource<String>,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, name: &str, src: &str) -> Self {
        Self {
            diag,
            source: NamedSource::new(name, src.to_string()),
        }
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.diag, f)
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.diag.message())
    }
}

impl Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.diag.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.source)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.diag.labels().is_empty() {
            return None;
        }
        Some(Box::new(self.diag.labels().iter().map(|label| {
            let message = Some(label.message().to_string());
            let span = source_span(label.span());
            if label.is_primary() {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            }
        })))
    }
}

/// Any other fatal error.
#[derive(Debug)]
pub struct ErrorAdapter<'a>(pub &'a OntologyError);

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.0, f)
    }
}

impl Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.0 {
            OntologyError::Io(_) => "ontolink::io",
            OntologyError::RegistryLoad { .. } => "ontolink::registry",
            OntologyError::MissingLayersDir(_) => "ontolink::layers_dir",
            OntologyError::UnknownLayer { .. } => "ontolink::unknown_layer",
            OntologyError::Report(_) => "ontolink::report",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.0 {
            OntologyError::MissingLayersDir(_) => {
                "pass `--spec-root` or set `paths.layers_dir` in the configuration"
            }
            OntologyError::UnknownLayer { .. } => "pass one of the known layers to `--layer`",
            OntologyError::RegistryLoad { .. } => {
                "pass `--spec-root` or set `paths.registry_file` in the configuration"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

fn source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Pick the rendering for `err`.
///
/// A registry load failure with a position points into the registry text;
/// anything else is rendered through [`ErrorAdapter`].
pub fn to_reportable(err: &OntologyError) -> Box<dyn MietteDiagnostic + '_> {
    match err {
        OntologyError::RegistryLoad {
            path,
            diagnostic: Some(diagnostic),
            src,
            ..
        } => Box::new(DiagnosticAdapter::new(
            diagnostic,
            &path.display().to_string(),
            src,
        )),
        _ => Box::new(ErrorAdapter(err)),
    }
}

#[cfg(test)]
mod tests {
    use ontolink::registry::LinkRegistry;
    use ontolink_parser::error::ErrorCode;

    use super::*;

    #[test]
    fn test_registry_error_points_into_the_registry() {
        let err = LinkRegistry::from_json("{\"linkTypes\": [\n  {\"id\": }\n]}").unwrap_err();
        let report = to_reportable(&err);

        assert_eq!(report.code().unwrap().to_string(), "E100");
        assert!(report.source_code().is_some());
        assert_eq!(report.labels().unwrap().count(), 1);
    }

    #[test]
    fn test_unknown_layer_has_code_and_help() {
        let err = OntologyError::UnknownLayer {
            layer: "risk".to_string(),
            known: "business, motivation".to_string(),
        };
        let report = to_reportable(&err);

        assert_eq!(
            report.to_string(),
            "unknown layer `risk` (known layers: business, motivation)"
        );
        assert_eq!(report.code().unwrap().to_string(), "ontolink::unknown_layer");
        assert!(report.help().is_some());
        assert!(report.source_code().is_none());
    }

    #[test]
    fn test_registry_error_without_position() {
        let err = OntologyError::registry_load("link-registry.json", "No such file or directory");
        let report = to_reportable(&err);

        assert_eq!(report.code().unwrap().to_string(), "ontolink::registry");
        assert!(report.labels().is_none());
    }

    #[test]
    fn test_duplicate_id_keeps_both_labels() {
        let diag = Diagnostic::new(ErrorCode::E101, "duplicate link type id `serving`")
            .with_label(Span::new(0..5), "duplicate definition")
            .with_secondary_label(Span::new(10..15), "first defined on this line");
        let adapter = DiagnosticAdapter::new(&diag, "link-registry.json", "some registry source");

        let labels: Vec<_> = adapter.labels().unwrap().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].primary());
        assert!(!labels[1].primary());
        assert_eq!(labels[1].label(), Some("first defined on this line"));
    }
}
