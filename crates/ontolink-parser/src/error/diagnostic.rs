//! Coded diagnostics with labeled spans.
//!
//! Every [`Diagnostic`] carries an [`ErrorCode`]; its severity follows from
//! the code, so a document warning can never be mistaken for a fatal
//! registry error.

use std::fmt;

use crate::{
    error::{ErrorCode, Severity},
    span::Span,
};

/// A message attached to a region of the scanned text.
///
/// The primary label marks where the problem is. Secondary labels point at
/// related places, such as the first definition of a duplicated id.
#[derive(Debug, Clone)]
pub struct Label {
    span: Span,
    message: String,
    primary: bool,
}

impl Label {
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }
}

/// A problem found in a layer document or in the link registry.
///
/// `Display` gives the one-line form, e.g.
/// ``warning[W002]: `<relationship>` tag has no `target` attribute``.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: ErrorCode,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic without labels.
    ///
    /// ```
    /// # use ontolink_parser::{Span, error::{Diagnostic, ErrorCode, Severity}};
    /// let diag = Diagnostic::new(ErrorCode::E101, "duplicate link type id `serving`")
    ///     .with_label(Span::new(0..10), "second definition")
    ///     .with_help("link type ids must be unique");
    ///
    /// assert_eq!(diag.severity(), Severity::Error);
    /// ```
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Span of the first primary label; used to locate the diagnostic.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find(|label| label.primary)
            .map(|label| label.span)
    }

    pub fn with_label(self, span: Span, message: impl Into<String>) -> Self {
        self.labeled(span, message, true)
    }

    pub fn with_secondary_label(self, span: Span, message: impl Into<String>) -> Self {
        self.labeled(span, message, false)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    fn labeled(mut self, span: Span, message: impl Into<String>, primary: bool) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
            primary,
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity(), self.code, self.message)
    }
}

impl std::error::Error for Diagnostic {}
