//! Accumulates the diagnostics of one document scan.

use log::warn;

use crate::error::Diagnostic;

/// Every skipped declaration of a document, in the order it was found.
///
/// Each emitted diagnostic is also logged, so a run with `--log-level warn`
/// shows what was skipped even before the report is written.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        warn!(code:% = diagnostic.code(), message = diagnostic.message(); "Skipping declaration");
        self.diagnostics.push(diagnostic);
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
