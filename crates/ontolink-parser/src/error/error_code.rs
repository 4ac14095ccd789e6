//! Error codes for the ontolink diagnostic system.
//!
//! Codes are organized by source:
//! - `W0xx` - Layer document warnings (declaration skipped, scan continues)
//! - `E1xx` - Link registry errors (fatal)

use std::fmt;

/// How a diagnostic affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The run cannot continue (registry problems).
    Error,
    /// A declaration was skipped; scanning continues.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Document Warnings (W0xx)
    // =========================================================================
    /// Malformed tag.
    ///
    /// A `<element>`, `<relationship>` or `<property>` tag could not be read,
    /// usually because of an unquoted attribute value or a missing `>`.
    W001,

    /// Missing attribute.
    ///
    /// A tag lacks an attribute it cannot be interpreted without.
    W002,

    /// Invalid YAML block.
    ///
    /// A fenced `yaml` block is not well-formed after preprocessing.
    W003,

    /// Invalid front matter.
    ///
    /// The `---` delimited block at the top of the document is not a YAML mapping.
    W004,

    /// Unknown source entity.
    ///
    /// A declaration has no source entity, or an entity has no determinable type.
    W005,

    /// Invalid reference value.
    ///
    /// A reference must be a string, a list of strings, or `{value: ...}` items.
    W006,

    /// Unbalanced element tag.
    ///
    /// An `<element>` was never closed, or a `</element>` has no opening tag.
    W007,

    /// Unterminated code fence.
    ///
    /// A fenced `yaml` block runs to the end of the document.
    W008,

    // =========================================================================
    // Registry Errors (E1xx)
    // =========================================================================
    /// Malformed link registry.
    ///
    /// The registry is not valid JSON or does not match the registry shape.
    E100,

    /// Duplicate link type id.
    ///
    /// Two registry entries share the same `id`.
    E101,
}

impl ErrorCode {
    /// Returns the code as a string (e.g. "W001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::W001 => "W001",
            ErrorCode::W002 => "W002",
            ErrorCode::W003 => "W003",
            ErrorCode::W004 => "W004",
            ErrorCode::W005 => "W005",
            ErrorCode::W006 => "W006",
            ErrorCode::W007 => "W007",
            ErrorCode::W008 => "W008",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
        }
    }

    /// Document codes are warnings, registry codes are errors.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::E100 | ErrorCode::E101 => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Returns a short description of what this code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::W001 => "malformed tag",
            ErrorCode::W002 => "missing attribute",
            ErrorCode::W003 => "invalid yaml block",
            ErrorCode::W004 => "invalid front matter",
            ErrorCode::W005 => "unknown source entity",
            ErrorCode::W006 => "invalid reference value",
            ErrorCode::W007 => "unbalanced element tag",
            ErrorCode::W008 => "unterminated code fence",
            ErrorCode::E100 => "malformed link registry",
            ErrorCode::E101 => "duplicate link type id",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::W001.to_string(), "W001");
        assert_eq!(ErrorCode::E100.to_string(), "E100");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::W003.description(), "invalid yaml block");
        assert_eq!(ErrorCode::E101.description(), "duplicate link type id");
    }

    #[test]
    fn test_error_code_severity() {
        assert_eq!(ErrorCode::W008.severity(), Severity::Warning);
        assert_eq!(ErrorCode::E100.severity(), Severity::Error);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
