//! Error and diagnostic system for the ontolink parser.
//!
//! This module provides the diagnostic types used to report problems found
//! while scanning layer documents and loading the link registry:
//! - [`ErrorCode`]s, whose prefix decides the [`Severity`]
//! - labeled spans pointing into the scanned text
//! - a collector accumulating the warnings of one document
//!
//! # Overview
//!
//! Parsing a layer document never fails as a whole. Each declaration that
//! cannot be understood becomes a warning [`Diagnostic`] and the scan
//! continues with the next declaration.
//!
//! # Example
//!
//! ```
//! # use ontolink_parser::error::{Diagnostic, ErrorCode};
//! # use ontolink_parser::Span;
//!
//! let span = Span::new(100..120);
//!
//! let diag = Diagnostic::new(ErrorCode::W001, "malformed `<relationship>` tag")
//!     .with_label(span, "tag starts here")
//!     .with_help("quote every attribute value and close the tag with `>` or `/>`");
//! ```

mod collector;
mod diagnostic;
mod error_code;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::{Diagnostic, Label};
pub use error_code::{ErrorCode, Severity};
