//! # Ontolink Parser
//!
//! Multi-format relationship parser for architecture layer documents. A
//! layer document may declare relationships in three notations, freely
//! mixed:
//!
//! - dotted `<layer>.<field>` keys of entity mappings in front matter or
//!   fenced `yaml` blocks,
//! - `<relationship type=".." source=".." target=".."/>` tags,
//! - `<property key="<layer>.<field>" value=".."/>` tags.
//!
//! [`parse_all_formats`] normalizes all of them into
//! [`RelationshipRecord`](ontolink_core::relationship::RelationshipRecord)s
//! and collects the declared entities. Anything it cannot read becomes a
//! [`ParserWarning`] instead of an error.
//!
//! ## Usage
//!
//! ```
//! use ontolink_core::layer::LayerSet;
//! use ontolink_parser::{document_layer, parse_all_formats};
//!
//! let source = "```yaml\nid: biz.service.billing\nmotivation.supports-goals: motivation.goal.grow\n```\n";
//! let layer = document_layer(source, "02-business-layer.md").unwrap();
//! let result = parse_all_formats(source, &layer, "02-business-layer.md", &LayerSet::canonical());
//!
//! let record = &result.relationships()[0];
//! assert!(record.is_cross_layer());
//! assert_eq!(record.target_layer(), "motivation");
//! ```

mod document;
pub mod error;
mod frontmatter;
mod preprocess;
mod span;
mod tags;
mod yaml;

pub use document::{ParseResult, ParserWarning, parse_all_formats};
pub use frontmatter::document_layer;
pub use span::{LineIndex, Span};
