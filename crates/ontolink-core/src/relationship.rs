//! Normalized relationship declarations.
//!
//! Every notation a layer document may use to declare a relationship is
//! normalized into a [`RelationshipRecord`]. Downstream consumers never need
//! to know which notation a record came from, beyond its [`FormatType`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// The notation a relationship was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    /// `<relationship type=".." source=".." target=".."/>`, always intra-layer.
    XmlRelationship,
    /// A dotted `<layer>.<field>` key inside a YAML entity block.
    YamlProperty,
    /// `<property key="<layer>.<field>" .../>`, the tag form of a YAML property.
    XmlProperty,
}

impl FormatType {
    /// All format types in reporting order.
    pub const ALL: [FormatType; 3] = [
        FormatType::XmlRelationship,
        FormatType::YamlProperty,
        FormatType::XmlProperty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::XmlRelationship => "xml_relationship",
            FormatType::YamlProperty => "yaml_property",
            FormatType::XmlProperty => "xml_property",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file position used for diagnostics. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    file: String,
    line: usize,
    column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A relationship declaration in canonical form.
///
/// `is_cross_layer` is derived from the source and target layers on
/// construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    source_layer: String,
    source_entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_entity_type: Option<String>,
    target_layer: String,
    target_entity_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_entity_type: Option<String>,
    label: String,
    format_type: FormatType,
    is_cross_layer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field_path: Option<String>,
    source_location: SourceLocation,
}

impl RelationshipRecord {
    /// Creates a record.
    ///
    /// # Arguments
    ///
    /// * `format_type` - Notation the relationship was declared with.
    /// * `source_layer` - Layer of the declaring document.
    /// * `source_entity_id` - Entity originating the relationship.
    /// * `target_layer` - Layer the targets live in.
    /// * `target_entity_ids` - One or more target ids (or enum values).
    /// * `label` - Relationship-type label or field path used for registry matching.
    /// * `source_location` - Where the declaration starts.
    pub fn new(
        format_type: FormatType,
        source_layer: impl Into<String>,
        source_entity_id: impl Into<String>,
        target_layer: impl Into<String>,
        target_entity_ids: Vec<String>,
        label: impl Into<String>,
        source_location: SourceLocation,
    ) -> Self {
        let source_layer = source_layer.into();
        let target_layer = target_layer.into();
        let is_cross_layer = source_layer != target_layer;
        Self {
            source_layer,
            source_entity_id: source_entity_id.into(),
            source_entity_type: None,
            target_layer,
            target_entity_ids,
            target_entity_type: None,
            label: label.into(),
            format_type,
            is_cross_layer,
            field_path: None,
            source_location,
        }
    }

    /// Sets the declared source entity type.
    pub fn with_source_type(mut self, entity_type: Option<String>) -> Self {
        self.source_entity_type = entity_type;
        self
    }

    /// Sets the target entity type hint.
    pub fn with_target_type(mut self, entity_type: Option<String>) -> Self {
        self.target_entity_type = entity_type;
        self
    }

    /// Sets the dotted field path of a property declaration.
    pub fn with_field_path(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }

    pub fn source_layer(&self) -> &str {
        &self.source_layer
    }

    pub fn source_entity_id(&self) -> &str {
        &self.source_entity_id
    }

    pub fn source_entity_type(&self) -> Option<&str> {
        self.source_entity_type.as_deref()
    }

    pub fn target_layer(&self) -> &str {
        &self.target_layer
    }

    pub fn target_entity_ids(&self) -> &[String] {
        &self.target_entity_ids
    }

    pub fn target_entity_type(&self) -> Option<&str> {
        self.target_entity_type.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format_type(&self) -> FormatType {
        self.format_type
    }

    pub fn is_cross_layer(&self) -> bool {
        self.is_cross_layer
    }

    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref()
    }

    pub fn source_location(&self) -> &SourceLocation {
        &self.source_location
    }

    /// The key used to match this record against the registry: the field
    /// path for property declarations, the label otherwise.
    pub fn match_label(&self) -> &str {
        self.field_path.as_deref().unwrap_or(&self.label)
    }
}
