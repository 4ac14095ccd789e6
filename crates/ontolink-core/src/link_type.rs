//! Link type definitions loaded from the link registry.
//!
//! A [`LinkType`] describes one legal relationship kind: which layers and
//! entity types may originate it, what it may target, how many targets a
//! field may hold and how target identifiers are formatted.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Bucket name used for link types without an explicit category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Whether a relationship field holds one or many target references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Array,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Single => write!(f, "single"),
            Cardinality::Array => write!(f, "array"),
        }
    }
}

/// Syntactic format of target identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFormat {
    /// `8-4-4-4-12` hexadecimal UUID.
    Uuid,
    /// Dot separated kebab-case segments, e.g. `motivation.goal.increase-revenue`.
    Identifier,
    /// A value from the link type's bound enumeration.
    Enum,
    /// Free-form string; never checked.
    String,
    /// Any format this version does not know; never checked.
    #[serde(other)]
    Other,
}

impl fmt::Display for LinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkFormat::Uuid => "uuid",
            LinkFormat::Identifier => "identifier",
            LinkFormat::Enum => "enum",
            LinkFormat::String => "string",
            LinkFormat::Other => "other",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Low,
    Medium,
    High,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Low => write!(f, "low"),
            Strength::Medium => write!(f, "medium"),
            Strength::High => write!(f, "high"),
        }
    }
}

/// A registered relationship kind with its source and target constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkType {
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    predicate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    inverse_predicate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    source_layers: BTreeSet<String>,

    #[serde(default)]
    source_element_types_by_layer: BTreeMap<String, BTreeSet<String>>,

    /// `None` means the link stays within the source layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_layer: Option<String>,

    target_types: BTreeSet<String>,

    cardinality: Cardinality,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<LinkFormat>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    field_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    strength: Option<Strength>,

    #[serde(default)]
    required: bool,

    #[serde(default = "default_true")]
    bidirectional: bool,

    #[serde(default, rename = "hasExamples")]
    has_examples_flag: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    examples: Vec<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

/// A normalized key under which a link type can be matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    key: String,
    inverse: bool,
}

impl MatchKey {
    /// The normalized key text.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `true` if the key is the link type's inverse predicate.
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }
}

impl LinkType {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The statistics bucket, [`UNCATEGORIZED`] when absent or blank.
    pub fn category(&self) -> &str {
        match self.category.as_deref() {
            Some(category) if !category.trim().is_empty() => category,
            _ => UNCATEGORIZED,
        }
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn inverse_predicate(&self) -> Option<&str> {
        self.inverse_predicate.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source_layers(&self) -> impl Iterator<Item = &str> {
        self.source_layers.iter().map(String::as_str)
    }

    pub fn allows_source_layer(&self, layer: &str) -> bool {
        self.source_layers.contains(layer)
    }

    /// Allowed source entity types for a layer, `None` if the registry does
    /// not constrain that layer.
    pub fn allowed_source_types(&self, layer: &str) -> Option<&BTreeSet<String>> {
        self.source_element_types_by_layer.get(layer)
    }

    /// Returns `true` if an entity of `entity_type` in `layer` may originate this link.
    ///
    /// Layers without an explicit type list accept any type.
    pub fn accepts_source_type(&self, layer: &str, entity_type: &str) -> bool {
        self.allowed_source_types(layer)
            .is_none_or(|types| types.contains(entity_type))
    }

    /// Source layers that have no entry in `sourceElementTypesByLayer`.
    pub fn gap_layers(&self) -> impl Iterator<Item = &str> {
        self.source_layers
            .iter()
            .filter(|layer| !self.source_element_types_by_layer.contains_key(*layer))
            .map(String::as_str)
    }

    /// The declared target layer, if any.
    pub fn target_layer(&self) -> Option<&str> {
        self.target_layer.as_deref()
    }

    /// The layer targeted when the link originates from `source_layer`.
    pub fn target_layer_for<'a>(&'a self, source_layer: &'a str) -> &'a str {
        self.target_layer.as_deref().unwrap_or(source_layer)
    }

    pub fn target_types(&self) -> &BTreeSet<String> {
        &self.target_types
    }

    /// Returns `true` if `entity_type` may be targeted. An empty type list accepts anything.
    pub fn accepts_target_type(&self, entity_type: &str) -> bool {
        self.target_types.is_empty() || self.target_types.contains(entity_type)
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn format(&self) -> Option<LinkFormat> {
        self.format
    }

    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    pub fn field_paths(&self) -> &[String] {
        &self.field_paths
    }

    pub fn strength(&self) -> Option<Strength> {
        self.strength
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    pub fn has_examples(&self) -> bool {
        self.has_examples_flag || !self.examples.is_empty()
    }

    /// All normalized keys this link type can be matched by.
    ///
    /// Forward keys are the id, the name, the predicate and every field path.
    /// The inverse predicate is returned as an inverse key unless it collides
    /// with a forward key.
    pub fn match_keys(&self) -> Vec<MatchKey> {
        let mut forward: Vec<String> = Vec::new();
        let mut push = |raw: &str| {
            let key = normalize_key(raw);
            if !key.is_empty() && !forward.contains(&key) {
                forward.push(key);
            }
        };

        push(&self.id);
        if let Some(name) = &self.name {
            push(name);
        }
        if let Some(predicate) = &self.predicate {
            push(predicate);
        }
        for path in &self.field_paths {
            push(path);
        }

        let mut keys: Vec<MatchKey> = forward
            .iter()
            .map(|key| MatchKey {
                key: key.clone(),
                inverse: false,
            })
            .collect();

        if let Some(inverse) = &self.inverse_predicate {
            let key = normalize_key(inverse);
            if !key.is_empty() && !forward.contains(&key) {
                keys.push(MatchKey { key, inverse: true });
            }
        }

        keys
    }
}

/// Normalizes a relationship label, predicate or field path into a match key.
///
/// Camel-case boundaries, whitespace, underscores and dots become single
/// dashes and everything is lowercased.
///
/// # Examples
///
/// ```
/// use ontolink_core::link_type::normalize_key;
///
/// assert_eq!(normalize_key("Serving"), "serving");
/// assert_eq!(normalize_key("AssociatedWith"), "associated-with");
/// assert_eq!(normalize_key("motivation.supports-goals"), "motivation-supports-goals");
/// assert_eq!(normalize_key("is realized by"), "is-realized-by");
/// ```
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut after_lower = false;

    for ch in raw.trim().chars() {
        if ch.is_uppercase() {
            if after_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            after_lower = false;
        } else if ch.is_alphanumeric() {
            out.push(ch);
            after_lower = true;
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            after_lower = false;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> LinkType {
        serde_json::from_str(json).expect("valid link type")
    }

    #[test]
    fn test_minimal_link_type_defaults() {
        let link = parse(
            r#"{"id": "serving", "sourceLayers": ["business"], "targetTypes": ["service"], "cardinality": "single"}"#,
        );

        assert_eq!(link.id(), "serving");
        assert_eq!(link.category(), UNCATEGORIZED);
        assert_eq!(link.cardinality(), Cardinality::Single);
        assert!(link.is_bidirectional());
        assert!(!link.is_required());
        assert!(!link.has_examples());
        assert_eq!(link.format(), None);
        assert_eq!(link.target_layer(), None);
        assert_eq!(link.target_layer_for("business"), "business");
    }

    #[test]
    fn test_source_type_constraints_and_gaps() {
        let link = parse(
            r#"{
                "id": "serving",
                "sourceLayers": ["business", "application"],
                "sourceElementTypesByLayer": {"business": ["actor"]},
                "targetTypes": [],
                "cardinality": "array"
            }"#,
        );

        assert!(link.accepts_source_type("business", "actor"));
        assert!(!link.accepts_source_type("business", "service"));
        assert!(link.accepts_source_type("application", "anything"));
        assert!(link.accepts_target_type("whatever"));
        assert_eq!(link.gap_layers().collect::<Vec<_>>(), vec!["application"]);
    }

    #[test]
    fn test_unknown_format_is_tolerated() {
        let link = parse(
            r#"{"id": "x", "sourceLayers": ["api"], "targetTypes": [], "cardinality": "single", "format": "url"}"#,
        );
        assert_eq!(link.format(), Some(LinkFormat::Other));
    }

    #[test]
    fn test_examples_flag_or_list() {
        let flagged = parse(
            r#"{"id": "a", "sourceLayers": ["ux"], "targetTypes": [], "cardinality": "single", "hasExamples": true}"#,
        );
        let listed = parse(
            r#"{"id": "b", "sourceLayers": ["ux"], "targetTypes": [], "cardinality": "single", "examples": [{"from": "x"}]}"#,
        );
        assert!(flagged.has_examples());
        assert!(listed.has_examples());
    }

    #[test]
    fn test_match_keys() {
        let link = parse(
            r#"{
                "id": "motivation-supports-goals",
                "predicate": "supports goals",
                "inversePredicate": "SupportedBy",
                "sourceLayers": ["business"],
                "targetLayer": "motivation",
                "targetTypes": ["goal"],
                "cardinality": "array",
                "fieldPaths": ["motivation.supports-goals"]
            }"#,
        );

        let keys = link.match_keys();
        let forward: Vec<&str> = keys
            .iter()
            .filter(|k| !k.is_inverse())
            .map(MatchKey::key)
            .collect();
        assert_eq!(forward, vec!["motivation-supports-goals", "supports-goals"]);

        let inverse: Vec<&str> = keys
            .iter()
            .filter(|k| k.is_inverse())
            .map(MatchKey::key)
            .collect();
        assert_eq!(inverse, vec!["supported-by"]);
    }

    #[test]
    fn test_normalize_key_collapses_separators() {
        assert_eq!(normalize_key("  Access__Read  "), "access-read");
        assert_eq!(normalize_key("--"), "");
        assert_eq!(normalize_key("API"), "api");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result: Result<LinkType, _> =
            serde_json::from_str(r#"{"id": "x", "sourceLayers": ["api"], "targetTypes": []}"#);
        assert!(result.is_err());
    }
}
