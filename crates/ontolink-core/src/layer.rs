//! Layer identifiers and naming conventions.
//!
//! A layer is one architectural concern-area of the specification. Layer ids
//! are plain lowercase strings such as `business` or `data-model`.

use std::collections::BTreeSet;

/// The layers every specification tree is expected to know about.
pub const CANONICAL_LAYERS: [&str; 12] = [
    "motivation",
    "business",
    "security",
    "application",
    "technology",
    "api",
    "data-model",
    "datastore",
    "ux",
    "navigation",
    "apm",
    "testing",
];

/// An ordered set of known layer ids.
///
/// Used by the parser to decide whether a dotted property key such as
/// `motivation.supports-goals` refers to another layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSet {
    layers: BTreeSet<String>,
}

impl LayerSet {
    /// Creates an empty layer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a layer set containing the [`CANONICAL_LAYERS`].
    pub fn canonical() -> Self {
        CANONICAL_LAYERS.iter().copied().collect()
    }

    /// Adds a layer id to the set.
    pub fn insert(&mut self, layer: impl Into<String>) {
        self.layers.insert(layer.into());
    }

    /// Returns `true` if the layer id is known.
    pub fn contains(&self, layer: &str) -> bool {
        self.layers.contains(layer)
    }

    /// Iterates the layer ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LayerSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            layers: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for LayerSet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.layers.extend(iter.into_iter().map(Into::into));
    }
}

/// Derives a layer id from a layer document file name.
///
/// Leading ordering digits and their separator are removed, as well as the
/// `.md` extension and a trailing `-layer`.
///
/// # Examples
///
/// ```
/// use ontolink_core::layer::layer_from_file_name;
///
/// assert_eq!(layer_from_file_name("02-business-layer.md").as_deref(), Some("business"));
/// assert_eq!(layer_from_file_name("07-data-model-layer.md").as_deref(), Some("data-model"));
/// assert_eq!(layer_from_file_name("security.md").as_deref(), Some("security"));
/// assert_eq!(layer_from_file_name("README"), None);
/// ```
pub fn layer_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".md")?;
    let stem = stem.trim_start_matches(|c: char| c.is_ascii_digit());
    let stem = stem.trim_start_matches(['-', '_', '.']);
    let stem = stem.strip_suffix("-layer").unwrap_or(stem);

    if stem.is_empty() {
        None
    } else {
        Some(stem.to_ascii_lowercase())
    }
}

/// Splits a dotted cross-layer field path into its layer and field parts.
///
/// Returns `None` when the path has no dot.
///
/// ```
/// use ontolink_core::layer::split_field_path;
///
/// assert_eq!(split_field_path("motivation.supports-goals"), Some(("motivation", "supports-goals")));
/// assert_eq!(split_field_path("name"), None);
/// ```
pub fn split_field_path(path: &str) -> Option<(&str, &str)> {
    let (layer, field) = path.split_once('.')?;
    if layer.is_empty() || field.is_empty() {
        None
    } else {
        Some((layer, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_layer_set() {
        let layers = LayerSet::canonical();
        assert_eq!(layers.len(), CANONICAL_LAYERS.len());
        assert!(layers.contains("business"));
        assert!(layers.contains("data-model"));
        assert!(!layers.contains("biz"));
    }

    #[test]
    fn test_layer_set_extend() {
        let mut layers = LayerSet::new();
        assert!(layers.is_empty());
        layers.extend(["custom", "business"]);
        layers.insert("custom");
        assert_eq!(layers.iter().collect::<Vec<_>>(), vec!["business", "custom"]);
    }

    #[test]
    fn test_layer_from_file_name_variants() {
        assert_eq!(
            layer_from_file_name("01-motivation-layer.md").as_deref(),
            Some("motivation")
        );
        assert_eq!(layer_from_file_name("12_testing.md").as_deref(), Some("testing"));
        assert_eq!(layer_from_file_name("notes.txt"), None);
        assert_eq!(layer_from_file_name("01-.md"), None);
    }

    #[test]
    fn test_split_field_path_edge_cases() {
        assert_eq!(split_field_path(".goal"), None);
        assert_eq!(split_field_path("motivation."), None);
        assert_eq!(
            split_field_path("apm.trace.span"),
            Some(("apm", "trace.span"))
        );
    }
}
