//! The Link Registry: every legal relationship type and its constraints.
//!
//! The registry is loaded once per run from a JSON document of the form
//! `{"linkTypes": [ ... ]}` and is immutable afterwards. Lookups go through
//! hash-map indexes built at load time.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use winnow::{ModalResult, Parser as _, ascii::multispace0};

use ontolink_core::{
    link_type::{LinkType, normalize_key},
    relationship::RelationshipRecord,
};
use ontolink_parser::{
    LineIndex, Span,
    error::{Diagnostic, ErrorCode},
};

use crate::error::OntologyError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    link_types: Vec<LinkType>,
}

/// A source layer of a link type without an explicit source-type list.
///
/// Any entity type of that layer may originate the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryGap {
    link_id: String,
    layer: String,
    line: usize,
}

impl RegistryGap {
    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Line of the link type's `id` in the registry file.
    pub fn line(&self) -> usize {
        self.line
    }
}

/// Aggregate registry figures, computed in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total: usize,
    pub with_predicates: usize,
    pub with_inverse_predicates: usize,
    pub bidirectional: usize,
    pub required: usize,
    pub with_examples: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub strength_counts: BTreeMap<String, usize>,
    pub registry_gaps: usize,
}

/// A link type matched under a key, and whether the key was its inverse.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'r> {
    link: &'r LinkType,
    inverse: bool,
}

impl<'r> Candidate<'r> {
    pub fn link(&self) -> &'r LinkType {
        self.link
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// Whether an entity of `entity_type` in `layer` may stand on the
    /// source side of the matched direction.
    ///
    /// Under an inverse match the record's source is the link's target, so
    /// the link's target types apply.
    pub fn accepts_source(&self, layer: &str, entity_type: &str) -> bool {
        if self.inverse {
            self.link.accepts_target_type(entity_type)
        } else {
            self.link.accepts_source_type(layer, entity_type)
        }
    }

    /// Whether an entity of `entity_type` in `layer` may stand on the
    /// target side of the matched direction.
    pub fn accepts_target(&self, layer: &str, entity_type: &str) -> bool {
        if self.inverse {
            self.link.accepts_source_type(layer, entity_type)
        } else {
            self.link.accepts_target_type(entity_type)
        }
    }
}

/// The loaded link registry.
#[derive(Debug, Clone)]
pub struct LinkRegistry {
    path: PathBuf,
    links: IndexMap<String, LinkType>,
    lines: Vec<usize>,
    by_source_layer: HashMap<String, Vec<usize>>,
    by_source_type: HashMap<(String, String), Vec<usize>>,
    by_match_key: HashMap<(String, String), Vec<(usize, bool)>>,
}

/// Length of `"id": <quoted_id>` at the start of `input`, if it is there.
fn id_member_len(input: &str, quoted_id: &str) -> Option<usize> {
    let mut rest = input;
    let member: ModalResult<()> = ("\"id\"", multispace0, ':', multispace0, quoted_id)
        .void()
        .parse_next(&mut rest);
    member.ok().map(|()| input.len() - rest.len())
}

/// Offsets of the `"id"` string value of each link type, in file order.
///
/// Only `"id": "<value>"` members count, and the search resumes after the
/// previous hit, so the same text in another field or a repeated id never
/// steals a link type's position.
fn id_offsets(source: &str, links: &[LinkType]) -> Vec<Option<usize>> {
    let mut cursor = 0;
    links
        .iter()
        .map(|link| {
            let quoted = format!("\"{}\"", link.id());
            let from = cursor;
            let (start, len) = source
                .get(from..)?
                .match_indices("\"id\"")
                .find_map(|(idx, _)| {
                    let start = from + idx;
                    id_member_len(&source[start..], &quoted).map(|len| (start, len))
                })?;
            cursor = start + len;
            Some(cursor - quoted.len())
        })
        .collect()
}

impl LinkRegistry {
    /// Load the registry from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::RegistryLoad`] if the file cannot be read,
    /// is not well-formed, lacks `linkTypes`, has an entry missing a
    /// required field, or repeats an id.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OntologyError> {
        let path = path.as_ref();
        info!(path:? = path; "Loading link registry");

        let source = fs::read_to_string(path)
            .map_err(|err| OntologyError::registry_load(path, err.to_string()))?;
        Self::parse(&source, path)
    }

    /// Build the registry from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`LinkRegistry::load`], minus I/O.
    ///
    /// # Examples
    ///
    /// ```
    /// use ontolink::registry::LinkRegistry;
    ///
    /// let registry = LinkRegistry::from_json(r#"{"linkTypes": [{
    ///     "id": "serving",
    ///     "sourceLayers": ["business"],
    ///     "sourceElementTypesByLayer": {"business": ["actor"]},
    ///     "targetTypes": ["service"],
    ///     "cardinality": "single"
    /// }]}"#).unwrap();
    ///
    /// assert!(registry.lookup("serving").is_some());
    /// assert_eq!(registry.allowed_from("business", "actor").len(), 1);
    /// ```
    pub fn from_json(source: &str) -> Result<Self, OntologyError> {
        Self::parse(source, Path::new("<inline>"))
    }

    fn parse(source: &str, path: &Path) -> Result<Self, OntologyError> {
        let line_index = LineIndex::new(source);

        let file: RegistryFile = serde_json::from_str(source).map_err(|err| {
            let offset = line_index.offset(source, err.line(), err.column());
            let end = (offset + 1).min(source.len());
            let diagnostic = Diagnostic::new(ErrorCode::E100, format!("malformed link registry: {err}"))
                .with_label(Span::new(offset..end), "registry error here")
                .with_help("the registry must be `{\"linkTypes\": [...]}` with `id`, `sourceLayers`, `targetTypes` and `cardinality` on every entry");
            OntologyError::registry_diagnostic(path, diagnostic, source)
        })?;

        let offsets = id_offsets(source, &file.link_types);
        let mut links: IndexMap<String, LinkType> = IndexMap::with_capacity(file.link_types.len());
        let mut lines = Vec::with_capacity(file.link_types.len());

        for (link, offset) in file.link_types.into_iter().zip(offsets) {
            if let Some(first) = links.get_index_of(link.id()) {
                let span_of = |offset: Option<usize>| {
                    offset.map_or(Span::default(), |start| {
                        Span::new(start..start + link.id().len() + 2)
                    })
                };
                let first_offset = lines
                    .get(first)
                    .and_then(|line| line_index.line_start(*line));
                let diagnostic =
                    Diagnostic::new(ErrorCode::E101, format!("duplicate link type id `{}`", link.id()))
                        .with_label(span_of(offset), "duplicate definition")
                        .with_secondary_label(span_of(first_offset), "first defined on this line")
                        .with_help("link type ids must be unique");
                return Err(OntologyError::registry_diagnostic(path, diagnostic, source));
            }

            let line = offset.map_or(1, |offset| line_index.line(offset));
            lines.push(line);
            links.insert(link.id().to_string(), link);
        }

        let registry = Self::index(path.to_path_buf(), links, lines);
        info!(
            link_types = registry.len(),
            gaps = registry.registry_gaps().len();
            "Link registry loaded"
        );
        Ok(registry)
    }

    fn index(path: PathBuf, links: IndexMap<String, LinkType>, lines: Vec<usize>) -> Self {
        let mut by_source_layer: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_source_type: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut by_match_key: HashMap<(String, String), Vec<(usize, bool)>> = HashMap::new();

        for (idx, link) in links.values().enumerate() {
            let keys = link.match_keys();
            for layer in link.source_layers() {
                by_source_layer
                    .entry(layer.to_string())
                    .or_default()
                    .push(idx);

                for entity_type in link.allowed_source_types(layer).into_iter().flatten() {
                    by_source_type
                        .entry((layer.to_string(), entity_type.clone()))
                        .or_default()
                        .push(idx);
                }

                for key in &keys {
                    by_match_key
                        .entry((layer.to_string(), key.key().to_string()))
                        .or_default()
                        .push((idx, key.is_inverse()));
                }
            }
        }

        debug!(
            source_layers = by_source_layer.len(),
            match_keys = by_match_key.len();
            "Registry indexes built"
        );

        Self {
            path,
            links,
            lines,
            by_source_layer,
            by_source_type,
            by_match_key,
        }
    }

    /// Path the registry was loaded from (`<inline>` for text).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All link types in file order.
    pub fn links(&self) -> impl Iterator<Item = &LinkType> {
        self.links.values()
    }

    pub fn lookup(&self, id: &str) -> Option<&LinkType> {
        self.links.get(id)
    }

    /// Link types an entity of `entity_type` in `layer` may originate, in
    /// file order. Gap layers accept every type.
    pub fn allowed_from(&self, layer: &str, entity_type: &str) -> Vec<&LinkType> {
        let Some(layer_links) = self.by_source_layer.get(layer) else {
            return Vec::new();
        };
        let typed = self
            .by_source_type
            .get(&(layer.to_string(), entity_type.to_string()));

        layer_links
            .iter()
            .filter(|idx| {
                typed.is_some_and(|typed| typed.contains(*idx))
                    || self.links[**idx].allowed_source_types(layer).is_none()
            })
            .map(|idx| &self.links[*idx])
            .collect()
    }

    /// Link types originating in `layer` that can be matched by `key`.
    ///
    /// `key` is normalized before lookup, so `Serving`, `serving` and
    /// `motivation.supports-goals` / `motivation-supports-goals` are
    /// interchangeable.
    pub fn candidates(&self, layer: &str, key: &str) -> Vec<Candidate<'_>> {
        self.by_match_key
            .get(&(layer.to_string(), normalize_key(key)))
            .map(|entries| {
                entries
                    .iter()
                    .map(|(idx, inverse)| Candidate {
                        link: &self.links[*idx],
                        inverse: *inverse,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The link type a record declares, if any.
    ///
    /// The record's match label is tried first, then its plain label. Only
    /// candidates whose target layer is the record's target layer qualify;
    /// among those, one accepting `source_type` wins over the first.
    pub fn match_record(
        &self,
        record: &RelationshipRecord,
        source_type: Option<&str>,
    ) -> Option<Candidate<'_>> {
        let layer = record.source_layer();
        let mut keys = vec![record.match_label()];
        if record.label() != record.match_label() {
            keys.push(record.label());
        }

        keys.into_iter().find_map(|key| {
            let candidates: Vec<Candidate<'_>> = self
                .candidates(layer, key)
                .into_iter()
                .filter(|candidate| candidate.link.target_layer_for(layer) == record.target_layer())
                .collect();

            let accepting = source_type.and_then(|entity_type| {
                candidates
                    .iter()
                    .find(|candidate| candidate.accepts_source(layer, entity_type))
                    .copied()
            });
            accepting.or_else(|| candidates.first().copied())
        })
    }

    /// Required link types originating in `layer`.
    pub fn required_from(&self, layer: &str) -> impl Iterator<Item = &LinkType> {
        self.by_source_layer
            .get(layer)
            .into_iter()
            .flatten()
            .map(|idx| &self.links[*idx])
            .filter(|link| link.is_required())
    }

    /// Line of link type `id` in the registry file.
    pub fn line_of(&self, id: &str) -> Option<usize> {
        self.links
            .get_index_of(id)
            .and_then(|idx| self.lines.get(idx).copied())
    }

    /// Every `(link type, source layer)` pair without a source-type list.
    pub fn registry_gaps(&self) -> Vec<RegistryGap> {
        self.links
            .values()
            .zip(&self.lines)
            .flat_map(|(link, line)| {
                link.gap_layers().map(move |layer| RegistryGap {
                    link_id: link.id().to_string(),
                    layer: layer.to_string(),
                    line: *line,
                })
            })
            .collect()
    }

    pub fn links_without_examples(&self) -> Vec<&LinkType> {
        self.links().filter(|link| !link.has_examples()).collect()
    }

    pub fn links_without_predicates(&self) -> Vec<&LinkType> {
        self.links()
            .filter(|link| link.predicate().is_none())
            .collect()
    }

    /// Compute [`RegistryStatistics`] in a single pass.
    ///
    /// `category_counts` always sums to `total`.
    pub fn statistics(&self) -> RegistryStatistics {
        self.links()
            .fold(RegistryStatistics::default(), |mut stats, link| {
                stats.total += 1;
                stats.with_predicates += usize::from(link.predicate().is_some());
                stats.with_inverse_predicates += usize::from(link.inverse_predicate().is_some());
                stats.bidirectional += usize::from(link.is_bidirectional());
                stats.required += usize::from(link.is_required());
                stats.with_examples += usize::from(link.has_examples());
                stats.registry_gaps += link.gap_layers().count();
                *stats
                    .category_counts
                    .entry(link.category().to_string())
                    .or_default() += 1;
                if let Some(strength) = link.strength() {
                    *stats
                        .strength_counts
                        .entry(strength.to_string())
                        .or_default() += 1;
                }
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use ontolink_core::relationship::{FormatType, SourceLocation};

    use super::*;

    const REGISTRY: &str = r#"{
  "linkTypes": [
    {
      "id": "serving",
      "name": "Serving",
      "category": "dependency",
      "predicate": "serves",
      "inversePredicate": "served by",
      "sourceLayers": ["business"],
      "sourceElementTypesByLayer": {"business": ["actor", "service"]},
      "targetTypes": ["service"],
      "cardinality": "single",
      "strength": "high",
      "examples": ["biz.actor.customer -> biz.service.billing"]
    },
    {
      "id": "motivation-supports-goals",
      "sourceLayers": ["business", "application"],
      "sourceElementTypesByLayer": {"business": ["service"]},
      "targetLayer": "motivation",
      "targetTypes": ["goal"],
      "cardinality": "array",
      "required": true,
      "bidirectional": false
    }
  ]
}"#;

    fn registry() -> LinkRegistry {
        LinkRegistry::from_json(REGISTRY).expect("valid registry")
    }

    #[test]
    fn test_lookup_and_lines() {
        let registry = registry();

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("serving").is_some());
        assert!(registry.lookup("missing").is_none());
        assert_eq!(registry.line_of("serving"), Some(4));
        assert_eq!(registry.line_of("motivation-supports-goals"), Some(17));
    }

    #[test]
    fn test_allowed_from_respects_types_and_gaps() {
        let registry = registry();

        let ids = |links: Vec<&LinkType>| links.iter().map(|l| l.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(registry.allowed_from("business", "actor")), ["serving"]);
        assert_eq!(
            ids(registry.allowed_from("business", "service")),
            ["serving", "motivation-supports-goals"]
        );
        assert_eq!(
            ids(registry.allowed_from("application", "component")),
            ["motivation-supports-goals"]
        );
        assert!(registry.allowed_from("data-model", "entity").is_empty());
    }

    #[test]
    fn test_candidates_by_label_predicate_and_field_path() {
        let registry = registry();

        assert_eq!(registry.candidates("business", "Serving").len(), 1);
        assert!(!registry.candidates("business", "serves")[0].is_inverse());
        assert!(registry.candidates("business", "ServedBy")[0].is_inverse());
        assert_eq!(
            registry.candidates("business", "motivation.supports-goals")[0].link().id(),
            "motivation-supports-goals"
        );
        assert!(registry.candidates("security", "serving").is_empty());
    }

    fn record(label: &str, target_layer: &str) -> RelationshipRecord {
        RelationshipRecord::new(
            FormatType::XmlRelationship,
            "business",
            "biz.service.billing",
            target_layer,
            vec!["x.y.z".to_string()],
            label,
            SourceLocation::new("business.md", 1, 1),
        )
    }

    #[test]
    fn test_match_record_checks_target_layer() {
        let registry = registry();

        let matched = registry.match_record(&record("Serving", "business"), Some("actor"));
        assert_eq!(matched.map(|c| c.link().id()), Some("serving"));

        assert!(registry.match_record(&record("Serving", "motivation"), None).is_none());

        let property = record("supports-goals", "motivation").with_field_path("motivation.supports-goals");
        let matched = registry.match_record(&property, Some("service")).unwrap();
        assert_eq!(matched.link().id(), "motivation-supports-goals");
        assert!(!matched.is_inverse());
    }

    #[test]
    fn test_inverse_candidate_swaps_type_checks() {
        let registry = registry();
        let matched = registry.match_record(&record("served by", "business"), None).unwrap();

        assert!(matched.is_inverse());
        assert!(matched.accepts_source("business", "service"));
        assert!(!matched.accepts_source("business", "actor"));
        assert!(matched.accepts_target("business", "actor"));
        assert!(!matched.accepts_target("business", "goal"));
    }

    #[test]
    fn test_statistics_and_gaps() {
        let registry = registry();
        let stats = registry.statistics();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_predicates, 1);
        assert_eq!(stats.with_inverse_predicates, 1);
        assert_eq!(stats.bidirectional, 1);
        assert_eq!(stats.required, 1);
        assert_eq!(stats.with_examples, 1);
        assert_eq!(stats.category_counts.values().sum::<usize>(), stats.total);
        assert_eq!(stats.category_counts["uncategorized"], 1);
        assert_eq!(stats.strength_counts["high"], 1);
        assert_eq!(stats.registry_gaps, 1);

        let gaps = registry.registry_gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].link_id(), "motivation-supports-goals");
        assert_eq!(gaps[0].layer(), "application");
        assert_eq!(gaps[0].line(), 17);

        assert_eq!(registry.links_without_examples().len(), 1);
        assert_eq!(registry.links_without_predicates()[0].id(), "motivation-supports-goals");
        assert_eq!(registry.required_from("business").count(), 1);
    }

    #[test]
    fn test_lines_ignore_ids_quoted_in_other_fields() {
        let registry = LinkRegistry::from_json(
            r#"{"linkTypes": [
  {"id": "serving", "predicate": "flow",
   "sourceLayers": ["business"], "sourceElementTypesByLayer": {"business": ["actor"]},
   "targetTypes": [], "cardinality": "array"},
  {"id":"flow", "sourceLayers": ["business"],
   "targetTypes": [], "cardinality": "array"}
]}"#,
        )
        .unwrap();

        assert_eq!(registry.line_of("serving"), Some(2));
        assert_eq!(registry.line_of("flow"), Some(5));

        let gaps = registry.registry_gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].link_id(), "flow");
        assert_eq!(gaps[0].line(), 5);
    }

    #[test]
    fn test_malformed_json_has_position() {
        let err = LinkRegistry::from_json("{\n  \"linkTypes\": [\n    {\"id\": }\n  ]\n}").unwrap_err();

        match err {
            OntologyError::RegistryLoad {
                diagnostic: Some(diagnostic),
                src,
                ..
            } => {
                assert_eq!(diagnostic.code(), ErrorCode::E100);
                let span = diagnostic.primary_span().unwrap();
                assert_eq!(LineIndex::new(&src).line(span.start()), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let err = LinkRegistry::from_json(
            r#"{"linkTypes": [{"id": "x", "sourceLayers": ["business"], "targetTypes": []}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cardinality"), "{err}");

        let err = LinkRegistry::from_json(r#"{"links": []}"#).unwrap_err();
        assert!(err.to_string().contains("linkTypes"), "{err}");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let source = r#"{"linkTypes": [
  {"id": "serving", "sourceLayers": ["business"], "targetTypes": [], "cardinality": "single"},
  {"id": "serving", "sourceLayers": ["business"], "targetTypes": [], "cardinality": "array"}
]}"#;
        let err = LinkRegistry::from_json(source).unwrap_err();

        match err {
            OntologyError::RegistryLoad {
                diagnostic: Some(diagnostic),
                ..
            } => {
                assert_eq!(diagnostic.code(), ErrorCode::E101);
                let span = diagnostic.primary_span().unwrap();
                assert_eq!(LineIndex::new(source).line(span.start()), 3);
                assert_eq!(diagnostic.labels().len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = LinkRegistry::load("/nonexistent/link-registry.json").unwrap_err();
        assert!(matches!(
            err,
            OntologyError::RegistryLoad { diagnostic: None, .. }
        ));
    }
}
