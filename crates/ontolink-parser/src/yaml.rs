//! YAML fence scanning and entity extraction.
//!
//! Fenced `yaml`/`yml` code blocks and the front matter `entities` list carry
//! entity declarations. Each entity mapping may hold dotted
//! `<layer>.<field>` keys, which are cross-layer references.

use std::ops::Range;

use log::trace;
use ontolink_core::layer::{LayerSet, split_field_path};
use serde_yaml::{Mapping, Value};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    preprocess::normalize_annotations,
    span::{LineIndex, Span},
};

/// A fenced `yaml` code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct YamlBlock<'a> {
    /// Text between the fence lines.
    pub text: &'a str,
    /// Byte offset of `text` in the document.
    pub text_start: usize,
    /// The whole block, fence lines included.
    pub block_range: Range<usize>,
}

/// An opening fence line: the fence character, its run length and the info string.
fn fence_open(line: &str) -> Option<(char, usize, &str)> {
    let content = line.trim_end();
    let indented = content.trim_start_matches(' ');
    if content.len() - indented.len() > 3 {
        return None;
    }

    let fence_char = indented.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let run = indented.len() - indented.trim_start_matches(fence_char).len();
    if run < 3 {
        return None;
    }

    let info = indented[run..].trim();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    Some((fence_char, run, info))
}

fn fence_closes(line: &str, fence_char: char, run: usize) -> bool {
    let content = line.trim();
    content.len() >= run && content.chars().all(|c| c == fence_char)
}

fn is_yaml_info(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|lang| lang.eq_ignore_ascii_case("yaml") || lang.eq_ignore_ascii_case("yml"))
}

/// Lazy iterator over the YAML fences of a document.
///
/// Other fences are stepped over so that a ```` ```yaml ```` line inside
/// them is not mistaken for a block. An unterminated YAML fence yields a
/// `W008` diagnostic and ends the scan.
pub(crate) struct YamlFences<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> YamlFences<'a> {
    /// Start scanning `source` at byte offset `start` (a line start).
    pub fn new(source: &'a str, start: usize) -> Self {
        Self {
            source,
            position: start,
        }
    }
}

impl<'a> Iterator for YamlFences<'a> {
    type Item = Result<YamlBlock<'a>, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.source.len() {
            let open_start = self.position;
            let open_line = self.source[open_start..]
                .split_inclusive('\n')
                .next()
                .unwrap_or_default();
            self.position += open_line.len();

            let Some((fence_char, run, info)) = fence_open(open_line) else {
                continue;
            };
            let is_yaml = is_yaml_info(info);
            let text_start = self.position;

            let mut offset = text_start;
            let mut closing = None;
            for line in self.source[text_start..].split_inclusive('\n') {
                if fence_closes(line, fence_char, run) {
                    closing = Some((offset, offset + line.len()));
                    break;
                }
                offset += line.len();
            }

            match closing {
                Some((text_end, block_end)) => {
                    self.position = block_end;
                    if is_yaml {
                        return Some(Ok(YamlBlock {
                            text: &self.source[text_start..text_end],
                            text_start,
                            block_range: open_start..block_end,
                        }));
                    }
                }
                None => {
                    self.position = self.source.len();
                    if is_yaml {
                        let open_end = open_start + open_line.trim_end().len();
                        return Some(Err(Diagnostic::new(ErrorCode::W008, "unterminated `yaml` code block")
                            .with_label(Span::new(open_start..open_end), "block opened here")
                            .with_help("close the block with a matching fence line")));
                    }
                }
            }
        }
        None
    }
}

/// Where a YAML text came from; decides its shape and warning code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum YamlSource {
    FrontMatter,
    Fence,
}

impl YamlSource {
    fn invalid_code(self) -> ErrorCode {
        match self {
            YamlSource::FrontMatter => ErrorCode::W004,
            YamlSource::Fence => ErrorCode::W003,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            YamlSource::FrontMatter => "front matter",
            YamlSource::Fence => "`yaml` block",
        }
    }
}

/// An entity mapping found in YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntityDeclaration {
    pub id: String,
    /// The explicit `type`; inference is left to the caller.
    pub entity_type: Option<String>,
    /// Document offset of the `id` key.
    pub offset: usize,
    pub properties: Vec<PropertyDeclaration>,
}

/// A dotted `<layer>.<field>` key of an entity mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PropertyDeclaration {
    pub field_path: String,
    pub target_layer: String,
    pub field: String,
    pub targets: Vec<String>,
    /// Document offset of the key.
    pub offset: usize,
}

/// Finds the text position of keys, since YAML values carry none.
struct KeyLocator<'t> {
    text: &'t str,
    base: usize,
    cursor: usize,
}

impl<'t> KeyLocator<'t> {
    fn new(text: &'t str, base: usize) -> Self {
        Self {
            text,
            base,
            cursor: 0,
        }
    }

    /// Local offset of the first line at or after `from` whose key is `key`
    /// (and which mentions `value`, when given).
    fn find(&self, from: usize, key: &str, value: Option<&str>) -> Option<usize> {
        let mut line_start = from;
        let mut mention = None;

        for line in self.text.get(from..)?.split_inclusive('\n') {
            let body = line.trim_start();
            let body = body.strip_prefix("- ").map_or(body, str::trim_start);
            let body_offset = line_start + (line.len() - body.len());

            let unquoted = body.trim_start_matches(['"', '\'']);
            let key_matches = unquoted
                .strip_prefix(key)
                .map(|rest| rest.trim_start_matches(['"', '\'']))
                .is_some_and(|rest| rest.starts_with(':'));
            let value_matches = value.is_none_or(|value| line.contains(value));

            if key_matches && value_matches {
                return Some(body_offset);
            }
            if mention.is_none() && value.is_some_and(|value| line.contains(value)) {
                mention = Some(body_offset);
            }
            line_start += line.len();
        }
        mention
    }

    /// Move the search start past the line holding local offset `offset`.
    fn advance_past(&mut self, offset: usize) {
        let line_end = Span::to_line_end(self.text, offset).end();
        self.cursor = self.cursor.max((line_end + 1).min(self.text.len()));
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Collect reference targets from a property value.
///
/// Accepts a string (comma separated ids), a scalar, a list of those, or
/// `{value: ...}` mappings produced by annotation preprocessing.
fn reference_targets(value: &Value, targets: &mut Vec<String>) -> Result<(), ()> {
    match value {
        Value::Null => Ok(()),
        Value::String(text) => {
            targets.extend(
                text.split(',')
                    .map(str::trim)
                    .filter(|target| !target.is_empty())
                    .map(str::to_string),
            );
            Ok(())
        }
        Value::Number(_) | Value::Bool(_) => {
            targets.extend(scalar_string(value));
            Ok(())
        }
        Value::Sequence(items) => items
            .iter()
            .try_for_each(|item| reference_targets(item, targets)),
        Value::Mapping(mapping) => match mapping.get("value") {
            Some(inner) if !inner.is_mapping() => reference_targets(inner, targets),
            _ => Err(()),
        },
        Value::Tagged(tagged) => reference_targets(&tagged.value, targets),
    }
}

struct Extractor<'k, 't, 'c> {
    known_layers: &'k LayerSet,
    locator: KeyLocator<'t>,
    collector: &'c mut DiagnosticCollector,
    declarations: Vec<EntityDeclaration>,
}

impl Extractor<'_, '_, '_> {
    fn line_span(&self, local_offset: usize) -> Span {
        Span::to_line_end(self.locator.text, local_offset).offset_by(self.locator.base)
    }

    /// Dotted keys whose first segment is a known layer.
    fn layer_keys<'m>(&self, mapping: &'m Mapping) -> Vec<(&'m str, &'m Value)> {
        let nested = mapping
            .get("properties")
            .and_then(Value::as_mapping)
            .into_iter()
            .flat_map(Mapping::iter);

        mapping
            .iter()
            .chain(nested)
            .filter_map(|(key, value)| Some((key.as_str()?, value)))
            .filter(|(key, _)| {
                split_field_path(key).is_some_and(|(layer, _)| self.known_layers.contains(layer))
            })
            .collect()
    }

    fn entity(&mut self, mapping: &Mapping) {
        let from = self.locator.cursor;
        let layer_keys = self.layer_keys(mapping);

        let Some(id) = mapping.get("id").and_then(scalar_string).filter(|id| !id.is_empty())
        else {
            if let Some((key, _)) = layer_keys.first() {
                let offset = self.locator.find(from, key, None).unwrap_or(from);
                self.locator.advance_past(offset);
                let span = self.line_span(offset);
                self.collector.emit(
                    Diagnostic::new(ErrorCode::W005, format!("`{key}` has no source entity"))
                        .with_label(span, "declared here")
                        .with_help("add an `id` to the mapping holding this reference"),
                );
            }
            return;
        };

        let id_offset = self.locator.find(from, "id", Some(&id)).unwrap_or(from);
        self.locator.advance_past(id_offset);

        let entity_type = mapping
            .get("type")
            .and_then(scalar_string)
            .filter(|entity_type| !entity_type.is_empty());

        let mut properties = Vec::with_capacity(layer_keys.len());
        for (key, value) in layer_keys {
            let offset = self.locator.find(from, key, None).unwrap_or(id_offset);
            self.locator.advance_past(offset);

            let mut targets = Vec::new();
            if reference_targets(value, &mut targets).is_err() {
                let span = self.line_span(offset);
                self.collector.emit(
                    Diagnostic::new(ErrorCode::W006, format!("`{key}` of `{id}` has an unreadable value"))
                        .with_label(span, "reference declared here")
                        .with_help("use an id, a list of ids, or `{value: <id>}` items"),
                );
                continue;
            }
            if targets.is_empty() {
                continue;
            }

            if let Some((target_layer, field)) = split_field_path(key) {
                trace!(entity = id, field_path = key, targets = targets.len(); "YAML property");
                properties.push(PropertyDeclaration {
                    field_path: key.to_string(),
                    target_layer: target_layer.to_string(),
                    field: field.to_string(),
                    targets,
                    offset: offset + self.locator.base,
                });
            }
        }

        self.declarations.push(EntityDeclaration {
            id,
            entity_type,
            offset: id_offset + self.locator.base,
            properties,
        });
    }

    fn items(&mut self, items: &[Value]) {
        for item in items {
            if let Some(mapping) = item.as_mapping() {
                self.entity(mapping);
            }
        }
    }
}

/// Parse a YAML text and extract its entity declarations.
///
/// `base` is the document offset of `text`. Unparseable YAML yields one
/// diagnostic and no declarations; a bad property only drops that property.
pub(crate) fn extract_entities(
    text: &str,
    base: usize,
    origin: YamlSource,
    known_layers: &LayerSet,
    collector: &mut DiagnosticCollector,
) -> Vec<EntityDeclaration> {
    let normalized = normalize_annotations(text);
    let value = match serde_yaml::from_str::<Value>(&normalized) {
        Ok(value) => value,
        Err(err) => {
            let line_index = LineIndex::new(text);
            let local = err
                .location()
                .and_then(|location| line_index.line_start(location.line()))
                .unwrap_or(0);

            collector.emit(
                Diagnostic::new(origin.invalid_code(), format!("invalid {}: {err}", origin.describe()))
                    .with_label(Span::to_line_end(text, local).offset_by(base), "YAML error here")
                    .with_help("fix the YAML syntax; declarations in this block were skipped"),
            );
            return Vec::new();
        }
    };

    let mut extractor = Extractor {
        known_layers,
        locator: KeyLocator::new(text, base),
        collector,
        declarations: Vec::new(),
    };

    match (&value, origin) {
        (Value::Mapping(mapping), YamlSource::FrontMatter) => {
            if let Some(items) = mapping.get("entities").and_then(Value::as_sequence) {
                extractor.items(items);
            }
        }
        (Value::Mapping(mapping), YamlSource::Fence) => {
            if mapping.contains_key("id") {
                extractor.entity(mapping);
            }
            match mapping.get("entities").and_then(Value::as_sequence) {
                Some(items) => extractor.items(items),
                None if !mapping.contains_key("id") => extractor.entity(mapping),
                None => {}
            }
        }
        (Value::Sequence(items), YamlSource::Fence) => extractor.items(items),
        (Value::Null, _) => {}
        (_, YamlSource::FrontMatter) => {
            let span = Span::new(0..text.trim_end().len()).offset_by(base);
            extractor.collector.emit(
                Diagnostic::new(ErrorCode::W004, "front matter is not a mapping")
                    .with_label(span, "expected `key: value` pairs"),
            );
        }
        (_, YamlSource::Fence) => {}
    }

    extractor.declarations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> LayerSet {
        LayerSet::canonical()
    }

    fn extract(text: &str) -> (Vec<EntityDeclaration>, Vec<Diagnostic>) {
        let mut collector = DiagnosticCollector::new();
        let declarations = extract_entities(text, 0, YamlSource::Fence, &layers(), &mut collector);
        (declarations, collector.into_diagnostics())
    }

    #[test]
    fn test_fences_yield_yaml_blocks_only() {
        let source = "# Doc\n```yaml\nid: a\n```\n```json\n{}\n```\n~~~yml\nid: b\n~~~\n";
        let blocks: Vec<_> = YamlFences::new(source, 0).map(Result::unwrap).collect();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "id: a\n");
        assert_eq!(&source[blocks[0].text_start..blocks[0].text_start + 6], "id: a\n");
        assert_eq!(&source[blocks[0].block_range.clone()], "```yaml\nid: a\n```\n");
        assert_eq!(blocks[1].text, "id: b\n");
    }

    #[test]
    fn test_yaml_inside_other_fence_is_ignored() {
        let source = "````markdown\n```yaml\nid: a\n```\n````\n";
        assert_eq!(YamlFences::new(source, 0).count(), 0);
    }

    #[test]
    fn test_unterminated_yaml_fence() {
        let source = "text\n```yaml\nid: a\n";
        let results: Vec<_> = YamlFences::new(source, 0).collect();

        assert_eq!(results.len(), 1);
        let diagnostic = results[0].as_ref().unwrap_err();
        assert_eq!(diagnostic.code(), ErrorCode::W008);
        assert_eq!(diagnostic.primary_span(), Some(Span::new(5..12)));
    }

    #[test]
    fn test_single_entity_with_properties() {
        let text = "id: biz.service.billing\ntype: service\nname: Billing\nmotivation.supports-goals:\n  - motivation.goal.a\n  - motivation.goal.b\nproperties:\n  security.policies: security.policy.pci\n";
        let (declarations, diagnostics) = extract(text);

        assert!(diagnostics.is_empty());
        assert_eq!(declarations.len(), 1);
        let entity = &declarations[0];
        assert_eq!(entity.id, "biz.service.billing");
        assert_eq!(entity.entity_type.as_deref(), Some("service"));
        assert_eq!(entity.offset, 0);
        assert_eq!(entity.properties.len(), 2);

        let goals = &entity.properties[0];
        assert_eq!(goals.field_path, "motivation.supports-goals");
        assert_eq!(goals.target_layer, "motivation");
        assert_eq!(goals.field, "supports-goals");
        assert_eq!(goals.targets, vec!["motivation.goal.a", "motivation.goal.b"]);
        assert_eq!(&text[goals.offset..goals.offset + 10], "motivation");

        let policies = &entity.properties[1];
        assert_eq!(policies.targets, vec!["security.policy.pci"]);
        assert_eq!(&text[policies.offset..policies.offset + 8], "security");
    }

    #[test]
    fn test_sequence_and_entities_list_locations() {
        let text = "entities:\n  - id: biz.actor.customer\n  - id: biz.actor.clerk\n    type: actor\n";
        let (declarations, _) = extract(text);

        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].entity_type, None);
        assert_eq!(&text[declarations[1].offset..declarations[1].offset + 3], "id:");
        assert!(declarations[1].offset > declarations[0].offset);
    }

    #[test]
    fn test_annotated_values_and_comma_lists() {
        let text = "id: app.component.web\napplication.uses: \"app.service.a\" (main backend)\ndata-model.entities: a.x.one, a.x.two\n";
        let (declarations, diagnostics) = extract(text);

        assert!(diagnostics.is_empty());
        let properties = &declarations[0].properties;
        assert_eq!(properties[0].targets, vec!["app.service.a"]);
        assert_eq!(properties[1].targets, vec!["a.x.one", "a.x.two"]);
    }

    #[test]
    fn test_unknown_layers_and_empty_values_are_ignored() {
        let text = "id: a.b.c\ncustom.field: x\nmotivation.supports-goals:\n";
        let (declarations, diagnostics) = extract(text);

        assert!(diagnostics.is_empty());
        assert!(declarations[0].properties.is_empty());
    }

    #[test]
    fn test_invalid_yaml_reports_line() {
        let text = "id: a.b.c\nname: [unclosed\n";
        let mut collector = DiagnosticCollector::new();
        let declarations =
            extract_entities(text, 100, YamlSource::Fence, &layers(), &mut collector);

        assert!(declarations.is_empty());
        let diagnostics = collector.into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), ErrorCode::W003);
        assert!(diagnostics[0].primary_span().unwrap().start() >= 100);
    }

    #[test]
    fn test_unreadable_property_value() {
        let text = "id: a.b.c\nmotivation.supports-goals:\n  nested: true\n";
        let (declarations, diagnostics) = extract(text);
        assert_eq!(declarations.len(), 1);
        assert!(declarations[0].properties.is_empty());
        assert_eq!(diagnostics[0].code(), ErrorCode::W006);
    }

    #[test]
    fn test_orphan_property_without_id() {
        let text = "name: x\nmotivation.supports-goals: motivation.goal.a\n";
        let (declarations, diagnostics) = extract(text);

        assert!(declarations.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), ErrorCode::W005);
        assert_eq!(diagnostics[0].primary_span(), Some(Span::new(8..52)));
    }

    #[test]
    fn test_front_matter_reads_entities_only() {
        let text = "layer: business\nid: not.an.entity\nentities:\n  - id: biz.role.clerk\n";
        let mut collector = DiagnosticCollector::new();
        let declarations =
            extract_entities(text, 4, YamlSource::FrontMatter, &layers(), &mut collector);

        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].id, "biz.role.clerk");
        assert!(collector.into_diagnostics().is_empty());
    }
}
