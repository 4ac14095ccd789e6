//! Normalization of one layer document into relationship records.

use log::{debug, trace};
use ontolink_core::{
    entity::{Entity, infer_entity_type},
    layer::{LayerSet, split_field_path},
    relationship::{FormatType, RelationshipRecord, SourceLocation},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    frontmatter::locate_front_matter,
    span::{LineIndex, Span},
    tags::{Tag, TagForm, TagKind, TagScanner, decode_entities},
    yaml::{EntityDeclaration, YamlFences, YamlSource, extract_entities},
};

/// A declaration the parser skipped, with where it was found.
#[derive(Debug, Clone)]
pub struct ParserWarning {
    diagnostic: Diagnostic,
    location: SourceLocation,
}

impl ParserWarning {
    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }
}

/// Everything extracted from one layer document.
///
/// Records, entities and warnings are each ordered by source location.
#[derive(Debug, Clone)]
pub struct ParseResult {
    layer: String,
    file: String,
    relationships: Vec<RelationshipRecord>,
    entities: Vec<Entity>,
    warnings: Vec<ParserWarning>,
}

impl ParseResult {
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn relationships(&self) -> &[RelationshipRecord] {
        &self.relationships
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn warnings(&self) -> &[ParserWarning] {
        &self.warnings
    }
}

/// An `<element>` enclosing the tags being scanned.
struct ElementFrame {
    id: Option<String>,
    entity_type: Option<String>,
    span: Span,
}

/// A `<property key="...">` waiting for its closing tag to supply the value.
struct PendingProperty {
    field_path: String,
    source: String,
    source_type: Option<String>,
    content_start: usize,
    span: Span,
}

struct DocumentParser<'a> {
    source: &'a str,
    layer: &'a str,
    file: &'a str,
    known_layers: &'a LayerSet,
    line_index: LineIndex,
    collector: DiagnosticCollector,
    relationships: Vec<RelationshipRecord>,
    entities: Vec<Entity>,
}

fn split_targets(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}

impl<'a> DocumentParser<'a> {
    fn location(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.line_index.line_col(self.source, offset);
        SourceLocation::new(self.file, line, column)
    }

    fn missing_attribute(&mut self, tag: &Tag<'_>, attribute: &str, help: &str) {
        self.collector.emit(
            Diagnostic::new(ErrorCode::W002, format!("`<{}>` tag has no `{attribute}` attribute", tag.kind))
                .with_label(tag.span, "tag declared here")
                .with_help(help.to_string()),
        );
    }

    /// Declared or inferred type of entity `id`; warns when neither exists.
    fn entity_type(&mut self, id: &str, declared: Option<String>, span: Span) -> Option<String> {
        let entity_type = declared.or_else(|| infer_entity_type(id).map(str::to_string));
        if entity_type.is_none() {
            self.collector.emit(
                Diagnostic::new(ErrorCode::W005, format!("entity `{id}` has no type"))
                    .with_label(span, "declared here")
                    .with_help("add a `type`, or use an id of the form `<prefix>.<type>.<name>`"),
            );
        }
        entity_type
    }

    fn declare_entity(&mut self, id: &str, entity_type: &str, offset: usize) {
        trace!(layer = self.layer, id, entity_type; "Entity declared");
        let location = self.location(offset);
        self.entities
            .push(Entity::new(self.layer, id, entity_type, location));
    }

    /// Record a `<layer>.<field>` reference, if its layer is known.
    fn property(
        &mut self,
        format_type: FormatType,
        source: &str,
        source_type: Option<String>,
        field_path: &str,
        targets: Vec<String>,
        offset: usize,
    ) {
        let Some((target_layer, field)) = split_field_path(field_path)
            .filter(|(layer, _)| self.known_layers.contains(layer))
        else {
            trace!(field_path; "Ignoring property of unknown layer");
            return;
        };

        trace!(
            format_type:%,
            source,
            field_path,
            targets = targets.len();
            "Property reference"
        );
        let record = RelationshipRecord::new(
            format_type,
            self.layer,
            source,
            target_layer,
            targets,
            field,
            self.location(offset),
        )
        .with_field_path(field_path)
        .with_source_type(source_type);
        self.relationships.push(record);
    }

    fn yaml_declarations(&mut self, declarations: Vec<EntityDeclaration>) {
        for declaration in declarations {
            let span = Span::new(declaration.offset..declaration.offset + declaration.id.len());
            let entity_type = self.entity_type(&declaration.id, declaration.entity_type, span);
            if let Some(entity_type) = &entity_type {
                self.declare_entity(&declaration.id, entity_type, declaration.offset);
            }

            for property in declaration.properties {
                let location = self.location(property.offset);
                let record = RelationshipRecord::new(
                    FormatType::YamlProperty,
                    self.layer,
                    declaration.id.as_str(),
                    property.target_layer,
                    property.targets,
                    property.field,
                    location,
                )
                .with_field_path(property.field_path)
                .with_source_type(entity_type.clone());
                self.relationships.push(record);
            }
        }
    }

    /// Source entity of a nested tag: explicit `source`, else the enclosing element.
    fn tag_source(&self, tag: &Tag<'_>, stack: &[ElementFrame]) -> Option<(String, Option<String>)> {
        let enclosing = stack.last().and_then(|frame| {
            frame
                .id
                .as_ref()
                .map(|id| (id.clone(), frame.entity_type.clone()))
        });

        match tag.attribute("source") {
            Some(source) => {
                let entity_type = enclosing
                    .filter(|(id, _)| *id == source)
                    .and_then(|(_, entity_type)| entity_type);
                Some((source.into_owned(), entity_type))
            }
            None => enclosing,
        }
    }

    fn no_source(&mut self, tag: &Tag<'_>) {
        self.collector.emit(
            Diagnostic::new(ErrorCode::W005, format!("`<{}>` tag has no source entity", tag.kind))
                .with_label(tag.span, "tag declared here")
                .with_help("add `source=\"<entity id>\"` or nest the tag inside an `<element>`"),
        );
    }

    fn element(&mut self, tag: &Tag<'_>, stack: &mut Vec<ElementFrame>) {
        match tag.form {
            TagForm::Close => {
                if stack.pop().is_none() {
                    self.collector.emit(
                        Diagnostic::new(ErrorCode::W007, "`</element>` has no opening tag")
                            .with_label(tag.span, "closed here"),
                    );
                }
            }
            TagForm::Open | TagForm::SelfClosing => {
                let id = tag.attribute("id").map(|id| id.into_owned());
                let entity_type = match &id {
                    Some(id) => {
                        let declared = tag.attribute("type").map(|t| t.into_owned());
                        let entity_type = self.entity_type(id, declared, tag.span);
                        if let Some(entity_type) = &entity_type {
                            self.declare_entity(id, entity_type, tag.span.start());
                        }
                        entity_type
                    }
                    None => {
                        self.missing_attribute(tag, "id", "add `id=\"<entity id>\"`");
                        None
                    }
                };

                if tag.form == TagForm::Open {
                    stack.push(ElementFrame {
                        id,
                        entity_type,
                        span: tag.span,
                    });
                }
            }
        }
    }

    fn relationship(&mut self, tag: &Tag<'_>, stack: &[ElementFrame]) {
        if tag.form == TagForm::Close {
            return;
        }

        let Some(label) = tag.attribute("type") else {
            self.missing_attribute(tag, "type", "add `type=\"<relationship type>\"`");
            return;
        };
        let Some(target) = tag.attribute("target") else {
            self.missing_attribute(tag, "target", "add `target=\"<entity id>\"`");
            return;
        };
        let Some((source, source_type)) = self.tag_source(tag, stack) else {
            self.no_source(tag);
            return;
        };

        let targets = split_targets(&target);
        if targets.is_empty() {
            self.missing_attribute(tag, "target", "add `target=\"<entity id>\"`");
            return;
        }

        trace!(source = source.as_str(), label = &*label, targets = targets.len(); "Relationship tag");
        let target_type = tag
            .attribute("targetType")
            .or_else(|| tag.attribute("target-type"))
            .map(|t| t.into_owned());
        let record = RelationshipRecord::new(
            FormatType::XmlRelationship,
            self.layer,
            source,
            self.layer,
            targets,
            label,
            self.location(tag.span.start()),
        )
        .with_source_type(source_type)
        .with_target_type(target_type);
        self.relationships.push(record);
    }

    fn property_tag(
        &mut self,
        tag: &Tag<'_>,
        stack: &[ElementFrame],
        pending: &mut Option<PendingProperty>,
    ) {
        if tag.form == TagForm::Close {
            if let Some(open) = pending.take() {
                let source = self.source;
                let content = decode_entities(source[open.content_start..tag.span.start()].trim());
                let targets = split_targets(&content);
                if targets.is_empty() {
                    self.unvalued_property(open.span);
                } else {
                    self.property(
                        FormatType::XmlProperty,
                        &open.source,
                        open.source_type,
                        &open.field_path,
                        targets,
                        open.span.start(),
                    );
                }
            }
            return;
        }

        if let Some(open) = pending.take() {
            self.unvalued_property(open.span);
        }

        let Some(key) = tag.attribute("key") else {
            self.missing_attribute(tag, "key", "add `key=\"<layer>.<field>\"`");
            return;
        };
        let Some((source, source_type)) = self.tag_source(tag, stack) else {
            self.no_source(tag);
            return;
        };

        match (tag.attribute("value"), tag.form) {
            (Some(value), _) => {
                let targets = split_targets(&value);
                if targets.is_empty() {
                    self.unvalued_property(tag.span);
                    return;
                }
                self.property(
                    FormatType::XmlProperty,
                    &source,
                    source_type,
                    &key,
                    targets,
                    tag.span.start(),
                );
            }
            (None, TagForm::Open) => {
                *pending = Some(PendingProperty {
                    field_path: key.into_owned(),
                    source,
                    source_type,
                    content_start: tag.span.end(),
                    span: tag.span,
                });
            }
            (None, _) => self.unvalued_property(tag.span),
        }
    }

    fn unvalued_property(&mut self, span: Span) {
        self.collector.emit(
            Diagnostic::new(ErrorCode::W002, "`<property>` tag has no `value`")
                .with_label(span, "tag declared here")
                .with_help("add `value=\"<id>\"` or put the value before `</property>`"),
        );
    }

    fn scan_tags(&mut self, skip: Vec<std::ops::Range<usize>>) {
        let mut stack: Vec<ElementFrame> = Vec::new();
        let mut pending: Option<PendingProperty> = None;

        for tag in TagScanner::new(self.source, skip) {
            let tag = match tag {
                Ok(tag) => tag,
                Err(diagnostic) => {
                    self.collector.emit(diagnostic);
                    continue;
                }
            };

            match tag.kind {
                TagKind::Element => self.element(&tag, &mut stack),
                TagKind::Relationship => self.relationship(&tag, &stack),
                TagKind::Property => self.property_tag(&tag, &stack, &mut pending),
            }
        }

        if let Some(open) = pending {
            self.unvalued_property(open.span);
        }
        for frame in stack {
            let name = frame.id.as_deref().unwrap_or("<anonymous>");
            self.collector.emit(
                Diagnostic::new(ErrorCode::W007, format!("`<element>` `{name}` is never closed"))
                    .with_label(frame.span, "opened here")
                    .with_help("add `</element>` or make the tag self-closing"),
            );
        }
    }

    fn finish(self) -> ParseResult {
        let DocumentParser {
            source,
            layer,
            file,
            line_index,
            collector,
            mut relationships,
            mut entities,
            ..
        } = self;

        let mut warnings: Vec<ParserWarning> = collector
            .into_diagnostics()
            .into_iter()
            .map(|diagnostic| {
                let offset = diagnostic.primary_span().map_or(0, |span| span.start());
                let (line, column) = line_index.line_col(source, offset);
                ParserWarning {
                    location: SourceLocation::new(file, line, column),
                    diagnostic,
                }
            })
            .collect();

        relationships.sort_by(|a, b| a.source_location().cmp(b.source_location()));
        entities.sort_by(|a, b| a.declaration_location().cmp(b.declaration_location()));
        warnings.sort_by(|a, b| a.location.cmp(&b.location));

        ParseResult {
            layer: layer.to_string(),
            file: file.to_string(),
            relationships,
            entities,
            warnings,
        }
    }
}

/// Extract every relationship and entity declared in a layer document.
///
/// All three notations are recognized in the same pass: YAML properties (in
/// front matter `entities` and fenced `yaml` blocks), `<relationship>` tags
/// and `<property>` tags. Declarations that cannot be understood become
/// [`ParserWarning`]s; parsing itself never fails.
///
/// # Arguments
///
/// * `source` - Document text.
/// * `layer_id` - Layer the document describes; the source layer of every record.
/// * `file_path` - Path reported in record locations.
/// * `known_layers` - Layers a dotted `<layer>.<field>` key may reference.
///
/// # Example
///
/// ```
/// use ontolink_core::layer::LayerSet;
/// use ontolink_parser::parse_all_formats;
///
/// let source = r#"
/// <element id="biz.actor.customer" type="actor">
///   <relationship type="Serving" target="biz.service.billing"/>
/// </element>
/// "#;
/// let result = parse_all_formats(source, "business", "business.md", &LayerSet::canonical());
///
/// assert_eq!(result.entities().len(), 1);
/// assert_eq!(result.relationships()[0].source_entity_id(), "biz.actor.customer");
/// assert!(result.warnings().is_empty());
/// ```
pub fn parse_all_formats(
    source: &str,
    layer_id: &str,
    file_path: &str,
    known_layers: &LayerSet,
) -> ParseResult {
    let mut parser = DocumentParser {
        source,
        layer: layer_id,
        file: file_path,
        known_layers,
        line_index: LineIndex::new(source),
        collector: DiagnosticCollector::new(),
        relationships: Vec::new(),
        entities: Vec::new(),
    };

    let mut skip = Vec::new();
    let mut fence_start = 0;

    if let Some(front) = locate_front_matter(source) {
        let declarations = extract_entities(
            front.yaml,
            front.yaml_range.start,
            YamlSource::FrontMatter,
            known_layers,
            &mut parser.collector,
        );
        parser.yaml_declarations(declarations);
        fence_start = front.block_range.end;
        skip.push(front.block_range);
    }

    for block in YamlFences::new(source, fence_start) {
        match block {
            Ok(block) => {
                let declarations = extract_entities(
                    block.text,
                    block.text_start,
                    YamlSource::Fence,
                    known_layers,
                    &mut parser.collector,
                );
                parser.yaml_declarations(declarations);
                skip.push(block.block_range);
            }
            Err(diagnostic) => parser.collector.emit(diagnostic),
        }
    }

    parser.scan_tags(skip);
    let result = parser.finish();

    debug!(
        layer = result.layer(),
        file = result.file(),
        relationships = result.relationships().len(),
        entities = result.entities().len(),
        warnings = result.warnings().len();
        "Document parsed"
    );
    result
}
