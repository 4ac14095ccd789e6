//! Cross-checks of relationship records against the registry and the set
//! of declared entities.
//!
//! A [`Validator`] is fed records one at a time and accumulates
//! [`ValidationIssue`]s. The checks of one record are independent of each
//! other, except that a record matching no link type only gets the
//! existence check and an `unregistered-link` issue. Within one check the
//! first failure wins, so every check yields at most one issue per record.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use log::{debug, trace};

use ontolink_core::{
    link_type::{Cardinality, LinkFormat, LinkType},
    relationship::{RelationshipRecord, SourceLocation},
};
use ontolink_parser::ParseResult;

use crate::{
    catalog::LinkInstanceCatalog,
    entity_index::EntityIndex,
    format::format_violation,
    registry::{Candidate, LinkRegistry},
    report::{IssueCategory, ValidationIssue},
    spec_tree::SpecTree,
};

type LinkKey = (String, String, String);

fn quoted(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("`{id}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_list<'t>(types: impl IntoIterator<Item = &'t String>) -> String {
    let types: Vec<&str> = types.into_iter().map(String::as_str).collect();
    if types.is_empty() {
        "any".to_string()
    } else {
        types.join(", ")
    }
}

pub(crate) struct Validator<'a> {
    registry: &'a LinkRegistry,
    index: &'a EntityIndex,
    /// Distinct targets seen per `(layer, source, link)` for single links.
    single_targets: HashMap<LinkKey, IndexSet<String>>,
    cardinality_reported: HashSet<LinkKey>,
    /// `(layer, source, link)` triples declared by at least one record.
    declared: HashSet<LinkKey>,
    issues: Vec<ValidationIssue>,
    checked: usize,
}

impl<'a> Validator<'a> {
    pub(crate) fn new(registry: &'a LinkRegistry, index: &'a EntityIndex) -> Self {
        Self {
            registry,
            index,
            single_targets: HashMap::new(),
            cardinality_reported: HashSet::new(),
            declared: HashSet::new(),
            issues: Vec::new(),
            checked: 0,
        }
    }

    /// Number of records checked so far.
    pub(crate) fn checked(&self) -> usize {
        self.checked
    }

    pub(crate) fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    pub(crate) fn check_record(&mut self, record: &RelationshipRecord) {
        let registry = self.registry;
        let index = self.index;
        self.checked += 1;

        let layer = record.source_layer();
        let source_type = record
            .source_entity_type()
            .or_else(|| index.resolve_type(layer, record.source_entity_id()));
        let matched = registry.match_record(record, source_type);

        trace!(
            source = record.source_entity_id(),
            label = record.match_label(),
            link:? = matched.map(|candidate| candidate.link().id());
            "Checking relationship"
        );

        let values_only = matched.is_some_and(|candidate| candidate.link().format() == Some(LinkFormat::Enum));
        let missing = if values_only {
            None
        } else {
            self.missing_targets(record)
        };
        self.issues.extend(missing);

        let Some(candidate) = matched else {
            let issue = self.unregistered(record, source_type);
            self.issues.push(issue);
            return;
        };

        if !candidate.is_inverse() {
            self.declared.insert((
                layer.to_string(),
                record.source_entity_id().to_string(),
                candidate.link().id().to_string(),
            ));
        }

        let issues = [
            self.type_mismatch(record, candidate, source_type),
            self.cardinality_violation(record, candidate),
            self.format_mismatch(record, candidate.link()),
        ];
        self.issues.extend(issues.into_iter().flatten());
    }

    fn missing_targets(&self, record: &RelationshipRecord) -> Option<ValidationIssue> {
        let index = self.index;
        let target_layer = record.target_layer();
        let mut missing: Vec<&str> = Vec::new();

        if !record.is_cross_layer()
            && index.resolve(record.source_layer(), record.source_entity_id()).is_none()
        {
            missing.push(record.source_entity_id());
        }
        for target in record.target_entity_ids() {
            if index.resolve(target_layer, target).is_none() && !missing.contains(&target.as_str()) {
                missing.push(target);
            }
        }

        if missing.is_empty() {
            return None;
        }

        let message = if missing.len() == 1 {
            format!("{} is not declared in layer `{target_layer}`", quoted(&missing))
        } else {
            format!("{} are not declared in layer `{target_layer}`", quoted(&missing))
        };
        Some(
            ValidationIssue::new(IssueCategory::MissingTarget, message, record.source_location().clone())
                .with_field_path(record.field_path())
                .with_suggestion(format!(
                    "declare the entity in the `{target_layer}` layer or correct the reference"
                )),
        )
    }

    fn unregistered(&self, record: &RelationshipRecord, source_type: Option<&str>) -> ValidationIssue {
        let layer = record.source_layer();
        let target_layer = record.target_layer();

        let allowed: Vec<&str> = source_type
            .map(|entity_type| {
                self.registry
                    .allowed_from(layer, entity_type)
                    .into_iter()
                    .filter(|link| link.target_layer_for(layer) == target_layer)
                    .map(LinkType::id)
                    .collect()
            })
            .unwrap_or_default();

        let suggestion = if allowed.is_empty() {
            "register the link type or correct the label".to_string()
        } else {
            format!("registered link types for this source: {}", allowed.join(", "))
        };

        ValidationIssue::new(
            IssueCategory::UnregisteredLink,
            format!(
                "`{}` from layer `{layer}` to layer `{target_layer}` matches no registered link type",
                record.match_label()
            ),
            record.source_location().clone(),
        )
        .with_field_path(record.field_path())
        .with_suggestion(suggestion)
    }

    fn type_mismatch(
        &self,
        record: &RelationshipRecord,
        candidate: Candidate<'_>,
        source_type: Option<&str>,
    ) -> Option<ValidationIssue> {
        let link = candidate.link();
        let layer = record.source_layer();
        let issue = |message: String, accepted: String| {
            ValidationIssue::new(IssueCategory::InvalidType, message, record.source_location().clone())
                .with_field_path(record.field_path())
                .with_suggestion(format!("accepted types: {accepted}"))
        };

        let rejected_source =
            source_type.filter(|entity_type| !candidate.accepts_source(layer, entity_type));
        if let Some(entity_type) = rejected_source {
            let (role, accepted) = if candidate.is_inverse() {
                ("be the target of", type_list(link.target_types()))
            } else {
                (
                    "originate",
                    type_list(link.allowed_source_types(layer).into_iter().flatten()),
                )
            };
            return Some(issue(
                format!(
                    "source `{}` of type `{entity_type}` cannot {role} `{}`",
                    record.source_entity_id(),
                    link.id()
                ),
                accepted,
            ));
        }

        if link.format() == Some(LinkFormat::Enum) {
            return None;
        }

        let target_layer = record.target_layer();
        record.target_entity_ids().iter().find_map(|target| {
            let entity_type = self
                .index
                .resolve_type(target_layer, target)
                .or_else(|| record.target_entity_type())?;
            if candidate.accepts_target(target_layer, entity_type) {
                return None;
            }

            let accepted = if candidate.is_inverse() {
                type_list(link.allowed_source_types(target_layer).into_iter().flatten())
            } else {
                type_list(link.target_types())
            };
            Some(issue(
                format!(
                    "target `{target}` of type `{entity_type}` is not accepted by `{}`",
                    link.id()
                ),
                accepted,
            ))
        })
    }

    /// A `single` link may reach one distinct target per source entity over
    /// the whole run. Only the record that first exceeds it is reported.
    fn cardinality_violation(
        &mut self,
        record: &RelationshipRecord,
        candidate: Candidate<'_>,
    ) -> Option<ValidationIssue> {
        let link = candidate.link();
        if candidate.is_inverse() || link.cardinality() != Cardinality::Single {
            return None;
        }

        let key = (
            record.source_layer().to_string(),
            record.source_entity_id().to_string(),
            link.id().to_string(),
        );
        let targets = self.single_targets.entry(key.clone()).or_default();
        targets.extend(record.target_entity_ids().iter().cloned());
        if targets.len() <= 1 {
            return None;
        }
        let seen: Vec<&str> = targets.iter().map(String::as_str).collect();
        let message = format!(
            "`{}` allows a single target but `{}` declares {}: {}",
            link.id(),
            record.source_entity_id(),
            seen.len(),
            quoted(&seen)
        );

        if !self.cardinality_reported.insert(key) {
            return None;
        }
        Some(
            ValidationIssue::new(
                IssueCategory::CardinalityViolation,
                message,
                record.source_location().clone(),
            )
            .with_field_path(record.field_path())
            .with_suggestion("keep one target or register the link type with `array` cardinality"),
        )
    }

    fn format_mismatch(&self, record: &RelationshipRecord, link: &LinkType) -> Option<ValidationIssue> {
        let reason = record
            .target_entity_ids()
            .iter()
            .find_map(|value| format_violation(link, value))?;

        Some(
            ValidationIssue::new(
                IssueCategory::FormatViolation,
                format!("{reason} in `{}`", link.id()),
                record.source_location().clone(),
            )
            .with_field_path(record.field_path()),
        )
    }

    /// Report entities of `layer` that lack a required link their type is
    /// explicitly listed for. Must run after every record was checked.
    pub(crate) fn check_required(&mut self, layer: &str) {
        let registry = self.registry;
        let index = self.index;
        let required: Vec<&LinkType> = registry.required_from(layer).collect();
        if required.is_empty() {
            return;
        }

        for entity in index.entities_in(layer) {
            let missing: Vec<&LinkType> = required
                .iter()
                .copied()
                .filter(|link| {
                    link.allowed_source_types(layer)
                        .is_some_and(|types| types.contains(entity.entity_type()))
                })
                .filter(|link| {
                    !self.declared.contains(&(
                        layer.to_string(),
                        entity.id().to_string(),
                        link.id().to_string(),
                    ))
                })
                .collect();

            let Some(first) = missing.first() else {
                continue;
            };

            let mut message = format!(
                "`{}` of type `{}` declares no `{}` link",
                entity.id(),
                entity.entity_type(),
                first.id()
            );
            if missing.len() > 1 {
                message.push_str(&format!(" (and {} other required link types)", missing.len() - 1));
            }
            let suggestion = match first.field_paths().first() {
                Some(path) => format!("add a `{path}` property"),
                None => format!("declare a `{}` relationship", first.id()),
            };

            self.issues.push(
                ValidationIssue::new(
                    IssueCategory::MissingRequiredLink,
                    message,
                    entity.declaration_location().clone(),
                )
                .with_suggestion(suggestion),
            );
        }
    }
}

/// One `duplicate-entity` issue per repeated declaration in `layers`.
pub(crate) fn duplicate_issues(index: &EntityIndex, in_scope: impl Fn(&str) -> bool) -> Vec<ValidationIssue> {
    index
        .duplicates()
        .iter()
        .filter(|duplicate| in_scope(duplicate.entity().layer()))
        .map(|duplicate| {
            let entity = duplicate.entity();
            ValidationIssue::new(
                IssueCategory::DuplicateEntity,
                format!(
                    "`{}` is declared more than once in layer `{}` (first declared at {})",
                    entity.id(),
                    entity.layer(),
                    duplicate.first_location()
                ),
                entity.declaration_location().clone(),
            )
            .with_suggestion("remove or rename one of the declarations")
        })
        .collect()
}

/// Parser diagnostics of one document as `parser-warning` issues.
pub(crate) fn parser_warning_issues(result: &ParseResult) -> impl Iterator<Item = ValidationIssue> + '_ {
    result.warnings().iter().map(|warning| {
        let diagnostic = warning.diagnostic();
        let message = format!("{}: {}", diagnostic.code(), diagnostic.message());
        let issue = ValidationIssue::new(IssueCategory::ParserWarning, message, warning.location().clone());
        match diagnostic.help() {
            Some(help) => issue.with_suggestion(help),
            None => issue,
        }
    })
}

/// `registry-gap` issues located in the registry file.
pub(crate) fn registry_gap_issues(
    registry: &LinkRegistry,
    registry_file: &str,
    in_scope: impl Fn(&str) -> bool,
) -> Vec<ValidationIssue> {
    registry
        .registry_gaps()
        .into_iter()
        .filter(|gap| in_scope(gap.layer()))
        .map(|gap| {
            ValidationIssue::new(
                IssueCategory::RegistryGap,
                format!(
                    "link type `{}` lists no source types for layer `{}`; any entity type is accepted",
                    gap.link_id(),
                    gap.layer()
                ),
                SourceLocation::new(registry_file, gap.line(), 1),
            )
            .with_suggestion(format!(
                "add `{}` to `sourceElementTypesByLayer`",
                gap.layer()
            ))
        })
        .collect()
}

/// `count-divergence` issues, located at line 1 of each flagged layer's
/// first document.
pub(crate) fn divergence_issues(catalog: &LinkInstanceCatalog, tree: &SpecTree) -> Vec<ValidationIssue> {
    catalog
        .divergent_layers()
        .filter_map(|counts| {
            let document = tree
                .documents()
                .iter()
                .find(|doc| doc.layer() == counts.layer())?;
            Some(ValidationIssue::new(
                IssueCategory::CountDivergence,
                format!(
                    "layer `{}` has {} bidirectional relationship entries, expected {} from {} unique relationships",
                    counts.layer(),
                    counts.bidirectional(),
                    counts.expected_bidirectional(),
                    counts.unique()
                ),
                SourceLocation::new(document.display_path(), 1, 1),
            ))
        })
        .collect()
}

/// Order issues: registry issues first, then by document in `documents`
/// order, then by line and column. Ties keep their emission order.
pub(crate) fn sort_issues(issues: &mut [ValidationIssue], documents: &[&str]) {
    let order: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(idx, file)| (*file, idx))
        .collect();

    issues.sort_by_key(|issue| {
        let location = issue.location();
        (
            issue.category() != IssueCategory::RegistryGap,
            order.get(location.file()).copied().unwrap_or(usize::MAX),
            location.line(),
            location.column(),
        )
    });
    debug!(issues = issues.len(); "Issues sorted");
}

#[cfg(test)]
mod tests {
    use ontolink_core::layer::LayerSet;
    use ontolink_parser::parse_all_formats;

    use super::*;

    const REGISTRY: &str = r#"{"linkTypes": [
  {"id": "serving", "name": "Serving", "predicate": "serves", "inversePredicate": "served by",
   "sourceLayers": ["business"], "sourceElementTypesByLayer": {"business": ["actor", "service"]},
   "targetTypes": ["service"], "cardinality": "single"},
  {"id": "motivation-supports-goals", "sourceLayers": ["business"],
   "sourceElementTypesByLayer": {"business": ["service"]}, "targetLayer": "motivation",
   "targetTypes": ["goal"], "cardinality": "array", "required": true},
  {"id": "business-status", "sourceLayers": ["business"],
   "sourceElementTypesByLayer": {"business": ["service"]}, "targetLayer": "business",
   "fieldPaths": ["business.status"], "targetTypes": [], "cardinality": "single",
   "format": "enum", "enumValues": ["active", "retired"]}
]}"#;

    const GOALS: &str = "<element id=\"motivation.goal.grow\"/>";

    fn validate(business: &str, required: bool) -> Vec<ValidationIssue> {
        let registry = LinkRegistry::from_json(REGISTRY).unwrap();
        let known = LayerSet::canonical();
        let results = [
            parse_all_formats(GOALS, "motivation", "motivation.md", &known),
            parse_all_formats(business, "business", "business.md", &known),
        ];
        let index = EntityIndex::build(&results);

        let mut validator = Validator::new(&registry, &index);
        for record in results[1].relationships() {
            validator.check_record(record);
        }
        if required {
            validator.check_required("business");
        }
        validator.into_issues()
    }

    fn run(business: &str) -> Vec<ValidationIssue> {
        validate(business, false)
    }

    fn categories(issues: &[ValidationIssue]) -> Vec<IssueCategory> {
        issues.iter().map(ValidationIssue::category).collect()
    }

    const ENTITIES: &str = "<element id=\"biz.actor.customer\"/>\n<element id=\"biz.service.billing\"/>\n";
    #[test]
    fn test_valid_relationship_has_no_issues() {
        let doc = format!(
            "{ENTITIES}<relationship type=\"Serving\" source=\"biz.actor.customer\" target=\"biz.service.billing\"/>\n"
        );
        let issues = run(&doc);
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_missing_targets_reported_once() {
        let doc = format!(
            "{ENTITIES}<relationship type=\"Serving\" source=\"biz.actor.ghost\" target=\"biz.service.a, biz.service.b\"/>\n"
        );
        let issues = run(&doc);

        let missing: Vec<_> = issues
            .iter()
            .filter(|issue| issue.category() == IssueCategory::MissingTarget)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].location().line(), 3);
        assert!(missing[0].message().contains("`biz.actor.ghost`"));
        assert!(missing[0].message().contains("`biz.service.b`"));
    }

    #[test]
    fn test_unregistered_link_suggests_allowed() {
        let doc = format!(
            "{ENTITIES}<relationship type=\"Flow\" source=\"biz.actor.customer\" target=\"biz.service.billing\"/>\n"
        );
        let issues = run(&doc);

        assert_eq!(categories(&issues), [IssueCategory::UnregisteredLink]);
        assert_eq!(
            issues[0].suggestion(),
            Some("registered link types for this source: serving")
        );
    }

    #[test]
    fn test_invalid_source_type_is_not_unregistered() {
        let doc = "<element id=\"biz.role.clerk\"/>\n<element id=\"biz.service.billing\"/>\n\
                   <relationship type=\"Serving\" source=\"biz.role.clerk\" target=\"biz.service.billing\"/>\n";
        let issues = run(doc);

        assert_eq!(categories(&issues), [IssueCategory::InvalidType]);
        assert!(issues[0].message().contains("type `role`"));
    }

    #[test]
    fn test_inverse_predicate_swaps_sides() {
        let doc = format!(
            "{ENTITIES}<relationship type=\"served by\" source=\"biz.service.billing\" target=\"biz.actor.customer\"/>\n"
        );
        assert!(run(&doc).is_empty());

        let doc = format!(
            "{ENTITIES}<relationship type=\"served by\" source=\"biz.actor.customer\" target=\"biz.service.billing\"/>\n"
        );
        assert_eq!(categories(&run(&doc)), [IssueCategory::InvalidType]);
    }

    #[test]
    fn test_single_cardinality_reported_once() {
        let doc = "<element id=\"biz.actor.customer\"/>\n<element id=\"biz.service.a\"/>\n\
                   <element id=\"biz.service.b\"/>\n<element id=\"biz.service.c\"/>\n\
                   <relationship type=\"Serving\" source=\"biz.actor.customer\" target=\"biz.service.a\"/>\n\
                   <relationship type=\"Serving\" source=\"biz.actor.customer\" target=\"biz.service.a\"/>\n\
                   <relationship type=\"Serving\" source=\"biz.actor.customer\" target=\"biz.service.b\"/>\n\
                   <relationship type=\"Serving\" source=\"biz.actor.customer\" target=\"biz.service.c\"/>\n";
        let issues = run(doc);

        assert_eq!(categories(&issues), [IssueCategory::CardinalityViolation]);
        assert_eq!(issues[0].location().line(), 7);
    }

    #[test]
    fn test_enum_values_are_not_entities() {
        let doc = "```yaml\nid: biz.service.billing\nbusiness.status: draft\nmotivation.supports-goals: motivation.goal.grow\n```\n";
        let issues = run(doc);

        assert_eq!(categories(&issues), [IssueCategory::FormatViolation]);
        assert_eq!(issues[0].field_path(), Some("business.status"));
        assert!(issues[0].message().contains("`draft` is not one of active, retired"));
    }

    #[test]
    fn test_missing_required_link() {
        let issues = validate(ENTITIES, true);

        assert_eq!(categories(&issues), [IssueCategory::MissingRequiredLink]);
        assert_eq!(issues[0].location().line(), 2);
        assert!(issues[0].message().contains("`motivation-supports-goals`"));
    }

    #[test]
    fn test_issues_sorted_by_document_line_and_column() {
        let issue = |category, file, line, column| {
            ValidationIssue::new(category, "issue", SourceLocation::new(file, line, column))
        };
        let mut issues = vec![
            issue(IssueCategory::MissingTarget, "layers/02-business-layer.md", 4, 30),
            issue(IssueCategory::InvalidType, "layers/02-business-layer.md", 4, 1),
            issue(IssueCategory::MissingTarget, "layers/01-motivation-layer.md", 9, 1),
            issue(IssueCategory::RegistryGap, "link-registry.json", 20, 1),
        ];

        sort_issues(
            &mut issues,
            &["layers/01-motivation-layer.md", "layers/02-business-layer.md"],
        );

        let order: Vec<_> = issues
            .iter()
            .map(|issue| (issue.location().line(), issue.location().column()))
            .collect();
        assert_eq!(order, [(20, 1), (9, 1), (4, 1), (4, 30)]);
    }
}
