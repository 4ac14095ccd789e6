//! Reconciliation of raw, unique and bidirectional relationship counts.
//!
//! The same relationship set is seen three ways:
//!
//! - **raw**: every `(record, target)` pair as declared, per notation;
//! - **unique**: relationships after deduplication on
//!   `(source, target, canonical predicate)`;
//! - **bidirectional**: the sum of per-entity relationship lists, where a
//!   bidirectional link shows up at both of its ends.
//!
//! When every endpoint is declared the views obey
//! `bidirectional == 2 * unique - one_way - self_loops`. A layer that misses
//! the identity by more than the configured tolerance is flagged. Counts are
//! never corrected.

use std::{collections::BTreeMap, fmt};

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use serde::Serialize;

use ontolink_core::{
    link_type::normalize_key,
    relationship::{FormatType, RelationshipRecord},
};
use ontolink_parser::ParseResult;

use crate::{entity_index::EntityIndex, error::OntologyError, registry::LinkRegistry};

/// Raw counts per notation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FormatCounts {
    pub xml_relationship: usize,
    pub yaml_property: usize,
    pub xml_property: usize,
}

impl FormatCounts {
    fn add(&mut self, format_type: FormatType, count: usize) {
        match format_type {
            FormatType::XmlRelationship => self.xml_relationship += count,
            FormatType::YamlProperty => self.yaml_property += count,
            FormatType::XmlProperty => self.xml_property += count,
        }
    }

    pub fn get(&self, format_type: FormatType) -> usize {
        match format_type {
            FormatType::XmlRelationship => self.xml_relationship,
            FormatType::YamlProperty => self.yaml_property,
            FormatType::XmlProperty => self.xml_property,
        }
    }

    pub fn total(&self) -> usize {
        self.xml_relationship + self.yaml_property + self.xml_property
    }
}

/// Intra-layer counts of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCounts {
    layer: String,
    raw: FormatCounts,
    raw_total: usize,
    unique: usize,
    bidirectional: usize,
    one_way: usize,
    self_loops: usize,
    expected_bidirectional: usize,
    divergence: bool,
}

impl LayerCounts {
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn raw(&self) -> &FormatCounts {
        &self.raw
    }

    pub fn raw_total(&self) -> usize {
        self.raw_total
    }

    pub fn unique(&self) -> usize {
        self.unique
    }

    pub fn bidirectional(&self) -> usize {
        self.bidirectional
    }

    pub fn one_way(&self) -> usize {
        self.one_way
    }

    pub fn self_loops(&self) -> usize {
        self.self_loops
    }

    pub fn expected_bidirectional(&self) -> usize {
        self.expected_bidirectional
    }

    pub fn divergence(&self) -> bool {
        self.divergence
    }
}

/// Cross-layer references, counted raw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossLayerCounts {
    by_format: FormatCounts,
    /// Keyed by `source->target`.
    by_layer_pair: BTreeMap<String, usize>,
    total: usize,
}

impl CrossLayerCounts {
    pub fn by_format(&self) -> &FormatCounts {
        &self.by_format
    }

    pub fn by_layer_pair(&self) -> &BTreeMap<String, usize> {
        &self.by_layer_pair
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTotals {
    pub raw: usize,
    pub unique: usize,
    pub bidirectional: usize,
    pub cross_layer: usize,
}

/// The reconciled counts of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInstanceCatalog {
    layers: Vec<LayerCounts>,
    cross_layer: CrossLayerCounts,
    totals: CatalogTotals,
}

impl LinkInstanceCatalog {
    /// Per-layer counts in document order.
    pub fn layers(&self) -> &[LayerCounts] {
        &self.layers
    }

    pub fn layer(&self, layer: &str) -> Option<&LayerCounts> {
        self.layers.iter().find(|counts| counts.layer == layer)
    }

    pub fn cross_layer(&self) -> &CrossLayerCounts {
        &self.cross_layer
    }

    pub fn totals(&self) -> &CatalogTotals {
        &self.totals
    }

    /// Layers whose bidirectional count diverges from the expected value.
    pub fn divergent_layers(&self) -> impl Iterator<Item = &LayerCounts> {
        self.layers.iter().filter(|counts| counts.divergence)
    }

    /// Pretty-printed JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::Report`] if serialization fails.
    pub fn to_json(&self) -> Result<String, OntologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for LinkInstanceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "| Layer | xml_relationship | yaml_property | xml_property | Raw | Unique | Bidirectional | Expected | One-way | Self loops |"
        )?;
        writeln!(f, "|---|---|---|---|---|---|---|---|---|---|")?;
        for counts in &self.layers {
            let flag = if counts.divergence { " (divergent)" } else { "" };
            writeln!(
                f,
                "| {}{flag} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                counts.layer,
                counts.raw.xml_relationship,
                counts.raw.yaml_property,
                counts.raw.xml_property,
                counts.raw_total,
                counts.unique,
                counts.bidirectional,
                counts.expected_bidirectional,
                counts.one_way,
                counts.self_loops
            )?;
        }
        writeln!(f)?;

        writeln!(f, "| Cross-layer | Count |")?;
        writeln!(f, "|---|---|")?;
        for format_type in FormatType::ALL {
            writeln!(f, "| {format_type} | {} |", self.cross_layer.by_format.get(format_type))?;
        }
        for (pair, count) in &self.cross_layer.by_layer_pair {
            writeln!(f, "| {pair} | {count} |")?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "Totals: {} raw, {} unique, {} bidirectional, {} cross-layer",
            self.totals.raw, self.totals.unique, self.totals.bidirectional, self.totals.cross_layer
        )
    }
}

/// A deduplicated intra-layer relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UniqueKey {
    source: String,
    target: String,
    predicate: String,
}

#[derive(Default)]
struct LayerTally {
    raw: FormatCounts,
    /// Unique relationships and whether each is bidirectional.
    unique: IndexMap<UniqueKey, bool>,
}

/// Count reconciler over parse results.
pub struct LinkCatalog;

impl LinkCatalog {
    /// Reconcile the three count views of `results`.
    ///
    /// Predicates are canonicalized through `registry`: a matched record
    /// counts under its link type id, and a record matched through an
    /// inverse predicate is flipped. Unmatched records count under their
    /// normalized label and are treated as bidirectional.
    pub fn reconcile(results: &[ParseResult], registry: &LinkRegistry, tolerance: usize) -> LinkInstanceCatalog {
        let index = EntityIndex::build(results);
        let mut tallies: IndexMap<&str, LayerTally> = IndexMap::new();
        let mut cross_layer = CrossLayerCounts::default();

        for result in results {
            tallies.entry(result.layer()).or_default();
            for record in result.relationships() {
                let targets = record.target_entity_ids().len();
                if record.is_cross_layer() {
                    cross_layer.by_format.add(record.format_type(), targets);
                    *cross_layer
                        .by_layer_pair
                        .entry(format!("{}->{}", record.source_layer(), record.target_layer()))
                        .or_default() += targets;
                    cross_layer.total += targets;
                    continue;
                }

                let tally = tallies.entry(record.source_layer()).or_default();
                tally.raw.add(record.format_type(), targets);
                Self::dedup(record, registry, &index, &mut tally.unique);
            }
        }

        let layers: Vec<LayerCounts> = tallies
            .into_iter()
            .map(|(layer, tally)| Self::layer_counts(layer, tally, &index, tolerance))
            .collect();

        let totals = layers.iter().fold(
            CatalogTotals {
                cross_layer: cross_layer.total,
                ..CatalogTotals::default()
            },
            |mut totals, counts| {
                totals.raw += counts.raw_total;
                totals.unique += counts.unique;
                totals.bidirectional += counts.bidirectional;
                totals
            },
        );

        debug!(
            layers = layers.len(),
            raw = totals.raw,
            unique = totals.unique,
            cross_layer = totals.cross_layer;
            "Link counts reconciled"
        );

        LinkInstanceCatalog {
            layers,
            cross_layer,
            totals,
        }
    }

    fn dedup(
        record: &RelationshipRecord,
        registry: &LinkRegistry,
        index: &EntityIndex,
        unique: &mut IndexMap<UniqueKey, bool>,
    ) {
        let source_type = record
            .source_entity_type()
            .or_else(|| index.resolve_type(record.source_layer(), record.source_entity_id()));
        let matched = registry.match_record(record, source_type);

        let (predicate, bidirectional, inverse) = match matched {
            Some(candidate) => (
                candidate.link().id().to_string(),
                candidate.link().is_bidirectional(),
                candidate.is_inverse(),
            ),
            None => (normalize_key(record.match_label()), true, false),
        };

        for target in record.target_entity_ids() {
            let (source, target) = if inverse {
                (target.as_str(), record.source_entity_id())
            } else {
                (record.source_entity_id(), target.as_str())
            };
            unique
                .entry(UniqueKey {
                    source: source.to_string(),
                    target: target.to_string(),
                    predicate: predicate.clone(),
                })
                .or_insert(bidirectional);
        }
    }

    fn layer_counts(layer: &str, tally: LayerTally, index: &EntityIndex, tolerance: usize) -> LayerCounts {
        let mut one_way = 0;
        let mut self_loops = 0;
        let mut bidirectional = 0;
        let declared = |id: &str| index.resolve(layer, id).is_some();

        for (key, is_bidirectional) in &tally.unique {
            let self_loop = key.source == key.target;
            if self_loop {
                self_loops += 1;
            } else if !is_bidirectional {
                one_way += 1;
            }

            bidirectional += usize::from(declared(&key.source));
            if *is_bidirectional && !self_loop {
                bidirectional += usize::from(declared(&key.target));
            }
        }

        let unique = tally.unique.len();
        let expected_bidirectional = 2 * unique - one_way - self_loops;
        let divergence = bidirectional.abs_diff(expected_bidirectional) > tolerance;
        if divergence {
            warn!(
                layer,
                bidirectional,
                expected = expected_bidirectional;
                "Bidirectional count diverges"
            );
        }

        let distinct: IndexSet<&str> = tally
            .unique
            .keys()
            .flat_map(|key| [key.source.as_str(), key.target.as_str()])
            .collect();
        debug!(layer, entities = distinct.len(), unique; "Layer counts");

        LayerCounts {
            layer: layer.to_string(),
            raw: tally.raw,
            raw_total: tally.raw.total(),
            unique,
            bidirectional,
            one_way,
            self_loops,
            expected_bidirectional,
            divergence,
        }
    }
}
