//! Index of declared entities, keyed by `(layer, id)`.

use indexmap::IndexMap;
use log::{debug, warn};

use ontolink_core::{entity::Entity, relationship::SourceLocation};
use ontolink_parser::ParseResult;

/// An entity declared more than once in the same layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntity {
    entity: Entity,
    first_location: SourceLocation,
}

impl DuplicateEntity {
    /// The later declaration, which is the one kept in the index.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Where the entity was declared first.
    pub fn first_location(&self) -> &SourceLocation {
        &self.first_location
    }
}

/// All declared entities of a run, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    layers: IndexMap<String, IndexMap<String, Entity>>,
    duplicates: Vec<DuplicateEntity>,
}

impl EntityIndex {
    /// Build the index from parse results in document order.
    ///
    /// A repeated `(layer, id)` keeps its first slot but takes the later
    /// declaration; the repetition is recorded in [`EntityIndex::duplicates`].
    pub fn build<'a>(results: impl IntoIterator<Item = &'a ParseResult>) -> Self {
        let mut index = Self::default();

        for result in results {
            index.layers.entry(result.layer().to_string()).or_default();
            for entity in result.entities() {
                index.insert(entity.clone());
            }
        }

        debug!(
            layers = index.layers.len(),
            entities = index.len(),
            duplicates = index.duplicates.len();
            "Entity index built"
        );
        index
    }

    fn insert(&mut self, entity: Entity) {
        let layer = self.layers.entry(entity.layer().to_string()).or_default();
        let id = entity.id().to_string();

        if let Some(previous) = layer.insert(id, entity.clone()) {
            warn!(
                layer = entity.layer(),
                id = entity.id(),
                first:% = previous.declaration_location();
                "Duplicate entity declaration"
            );
            self.duplicates.push(DuplicateEntity {
                entity,
                first_location: previous.declaration_location().clone(),
            });
        }
    }

    pub fn resolve(&self, layer: &str, id: &str) -> Option<&Entity> {
        self.layers.get(layer)?.get(id)
    }

    pub fn resolve_type(&self, layer: &str, id: &str) -> Option<&str> {
        self.resolve(layer, id).map(Entity::entity_type)
    }

    /// Returns `true` if a document for `layer` was indexed, even one
    /// declaring no entities.
    pub fn contains_layer(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    pub fn entities_in(&self, layer: &str) -> impl Iterator<Item = &Entity> {
        self.layers.get(layer).into_iter().flat_map(IndexMap::values)
    }

    pub fn duplicates(&self) -> &[DuplicateEntity] {
        &self.duplicates
    }

    /// Number of distinct indexed entities.
    pub fn len(&self) -> usize {
        self.layers.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
