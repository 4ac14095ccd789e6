//! Entities declared in layer documents.

use serde::{Deserialize, Serialize};

use crate::relationship::SourceLocation;

/// An entity declared in a layer document, keyed by `(layer, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    id: String,
    #[serde(rename = "type")]
    entity_type: String,
    layer: String,
    declaration_location: SourceLocation,
}

impl Entity {
    pub fn new(
        layer: impl Into<String>,
        id: impl Into<String>,
        entity_type: impl Into<String>,
        declaration_location: SourceLocation,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            layer: layer.into(),
            declaration_location,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn declaration_location(&self) -> &SourceLocation {
        &self.declaration_location
    }
}

/// Infers an entity type from a dotted id of the form `<prefix>.<type>.<name>`.
///
/// # Examples
///
/// ```
/// use ontolink_core::entity::infer_entity_type;
///
/// assert_eq!(infer_entity_type("biz.service.billing"), Some("service"));
/// assert_eq!(infer_entity_type("motivation.goal.increase-revenue"), Some("goal"));
/// assert_eq!(infer_entity_type("billing"), None);
/// ```
pub fn infer_entity_type(id: &str) -> Option<&str> {
    let mut segments = id.split('.');
    let _prefix = segments.next()?;
    let entity_type = segments.next()?;
    let _name = segments.next()?;

    if entity_type.is_empty() {
        None
    } else {
        Some(entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_accessors() {
        let entity = Entity::new(
            "business",
            "biz.service.billing",
            "service",
            SourceLocation::new("02-business-layer.md", 4, 1),
        );
        assert_eq!(entity.layer(), "business");
        assert_eq!(entity.id(), "biz.service.billing");
        assert_eq!(entity.entity_type(), "service");
        assert_eq!(entity.declaration_location().line(), 4);
    }

    #[test]
    fn test_infer_entity_type_requires_three_segments() {
        assert_eq!(infer_entity_type("biz.service"), None);
        assert_eq!(infer_entity_type("a..b"), None);
        assert_eq!(infer_entity_type("a.b.c.d"), Some("b"));
    }
}
