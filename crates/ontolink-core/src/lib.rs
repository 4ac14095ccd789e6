//! Ontolink Core Types and Definitions
//!
//! This crate provides the foundational types shared by the ontolink parser
//! and validator. It includes:
//!
//! - **Layers**: Layer ids, the canonical layer set and file-name conventions ([`layer`] module)
//! - **Link types**: Registry entries describing legal relationships ([`link_type::LinkType`])
//! - **Relationships**: Normalized relationship declarations ([`relationship::RelationshipRecord`])
//! - **Entities**: Entities declared in layer documents ([`entity::Entity`])

pub mod entity;
pub mod layer;
pub mod link_type;
pub mod relationship;
