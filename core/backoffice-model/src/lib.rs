//! Entity model for the backoffice data layer.
//!
//! Defines the types every repository call produces or consumes:
//! - [`Entity`]: an open field map with id, translations, loaded
//!   associations and change tracking
//! - [`EntityCollection`]: one page of results plus total, criteria and
//!   aggregations
//! - [`EntityDefinition`]: declares an entity type's fields, associations
//!   and defaults; registered at startup in a [`DefinitionRegistry`]
//! - [`EntityHook`]: optional trait for custom validation/post-load logic

mod collection;
mod entity;
mod hook;
mod schema;

pub use collection::EntityCollection;
pub use entity::{Association, Entity};
pub use hook::EntityHook;
pub use schema::{DefinitionRegistry, EntityDefinition, FieldType, Property, PropertyKind};
