//! Turns search responses into entities and collections.
//!
//! Two response shapes are accepted:
//! - JSON:API: items carry `attributes` and `relationships`, with related
//!   records in a top-level `included` array and the total in `meta.total`
//! - plain JSON: items are flat objects with associations inlined, the total
//!   in `total`
//!
//! Which keys are associations is decided by the entity definition; entities
//! without a registered definition keep every key as a field.

use crate::error::{DataError, DataResult};
use crate::route::entity_route;
use backoffice_criteria::Criteria;
use backoffice_model::{Association, DefinitionRegistry, Entity, EntityCollection};
use backoffice_types::ApiContext;
use serde::de::Error as _;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Keys of a plain item that are never stored as fields.
const RESERVED_KEYS: &[&str] = &["id", "translated", "apiAlias", "_uniqueIdentifier"];

pub(crate) struct Hydrator<'a> {
    registry: &'a DefinitionRegistry,
    context: &'a ApiContext,
    included: HashMap<(&'a str, &'a str), &'a Value>,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(registry: &'a DefinitionRegistry, context: &'a ApiContext, body: &'a Value) -> Self {
        let included = body
            .get("included")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let kind = item.get("type")?.as_str()?;
                        let id = item.get("id")?.as_str()?;
                        Some(((kind, id), item))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            registry,
            context,
            included,
        }
    }

    /// Hydrates a whole search response.
    pub(crate) fn collection(
        &self,
        entity_name: &str,
        criteria: &Criteria,
        body: &'a Value,
    ) -> DataResult<EntityCollection> {
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| DataError::Serialization(serde_json::Error::custom("response has no `data` array")))?;

        let entities = data
            .iter()
            .map(|item| self.entity(entity_name, criteria, item, &mut Vec::new()))
            .collect::<DataResult<Vec<_>>>()?;

        let total = body
            .get("total")
            .and_then(Value::as_u64)
            .or_else(|| body.pointer("/meta/total").and_then(Value::as_u64))
            .unwrap_or(entities.len() as u64);

        let aggregations = body
            .get("aggregations")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(EntityCollection::new(
            entity_route(entity_name),
            entity_name,
            self.context.clone(),
            criteria.clone(),
        )
        .with_results(entities, total, aggregations))
    }

    /// Hydrates one item. `path` holds the `(entity, id)` pairs being
    /// hydrated above this one; relationships pointing back into it are
    /// skipped.
    fn entity(
        &self,
        entity_name: &str,
        criteria: &Criteria,
        item: &'a Value,
        path: &mut Vec<(String, String)>,
    ) -> DataResult<Entity> {
        let object = item
            .as_object()
            .ok_or_else(|| DataError::Serialization(serde_json::Error::custom("entity is not an object")))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DataError::Serialization(serde_json::Error::custom("entity has no string `id`")))?;

        path.push((entity_name.to_string(), id.to_string()));
        let entity = if let Some(attributes) = object.get("attributes").and_then(Value::as_object) {
            self.from_json_api(entity_name, id, criteria, attributes, object.get("relationships"), path)
        } else {
            self.from_plain(entity_name, id, criteria, object, path)
        };
        path.pop();
        entity
    }

    fn from_json_api(
        &self,
        entity_name: &str,
        id: &str,
        criteria: &Criteria,
        attributes: &Map<String, Value>,
        relationships: Option<&'a Value>,
        path: &mut Vec<(String, String)>,
    ) -> DataResult<Entity> {
        let mut fields = attributes.clone();
        let translated = match fields.remove("translated") {
            Some(Value::Object(t)) => t,
            _ => Map::new(),
        };
        for key in RESERVED_KEYS {
            fields.remove(*key);
        }
        let mut entity = Entity::hydrated(entity_name, id, fields, translated);

        let Some(relationships) = relationships.and_then(Value::as_object) else {
            return Ok(entity);
        };

        for (name, relationship) in relationships {
            let nested = nested_criteria(criteria, name);
            match relationship.get("data") {
                Some(Value::Object(reference)) => {
                    if let Some(related) = self.resolve(reference, path) {
                        let target = reference_type(reference).unwrap_or(name.as_str());
                        let child = self.entity(target, &nested, related, path)?;
                        entity.set_association(name.clone(), Association::ToOne(Box::new(child)));
                    }
                }
                Some(Value::Array(references)) => {
                    let target = self
                        .target_entity(entity_name, name)
                        .or_else(|| references.first().and_then(|r| r.as_object()).and_then(reference_type))
                        .unwrap_or(name.as_str())
                        .to_string();
                    let mut children = Vec::new();
                    for reference in references.iter().filter_map(Value::as_object) {
                        if let Some(related) = self.resolve(reference, path) {
                            children.push(self.entity(&target, &nested, related, path)?);
                        }
                    }
                    let collection = self.nested_collection(entity_name, id, name, &target, nested, children);
                    entity.set_association(name.clone(), Association::ToMany(collection));
                }
                _ => {}
            }
        }
        Ok(entity)
    }

    fn from_plain(
        &self,
        entity_name: &str,
        id: &str,
        criteria: &Criteria,
        object: &'a Map<String, Value>,
        path: &mut Vec<(String, String)>,
    ) -> DataResult<Entity> {
        let definition = self.registry.get(entity_name);
        let mut fields = Map::new();
        let mut associations = Vec::new();

        for (key, value) in object {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match definition.and_then(|d| d.property(key)) {
                Some(property) if property.is_association() => {
                    if !value.is_null() {
                        associations.push((key, property.target_entity().unwrap_or(key.as_str()).to_string(), value));
                    }
                }
                _ => {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        let translated = match object.get("translated") {
            Some(Value::Object(t)) => t.clone(),
            _ => Map::new(),
        };
        let mut entity = Entity::hydrated(entity_name, id, fields, translated);

        for (name, target, value) in associations {
            let nested = nested_criteria(criteria, name);
            match value {
                Value::Array(items) => {
                    let children = items
                        .iter()
                        .map(|item| self.entity(&target, &nested, item, path))
                        .collect::<DataResult<Vec<_>>>()?;
                    let collection = self.nested_collection(entity_name, id, name, &target, nested, children);
                    entity.set_association(name.clone(), Association::ToMany(collection));
                }
                Value::Object(_) => {
                    let child = self.entity(&target, &nested, value, path)?;
                    entity.set_association(name.clone(), Association::ToOne(Box::new(child)));
                }
                _ => {}
            }
        }
        Ok(entity)
    }

    fn resolve(&self, reference: &Map<String, Value>, path: &[(String, String)]) -> Option<&'a Value> {
        let kind = reference_type(reference)?;
        let id = reference.get("id")?.as_str()?;
        if path.iter().any(|(e, i)| e == kind && i == id) {
            return None;
        }
        self.included.get(&(kind, id)).copied()
    }

    fn target_entity(&self, entity_name: &str, association: &str) -> Option<&'a str> {
        self.registry
            .get(entity_name)
            .and_then(|d| d.property(association))
            .and_then(|p| p.target_entity())
    }

    fn nested_collection(
        &self,
        owner: &str,
        owner_id: &str,
        association: &str,
        target: &str,
        criteria: Criteria,
        children: Vec<Entity>,
    ) -> EntityCollection {
        let source = format!("{}/{}/{}", entity_route(owner), owner_id, crate::route::segment(association));
        let total = children.len() as u64;
        EntityCollection::new(source, target, self.context.clone(), criteria).with_results(
            children,
            total,
            Map::new(),
        )
    }
}

fn reference_type(reference: &Map<String, Value>) -> Option<&str> {
    reference.get("type").and_then(Value::as_str)
}

fn nested_criteria(criteria: &Criteria, association: &str) -> Criteria {
    criteria
        .associations()
        .get(association)
        .cloned()
        .unwrap_or_else(Criteria::unpaged)
}

/// Extracts `{total, data: [ids]}` from a `search-ids` response.
pub(crate) fn ids_from(body: &Value) -> DataResult<(u64, Vec<String>)> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Serialization(serde_json::Error::custom("response has no `data` array")))?;

    let ids: Vec<String> = data
        .iter()
        .filter_map(|v| match v {
            Value::String(id) => Some(id.clone()),
            Value::Object(o) => o.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect();

    let total = body
        .get("total")
        .and_then(Value::as_u64)
        .unwrap_or(ids.len() as u64);
    Ok((total, ids))
}
