use crate::collection::EntityCollection;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A loaded or locally created entity.
///
/// Field values live in an open map whose shape is described by the entity's
/// [`EntityDefinition`](crate::EntityDefinition). The entity keeps a snapshot
/// of the values it was loaded (or last saved) with, so pending changes can
/// be computed and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: String,
    entity_name: String,
    fields: Map<String, Value>,
    translated: Map<String, Value>,
    associations: BTreeMap<String, Association>,
    origin: Map<String, Value>,
    removals: BTreeMap<String, Vec<Removal>>,
    is_new: bool,
}

/// An entity taken out of a to-many association, kept until the removal is
/// saved or discarded.
#[derive(Debug, Clone, PartialEq)]
struct Removal {
    index: usize,
    entity: Entity,
}

/// A loaded association value.
#[derive(Debug, Clone, PartialEq)]
pub enum Association {
    ToOne(Box<Entity>),
    ToMany(EntityCollection),
}

impl Entity {
    /// A new local entity that does not exist on the server yet.
    pub fn new(entity_name: impl Into<String>, id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            entity_name: entity_name.into(),
            fields,
            translated: Map::new(),
            associations: BTreeMap::new(),
            origin: Map::new(),
            removals: BTreeMap::new(),
            is_new: true,
        }
    }

    /// An entity as returned by the server. Its current values are its origin.
    pub fn hydrated(
        entity_name: impl Into<String>,
        id: impl Into<String>,
        fields: Map<String, Value>,
        translated: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_name: entity_name.into(),
            origin: fields.clone(),
            fields,
            translated,
            associations: BTreeMap::new(),
            removals: BTreeMap::new(),
            is_new: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// True until the entity has been saved once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Forces the next save to create instead of update.
    pub fn mark_as_new(&mut self) {
        self.is_new = true;
    }

    // ── Fields ───────────────────────────────────────────────────

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field to `null` (e.g. to clear a foreign key).
    pub fn clear(&mut self, field: &str) -> &mut Self {
        self.fields.insert(field.to_string(), Value::Null);
        self
    }

    /// Resolves a JSON pointer (e.g. "/config/entity") against the fields.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let path = pointer.strip_prefix('/')?;
        match path.split_once('/') {
            Some((head, rest)) => self.fields.get(head)?.pointer(&format!("/{rest}")),
            None => self.fields.get(path),
        }
    }

    /// Extract a string value using a JSON pointer.
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.pointer(pointer).and_then(|v| v.as_f64())
    }

    // ── Translations ─────────────────────────────────────────────

    pub fn translated(&self) -> &Map<String, Value> {
        &self.translated
    }

    /// The localized value of `field`, falling back to the raw field.
    pub fn translated_value(&self, field: &str) -> Option<&Value> {
        self.translated
            .get(field)
            .filter(|v| !v.is_null())
            .or_else(|| self.fields.get(field))
    }

    // ── Associations ─────────────────────────────────────────────

    pub fn associations(&self) -> &BTreeMap<String, Association> {
        &self.associations
    }

    pub fn set_association(&mut self, name: impl Into<String>, association: Association) -> &mut Self {
        self.associations.insert(name.into(), association);
        self
    }

    pub fn to_one(&self, name: &str) -> Option<&Entity> {
        match self.associations.get(name) {
            Some(Association::ToOne(entity)) => Some(entity),
            _ => None,
        }
    }

    pub fn to_one_mut(&mut self, name: &str) -> Option<&mut Entity> {
        match self.associations.get_mut(name) {
            Some(Association::ToOne(entity)) => Some(entity),
            _ => None,
        }
    }

    pub fn to_many(&self, name: &str) -> Option<&EntityCollection> {
        match self.associations.get(name) {
            Some(Association::ToMany(collection)) => Some(collection),
            _ => None,
        }
    }

    pub fn to_many_mut(&mut self, name: &str) -> Option<&mut EntityCollection> {
        match self.associations.get_mut(name) {
            Some(Association::ToMany(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Removes `id` from a loaded to-many association and queues the removal
    /// for the next save. Returns false if the association is not loaded or
    /// does not contain `id`.
    pub fn remove_from_association(&mut self, name: &str, id: &str) -> bool {
        let Some(collection) = self.to_many_mut(name) else {
            return false;
        };
        let Some(index) = collection.iter().position(|e| e.id() == id) else {
            return false;
        };
        let Some(entity) = collection.remove(id) else {
            return false;
        };
        self.removals
            .entry(name.to_string())
            .or_default()
            .push(Removal { index, entity });
        true
    }

    /// Ids removed from to-many associations and not yet saved, per
    /// association.
    pub fn pending_removals(&self) -> BTreeMap<&str, Vec<&str>> {
        self.removals
            .iter()
            .filter(|(_, removed)| !removed.is_empty())
            .map(|(name, removed)| (name.as_str(), removed.iter().map(|r| r.entity.id()).collect()))
            .collect()
    }

    /// Drops the queued removal of `id` from `association` of the entity
    /// `entity_name`/`entity_id`, which is this entity or one nested in its
    /// associations. Called once the server has applied the removal.
    pub fn confirm_removal(&mut self, entity_name: &str, entity_id: &str, association: &str, id: &str) -> bool {
        if self.entity_name == entity_name
            && self.id == entity_id
            && let Some(pending) = self.removals.get_mut(association)
            && let Some(index) = pending.iter().position(|r| r.entity.id() == id)
        {
            pending.remove(index);
            if pending.is_empty() {
                self.removals.remove(association);
            }
            return true;
        }
        self.associations.values_mut().any(|loaded| match loaded {
            Association::ToOne(entity) => entity.confirm_removal(entity_name, entity_id, association, id),
            Association::ToMany(collection) => collection
                .iter_mut()
                .any(|entity| entity.confirm_removal(entity_name, entity_id, association, id)),
        })
    }

    // ── Change tracking ──────────────────────────────────────────

    /// Fields whose value differs from the origin. For new entities, every
    /// field.
    pub fn changed_fields(&self) -> Map<String, Value> {
        if self.is_new {
            return self.fields.clone();
        }
        self.fields
            .iter()
            .filter(|(k, v)| self.origin.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// True if saving would send anything.
    pub fn has_changes(&self) -> bool {
        self.is_new
            || !self.changed_fields().is_empty()
            || self.removals.values().any(|removed| !removed.is_empty())
            || self.associations.values().any(|a| match a {
                Association::ToOne(entity) => entity.has_changes(),
                Association::ToMany(collection) => collection.iter().any(Entity::has_changes),
            })
    }

    /// Accepts the current values as persisted state.
    pub fn commit(&mut self) {
        self.origin = self.fields.clone();
        self.removals.clear();
        self.is_new = false;
        for association in self.associations.values_mut() {
            match association {
                Association::ToOne(entity) => entity.commit(),
                Association::ToMany(collection) => collection.iter_mut().for_each(Entity::commit),
            }
        }
    }

    /// Accepts the current field values, here and in loaded associations,
    /// as persisted. Queued removals stay pending.
    pub fn commit_fields(&mut self) {
        self.origin = self.fields.clone();
        self.is_new = false;
        for association in self.associations.values_mut() {
            match association {
                Association::ToOne(entity) => entity.commit_fields(),
                Association::ToMany(collection) => collection.iter_mut().for_each(Entity::commit_fields),
            }
        }
    }

    /// Restores the values the entity was loaded with, here and in loaded
    /// associations, and puts removed association entries back in place.
    pub fn discard(&mut self) {
        self.fields = self.origin.clone();
        for (name, removed) in std::mem::take(&mut self.removals) {
            if let Some(collection) = self.to_many_mut(&name) {
                for removal in removed.into_iter().rev() {
                    collection.insert(removal.index, removal.entity);
                }
            }
        }
        for association in self.associations.values_mut() {
            match association {
                Association::ToOne(entity) => entity.discard(),
                Association::ToMany(collection) => collection.iter_mut().for_each(Entity::discard),
            }
        }
    }

    // ── Conversion ───────────────────────────────────────────────

    /// Plain JSON form: `id` plus all fields, with loaded associations
    /// inlined.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        for (name, association) in &self.associations {
            let value = match association {
                Association::ToOne(entity) => entity.to_json(),
                Association::ToMany(collection) => {
                    Value::Array(collection.iter().map(Entity::to_json).collect())
                }
            };
            out.insert(name.clone(), value);
        }
        if !self.translated.is_empty() {
            out.insert("translated".to_string(), Value::Object(self.translated.clone()));
        }
        Value::Object(out)
    }

    /// Decodes the entity into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}
