//! Computes the write payload for a save.

use crate::route::{entity_route, segment};
use backoffice_model::{Association, DefinitionRegistry, Entity, PropertyKind};
use serde_json::{Map, Value};

/// What a save sends: one upsert payload plus association deletions.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    /// Changed fields and nested association changes. Always contains `id`.
    pub payload: Map<String, Value>,
    /// Association removals to `DELETE` after the payload was written.
    pub deletions: Vec<Deletion>,
}

/// One removed association entry and the route that deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub route: String,
    /// Entity name of the owner the entry was removed from.
    pub owner: String,
    pub owner_id: String,
    pub association: String,
    /// Id of the removed entity.
    pub id: String,
}

impl Changeset {
    /// True if the payload holds nothing besides the id.
    pub fn is_payload_empty(&self) -> bool {
        self.payload.keys().all(|k| k == "id")
    }

    pub fn is_empty(&self) -> bool {
        self.is_payload_empty() && self.deletions.is_empty()
    }
}

pub(crate) struct ChangesetGenerator<'a> {
    registry: &'a DefinitionRegistry,
}

impl<'a> ChangesetGenerator<'a> {
    pub(crate) fn new(registry: &'a DefinitionRegistry) -> Self {
        Self { registry }
    }

    pub(crate) fn generate(&self, entity: &Entity) -> Changeset {
        let mut deletions = Vec::new();
        let payload = self.payload(entity, &mut deletions);
        Changeset { payload, deletions }
    }

    fn payload(&self, entity: &Entity, deletions: &mut Vec<Deletion>) -> Map<String, Value> {
        let definition = self.registry.get(entity.entity_name());
        let mut payload: Map<String, Value> = entity
            .changed_fields()
            .into_iter()
            .filter(|(name, _)| !definition.is_some_and(|d| d.is_read_only(name) || d.is_association(name)))
            .collect();
        payload.insert("id".to_string(), Value::String(entity.id().to_string()));

        for (name, association) in entity.associations() {
            match association {
                Association::ToOne(child) if child.has_changes() => {
                    payload.insert(name.clone(), Value::Object(self.payload(child, deletions)));
                }
                Association::ToMany(children) => {
                    let changed: Vec<Value> = children
                        .iter()
                        .filter(|child| child.has_changes())
                        .map(|child| Value::Object(self.payload(child, deletions)))
                        .collect();
                    if !changed.is_empty() {
                        payload.insert(name.clone(), Value::Array(changed));
                    }
                }
                Association::ToOne(_) => {}
            }
        }

        for (name, ids) in entity.pending_removals() {
            let kind = definition.and_then(|d| d.property(name)).map(|p| &p.kind);
            for id in ids {
                let route = match kind {
                    Some(PropertyKind::OneToMany { entity: target, .. }) => {
                        format!("{}/{}", entity_route(target), id)
                    }
                    _ => format!(
                        "{}/{}/{}/{}",
                        entity_route(entity.entity_name()),
                        entity.id(),
                        segment(name),
                        id
                    ),
                };
                deletions.push(Deletion {
                    route,
                    owner: entity.entity_name().to_string(),
                    owner_id: entity.id().to_string(),
                    association: name.to_string(),
                    id: id.to_string(),
                });
            }
        }

        payload
    }
}
