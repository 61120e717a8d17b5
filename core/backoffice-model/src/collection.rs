use crate::entity::Entity;
use backoffice_criteria::Criteria;
use backoffice_types::ApiContext;
use serde_json::{Map, Value};
use std::ops::Index;

/// One page of search results.
///
/// Keeps the criteria and context that produced it so the page can be
/// refreshed, and so the complement ("not yet assigned") can be derived.
/// Entity order is the server's response order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection {
    source: String,
    entity_name: String,
    context: ApiContext,
    criteria: Criteria,
    entities: Vec<Entity>,
    total: u64,
    aggregations: Map<String, Value>,
}

impl EntityCollection {
    /// An empty collection bound to `entity_name`.
    pub fn new(
        source: impl Into<String>,
        entity_name: impl Into<String>,
        context: ApiContext,
        criteria: Criteria,
    ) -> Self {
        Self {
            source: source.into(),
            entity_name: entity_name.into(),
            context,
            criteria,
            entities: Vec::new(),
            total: 0,
            aggregations: Map::new(),
        }
    }

    /// Attaches a page of results.
    #[must_use]
    pub fn with_results(
        mut self,
        entities: Vec<Entity>,
        total: u64,
        aggregations: Map<String, Value>,
    ) -> Self {
        self.entities = Vec::with_capacity(entities.len());
        for entity in entities {
            self.add(entity);
        }
        self.total = total;
        self.aggregations = aggregations;
        self
    }

    /// API route the collection was loaded from (e.g. `/category`).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Server-reported count under the criteria, across all pages.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggregations
    }

    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.get(name)
    }

    // ── Sequence access ──────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    pub fn at(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn first(&self) -> Option<&Entity> {
        self.entities.first()
    }

    pub fn last(&self) -> Option<&Entity> {
        self.entities.last()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entities.iter().map(Entity::id).collect()
    }

    // ── Local mutation ───────────────────────────────────────────

    /// Appends an entity. An entity with the same id is replaced in place.
    pub fn add(&mut self, entity: Entity) {
        match self.entities.iter().position(|e| e.id() == entity.id()) {
            Some(index) => self.entities[index] = entity,
            None => self.entities.push(entity),
        }
    }

    /// Inserts an entity at `index`, clamped to the length. An entity with
    /// the same id is replaced in place.
    pub fn insert(&mut self, index: usize, entity: Entity) {
        if let Some(existing) = self.entities.iter_mut().find(|e| e.id() == entity.id()) {
            *existing = entity;
            return;
        }
        let index = index.min(self.entities.len());
        self.entities.insert(index, entity);
    }

    /// Removes and returns the entity with `id`.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id() == id)?;
        Some(self.entities.remove(index))
    }

    /// Moves the entity at `from` to `to`. Returns false if either index is
    /// out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entities.len() || to >= self.entities.len() {
            return false;
        }
        let entity = self.entities.remove(from);
        self.entities.insert(to, entity);
        true
    }

    /// The "not yet returned" probe for this collection's criteria.
    pub fn complement_criteria(&self) -> Criteria {
        self.criteria.complement()
    }
}

impl Index<usize> for EntityCollection {
    type Output = Entity;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entities[index]
    }
}

impl<'a> IntoIterator for &'a EntityCollection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl IntoIterator for EntityCollection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
