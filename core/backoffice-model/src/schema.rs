use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Describes an entity type: its fields, associations and defaults.
///
/// Definitions are registered once at startup in a [`DefinitionRegistry`]
/// and drive hydration (which keys are associations), seeding of new
/// entities (defaults) and changesets (read-only fields are never sent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub entity: String,
    pub properties: BTreeMap<String, Property>,
}

impl EntityDefinition {
    /// A definition with the standard `id`, `createdAt` and `updatedAt`
    /// properties.
    pub fn new(entity: &str) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Property::uuid().primary_key());
        properties.insert("createdAt".to_string(), Property::datetime().read_only());
        properties.insert("updatedAt".to_string(), Property::datetime().read_only());
        Self {
            entity: entity.to_string(),
            properties,
        }
    }

    /// Adds or replaces a property.
    pub fn with(mut self, name: &str, property: Property) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn is_association(&self, name: &str) -> bool {
        self.property(name).is_some_and(Property::is_association)
    }

    pub fn is_to_many(&self, name: &str) -> bool {
        self.property(name).is_some_and(Property::is_to_many)
    }

    /// True for fields the server assigns and the client never writes.
    pub fn is_read_only(&self, name: &str) -> bool {
        self.property(name).is_some_and(|p| p.read_only)
    }

    /// Default values for plain fields of a freshly created entity.
    pub fn defaults(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter(|(_, p)| !p.is_association() && !p.read_only && !p.primary_key)
            .filter_map(|(name, p)| p.default.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Names of all association properties.
    pub fn associations(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties
            .iter()
            .filter(|(_, p)| p.is_association())
            .map(|(n, p)| (n.as_str(), p))
    }
}

/// A single property of an entity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub kind: PropertyKind,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub translatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Property {
    fn field(field_type: FieldType) -> Self {
        Self {
            kind: PropertyKind::Field { field_type },
            read_only: false,
            required: false,
            primary_key: false,
            translatable: false,
            default: None,
        }
    }

    fn relation(kind: PropertyKind) -> Self {
        Self {
            kind,
            ..Self::field(FieldType::Json)
        }
    }

    /// Shorthand for a plain string field.
    pub fn string() -> Self {
        Self::field(FieldType::String)
    }

    /// Shorthand for a long text field.
    pub fn text() -> Self {
        Self::field(FieldType::Text)
    }

    pub fn int() -> Self {
        Self::field(FieldType::Int)
    }

    pub fn float() -> Self {
        Self::field(FieldType::Float)
    }

    pub fn bool() -> Self {
        Self::field(FieldType::Bool)
    }

    pub fn datetime() -> Self {
        Self::field(FieldType::DateTime)
    }

    /// Shorthand for an id or foreign key field.
    pub fn uuid() -> Self {
        Self::field(FieldType::Uuid)
    }

    /// Shorthand for a JSON blob field (e.g. `customFields`, `config`).
    pub fn json() -> Self {
        Self::field(FieldType::Json)
    }

    /// Many-to-one association resolved through `local_field`.
    pub fn many_to_one(entity: &str, local_field: &str) -> Self {
        Self::relation(PropertyKind::ManyToOne {
            entity: entity.to_string(),
            local_field: local_field.to_string(),
        })
    }

    /// One-to-many association whose children point back via `reference_field`.
    pub fn one_to_many(entity: &str, reference_field: &str) -> Self {
        Self::relation(PropertyKind::OneToMany {
            entity: entity.to_string(),
            reference_field: reference_field.to_string(),
        })
    }

    /// Many-to-many association stored in the `mapping` entity.
    pub fn many_to_many(entity: &str, mapping: &str) -> Self {
        Self::relation(PropertyKind::ManyToMany {
            entity: entity.to_string(),
            mapping: mapping.to_string(),
        })
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.required = true;
        self
    }

    #[must_use]
    pub fn translatable(mut self) -> Self {
        self.translatable = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_association(&self) -> bool {
        !matches!(self.kind, PropertyKind::Field { .. })
    }

    pub fn is_to_many(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::OneToMany { .. } | PropertyKind::ManyToMany { .. }
        )
    }

    /// Target entity of an association.
    pub fn target_entity(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Field { .. } => None,
            PropertyKind::ManyToOne { entity, .. }
            | PropertyKind::OneToMany { entity, .. }
            | PropertyKind::ManyToMany { entity, .. } => Some(entity),
        }
    }
}

/// What a property holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum PropertyKind {
    Field {
        field_type: FieldType,
    },
    ManyToOne {
        entity: String,
        local_field: String,
    },
    OneToMany {
        entity: String,
        reference_field: String,
    },
    ManyToMany {
        entity: String,
        mapping: String,
    },
}

/// The data type of a plain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Text,
    Int,
    Float,
    Bool,
    DateTime,
    Uuid,
    Json,
}

/// Every entity definition known to the application.
///
/// Built at startup and shared (behind an `Arc`) with every repository.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, EntityDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any previous one for the same entity.
    pub fn register(&mut self, definition: EntityDefinition) -> &mut Self {
        self.definitions
            .insert(definition.entity.clone(), definition);
        self
    }

    pub fn get(&self, entity: &str) -> Option<&EntityDefinition> {
        self.definitions.get(entity)
    }

    pub fn has(&self, entity: &str) -> bool {
        self.definitions.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Loads definitions from a JSON array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let definitions: Vec<EntityDefinition> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        Ok(registry)
    }
}
