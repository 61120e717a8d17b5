//! Repository: search, load and persist one entity type.

use crate::changeset::{Changeset, ChangesetGenerator};
use crate::error::{DataError, DataResult, FieldError};
use crate::hydrate::{ids_from, Hydrator};
use crate::route::entity_route;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};
use backoffice_criteria::Criteria;
use backoffice_model::{DefinitionRegistry, Entity, EntityCollection, EntityDefinition, EntityHook};
use backoffice_types::{ApiContext, EntityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an id-only search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSearchResult {
    pub total: u64,
    pub ids: Vec<String>,
}

/// How an entity references the owner an association is removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssociationKind {
    /// The entity holds a foreign key column pointing at the owner.
    OneToMany,
    /// The entity holds a to-many association containing the owner.
    ManyToMany,
}

/// Data access for one entity type.
///
/// Cheap to clone; clones share the transport, definitions and hook. Every
/// call is an independent round-trip: nothing is queued, deduplicated or
/// retried.
#[derive(Clone)]
pub struct Repository {
    entity_name: String,
    route: String,
    transport: Arc<dyn Transport>,
    registry: Arc<DefinitionRegistry>,
    hook: Option<Arc<dyn EntityHook>>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity_name", &self.entity_name)
            .field("route", &self.route)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

impl Repository {
    pub(crate) fn new(
        entity_name: &str,
        transport: Arc<dyn Transport>,
        registry: Arc<DefinitionRegistry>,
        hook: Option<Arc<dyn EntityHook>>,
    ) -> Self {
        Self {
            entity_name: entity_name.to_string(),
            route: entity_route(entity_name),
            transport,
            registry,
            hook,
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Base route, e.g. `/product-manufacturer`.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn definition(&self) -> Option<&EntityDefinition> {
        self.registry.get(&self.entity_name)
    }

    // ── Reading ──────────────────────────────────────────────────

    /// Runs `criteria` and returns one page of hydrated entities.
    pub async fn search(&self, criteria: &Criteria, context: &ApiContext) -> DataResult<EntityCollection> {
        let body = serde_json::to_value(criteria)?;
        let path = format!("/search{}", self.route);
        debug!("Searching {} (page {:?}, limit {:?})", self.entity_name, criteria.page(), criteria.limit());

        let response = self.send(ApiRequest::new(Method::Post, path, context).with_body(body)).await?;
        let response = self.expect_success(response, None)?;

        let hydrator = Hydrator::new(&self.registry, context, &response.body);
        let mut collection = hydrator.collection(&self.entity_name, criteria, &response.body)?;
        if let Some(hook) = &self.hook {
            collection.iter_mut().for_each(|entity| hook.on_after_load(entity));
        }

        debug!(
            "Loaded {} of {} {} entities",
            collection.len(),
            collection.total(),
            self.entity_name
        );
        Ok(collection)
    }

    /// Runs `criteria` and returns only the matching ids and the total.
    pub async fn search_ids(&self, criteria: &Criteria, context: &ApiContext) -> DataResult<IdSearchResult> {
        let body = serde_json::to_value(criteria)?;
        let path = format!("/search-ids{}", self.route);

        let response = self.send(ApiRequest::new(Method::Post, path, context).with_body(body)).await?;
        let response = self.expect_success(response, None)?;
        let (total, ids) = ids_from(&response.body)?;
        Ok(IdSearchResult { total, ids })
    }

    /// Loads a single entity by id. `criteria` may add associations; its
    /// filters, term and pagination are replaced.
    pub async fn get(&self, id: &str, context: &ApiContext, criteria: Option<&Criteria>) -> DataResult<Entity> {
        let mut criteria = criteria.cloned().unwrap_or_default();
        criteria.reset_filters().set_term("").set_ids([id]).reset_page().set_limit(1)?;

        let collection = self.search(&criteria, context).await?;
        collection
            .into_iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| DataError::NotFound {
                entity: self.entity_name.clone(),
                id: id.to_string(),
            })
    }

    // ── Local state ──────────────────────────────────────────────

    /// A new local entity with a fresh id (or `id`) and the schema defaults.
    /// Nothing is sent until [`save`](Self::save).
    pub fn create(&self, id: Option<&str>) -> Entity {
        let id = id.map_or_else(|| EntityId::new().to_string(), str::to_string);
        let defaults = self.definition().map(EntityDefinition::defaults).unwrap_or_default();
        Entity::new(&self.entity_name, id, defaults)
    }

    pub fn has_changes(&self, entity: &Entity) -> bool {
        entity.has_changes()
    }

    /// Drops unsaved changes.
    pub fn discard(&self, entity: &mut Entity) {
        entity.discard();
    }

    /// The payload a save of `entity` would send.
    pub fn changeset(&self, entity: &Entity) -> Changeset {
        ChangesetGenerator::new(&self.registry).generate(entity)
    }

    /// Detaches `entity` from the owner identified by `owner_id`.
    ///
    /// For [`AssociationKind::OneToMany`] the foreign key `column` is cleared;
    /// for [`AssociationKind::ManyToMany`] the owner is removed from the
    /// loaded to-many association `column`. The change is local until the
    /// entity is saved.
    pub fn remove_association(
        &self,
        entity: &mut Entity,
        column: &str,
        kind: AssociationKind,
        owner_id: &str,
    ) -> DataResult<()> {
        match kind {
            AssociationKind::OneToMany => {
                entity.clear(column);
                Ok(())
            }
            AssociationKind::ManyToMany => {
                if entity.remove_from_association(column, owner_id) {
                    Ok(())
                } else {
                    Err(DataError::InvalidArgument(format!(
                        "{} {} has no loaded `{column}` entry {owner_id}",
                        entity.entity_name(),
                        entity.id()
                    )))
                }
            }
        }
    }

    // ── Writing ──────────────────────────────────────────────────

    /// Persists pending changes of `entity`.
    ///
    /// New entities are created with their full payload; existing ones are
    /// patched with changed fields only. Without changes nothing is sent.
    ///
    /// Once the payload is written the entity's current values become its
    /// origin, and each association removal is dropped from the entity as its
    /// `DELETE` succeeds. A failed payload write leaves the entity untouched;
    /// a failed deletion leaves only the removals not yet applied pending, so
    /// saving again resumes where the last attempt stopped.
    pub async fn save(&self, entity: &mut Entity, context: &ApiContext) -> DataResult<()> {
        if !entity.has_changes() {
            debug!("No changes to save for {} {}", self.entity_name, entity.id());
            return Ok(());
        }

        if let Some(hook) = &self.hook {
            hook.validate(entity).map_err(DataError::Hook)?;
        }

        let changeset = self.changeset(entity);
        let id = entity.id().to_string();

        if entity.is_new() {
            let request = ApiRequest::new(Method::Post, self.route.clone(), context)
                .with_body(Value::Object(changeset.payload));
            let response = self.send(request).await?;
            self.expect_success(response, None)?;
            info!("Created {} {}", self.entity_name, id);
        } else if !changeset.is_payload_empty() {
            let request = ApiRequest::new(Method::Patch, format!("{}/{}", self.route, id), context)
                .with_body(Value::Object(changeset.payload));
            let response = self.send(request).await?;
            self.expect_success(response, Some(&id))?;
            info!("Updated {} {}", self.entity_name, id);
        }

        entity.commit_fields();

        for deletion in changeset.deletions {
            let request = ApiRequest::new(Method::Delete, deletion.route.clone(), context);
            let response = self.send(request).await?;
            self.expect_success(response, None)?;
            entity.confirm_removal(&deletion.owner, &deletion.owner_id, &deletion.association, &deletion.id);
            debug!("Removed {} {} from {}.{}", deletion.id, deletion.association, deletion.owner, deletion.owner_id);
        }

        entity.commit();
        Ok(())
    }

    /// Deletes the entity with `id` on the server.
    pub async fn delete(&self, id: &str, context: &ApiContext) -> DataResult<()> {
        let request = ApiRequest::new(Method::Delete, format!("{}/{}", self.route, id), context);
        let response = self.send(request).await?;
        self.expect_success(response, Some(id))?;
        info!("Deleted {} {}", self.entity_name, id);
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    async fn send(&self, request: ApiRequest) -> DataResult<ApiResponse> {
        let label = format!("{} {}", request.method, request.path);
        self.transport.send(request).await.inspect_err(|e| {
            warn!("{label} failed: {e}");
        })
    }

    fn expect_success(&self, response: ApiResponse, id: Option<&str>) -> DataResult<ApiResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let err = error_from_response(&self.entity_name, id, &response);
        warn!("{} request failed: {err}", self.entity_name);
        Err(err)
    }
}

/// Maps an error response to a [`DataError`].
///
/// A 404 on a request for a specific id becomes `NotFound`. A 400 whose
/// errors point at fields becomes `Validation`. Everything else is `Api`,
/// using the first error's detail and code.
pub(crate) fn error_from_response(entity: &str, id: Option<&str>, response: &ApiResponse) -> DataError {
    let status = response.status;
    if status == 404
        && let Some(id) = id
    {
        return DataError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        };
    }

    let errors = response
        .body
        .get("errors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let field_errors: Vec<FieldError> = errors
        .iter()
        .filter_map(|e| {
            let pointer = e.pointer("/source/pointer")?.as_str()?;
            Some(FieldError {
                pointer: pointer.to_string(),
                code: e.get("code").and_then(Value::as_str).map(str::to_string),
                detail: error_detail(e).unwrap_or_default(),
            })
        })
        .collect();

    if status == 400 && !field_errors.is_empty() {
        return DataError::Validation {
            status,
            errors: field_errors,
        };
    }

    let first = errors.first();
    let detail = first
        .and_then(error_detail)
        .or_else(|| response.body.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));
    let code = first
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);

    DataError::Api { status, detail, code }
}

fn error_detail(error: &Value) -> Option<String> {
    error
        .get("detail")
        .or_else(|| error.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
