//! Batch loading of the entities assigned to one owner.
//!
//! An [`AssociationLoader`] is configured with one [`AssociationConfig`] per
//! association (e.g. every entity type that references a rule). It loads all
//! of them at once, probes how many entities are *not* assigned yet, and
//! offers per-association refresh, term filtering and bulk removal.

use crate::error::{DataError, DataResult};
use crate::factory::RepositoryFactory;
use crate::notify::Notifier;
use crate::repository::{AssociationKind, Repository};
use backoffice_criteria::Criteria;
use backoffice_model::{Entity, EntityCollection};
use backoffice_types::ApiContext;
use futures::future::join_all;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds a fresh criteria for each load.
pub type CriteriaFactory = Arc<dyn Fn() -> Criteria + Send + Sync>;

/// How assigned entities are detached from the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteContext {
    pub kind: AssociationKind,
    /// Foreign key (one-to-many) or association name (many-to-many) on the
    /// assigned entity.
    pub column: String,
}

/// How new entities are assigned to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddContext {
    pub kind: AssociationKind,
    /// Entity type offered for assignment.
    pub entity: String,
    pub column: String,
}

/// One association to load.
#[derive(Clone)]
pub struct AssociationConfig {
    pub id: String,
    pub entity_name: String,
    /// Name of the association on the owner, if it has one.
    pub association_name: Option<String>,
    pub criteria: CriteriaFactory,
    /// Overrides the loader's context for this association.
    pub context: Option<ApiContext>,
    pub delete_context: Option<DeleteContext>,
    pub add_context: Option<AddContext>,
}

impl fmt::Debug for AssociationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationConfig")
            .field("id", &self.id)
            .field("entity_name", &self.entity_name)
            .field("association_name", &self.association_name)
            .field("context", &self.context)
            .field("delete_context", &self.delete_context)
            .field("add_context", &self.add_context)
            .finish_non_exhaustive()
    }
}

impl AssociationConfig {
    pub fn new(
        id: impl Into<String>,
        entity_name: impl Into<String>,
        criteria: impl Fn() -> Criteria + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            entity_name: entity_name.into(),
            association_name: None,
            criteria: Arc::new(criteria),
            context: None,
            delete_context: None,
            add_context: None,
        }
    }

    #[must_use]
    pub fn with_association_name(mut self, name: impl Into<String>) -> Self {
        self.association_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ApiContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_delete_context(mut self, kind: AssociationKind, column: impl Into<String>) -> Self {
        self.delete_context = Some(DeleteContext {
            kind,
            column: column.into(),
        });
        self
    }

    #[must_use]
    pub fn with_add_context(
        mut self,
        kind: AssociationKind,
        entity: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.add_context = Some(AddContext {
            kind,
            entity: entity.into(),
            column: column.into(),
        });
        self
    }

    fn build_criteria(&self) -> Criteria {
        (self.criteria)()
    }

    fn probes_not_assigned(&self) -> bool {
        self.delete_context.is_some() || self.add_context.is_some()
    }
}

/// Loaded state of one association.
#[derive(Debug)]
pub struct AssociationEntry {
    config: AssociationConfig,
    repository: Repository,
    loaded: Option<EntityCollection>,
    not_assigned_total: Option<u64>,
    error: Option<DataError>,
}

impl AssociationEntry {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// The last loaded page, if any load succeeded.
    pub fn loaded(&self) -> Option<&EntityCollection> {
        self.loaded.as_ref()
    }

    /// Entities matching none of the association's filters. `None` when the
    /// association neither adds nor deletes, or before the first load.
    pub fn not_assigned_total(&self) -> Option<u64> {
        self.not_assigned_total
    }

    /// Why the last batch load of this association failed.
    pub fn error(&self) -> Option<&DataError> {
        self.error.as_ref()
    }
}

/// Counts running operations; loading while the count is non-zero.
#[derive(Debug, Default)]
struct LoadingCounter(AtomicUsize);

struct LoadingGuard(Arc<LoadingCounter>);

impl LoadingCounter {
    fn start(self: &Arc<Self>) -> LoadingGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(Arc::clone(self))
    }

    fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0 .0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loads and manages a set of associations of one owner entity.
pub struct AssociationLoader {
    factory: RepositoryFactory,
    owner_id: String,
    context: ApiContext,
    entries: Vec<AssociationEntry>,
    notifier: Arc<dyn Notifier>,
    loading: Arc<LoadingCounter>,
}

impl AssociationLoader {
    pub fn new(
        factory: RepositoryFactory,
        owner_id: impl Into<String>,
        configs: Vec<AssociationConfig>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let entries = configs
            .into_iter()
            .map(|config| AssociationEntry {
                repository: factory.create(&config.entity_name),
                config,
                loaded: None,
                not_assigned_total: None,
                error: None,
            })
            .collect();

        Self {
            factory,
            owner_id: owner_id.into(),
            context: ApiContext::default(),
            entries,
            notifier,
            loading: Arc::new(LoadingCounter::default()),
        }
    }

    /// Context used by associations without their own.
    #[must_use]
    pub fn with_context(mut self, context: ApiContext) -> Self {
        self.context = context;
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn entries(&self) -> &[AssociationEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&AssociationEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// True while any load, refresh, filter or delete is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.is_active()
    }

    /// Loads every association concurrently.
    ///
    /// Each association's result is stored as soon as it arrives, so one
    /// failure does not discard the others. If any association fails, the
    /// notifier receives exactly one error for the whole batch. Returns
    /// whether every association loaded.
    pub async fn load_all(&mut self) -> bool {
        let _guard = self.loading.start();
        let fallback = &self.context;

        let results = join_all(self.entries.iter_mut().map(|entry| load_entry(entry, fallback))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        for (entry, result) in self.entries.iter_mut().zip(results) {
            if let Err(e) = &result {
                warn!("Loading association {} failed: {e}", entry.id());
            }
            entry.error = result.err();
        }

        if failed > 0 {
            self.notifier.error(&format!(
                "Failed to load {failed} of {} associations",
                self.entries.len()
            ));
            return false;
        }
        debug!("Loaded {} associations of {}", self.entries.len(), self.owner_id);
        true
    }

    /// Reloads one association and its not-assigned total.
    pub async fn refresh(&mut self, id: &str) -> DataResult<()> {
        let index = self.index_of(id)?;
        let _guard = self.loading.start();
        let entry = &mut self.entries[index];
        load_entry(entry, &self.context).await?;
        entry.error = None;
        Ok(())
    }

    /// Reloads one association from page 1 restricted to `term`.
    pub async fn filter(&mut self, id: &str, term: &str) -> DataResult<()> {
        let index = self.index_of(id)?;
        let _guard = self.loading.start();
        let entry = &mut self.entries[index];
        let context = entry.config.context.clone().unwrap_or_else(|| self.context.clone());

        let mut criteria = entry.config.build_criteria();
        criteria.reset_page().set_term(term);

        let collection = entry.repository.search(&criteria, &context).await?;
        entry.loaded = Some(collection);
        Ok(())
    }

    /// Detaches `items` from the owner, saves each of them concurrently and
    /// reloads the association.
    pub async fn delete_items(&mut self, id: &str, items: Vec<Entity>) -> DataResult<()> {
        let index = self.index_of(id)?;
        let entry = &self.entries[index];
        let delete_context = entry
            .config
            .delete_context
            .clone()
            .ok_or_else(|| DataError::InvalidArgument(format!("association {id} does not allow deletion")))?;
        let context = entry.config.context.clone().unwrap_or_else(|| self.context.clone());

        {
            let _guard = self.loading.start();
            let factory = &self.factory;
            let owner_id = self.owner_id.as_str();
            let delete_context = &delete_context;
            let context = &context;

            let results = join_all(items.into_iter().map(|mut item| async move {
                let repository = factory.create(item.entity_name());
                repository.remove_association(&mut item, &delete_context.column, delete_context.kind, owner_id)?;
                repository.save(&mut item, context).await
            }))
            .await;

            results.into_iter().collect::<DataResult<Vec<()>>>()?;
        }

        self.refresh(id).await
    }

    /// True when nothing is left to assign.
    pub fn disable_add(&self, id: &str) -> bool {
        self.entry(id).is_none_or(|e| e.not_assigned_total == Some(0))
    }

    pub fn allow_deletion(&self, id: &str) -> bool {
        self.entry(id).is_some_and(|e| e.config.delete_context.is_some())
    }

    fn index_of(&self, id: &str) -> DataResult<usize> {
        self.entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| DataError::InvalidArgument(format!("unknown association {id}")))
    }
}

async fn load_entry(entry: &mut AssociationEntry, fallback: &ApiContext) -> DataResult<()> {
    let context = entry.config.context.clone().unwrap_or_else(|| fallback.clone());
    let criteria = entry.config.build_criteria();

    let collection = entry.repository.search(&criteria, &context).await?;
    entry.loaded = Some(collection);

    if entry.config.probes_not_assigned() {
        let probe = entry.repository.search_ids(&criteria.complement(), &context).await?;
        entry.not_assigned_total = Some(probe.total);
    }
    Ok(())
}
