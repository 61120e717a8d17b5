use crate::config::ClientConfig;
use crate::error::DataResult;
use crate::repository::Repository;
use crate::transport::{HttpTransport, Transport};
use backoffice_model::{DefinitionRegistry, EntityHook};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hands out [`Repository`] instances bound to a shared transport and the
/// registered entity definitions.
#[derive(Clone)]
pub struct RepositoryFactory {
    transport: Arc<dyn Transport>,
    registry: Arc<DefinitionRegistry>,
    hooks: HashMap<String, Arc<dyn EntityHook>>,
}

impl fmt::Debug for RepositoryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryFactory")
            .field("entities", &self.registry.entity_names())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RepositoryFactory {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<DefinitionRegistry>) -> Self {
        Self {
            transport,
            registry,
            hooks: HashMap::new(),
        }
    }

    /// A factory talking HTTP to the configured API.
    pub fn from_config(config: &ClientConfig, registry: Arc<DefinitionRegistry>) -> DataResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), registry))
    }

    /// Registers a hook for one entity type.
    #[must_use]
    pub fn with_hook(mut self, entity_name: &str, hook: Arc<dyn EntityHook>) -> Self {
        self.hooks.insert(entity_name.to_string(), hook);
        self
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// A repository for `entity_name`. Entities without a registered
    /// definition work too; their responses are kept as plain fields.
    pub fn create(&self, entity_name: &str) -> Repository {
        Repository::new(
            entity_name,
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            self.hooks.get(entity_name).cloned(),
        )
    }
}
