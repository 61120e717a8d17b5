//! Data access for the backoffice admin API.
//!
//! - [`RepositoryFactory`] / [`Repository`]: search, load, create, save and
//!   delete entities of one type through a [`Transport`]
//! - [`AssociationLoader`]: load every association of an owner in one batch
//! - [`FlowSequenceStore`]: edit the action sequences of a flow
//!
//! ```no_run
//! use backoffice_criteria::Criteria;
//! use backoffice_data::{ClientConfig, RepositoryFactory};
//! use backoffice_model::DefinitionRegistry;
//! use std::sync::Arc;
//!
//! # async fn run() -> backoffice_data::DataResult<()> {
//! let config = ClientConfig::from_file("backoffice.json")?;
//! let factory = RepositoryFactory::from_config(&config, Arc::new(DefinitionRegistry::new()))?;
//!
//! let mut criteria = Criteria::new();
//! criteria.add_filter(Criteria::equals("active", true));
//! let products = factory.create("product").search(&criteria, &config.context()).await?;
//! println!("{} of {}", products.len(), products.total());
//! # Ok(())
//! # }
//! ```

pub mod changeset;
pub mod config;
pub mod error;
pub mod factory;
pub mod flow;
mod hydrate;
pub mod loader;
pub mod notify;
pub mod repository;
pub mod route;
pub mod transport;

pub use changeset::{Changeset, Deletion};
pub use config::ClientConfig;
pub use error::{DataError, DataResult, FieldError};
pub use factory::RepositoryFactory;
pub use flow::{FlowAction, FlowSequenceStore};
pub use loader::{AssociationConfig, AssociationEntry, AssociationLoader};
pub use notify::{Notifier, TracingNotifier};
pub use repository::{AssociationKind, IdSearchResult, Repository};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
