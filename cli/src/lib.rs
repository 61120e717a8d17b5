//! Argument parsing and command execution for the `backoffice` binary.

use anyhow::{Context, Result, bail};
use backoffice_criteria::{Criteria, SortDirection};
use backoffice_data::{ClientConfig, RepositoryFactory};
use backoffice_model::DefinitionRegistry;
use backoffice_types::ApiContext;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "backoffice")]
#[command(about = "Query the backoffice admin API")]
pub struct Cli {
    /// Path to a JSON client config file
    #[arg(short, long, env = "BACKOFFICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Admin API base URL, e.g. https://shop.example.com/api
    #[arg(long, env = "BACKOFFICE_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "BACKOFFICE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Content language id
    #[arg(long, env = "BACKOFFICE_LANGUAGE_ID")]
    pub language_id: Option<String>,

    /// Resolve inherited values
    #[arg(long)]
    pub inheritance: bool,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Path to a JSON file of entity definitions
    #[arg(long, env = "BACKOFFICE_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search entities and print them with the total
    Search(QueryArgs),
    /// Print only the ids matching a query
    Ids(QueryArgs),
    /// Load one entity by id
    Get {
        entity: String,
        id: String,
        /// Association to load along with the entity (repeatable)
        #[arg(short, long = "association")]
        associations: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// Entity name, e.g. `product` or `shipping_method`
    pub entity: String,

    /// Full-text search term
    #[arg(short, long)]
    pub term: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(short, long, default_value_t = backoffice_criteria::DEFAULT_LIMIT)]
    pub limit: u32,

    /// Equality filter `field=value`; the value is read as JSON when it parses (repeatable)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Sort key `field` or `field:desc` (repeatable)
    #[arg(short, long = "sort")]
    pub sortings: Vec<String>,

    /// Association to load (repeatable)
    #[arg(short, long = "association")]
    pub associations: Vec<String>,
}

impl QueryArgs {
    /// Builds the search criteria for these arguments.
    pub fn criteria(&self) -> Result<Criteria> {
        let mut criteria = Criteria::paged(self.page, self.limit)?;
        if let Some(term) = &self.term {
            criteria.set_term(term.as_str());
        }
        for filter in &self.filters {
            let (field, value) = parse_filter(filter)?;
            criteria.add_filter(Criteria::equals(field, value));
        }
        for sorting in &self.sortings {
            let (field, order) = match sorting.split_once(':') {
                Some((field, order)) => (field, order.parse::<SortDirection>().map_err(anyhow::Error::msg)?),
                None => (sorting.as_str(), SortDirection::Asc),
            };
            criteria.add_sorting(Criteria::sort(field, order));
        }
        for association in &self.associations {
            criteria.add_association(association);
        }
        Ok(criteria)
    }
}

fn parse_filter(raw: &str) -> Result<(&str, Value)> {
    let Some((field, value)) = raw.split_once('=') else {
        bail!("filter must look like field=value, got {raw:?}");
    };
    if field.is_empty() {
        bail!("filter field is empty in {raw:?}");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field, value))
}

impl Cli {
    /// The client config: the config file (or defaults) with flags applied on top.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        if let Some(language_id) = &self.language_id {
            config.language_id.clone_from(language_id);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config.inheritance |= self.inheritance;
        config.validate().context("invalid client config")?;
        Ok(config)
    }
}

/// Loads entity definitions, or an empty registry without a schema file.
pub fn load_registry(path: Option<&Path>) -> Result<DefinitionRegistry> {
    let Some(path) = path else {
        return Ok(DefinitionRegistry::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    let registry = DefinitionRegistry::from_json(&raw)
        .with_context(|| format!("failed to parse schema {}", path.display()))?;
    debug!("Loaded {} entity definitions", registry.len());
    Ok(registry)
}

/// Runs one command and returns what should be printed.
pub async fn execute(command: &Command, factory: &RepositoryFactory, context: &ApiContext) -> Result<Value> {
    match command {
        Command::Search(query) => {
            let criteria = query.criteria()?;
            let result = factory
                .create(&query.entity)
                .search(&criteria, context)
                .await
                .with_context(|| format!("search for {} failed", query.entity))?;
            let mut output = json!({
                "total": result.total(),
                "data": result.iter().map(|e| e.to_json()).collect::<Vec<_>>(),
            });
            if !result.aggregations().is_empty() {
                output["aggregations"] = Value::Object(result.aggregations().clone());
            }
            Ok(output)
        }
        Command::Ids(query) => {
            let criteria = query.criteria()?;
            let result = factory
                .create(&query.entity)
                .search_ids(&criteria, context)
                .await
                .with_context(|| format!("id search for {} failed", query.entity))?;
            Ok(json!({"total": result.total, "data": result.ids}))
        }
        Command::Get { entity, id, associations } => {
            let mut criteria = Criteria::new();
            for association in associations {
                criteria.add_association(association);
            }
            let found = factory
                .create(entity)
                .get(id, context, Some(&criteria))
                .await
                .with_context(|| format!("failed to load {entity} {id}"))?;
            Ok(found.to_json())
        }
    }
}
