//! Command-line client for the backoffice admin API.
//!
//! Usage:
//!   backoffice --base-url https://shop.example.com/api --token $TOKEN \
//!       search product --term shirt --filter active=true --sort name:desc
//!   backoffice ids shipping_method --filter availabilityRuleId=<rule id>
//!   backoffice get product <id> --association manufacturer
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::sync::Arc;
use anyhow::{Context, Result};
use backoffice_cli::{Cli, execute, load_registry};
use backoffice_data::RepositoryFactory;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = cli.client_config()?;
    info!("Using admin API at {}", config.base_url);
    let registry = load_registry(cli.schema.as_deref())?;
    let factory = RepositoryFactory::from_config(&config, Arc::new(registry))
        .context("Failed to create API client")?;

    debug!("Running {:?}", cli.command);
    let output = execute(&cli.command, &factory, &config.context()).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
