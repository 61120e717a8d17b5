//! Client configuration.

use crate::error::{DataError, DataResult};
use backoffice_types::{ApiContext, LIVE_VERSION_ID, SYSTEM_LANGUAGE_ID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection settings for the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the admin API, e.g. `https://shop.example.com/api`.
    pub base_url: String,
    /// Per-request timeout (in seconds).
    pub timeout_secs: u64,
    /// Bearer token used when a call's context carries none.
    pub access_token: Option<String>,
    /// Default content language.
    pub language_id: String,
    /// Default entity version.
    pub version_id: String,
    /// Resolve inherited values by default.
    pub inheritance: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 30,
            access_token: None,
            language_id: SYSTEM_LANGUAGE_ID.to_string(),
            version_id: LIVE_VERSION_ID.to_string(),
            inheritance: false,
        }
    }
}

impl ClientConfig {
    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| DataError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings that would otherwise fail on first use.
    pub fn validate(&self) -> DataResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(DataError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DataError::Config("timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The default context for calls made with this config.
    pub fn context(&self) -> ApiContext {
        let context = ApiContext::default()
            .with_language(&self.language_id)
            .with_version(&self.version_id)
            .with_inheritance(self.inheritance);
        match &self.access_token {
            Some(token) => context.with_token(token),
            None => context,
        }
    }
}
