//! The API context passed through every data-access call.
//!
//! The data layer never interprets the context beyond handing it to the
//! transport, which turns it into request headers.

use serde::{Deserialize, Serialize};

/// Version id of the live (non-draft) version of versioned entities.
pub const LIVE_VERSION_ID: &str = "0fa91ce3e96a4bc2be4bd9ce752c3425";

/// Id of the system default language.
pub const SYSTEM_LANGUAGE_ID: &str = "2fbb5fe2e29a4d70aa5854ce7ce3e20b";

/// Scoping and credentials for a single API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiContext {
    /// Language the server resolves `translated` values for.
    pub language_id: String,
    /// Entity version to read and write.
    pub version_id: String,
    /// Whether inherited values (e.g. parent product fields) are resolved.
    pub inheritance: bool,
    /// Bearer token. Never serialized.
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for ApiContext {
    fn default() -> Self {
        Self {
            language_id: SYSTEM_LANGUAGE_ID.to_string(),
            version_id: LIVE_VERSION_ID.to_string(),
            inheritance: false,
            auth_token: None,
        }
    }
}

impl ApiContext {
    /// Returns a copy scoped to another language.
    #[must_use]
    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    /// Returns a copy scoped to another entity version.
    #[must_use]
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = version_id.into();
        self
    }

    /// Returns a copy with inheritance resolution switched on or off.
    #[must_use]
    pub fn with_inheritance(mut self, inheritance: bool) -> Self {
        self.inheritance = inheritance;
        self
    }

    /// Returns a copy carrying a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// True if this context targets the live version.
    pub fn is_live_version(&self) -> bool {
        self.version_id == LIVE_VERSION_ID
    }

    /// Header pairs the transport attaches to each request.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("sw-language-id", self.language_id.clone()),
            ("sw-version-id", self.version_id.clone()),
        ];
        if self.inheritance {
            headers.push(("sw-inheritance", "1".to_string()));
        }
        if let Some(token) = &self.auth_token {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
        headers
    }
}
