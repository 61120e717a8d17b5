//! Data-access error types.

use backoffice_criteria::CriteriaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for data-access operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors that can occur while talking to the admin API.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API request failed with status {status}: {detail}")]
    Api {
        status: u16,
        detail: String,
        code: Option<String>,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("validation failed with {} field error(s)", errors.len())]
    Validation { status: u16, errors: Vec<FieldError> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("rejected by entity hook: {0}")]
    Hook(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DataError {
    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            DataError::Api { status, .. } | DataError::Validation { status, .. } => Some(*status),
            DataError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// The data layer itself never retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Network(_) => true,
            DataError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Field-level errors of a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            DataError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<CriteriaError> for DataError {
    fn from(err: CriteriaError) -> Self {
        match err {
            CriteriaError::InvalidArgument(msg) => DataError::InvalidArgument(msg),
        }
    }
}

/// A server-side validation error attached to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON pointer into the written payload, e.g. `/0/name`.
    pub pointer: String,
    /// Machine-readable error code.
    pub code: Option<String>,
    /// Human-readable message.
    pub detail: String,
}

impl FieldError {
    /// The field name: the last segment of the pointer.
    pub fn field(&self) -> &str {
        self.pointer.rsplit('/').next().unwrap_or(&self.pointer)
    }
}
