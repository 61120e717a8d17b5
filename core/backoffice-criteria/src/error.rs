use thiserror::Error;

/// Result type for criteria operations.
pub type CriteriaResult<T> = Result<T, CriteriaError>;

/// Errors raised while building or decoding a criteria.
///
/// These are detected synchronously, before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
