use thiserror::Error;

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the value types of this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid base62 text: {0}")]
    InvalidBase62(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by a [`Store`][crate::Store] implementation.
///
/// `NotFound` is a regular outcome and is kept apart from backend failures so
/// callers can tell "no such id" from "backend unavailable".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short id not found: {0}")]
    NotFound(String),
    #[error("write conflict on prefix {prefix} persisted after {attempts} attempts")]
    Conflict { prefix: String, attempts: u32 },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<CoreError> for StoreError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidUrl(message) => Self::InvalidUrl(message),
            CoreError::InvalidBase62(message) => Self::InvalidData(message),
        }
    }
}
