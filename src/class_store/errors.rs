//! # Class Store Errors

use thiserror::Error;

/// Result type for class store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Class store errors
///
/// The three kinds are exhaustive: a missing record, an exhausted code
/// space, and anything the backend itself failed at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("No free class code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::ClassNotFound(_) => "class_not_found",
            StoreError::CodeSpaceExhausted { .. } => "code_space_exhausted",
            StoreError::Backend(_) => "storage_failure",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::ClassNotFound(_) => 404,
            StoreError::CodeSpaceExhausted { .. } => 503,
            StoreError::Backend(_) => 500,
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::ClassNotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(format!("migration failed: {}", e))
    }
}
