/*
 * Error types for orphan file cleanup.
 *
 * Errors are categorized by:
 * - Source: where the error originated (metadata, listing, deletion, storage)
 * - Retryability: whether the operation can be retried
 * - Fatality: metadata errors abort the action before any deletion,
 *   listing and deletion errors are accumulated into the result
 */

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanupError {
    /// Failure to read table metadata. Fatal: the action must never delete
    /// against an incomplete referenced-file set.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A storage subtree failed to enumerate. Recorded and skipped.
    #[error("Listing error: {0}")]
    Listing(String),

    /// A single candidate failed to delete. Recorded, batch continues.
    #[error("Deletion error: {0}")]
    Deletion(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Iceberg error: {0}")]
    Iceberg(#[from] iceberg::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CleanupError {
    /// Returns true if this error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CleanupError::Storage(_) | CleanupError::Listing(_))
    }

    /// Returns a suggested retry delay for this error type.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            CleanupError::Storage(_) => Some(Duration::from_millis(200)),
            CleanupError::Listing(_) => Some(Duration::from_millis(200)),
            _ => None,
        }
    }

    /// Wraps this error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match self {
            CleanupError::Metadata(msg) => CleanupError::Metadata(format!("{}: {}", ctx, msg)),
            CleanupError::Listing(msg) => CleanupError::Listing(format!("{}: {}", ctx, msg)),
            CleanupError::Deletion(msg) => CleanupError::Deletion(format!("{}: {}", ctx, msg)),
            CleanupError::Storage(msg) => CleanupError::Storage(format!("{}: {}", ctx, msg)),
            CleanupError::Config(msg) => CleanupError::Config(format!("{}: {}", ctx, msg)),
            CleanupError::Unexpected(msg) => CleanupError::Unexpected(format!("{}: {}", ctx, msg)),
            // Metadata reads are the only place iceberg errors originate
            e @ CleanupError::Iceberg(_) => CleanupError::Metadata(format!("{}: {}", ctx, e)),
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanupError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Adds context lazily (only evaluated on error).
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
