use std::time::Duration;

use thiserror::Error;

use crate::{RecordId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A compare-and-swap write lost the race.
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: RecordId,
        expected: Version,
        actual: Version,
    },

    /// Another document in the collection already holds this unique key.
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    /// The document was not found.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: RecordId },

    /// The store did not answer within the configured bound.
    #[error("Store operation {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true when the failure is an outage rather than a logical
    /// outcome (timeouts and driver errors).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout { .. } | StoreError::Database(_) | StoreError::Migration(_)
        )
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
