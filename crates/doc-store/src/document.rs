use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordId;

/// Version number for a stored document, used for compare-and-swap writes.
///
/// A document is written at version 1 and every successful replace
/// increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0), meaning "not yet stored".
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A document as it lives in the store, with store-maintained metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Generated identifier, unique within the collection.
    pub id: RecordId,

    /// Logical collection (e.g. "orders", "cart_items").
    pub collection: String,

    /// Optional grouping used for listing (e.g. the cart owner).
    pub partition: Option<String>,

    /// Optional secondary key, unique within the collection.
    pub unique_key: Option<String>,

    /// Current version for compare-and-swap.
    pub version: Version,

    /// When the document was first written.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// The document body as JSON.
    pub body: serde_json::Value,
}

/// A document about to be inserted.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: RecordId,
    pub collection: String,
    pub partition: Option<String>,
    pub unique_key: Option<String>,
    pub body: serde_json::Value,
}

impl NewDocument {
    /// Starts a new document for `collection` with a generated id.
    pub fn new(collection: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: RecordId::new(),
            collection: collection.into(),
            partition: None,
            unique_key: None,
            body,
        }
    }

    /// Uses a caller-chosen id instead of a generated one.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    /// Places the document in a partition.
    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Sets the unique secondary key.
    pub fn unique_key(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    /// Materializes the stored form at version 1.
    pub(crate) fn into_stored(self, now: DateTime<Utc>) -> StoredDocument {
        StoredDocument {
            id: self.id,
            collection: self.collection,
            partition: self.partition,
            unique_key: self.unique_key,
            version: Version::first(),
            created_at: now,
            updated_at: now,
            body: self.body,
        }
    }
}
