use async_trait::async_trait;

use crate::{
    DocumentQuery, NewDocument, RecordId, Result, StoreError, StoredDocument, Version,
};

/// Options for replacing or deleting a stored document.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Expected version of the document for compare-and-swap.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl WriteOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the document to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }
}

/// Core trait for document store implementations.
///
/// The store is the only synchronization point of the ledger: every
/// check-then-write in the domain is expressed as a versioned replace, a
/// unique-key insert or an atomic counter increment.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document at version 1.
    ///
    /// Fails with `DuplicateKey` if another document in the collection holds
    /// the same unique key.
    async fn insert(&self, document: NewDocument) -> Result<StoredDocument>;

    /// Retrieves a document by id.
    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<StoredDocument>>;

    /// Retrieves a document by its unique secondary key.
    async fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>>;

    /// Lists documents matching a query, in insertion order.
    async fn list(&self, query: DocumentQuery) -> Result<Vec<StoredDocument>>;

    /// Replaces a document body and bumps its version.
    ///
    /// If `options.expected_version` is set, the write only happens when the
    /// stored version still matches; otherwise it fails with
    /// `ConcurrencyConflict` and nothing is written.
    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        body: serde_json::Value,
        options: WriteOptions,
    ) -> Result<StoredDocument>;

    /// Deletes a document. Returns false if it did not exist.
    ///
    /// If `options.expected_version` is set, the document is only removed
    /// while its stored version still matches; otherwise it fails with
    /// `ConcurrencyConflict` and the document stays.
    async fn delete(&self, collection: &str, id: RecordId, options: WriteOptions) -> Result<bool>;

    /// Deletes every document of a partition. Returns the number removed.
    async fn delete_partition(&self, collection: &str, partition: &str) -> Result<u64>;

    /// Atomically increments a named counter and returns the new value.
    ///
    /// The first call for a name returns 1. Values are never handed out twice.
    async fn next_in_sequence(&self, counter: &str) -> Result<i64>;

    /// Returns the last value handed out by a counter (0 if never used)
    /// without advancing it.
    async fn peek_sequence(&self, counter: &str) -> Result<i64>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Retrieves a document, failing with `NotFound` if it is absent.
    async fn get_required(&self, collection: &str, id: RecordId) -> Result<StoredDocument> {
        self.get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })
    }

    /// Lists every document of a partition.
    async fn list_partition(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<Vec<StoredDocument>> {
        self.list(DocumentQuery::collection(collection).partition(partition))
            .await
    }

    /// Checks whether a document exists.
    async fn exists(&self, collection: &str, id: RecordId) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Applies offset and limit to an already ordered result set.
pub(crate) fn paginate(documents: Vec<StoredDocument>, query: &DocumentQuery) -> Vec<StoredDocument> {
    let offset = query.offset.unwrap_or(0);
    let documents = documents.into_iter().skip(offset);

    match query.limit {
        Some(limit) => documents.take(limit).collect(),
        None => documents.collect(),
    }
}
