//! Typed access to one logical collection.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    DocumentQuery, NewDocument, RecordId, Result, StoredDocument, Version,
    store::{DocumentStore, WriteOptions},
};

/// Trait for types persisted as documents.
///
/// The type decides which collection it lives in and, optionally, how it is
/// partitioned and which secondary key must stay unique.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection name.
    const COLLECTION: &'static str;

    /// Partition used for listing, if any.
    fn partition(&self) -> Option<String> {
        None
    }

    /// Secondary key that must be unique within the collection, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// A typed document together with its store-maintained metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: RecordId,

    #[serde(flatten)]
    pub data: T,

    #[serde(skip)]
    pub version: Version,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T: DeserializeOwned> Record<T> {
    /// Decodes a stored document.
    pub fn from_stored(document: StoredDocument) -> Result<Self> {
        Ok(Self {
            id: document.id,
            data: serde_json::from_value(document.body)?,
            version: document.version,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

/// Typed handle over a document store for documents of type `T`.
pub struct Collection<S, T> {
    store: S,
    _phantom: PhantomData<fn() -> T>,
}

impl<S: Clone, T> Clone for Collection<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, T> Collection<S, T>
where
    S: DocumentStore,
    T: Document,
{
    /// Creates a collection handle over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Inserts a new document.
    pub async fn insert(&self, data: T) -> Result<Record<T>> {
        let mut document = NewDocument::new(T::COLLECTION, serde_json::to_value(&data)?);
        if let Some(partition) = data.partition() {
            document = document.partition(partition);
        }
        if let Some(key) = data.unique_key() {
            document = document.unique_key(key);
        }

        let stored = self.store.insert(document).await?;
        Ok(Record {
            id: stored.id,
            data,
            version: stored.version,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Loads a document by id.
    pub async fn get(&self, id: RecordId) -> Result<Option<Record<T>>> {
        self.store
            .get(T::COLLECTION, id)
            .await?
            .map(Record::from_stored)
            .transpose()
    }

    /// Loads a document by its unique key.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<Record<T>>> {
        self.store
            .find_by_key(T::COLLECTION, key)
            .await?
            .map(Record::from_stored)
            .transpose()
    }

    /// Lists the documents of one partition in insertion order.
    pub async fn list_partition(&self, partition: &str) -> Result<Vec<Record<T>>> {
        self.list(DocumentQuery::collection(T::COLLECTION).partition(partition))
            .await
    }

    /// Lists every document of the collection in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Record<T>>> {
        self.list(DocumentQuery::collection(T::COLLECTION)).await
    }

    async fn list(&self, query: DocumentQuery) -> Result<Vec<Record<T>>> {
        self.store
            .list(query)
            .await?
            .into_iter()
            .map(Record::from_stored)
            .collect()
    }

    /// Replaces the body of `current` with `data`, provided nobody wrote the
    /// document since `current` was loaded.
    pub async fn replace(&self, current: &Record<T>, data: T) -> Result<Record<T>> {
        let stored = self
            .store
            .replace(
                T::COLLECTION,
                current.id,
                serde_json::to_value(&data)?,
                WriteOptions::expect_version(current.version),
            )
            .await?;

        Ok(Record {
            id: stored.id,
            data,
            version: stored.version,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Deletes a document. Returns false if it did not exist.
    pub async fn delete(&self, id: RecordId) -> Result<bool> {
        self.store
            .delete(T::COLLECTION, id, WriteOptions::new())
            .await
    }

    /// Deletes a document only while it is still at `expected`.
    /// Returns false if it is already gone.
    pub async fn delete_version(&self, id: RecordId, expected: Version) -> Result<bool> {
        self.store
            .delete(T::COLLECTION, id, WriteOptions::expect_version(expected))
            .await
    }

    /// Deletes every document of a partition.
    pub async fn delete_partition(&self, partition: &str) -> Result<u64> {
        self.store.delete_partition(T::COLLECTION, partition).await
    }
}
