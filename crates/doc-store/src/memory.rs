use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::{
    DocumentQuery, NewDocument, RecordId, Result, StoreError, StoredDocument,
    store::{DocumentStore, WriteOptions, paginate},
};

#[derive(Debug, Default)]
struct CollectionState {
    documents: HashMap<RecordId, StoredDocument>,
    keys: HashMap<String, RecordId>,
    insertion_order: Vec<RecordId>,
}

/// In-memory document store implementation.
///
/// Provides the same interface and the same conflict semantics as the
/// PostgreSQL implementation. Data is lost when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, CollectionState>>>,
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }

    /// Clears all documents and counters.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
        self.counters.lock().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<StoredDocument> {
        let mut collections = self.collections.write().await;
        let state = collections.entry(document.collection.clone()).or_default();

        // Unique constraint simulation
        if let Some(ref key) = document.unique_key
            && state.keys.contains_key(key)
        {
            return Err(StoreError::DuplicateKey {
                collection: document.collection,
                key: key.clone(),
            });
        }
        if state.documents.contains_key(&document.id) {
            return Err(StoreError::DuplicateKey {
                collection: document.collection,
                key: document.id.to_string(),
            });
        }

        let stored = document.into_stored(Utc::now());
        if let Some(ref key) = stored.unique_key {
            state.keys.insert(key.clone(), stored.id);
        }
        state.insertion_order.push(stored.id);
        state.documents.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.get(&id))
            .cloned())
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| {
            c.keys
                .get(key)
                .and_then(|id| c.documents.get(id))
                .cloned()
        }))
    }

    async fn list(&self, query: DocumentQuery) -> Result<Vec<StoredDocument>> {
        let collections = self.collections.read().await;
        let Some(state) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let documents: Vec<_> = state
            .insertion_order
            .iter()
            .filter_map(|id| state.documents.get(id))
            .filter(|d| match query.partition {
                Some(ref partition) => d.partition.as_ref() == Some(partition),
                None => true,
            })
            .cloned()
            .collect();

        Ok(paginate(documents, &query))
    }

    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        body: serde_json::Value,
        options: WriteOptions,
    ) -> Result<StoredDocument> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|c| c.documents.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;

        // Check and write happen under the same write lock
        if let Some(expected) = options.expected_version
            && document.version != expected
        {
            return Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual: document.version,
            });
        }

        document.body = body;
        document.version = document.version.next();
        document.updated_at = Utc::now();

        Ok(document.clone())
    }

    async fn delete(&self, collection: &str, id: RecordId, options: WriteOptions) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(state) = collections.get_mut(collection) else {
            return Ok(false);
        };

        if let Some(expected) = options.expected_version
            && let Some(document) = state.documents.get(&id)
            && document.version != expected
        {
            return Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual: document.version,
            });
        }

        match state.documents.remove(&id) {
            Some(removed) => {
                if let Some(key) = removed.unique_key {
                    state.keys.remove(&key);
                }
                state.insertion_order.retain(|existing| *existing != id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_partition(&self, collection: &str, partition: &str) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(state) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let doomed: Vec<RecordId> = state
            .documents
            .values()
            .filter(|d| d.partition.as_deref() == Some(partition))
            .map(|d| d.id)
            .collect();

        for id in &doomed {
            if let Some(removed) = state.documents.remove(id)
                && let Some(key) = removed.unique_key
            {
                state.keys.remove(&key);
            }
        }
        state.insertion_order.retain(|id| !doomed.contains(id));

        Ok(doomed.len() as u64)
    }

    async fn next_in_sequence(&self, counter: &str) -> Result<i64> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(counter.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn peek_sequence(&self, counter: &str) -> Result<i64> {
        Ok(self.counters.lock().await.get(counter).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentStoreExt, Version};

    fn cart_doc(owner: &str, key: &str) -> NewDocument {
        NewDocument::new("cart_items", serde_json::json!({"quantity": 1}))
            .partition(owner)
            .unique_key(key)
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "sess_1|p1|")).await.unwrap();

        assert_eq!(stored.version, Version::first());

        let fetched = store.get("cart_items", stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.body["quantity"], 1);
        assert_eq!(store.document_count("cart_items").await, 1);
    }

    #[tokio::test]
    async fn duplicate_unique_key_is_rejected() {
        let store = InMemoryDocumentStore::new();
        store.insert(cart_doc("sess_1", "k")).await.unwrap();

        let result = store.insert(cart_doc("sess_1", "k")).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
        assert_eq!(store.document_count("cart_items").await, 1);
    }

    #[tokio::test]
    async fn same_key_in_other_collection_is_allowed() {
        let store = InMemoryDocumentStore::new();
        store.insert(cart_doc("sess_1", "k")).await.unwrap();

        let other = NewDocument::new("coupons", serde_json::json!({})).unique_key("k");
        assert!(store.insert(other).await.is_ok());
    }

    #[tokio::test]
    async fn find_by_key() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "k1")).await.unwrap();

        let found = store.find_by_key("cart_items", "k1").await.unwrap();
        assert_eq!(found.map(|d| d.id), Some(stored.id));
        assert!(store.find_by_key("cart_items", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_with_matching_version_bumps_version() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "k")).await.unwrap();

        let updated = store
            .replace(
                "cart_items",
                stored.id,
                serde_json::json!({"quantity": 4}),
                WriteOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        assert_eq!(updated.version, Version::new(2));
        assert_eq!(updated.body["quantity"], 4);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn replace_with_stale_version_conflicts_and_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "k")).await.unwrap();
        store
            .replace(
                "cart_items",
                stored.id,
                serde_json::json!({"quantity": 2}),
                WriteOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let result = store
            .replace(
                "cart_items",
                stored.id,
                serde_json::json!({"quantity": 9}),
                WriteOptions::expect_version(Version::first()),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        let current = store.get_required("cart_items", stored.id).await.unwrap();
        assert_eq!(current.body["quantity"], 2);
    }

    #[tokio::test]
    async fn replace_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .replace(
                "orders",
                RecordId::new(),
                serde_json::json!({}),
                WriteOptions::new(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_frees_unique_key() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "k")).await.unwrap();

        assert!(
            store
                .delete("cart_items", stored.id, WriteOptions::new())
                .await
                .unwrap()
        );
        assert!(
            !store
                .delete("cart_items", stored.id, WriteOptions::new())
                .await
                .unwrap()
        );
        assert!(store.insert(cart_doc("sess_1", "k")).await.is_ok());
    }

    #[tokio::test]
    async fn stale_delete_conflicts_and_keeps_document() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(cart_doc("sess_1", "k")).await.unwrap();
        store
            .replace(
                "cart_items",
                stored.id,
                serde_json::json!({"quantity": 4}),
                WriteOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .delete(
                "cart_items",
                stored.id,
                WriteOptions::expect_version(Version::first()),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        assert!(store.exists("cart_items", stored.id).await.unwrap());
        assert!(
            store
                .delete(
                    "cart_items",
                    stored.id,
                    WriteOptions::expect_version(Version::new(2)),
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn list_partition_keeps_insertion_order() {
        let store = InMemoryDocumentStore::new();
        let a = store.insert(cart_doc("sess_1", "a")).await.unwrap();
        store.insert(cart_doc("sess_2", "b")).await.unwrap();
        let c = store.insert(cart_doc("sess_1", "c")).await.unwrap();

        let listed = store.list_partition("cart_items", "sess_1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);

        let page = store
            .list(DocumentQuery::collection("cart_items").offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn delete_partition_only_touches_that_partition() {
        let store = InMemoryDocumentStore::new();
        store.insert(cart_doc("sess_1", "a")).await.unwrap();
        store.insert(cart_doc("sess_1", "b")).await.unwrap();
        store.insert(cart_doc("sess_2", "c")).await.unwrap();

        let removed = store.delete_partition("cart_items", "sess_1").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.document_count("cart_items").await, 1);
        assert!(store.insert(cart_doc("sess_1", "a")).await.is_ok());
    }

    #[tokio::test]
    async fn counters_are_independent_and_start_at_one() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.next_in_sequence("invoice:2024-2025").await.unwrap(), 1);
        assert_eq!(store.next_in_sequence("invoice:2024-2025").await.unwrap(), 2);
        assert_eq!(store.next_in_sequence("invoice:2025-2026").await.unwrap(), 1);
        assert_eq!(store.peek_sequence("invoice:2024-2025").await.unwrap(), 2);
        assert_eq!(store.peek_sequence("invoice:2026-2027").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_counter_increments_never_collide() {
        let store = InMemoryDocumentStore::new();
        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.next_in_sequence("c").await.unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=100).collect::<Vec<_>>());
    }
}
