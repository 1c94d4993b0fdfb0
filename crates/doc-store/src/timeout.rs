use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    DocumentQuery, NewDocument, RecordId, Result, StoreError, StoredDocument,
    store::{DocumentStore, WriteOptions},
};

/// Decorator that bounds every store call by a fixed timeout.
///
/// A call that does not finish in time fails with `StoreError::Timeout`
/// instead of hanging the request. Work already committed by the inner
/// store stays committed.
#[derive(Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: DocumentStore> TimeoutStore<S> {
    /// Wraps `inner`, bounding each call by `timeout`.
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call timed out"
                );
                metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
                Err(StoreError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for TimeoutStore<S> {
    async fn insert(&self, document: NewDocument) -> Result<StoredDocument> {
        self.bounded("insert", self.inner.insert(document)).await
    }

    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<StoredDocument>> {
        self.bounded("get", self.inner.get(collection, id)).await
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
        self.bounded("find_by_key", self.inner.find_by_key(collection, key))
            .await
    }

    async fn list(&self, query: DocumentQuery) -> Result<Vec<StoredDocument>> {
        self.bounded("list", self.inner.list(query)).await
    }

    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        body: serde_json::Value,
        options: WriteOptions,
    ) -> Result<StoredDocument> {
        self.bounded(
            "replace",
            self.inner.replace(collection, id, body, options),
        )
        .await
    }

    async fn delete(&self, collection: &str, id: RecordId, options: WriteOptions) -> Result<bool> {
        self.bounded("delete", self.inner.delete(collection, id, options))
            .await
    }

    async fn delete_partition(&self, collection: &str, partition: &str) -> Result<u64> {
        self.bounded(
            "delete_partition",
            self.inner.delete_partition(collection, partition),
        )
        .await
    }

    async fn next_in_sequence(&self, counter: &str) -> Result<i64> {
        self.bounded("next_in_sequence", self.inner.next_in_sequence(counter))
            .await
    }

    async fn peek_sequence(&self, counter: &str) -> Result<i64> {
        self.bounded("peek_sequence", self.inner.peek_sequence(counter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryDocumentStore;

    /// Store whose every call stalls far beyond any sane timeout.
    #[derive(Clone)]
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn insert(&self, _document: NewDocument) -> Result<StoredDocument> {
            std::future::pending().await
        }
        async fn get(&self, _c: &str, _id: RecordId) -> Result<Option<StoredDocument>> {
            std::future::pending().await
        }
        async fn find_by_key(&self, _c: &str, _k: &str) -> Result<Option<StoredDocument>> {
            std::future::pending().await
        }
        async fn list(&self, _q: DocumentQuery) -> Result<Vec<StoredDocument>> {
            std::future::pending().await
        }
        async fn replace(
            &self,
            _c: &str,
            _id: RecordId,
            _b: serde_json::Value,
            _o: WriteOptions,
        ) -> Result<StoredDocument> {
            std::future::pending().await
        }
        async fn delete(&self, _c: &str, _id: RecordId, _o: WriteOptions) -> Result<bool> {
            std::future::pending().await
        }
        async fn delete_partition(&self, _c: &str, _p: &str) -> Result<u64> {
            std::future::pending().await
        }
        async fn next_in_sequence(&self, _c: &str) -> Result<i64> {
            std::future::pending().await
        }
        async fn peek_sequence(&self, _c: &str) -> Result<i64> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_surfaces_as_timeout() {
        let store = TimeoutStore::new(StalledStore, Duration::from_millis(50));

        let err = store.get("orders", RecordId::new()).await.unwrap_err();

        assert!(err.is_unavailable());
        assert!(matches!(err, StoreError::Timeout { operation: "get", .. }));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let store = TimeoutStore::new(InMemoryDocumentStore::new(), Duration::from_secs(5));

        let stored = store
            .insert(NewDocument::new("coupons", serde_json::json!({"code": "SAVE10"})))
            .await
            .unwrap();
        let fetched = store.get("coupons", stored.id).await.unwrap();

        assert!(fetched.is_some());
        assert_eq!(store.next_in_sequence("n").await.unwrap(), 1);
    }
}
