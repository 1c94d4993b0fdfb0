use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    DocumentQuery, NewDocument, RecordId, Result, StoreError, StoredDocument, Version,
    store::{DocumentStore, WriteOptions},
};

const SELECT_COLUMNS: &str =
    "id, collection, partition_key, unique_key, version, created_at, updated_at, body";

/// PostgreSQL-backed document store implementation.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<StoredDocument> {
        Ok(StoredDocument {
            id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            collection: row.try_get("collection")?,
            partition: row.try_get("partition_key")?,
            unique_key: row.try_get("unique_key")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }

    async fn current_version(&self, collection: &str, id: RecordId) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, document: NewDocument) -> Result<StoredDocument> {
        let collection = document.collection.clone();
        let key = document
            .unique_key
            .clone()
            .unwrap_or_else(|| document.id.to_string());
        let stored = document.into_stored(Utc::now());

        let sql = format!(
            r#"
            INSERT INTO documents (id, collection, partition_key, unique_key, version, created_at, updated_at, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(stored.id.as_uuid())
            .bind(&stored.collection)
            .bind(&stored.partition)
            .bind(&stored.unique_key)
            .bind(stored.version.as_i64())
            .bind(stored.created_at)
            .bind(stored.updated_at)
            .bind(&stored.body)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Unique violations on the key or primary key mean a racing insert won
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::DuplicateKey {
                        collection: collection.clone(),
                        key: key.clone(),
                    };
                }
                StoreError::Database(e)
            })?;

        Self::row_to_document(row)
    }

    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<StoredDocument>> {
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(collection)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM documents WHERE collection = $1 AND unique_key = $2"
        );
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn list(&self, query: DocumentQuery) -> Result<Vec<StoredDocument>> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM documents WHERE collection = $1");
        let mut param_count = 1;

        // Build dynamic query
        if query.partition.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND partition_key = ${param_count}"));
        }

        sql.push_str(" ORDER BY seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql).bind(&query.collection);

        if let Some(ref partition) = query.partition {
            sqlx_query = sqlx_query.bind(partition);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn replace(
        &self,
        collection: &str,
        id: RecordId,
        body: serde_json::Value,
        options: WriteOptions,
    ) -> Result<StoredDocument> {
        // The version predicate makes check and write a single atomic statement
        let sql = format!(
            r#"
            UPDATE documents
            SET body = $3, version = version + 1, updated_at = $4
            WHERE collection = $1 AND id = $2 AND ($5::BIGINT IS NULL OR version = $5)
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(collection)
            .bind(id.as_uuid())
            .bind(&body)
            .bind(Utc::now())
            .bind(options.expected_version.map(|v| v.as_i64()))
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Self::row_to_document(row);
        }

        match (self.current_version(collection, id).await?, options.expected_version) {
            (Some(actual), Some(expected)) => Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual,
            }),
            _ => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            }),
        }
    }

    async fn delete(&self, collection: &str, id: RecordId, options: WriteOptions) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .bind(options.expected_version.map(|v| v.as_i64()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match (self.current_version(collection, id).await?, options.expected_version) {
            (Some(actual), Some(expected)) => Err(StoreError::ConcurrencyConflict {
                collection: collection.to_string(),
                id,
                expected,
                actual,
            }),
            _ => Ok(false),
        }
    }

    async fn delete_partition(&self, collection: &str, partition: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND partition_key = $2")
                .bind(collection)
                .bind(partition)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn next_in_sequence(&self, counter: &str) -> Result<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(counter)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    async fn peek_sequence(&self, counter: &str) -> Result<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM counters WHERE name = $1")
            .bind(counter)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.unwrap_or(0))
    }
}
