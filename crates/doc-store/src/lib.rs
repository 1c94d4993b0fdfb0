pub mod collection;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod timeout;

pub use collection::{Collection, Document, Record};
pub use common::RecordId;
pub use document::{NewDocument, StoredDocument, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt, WriteOptions};
pub use timeout::TimeoutStore;
