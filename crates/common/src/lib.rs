//! Shared identifier types used across the commerce ledger crates.

mod types;

pub use types::{OwnerId, RecordId};
