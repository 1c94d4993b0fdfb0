use doc_store::StoreError;

/// Upper bound on reload-and-retry rounds after a lost compare-and-swap.
pub const MAX_WRITE_RETRIES: u32 = 5;

/// True when a write failed only because another writer got there first.
pub(crate) fn lost_race(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateKey { .. }
    )
}

pub(crate) fn note_retry(operation: &'static str, attempt: u32) {
    tracing::debug!(operation, attempt, "write lost a race, reloading");
    metrics::counter!("store_conflicts_retried_total", "operation" => operation).increment(1);
}
