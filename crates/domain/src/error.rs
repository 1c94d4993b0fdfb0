//! Domain error types.

use doc_store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::coupon::CouponError;
use crate::invoice::InvoiceError;
use crate::order::OrderError;
use crate::pricing::PricingError;

/// Coarse classification used by outer layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is wrong; retrying it unchanged will fail again.
    Validation,
    NotFound,
    /// The request collides with existing state.
    Conflict,
    /// The store is unreachable or too slow.
    StorageUnavailable,
    Internal,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    /// Too many concurrent writers kept invalidating our reads.
    #[error("Gave up on {operation} after {attempts} conflicting writes")]
    ContentionExhausted {
        operation: &'static str,
        attempts: u32,
    },

    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Pricing(_) => ErrorKind::Validation,
            DomainError::Cart(e) => e.kind(),
            DomainError::Coupon(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Invoice(e) => e.kind(),
            DomainError::ContentionExhausted { .. } => ErrorKind::Conflict,
            DomainError::Store(e) => match e {
                StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateKey { .. } => {
                    ErrorKind::Conflict
                }
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::Serialization(_) => ErrorKind::Internal,
                _ if e.is_unavailable() => ErrorKind::StorageUnavailable,
                _ => ErrorKind::Internal,
            },
        }
    }
}
