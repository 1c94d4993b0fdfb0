//! Orders: immutable records with a governed status lifecycle.

mod checkout;
mod lifecycle;
mod state;
mod value_objects;

pub use checkout::{Checkout, CheckoutRequest, ExpectedTotals};
pub use lifecycle::{NewOrder, OrderLifecycle};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{CustomerDetails, OrderLine, PaymentResult, ShippingAddress};

use chrono::{DateTime, Utc};
use common::OwnerId;
use doc_store::Document;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coupon::AppliedDiscount;
use crate::error::ErrorKind;
use crate::money::Money;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart snapshot had no lines.
    #[error("Cannot place an order from an empty cart")]
    EmptyCart,

    #[error("Payment failed; order not placed")]
    PaymentFailed,

    /// The requested move is not in the transition table.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order has moved past the point where it can be cancelled.
    #[error("Order {order_id} cannot be cancelled in {status} status")]
    IllegalCancellation {
        order_id: String,
        status: OrderStatus,
    },

    #[error("Invalid payment status change for order {order_id}: {from} -> {to}")]
    InvalidPaymentTransition {
        order_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid order: {0}")]
    InvalidOrderDetails(String),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// A client-computed total disagrees with the server's computation.
    #[error("{field} mismatch: client sent {client}, expected {server}")]
    TotalsMismatch {
        field: &'static str,
        client: Money,
        server: Money,
    },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::OrderNotFound(_) => ErrorKind::NotFound,
            OrderError::InvalidStatusTransition { .. }
            | OrderError::IllegalCancellation { .. }
            | OrderError::InvalidPaymentTransition { .. } => ErrorKind::Conflict,
            OrderError::EmptyCart
            | OrderError::PaymentFailed
            | OrderError::InvalidOrderDetails(_)
            | OrderError::UnknownStatus(_)
            | OrderError::TotalsMismatch { .. } => ErrorKind::Validation,
        }
    }
}

/// A placed order.
///
/// Fields are private: once placed, only the status, payment status and
/// tracking number change, and only through [`OrderLifecycle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    order_id: String,
    owner_id: OwnerId,
    customer: CustomerDetails,
    shipping_address: ShippingAddress,
    line_items: Vec<OrderLine>,
    subtotal: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    applied_discount: Option<AppliedDiscount>,
    discount: Money,
    total: Money,
    payment_method: String,
    payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_id: Option<String>,
    status: OrderStatus,
    #[serde(alias = "trackingId")]
    tracking_number: String,
}

impl Order {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn customer(&self) -> &CustomerDetails {
        &self.customer
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn line_items(&self) -> &[OrderLine] {
        &self.line_items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn applied_discount(&self) -> Option<&AppliedDiscount> {
        self.applied_discount.as_ref()
    }

    /// Discount amount taken off the subtotal (zero without a coupon).
    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking_number(&self) -> &str {
        &self.tracking_number
    }

    /// Number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(|l| l.quantity).sum()
    }
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn partition(&self) -> Option<String> {
        Some(self.owner_id.to_string())
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.order_id.clone())
    }
}

fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// `ORD<unix millis>_<6 random alphanumerics>`.
pub(crate) fn generate_order_id(now: DateTime<Utc>) -> String {
    format!("ORD{}_{}", now.timestamp_millis(), random_code(6))
}

/// `TRK<12 random alphanumerics>`.
pub(crate) fn generate_tracking_number() -> String {
    format!("TRK{}", random_code(12))
}
