//! Commerce ledger core.
//!
//! This crate holds the parts of a storefront with real invariants:
//! - [`pricing`]: pure money arithmetic (line totals, discounts, invoice totals)
//! - [`CartLedger`]: one consolidated cart per owner
//! - [`CouponEngine`]: coupon validation and administration
//! - [`OrderLifecycle`]: immutable orders with a compare-and-swap status machine
//! - [`InvoiceSequencer`]: gap-free invoice numbers per financial year
//!
//! Everything persists through a [`doc_store::DocumentStore`].

pub mod cart;
pub mod coupon;
pub mod error;
pub mod invoice;
pub mod money;
pub mod notify;
pub mod order;
pub mod pricing;
pub mod product;
mod retry;

pub use cart::{CartError, CartItem, CartLedger, CartLine, CartSnapshot};
pub use coupon::{
    AppliedDiscount, Coupon, CouponEngine, CouponError, CouponPatch, CouponResult, NewCoupon,
};
pub use error::{DomainError, ErrorKind};
pub use invoice::{FinancialYear, Invoice, InvoiceError, InvoiceSequencer, NewInvoice};
pub use money::{Money, Percentage};
pub use notify::{InMemoryNotifier, LoggingNotifier, OrderNotification, OrderNotifier};
pub use order::{
    Checkout, CheckoutRequest, CustomerDetails, ExpectedTotals, NewOrder, Order, OrderError,
    OrderLifecycle, OrderLine, OrderStatus, PaymentResult, PaymentStatus, ShippingAddress,
};
pub use pricing::{Discount, DiscountKind, PricingError};
pub use product::{ProductId, ProductSnapshot, VariationSnapshot};
pub use retry::MAX_WRITE_RETRIES;
