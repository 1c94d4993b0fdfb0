//! Shopping cart ledger.

mod ledger;

pub use ledger::CartLedger;

use common::{OwnerId, RecordId};
use doc_store::{Document, Record, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::money::Money;
use crate::pricing;
use crate::product::ProductId;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity below one.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Requested quantity exceeds the stock known for the item.
    #[error("Out of stock: requested {requested}, only {available} available")]
    OutOfStock { requested: u32, available: u32 },

    /// The item does not exist in this owner's cart.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(RecordId),

    /// Unit price below zero or above [`pricing::MAX_UNIT_PRICE`].
    #[error("Invalid unit price: {unit_price} (must be between 0.00 and {})", pricing::MAX_UNIT_PRICE)]
    InvalidPrice { unit_price: Money },

    /// The cart was modified between reading it and turning it into an order.
    #[error("Cart changed while the order was being placed")]
    CartChanged,
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::InvalidQuantity { .. }
            | CartError::OutOfStock { .. }
            | CartError::InvalidPrice { .. } => ErrorKind::Validation,
            CartError::CartItemNotFound(_) => ErrorKind::NotFound,
            CartError::CartChanged => ErrorKind::Conflict,
        }
    }
}

/// One product (and variation) in an owner's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub owner_id: OwnerId,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_key: Option<String>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub stock_at_add_time: u32,
}

impl CartItem {
    /// Key shared by every add of the same product and variation for one owner.
    ///
    /// Owner and product are length-prefixed, so no choice of ids can make
    /// two different rows share a key.
    pub fn consolidation_key(
        owner: &OwnerId,
        product_id: &ProductId,
        variation_key: Option<&str>,
    ) -> String {
        let owner = owner.as_str();
        let product = product_id.as_str();
        format!(
            "{}:{}|{}:{}|{}",
            owner.len(),
            owner,
            product.len(),
            product,
            variation_key.unwrap_or_default()
        )
    }

    /// True if this row is the one `add_item` means to merge into.
    pub(crate) fn is_same_line(
        &self,
        owner: &OwnerId,
        product_id: &ProductId,
        variation_key: Option<&str>,
    ) -> bool {
        self.owner_id == *owner
            && self.product_id == *product_id
            && self.variation_key.as_deref().unwrap_or_default()
                == variation_key.unwrap_or_default()
    }

    pub fn line_total(&self) -> Money {
        pricing::line_total(self.unit_price, self.quantity)
    }
}

impl Document for CartItem {
    const COLLECTION: &'static str = "cart_items";

    fn partition(&self) -> Option<String> {
        Some(self.owner_id.to_string())
    }

    fn unique_key(&self) -> Option<String> {
        Some(Self::consolidation_key(
            &self.owner_id,
            &self.product_id,
            self.variation_key.as_deref(),
        ))
    }
}

/// A priced cart row as frozen into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: RecordId,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_key: Option<String>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl From<&Record<CartItem>> for CartLine {
    fn from(record: &Record<CartItem>) -> Self {
        let item = &record.data;
        Self {
            item_id: record.id,
            product_id: item.product_id.clone(),
            variation_key: item.variation_key.clone(),
            product_name: item.product_name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

/// A stored cart row exactly as a snapshot saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeldRow {
    pub(crate) id: RecordId,
    pub(crate) version: Version,
    pub(crate) item: CartItem,
}

/// Read-only view of a cart at one instant.
///
/// This is the only cart input accepted when placing an order. It remembers
/// the version of every row it priced so checkout can consume exactly those
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    owner_id: OwnerId,
    items: Vec<CartLine>,
    subtotal: Money,
    item_count: u32,
    #[serde(skip)]
    rows: Vec<HeldRow>,
}

impl CartSnapshot {
    pub(crate) fn new(owner_id: OwnerId, items: Vec<CartLine>) -> Self {
        let subtotal = pricing::subtotal(items.iter().map(|l| l.line_total));
        let item_count = items.iter().fold(0u32, |acc, l| acc.saturating_add(l.quantity));
        Self {
            owner_id,
            items,
            subtotal,
            item_count,
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_records(owner_id: OwnerId, records: &[Record<CartItem>]) -> Self {
        let mut snapshot = Self::new(owner_id, records.iter().map(CartLine::from).collect());
        snapshot.rows = records
            .iter()
            .map(|r| HeldRow {
                id: r.id,
                version: r.version,
                item: r.data.clone(),
            })
            .collect();
        snapshot
    }

    /// Rows backing the lines; empty if the snapshot was not read from a store.
    pub(crate) fn held_rows(&self) -> &[HeldRow] {
        &self.rows
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
