//! Catalog inputs consumed by the cart.
//!
//! The catalog itself lives elsewhere; callers hand the ledger a snapshot of
//! the product as it looked at the time of the request.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Product identifier (SKU or catalog id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A product configuration with its own stock and price modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationSnapshot {
    pub key: String,
    #[serde(default)]
    pub price_modifier: Money,
    pub stock: u32,
}

/// Price and stock of a product at the time of a cart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub variation: Option<VariationSnapshot>,
}

impl ProductSnapshot {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
            variation: None,
        }
    }

    pub fn with_variation(mut self, key: impl Into<String>, price_modifier: Money, stock: u32) -> Self {
        self.variation = Some(VariationSnapshot {
            key: key.into(),
            price_modifier,
            stock,
        });
        self
    }

    /// Stock of the selected variation, or of the product when there is none.
    pub fn available_stock(&self) -> u32 {
        self.variation.as_ref().map_or(self.stock, |v| v.stock)
    }

    pub fn variation_key(&self) -> Option<&str> {
        self.variation.as_ref().map(|v| v.key.as_str())
    }
}
