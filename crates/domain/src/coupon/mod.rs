//! Coupons: terms, validation against a subtotal, and administration.

mod engine;

pub use engine::CouponEngine;

use chrono::{DateTime, Utc};
use doc_store::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::money::Money;
use crate::pricing::Discount;

/// Errors that can occur during coupon operations.
#[derive(Debug, Error)]
pub enum CouponError {
    /// No active coupon has this code.
    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Coupon {0} has expired")]
    CouponExpired(String),

    /// The subtotal is below the coupon's minimum purchase.
    #[error("Minimum purchase of {minimum} not met (subtotal {subtotal})")]
    MinPurchaseNotMet { minimum: Money, subtotal: Money },

    #[error("Coupon code already exists: {0}")]
    DuplicateCoupon(String),

    /// The coupon has been redeemed, its terms can no longer change.
    #[error("Coupon {0} has been redeemed and its terms are locked")]
    CouponLocked(String),

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),
}

impl CouponError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CouponError::CouponNotFound(_) => ErrorKind::NotFound,
            CouponError::CouponExpired(_)
            | CouponError::MinPurchaseNotMet { .. }
            | CouponError::InvalidCoupon(_) => ErrorKind::Validation,
            CouponError::DuplicateCoupon(_) | CouponError::CouponLocked(_) => ErrorKind::Conflict,
        }
    }
}

/// Display form of a code: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Lookup form of a code; codes match case-insensitively.
pub fn lookup_key(code: &str) -> String {
    code.trim().to_lowercase()
}

/// A stored coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount: Discount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub times_redeemed: u32,
}

impl Coupon {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }

    /// Redeemed coupons keep their terms forever.
    pub fn is_locked(&self) -> bool {
        self.times_redeemed > 0
    }
}

impl Document for Coupon {
    const COLLECTION: &'static str = "coupons";

    fn unique_key(&self) -> Option<String> {
        Some(lookup_key(&self.code))
    }
}

/// Input for creating a coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount: Discount,
    pub min_purchase: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl NewCoupon {
    pub fn new(code: impl Into<String>, discount: Discount) -> Self {
        Self {
            code: code.into(),
            discount,
            min_purchase: None,
            expires_at: None,
            is_active: true,
        }
    }

    pub fn min_purchase(mut self, amount: Money) -> Self {
        self.min_purchase = Some(amount);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub(crate) fn into_coupon(self) -> Result<Coupon, CouponError> {
        let code = normalize_code(&self.code);
        if code.is_empty() {
            return Err(CouponError::InvalidCoupon("code is required".to_string()));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponError::InvalidCoupon(format!(
                "code {code} may only contain letters, digits, '-' and '_'"
            )));
        }
        validate_min_purchase(self.min_purchase)?;

        Ok(Coupon {
            code,
            discount: self.discount,
            min_purchase: self.min_purchase,
            expires_at: self.expires_at,
            is_active: self.is_active,
            times_redeemed: 0,
        })
    }
}

fn validate_min_purchase(min_purchase: Option<Money>) -> Result<(), CouponError> {
    match min_purchase {
        Some(amount) if amount.is_negative() => Err(CouponError::InvalidCoupon(
            "minimum purchase must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Partial update of a coupon. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct CouponPatch {
    pub discount: Option<Discount>,
    pub min_purchase: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponPatch {
    /// True if the patch touches the discount terms rather than just the
    /// active flag.
    pub fn changes_terms(&self) -> bool {
        self.discount.is_some() || self.min_purchase.is_some() || self.expires_at.is_some()
    }

    pub(crate) fn apply(&self, coupon: &Coupon) -> Result<Coupon, CouponError> {
        if coupon.is_locked() && self.changes_terms() {
            return Err(CouponError::CouponLocked(coupon.code.clone()));
        }
        validate_min_purchase(self.min_purchase)?;

        let mut next = coupon.clone();
        if let Some(discount) = self.discount {
            next.discount = discount;
        }
        if let Some(min_purchase) = self.min_purchase {
            next.min_purchase = Some(min_purchase);
        }
        if let Some(expires_at) = self.expires_at {
            next.expires_at = Some(expires_at);
        }
        if let Some(is_active) = self.is_active {
            next.is_active = is_active;
        }
        Ok(next)
    }
}

/// Frozen outcome of validating a coupon against a subtotal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResult {
    pub coupon: Coupon,
    pub subtotal: Money,
    pub discount_amount: Money,
}

impl CouponResult {
    /// The copy of the discount that an order keeps.
    pub fn applied(&self) -> AppliedDiscount {
        AppliedDiscount {
            code: self.coupon.code.clone(),
            discount: self.coupon.discount,
            amount: self.discount_amount,
        }
    }
}

/// Discount as frozen into an order at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub code: String,
    pub discount: Discount,
    pub amount: Money,
}
