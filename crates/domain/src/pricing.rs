//! Pure monetary computations shared by carts, orders and invoices.
//!
//! Every percentage computation rounds half-up to the nearest minor unit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, Percentage};

/// Errors raised while building pricing inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// The discount kind is not one of `percentage` or `flat`.
    #[error("Invalid discount kind: {0}")]
    InvalidDiscountKind(String),

    /// A discount value is out of range for its kind.
    #[error("Invalid discount value: {0}")]
    InvalidDiscountValue(String),

    /// An amount that must not be negative was negative.
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },
}

/// Discount kind as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Flat,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Flat => "flat",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Ok(DiscountKind::Percentage),
            "flat" => Ok(DiscountKind::Flat),
            other => Err(PricingError::InvalidDiscountKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terms of a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Discount {
    /// A percentage of the subtotal, optionally capped.
    Percentage {
        value: Percentage,
        #[serde(rename = "maxDiscountCap", default, skip_serializing_if = "Option::is_none")]
        max_discount_cap: Option<Money>,
    },
    /// A fixed amount, never more than the subtotal.
    Flat { value: Money },
}

impl Discount {
    /// Builds validated discount terms.
    ///
    /// Percentages must lie in `(0, 100]`, flat amounts and caps must be
    /// positive. A cap is only accepted for percentage discounts.
    pub fn new(
        kind: DiscountKind,
        value: f64,
        max_discount_cap: Option<Money>,
    ) -> Result<Self, PricingError> {
        if let Some(cap) = max_discount_cap
            && !cap.is_positive()
        {
            return Err(PricingError::InvalidDiscountValue(
                "maximum discount must be positive".to_string(),
            ));
        }

        match kind {
            DiscountKind::Percentage => {
                let value = Percentage::from_decimal(value);
                if value.bps() <= 0 || value > Percentage::full() {
                    return Err(PricingError::InvalidDiscountValue(
                        "percentage must be greater than 0 and at most 100".to_string(),
                    ));
                }
                Ok(Discount::Percentage {
                    value,
                    max_discount_cap,
                })
            }
            DiscountKind::Flat => {
                if max_discount_cap.is_some() {
                    return Err(PricingError::InvalidDiscountValue(
                        "maximum discount only applies to percentage discounts".to_string(),
                    ));
                }
                let value = Money::from_decimal(value);
                if !value.is_positive() {
                    return Err(PricingError::InvalidDiscountValue(
                        "flat discount must be positive".to_string(),
                    ));
                }
                Ok(Discount::Flat { value })
            }
        }
    }

    pub fn kind(&self) -> DiscountKind {
        match self {
            Discount::Percentage { .. } => DiscountKind::Percentage,
            Discount::Flat { .. } => DiscountKind::Flat,
        }
    }

    /// The configured value in wire units (percent or major currency units).
    pub fn value(&self) -> f64 {
        match self {
            Discount::Percentage { value, .. } => value.to_decimal(),
            Discount::Flat { value } => value.to_decimal(),
        }
    }
}

/// Highest unit price a cart accepts (ten million major units).
///
/// Keeps `unit price × stock` inside the range of [`Money`].
pub const MAX_UNIT_PRICE: Money = Money::from_major(10_000_000);

/// `unit_price × quantity`.
pub fn line_total(unit_price: Money, quantity: u32) -> Money {
    unit_price.multiply(quantity)
}

/// Base price adjusted by a variation's price modifier.
pub fn unit_price(base: Money, variation_modifier: Option<Money>) -> Money {
    base + variation_modifier.unwrap_or_default()
}

/// Sum of line totals.
pub fn subtotal(line_totals: impl IntoIterator<Item = Money>) -> Money {
    line_totals.into_iter().sum()
}

/// Discount amount for `subtotal`.
///
/// Never negative and never more than the subtotal.
pub fn apply_discount(subtotal: Money, discount: &Discount) -> Money {
    if !subtotal.is_positive() {
        return Money::zero();
    }

    let amount = match *discount {
        Discount::Percentage {
            value,
            max_discount_cap,
        } => {
            let raw = subtotal.percent_of(value);
            match max_discount_cap {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        Discount::Flat { value } => value,
    };

    amount.max(Money::zero()).min(subtotal)
}

/// `subtotal − discount`, floored at zero.
pub fn order_total(subtotal: Money, discount: Money) -> Money {
    subtotal.saturating_sub(discount)
}

/// `gross × gst_pct / 100`, rounded half-up.
pub fn gst_amount(gross: Money, gst_pct: Percentage) -> Money {
    gross.percent_of(gst_pct)
}

/// `gross + gst + other_cost − discount`.
///
/// May be negative when the discount exceeds everything else; callers
/// recording invoices reject that case.
pub fn invoice_total(
    gross: Money,
    gst_pct: Percentage,
    other_cost: Money,
    discount: Money,
) -> Money {
    gross + gst_amount(gross, gst_pct) + other_cost - discount
}
