//! Monetary amounts and percentages.
//!
//! Amounts are integer minor units (paise/cents). Percentages are basis
//! points. On the wire both travel as decimal numbers in major units
//! (`859.8`, `18`, `12.5`) and are rounded to the nearest minor unit or basis
//! point when read.
//!
//! Operators saturate instead of overflowing; use the `checked_*` methods
//! where an out-of-range result must be rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money amount held in minor units to avoid floating point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a Money amount from whole major units.
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Converts a decimal major-unit amount, rounding half away from zero
    /// to the nearest minor unit.
    pub fn from_decimal(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the amount as a decimal in major units (display and wire only).
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, saturating at the i64 bounds.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts, flooring the result at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }

    /// Applies a percentage, rounding half-up to the nearest minor unit.
    ///
    /// `(cents × bps + 5000) / 10000` in i128 so large amounts cannot
    /// overflow; negative amounts round symmetrically.
    pub fn percent_of(&self, rate: Percentage) -> Money {
        let magnitude =
            (i128::from(self.0.unsigned_abs()) * i128::from(rate.bps()) + 5_000) / 10_000;
        let cents = i64::try_from(magnitude).unwrap_or(i64::MAX);
        if self.0 < 0 { Money(-cents) } else { Money(cents) }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        if !amount.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        Ok(Money::from_decimal(amount))
    }
}

/// A percentage in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(i64);

impl Percentage {
    /// Creates a percentage from basis points.
    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    /// Creates a percentage from whole percent.
    pub const fn from_percent(percent: i64) -> Self {
        Self(percent * 100)
    }

    /// Converts a decimal percent (e.g. `12.5`) to basis points.
    pub fn from_decimal(percent: f64) -> Self {
        Self((percent * 100.0).round() as i64)
    }

    /// Returns the value in basis points.
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Returns the value as a decimal percent (display and wire only).
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// 100%.
    pub const fn full() -> Self {
        Self(10_000)
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.to_decimal())
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let percent = f64::deserialize(deserializer)?;
        if !percent.is_finite() {
            return Err(serde::de::Error::custom("percentage must be a finite number"));
        }
        Ok(Percentage::from_decimal(percent))
    }
}
