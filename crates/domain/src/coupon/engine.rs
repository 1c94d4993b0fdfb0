use chrono::{DateTime, Utc};
use doc_store::{Collection, DocumentStore, Record, StoreError};

use crate::error::DomainError;
use crate::money::Money;
use crate::pricing;
use crate::retry::{MAX_WRITE_RETRIES, lost_race, note_retry};

use super::{Coupon, CouponError, CouponPatch, CouponResult, NewCoupon, lookup_key};

/// Validates coupon codes against subtotals and administers coupons.
///
/// Validation only reads a subtotal; it knows nothing of carts or orders.
#[derive(Clone)]
pub struct CouponEngine<S> {
    coupons: Collection<S, Coupon>,
}

impl<S: DocumentStore> CouponEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            coupons: Collection::new(store),
        }
    }

    /// Validates `code` for `subtotal` as of now.
    pub async fn validate(&self, code: &str, subtotal: Money) -> Result<CouponResult, DomainError> {
        self.validate_at(code, subtotal, Utc::now()).await
    }

    /// Validates `code` for `subtotal` as of `now`.
    ///
    /// Inactive coupons are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn validate_at(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<CouponResult, DomainError> {
        let outcome = self.evaluate(code, subtotal, now).await;

        let label = match &outcome {
            Ok(_) => "valid",
            Err(DomainError::Coupon(CouponError::CouponNotFound(_))) => "not_found",
            Err(DomainError::Coupon(CouponError::CouponExpired(_))) => "expired",
            Err(DomainError::Coupon(CouponError::MinPurchaseNotMet { .. })) => "min_purchase",
            Err(_) => "error",
        };
        metrics::counter!("coupon_validations_total", "outcome" => label).increment(1);

        outcome
    }

    async fn evaluate(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<CouponResult, DomainError> {
        let coupon = match self.coupons.find_by_key(&lookup_key(code)).await? {
            Some(record) if record.data.is_active => record.data,
            _ => return Err(CouponError::CouponNotFound(code.trim().to_string()).into()),
        };

        if coupon.is_expired_at(now) {
            return Err(CouponError::CouponExpired(coupon.code).into());
        }

        if let Some(minimum) = coupon.min_purchase
            && subtotal < minimum
        {
            return Err(CouponError::MinPurchaseNotMet { minimum, subtotal }.into());
        }

        let discount_amount = pricing::apply_discount(subtotal, &coupon.discount);
        Ok(CouponResult {
            coupon,
            subtotal,
            discount_amount,
        })
    }

    /// Creates a coupon. Codes are unique regardless of case.
    #[tracing::instrument(skip(self, new_coupon), fields(code = %new_coupon.code))]
    pub async fn create(&self, new_coupon: NewCoupon) -> Result<Record<Coupon>, DomainError> {
        let coupon = new_coupon.into_coupon()?;
        let code = coupon.code.clone();

        match self.coupons.insert(coupon).await {
            Ok(record) => {
                tracing::info!(coupon_id = %record.id, "coupon created");
                Ok(record)
            }
            Err(StoreError::DuplicateKey { .. }) => Err(CouponError::DuplicateCoupon(code).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// All coupons, active or not, oldest first.
    pub async fn list(&self) -> Result<Vec<Record<Coupon>>, DomainError> {
        Ok(self.coupons.list_all().await?)
    }

    /// Loads a coupon by code, active or not.
    pub async fn get(&self, code: &str) -> Result<Record<Coupon>, DomainError> {
        self.coupons
            .find_by_key(&lookup_key(code))
            .await?
            .ok_or_else(|| CouponError::CouponNotFound(code.trim().to_string()).into())
    }

    /// Applies `patch`. Redeemed coupons only accept active-flag changes.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, code: &str, patch: CouponPatch) -> Result<Record<Coupon>, DomainError> {
        self.modify(code, "coupon.update", |coupon| Ok(patch.apply(coupon)?))
            .await
    }

    /// Deactivates a coupon. Always permitted, even once redeemed.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, code: &str) -> Result<Record<Coupon>, DomainError> {
        self.modify(code, "coupon.deactivate", |coupon| {
            let mut next = coupon.clone();
            next.is_active = false;
            Ok(next)
        })
        .await
    }

    /// Counts one redemption, locking the coupon's terms.
    #[tracing::instrument(skip(self))]
    pub async fn record_redemption(&self, code: &str) -> Result<Record<Coupon>, DomainError> {
        self.modify(code, "coupon.record_redemption", |coupon| {
            let mut next = coupon.clone();
            next.times_redeemed = next.times_redeemed.saturating_add(1);
            Ok(next)
        })
        .await
    }

    /// Load, change and compare-and-swap, reloading when another writer won.
    async fn modify<F>(
        &self,
        code: &str,
        operation: &'static str,
        change: F,
    ) -> Result<Record<Coupon>, DomainError>
    where
        F: Fn(&Coupon) -> Result<Coupon, DomainError>,
    {
        for attempt in 1..=MAX_WRITE_RETRIES {
            let current = self.get(code).await?;
            let next = change(&current.data)?;

            match self.coupons.replace(&current, next).await {
                Ok(record) => return Ok(record),
                Err(e) if lost_race(&e) => note_retry(operation, attempt),
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::ContentionExhausted {
            operation,
            attempts: MAX_WRITE_RETRIES,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use doc_store::InMemoryDocumentStore;

    use super::*;
    use crate::money::Percentage;
    use crate::pricing::Discount;

    fn engine() -> CouponEngine<InMemoryDocumentStore> {
        CouponEngine::new(InMemoryDocumentStore::new())
    }

    fn percent(p: i64, cap: Option<Money>) -> Discount {
        Discount::Percentage {
            value: Percentage::from_percent(p),
            max_discount_cap: cap,
        }
    }

    #[tokio::test]
    async fn validate_is_case_insensitive() {
        let engine = engine();
        engine
            .create(NewCoupon::new("SAVE10", percent(10, None)))
            .await
            .unwrap();

        let result = engine.validate("save10", Money::from_major(8598)).await.unwrap();
        assert_eq!(result.discount_amount, Money::from_cents(85_980));
        assert_eq!(result.coupon.code, "SAVE10");
        assert_eq!(result.applied().amount, Money::from_cents(85_980));
    }

    #[tokio::test]
    async fn validate_applies_cap() {
        let engine = engine();
        engine
            .create(NewCoupon::new("BIG20", percent(20, Some(Money::from_major(500)))))
            .await
            .unwrap();

        let result = engine.validate("BIG20", Money::from_major(10_000)).await.unwrap();
        assert_eq!(result.discount_amount, Money::from_major(500));
    }

    #[tokio::test]
    async fn validate_failure_kinds() {
        let engine = engine();
        let now = Utc::now();
        engine
            .create(NewCoupon::new("OLD", percent(10, None)).expires_at(now - Duration::hours(1)))
            .await
            .unwrap();
        engine
            .create(NewCoupon::new("MIN", percent(10, None)).min_purchase(Money::from_major(1000)))
            .await
            .unwrap();
        engine
            .create(NewCoupon::new("OFF", percent(10, None)).inactive())
            .await
            .unwrap();

        let subtotal = Money::from_major(500);
        assert!(matches!(
            engine.validate_at("NOPE", subtotal, now).await,
            Err(DomainError::Coupon(CouponError::CouponNotFound(_)))
        ));
        assert!(matches!(
            engine.validate_at("OFF", subtotal, now).await,
            Err(DomainError::Coupon(CouponError::CouponNotFound(_)))
        ));
        assert!(matches!(
            engine.validate_at("OLD", subtotal, now).await,
            Err(DomainError::Coupon(CouponError::CouponExpired(_)))
        ));
        assert!(matches!(
            engine.validate_at("MIN", subtotal, now).await,
            Err(DomainError::Coupon(CouponError::MinPurchaseNotMet { .. }))
        ));
        assert!(engine.validate_at("MIN", Money::from_major(1000), now).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_codes_collide_regardless_of_case() {
        let engine = engine();
        engine
            .create(NewCoupon::new("SAVE10", percent(10, None)))
            .await
            .unwrap();

        let dup = engine.create(NewCoupon::new("save10", percent(5, None))).await;
        assert!(matches!(
            dup,
            Err(DomainError::Coupon(CouponError::DuplicateCoupon(_)))
        ));
        assert_eq!(engine.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redeemed_coupon_terms_are_locked() {
        let engine = engine();
        engine
            .create(NewCoupon::new("SAVE10", percent(10, None)))
            .await
            .unwrap();

        let patch = CouponPatch {
            discount: Some(percent(15, None)),
            ..Default::default()
        };
        let updated = engine.update("SAVE10", patch.clone()).await.unwrap();
        assert_eq!(updated.data.discount, percent(15, None));

        engine.record_redemption("SAVE10").await.unwrap();
        assert!(matches!(
            engine.update("SAVE10", patch).await,
            Err(DomainError::Coupon(CouponError::CouponLocked(_)))
        ));

        let deactivated = engine.deactivate("SAVE10").await.unwrap();
        assert!(!deactivated.data.is_active);
        assert_eq!(deactivated.data.times_redeemed, 1);
    }

    #[tokio::test]
    async fn concurrent_redemptions_are_all_counted() {
        let engine = Arc::new(engine());
        engine
            .create(NewCoupon::new("SAVE10", percent(10, None)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.record_redemption("SAVE10").await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(engine.get("save10").await.unwrap().data.times_redeemed, 3);
    }
}
