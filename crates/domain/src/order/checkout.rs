use common::OwnerId;
use doc_store::{DocumentStore, Record};

use crate::cart::CartLedger;
use crate::coupon::CouponEngine;
use crate::error::DomainError;
use crate::money::Money;
use crate::pricing;

use super::{
    CustomerDetails, NewOrder, Order, OrderError, OrderLifecycle, PaymentResult, ShippingAddress,
};

/// Totals the client computed on its side, if it sent any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedTotals {
    pub subtotal: Option<Money>,
    pub discount: Option<Money>,
    pub total: Option<Money>,
}

impl ExpectedTotals {
    fn check(&self, subtotal: Money, discount: Money, total: Money) -> Result<(), OrderError> {
        let pairs = [
            ("subtotal", self.subtotal, subtotal),
            ("discount", self.discount, discount),
            ("total", self.total, total),
        ];
        for (field, client, server) in pairs {
            if let Some(client) = client
                && client != server
            {
                return Err(OrderError::TotalsMismatch {
                    field,
                    client,
                    server,
                });
            }
        }
        Ok(())
    }
}

/// Everything the storefront sends when the customer places an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer: CustomerDetails,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment: PaymentResult,
    pub promo_code: Option<String>,
    pub expected: ExpectedTotals,
}

/// Turns an owner's cart into an order.
///
/// The server-side cart is authoritative; client totals are only compared.
/// The rows the order was priced from are consumed before the order is
/// written, so a cart can turn into at most one order and items added during
/// checkout stay in the cart. A failed redemption count is logged and the
/// order stands.
#[derive(Clone)]
pub struct Checkout<S> {
    cart: CartLedger<S>,
    coupons: CouponEngine<S>,
    orders: OrderLifecycle<S>,
}

impl<S: DocumentStore> Checkout<S> {
    pub fn new(cart: CartLedger<S>, coupons: CouponEngine<S>, orders: OrderLifecycle<S>) -> Self {
        Self {
            cart,
            coupons,
            orders,
        }
    }

    #[tracing::instrument(skip(self, request), fields(owner = %owner))]
    pub async fn place_order(
        &self,
        owner: &OwnerId,
        request: CheckoutRequest,
    ) -> Result<Record<Order>, DomainError> {
        let snapshot = self.cart.snapshot(owner).await?;
        if snapshot.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }

        let promo_code = request
            .promo_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let coupon = match promo_code {
            Some(code) => Some(self.coupons.validate(code, snapshot.subtotal()).await?),
            None => None,
        };

        let discount = coupon
            .as_ref()
            .map_or(Money::zero(), |c| c.discount_amount.min(snapshot.subtotal()));
        let total = pricing::order_total(snapshot.subtotal(), discount);
        request
            .expected
            .check(snapshot.subtotal(), discount, total)?;

        let new_order = NewOrder {
            customer: request.customer,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            payment: request.payment,
        };
        OrderLifecycle::<S>::check_new_order(owner, &snapshot, coupon.as_ref(), &new_order)?;

        self.cart.consume(&snapshot).await?;

        let order = match self
            .orders
            .create(owner, &snapshot, coupon.as_ref(), new_order)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "order not written, returning items to cart");
                self.cart.restore(&snapshot).await;
                return Err(e);
            }
        };

        if let Some(applied) = &coupon
            && let Err(e) = self.coupons.record_redemption(&applied.coupon.code).await
        {
            tracing::error!(
                error = %e,
                code = %applied.coupon.code,
                order_id = order.data.order_id(),
                "coupon redemption not recorded"
            );
        }

        Ok(order)
    }
}
