use std::sync::Arc;

use chrono::Utc;
use common::OwnerId;
use doc_store::{Collection, DocumentStore, Record, StoreError};

use crate::cart::CartSnapshot;
use crate::coupon::CouponResult;
use crate::error::DomainError;
use crate::money::Money;
use crate::notify::{LoggingNotifier, OrderNotification, OrderNotifier};
use crate::pricing;
use crate::retry::{MAX_WRITE_RETRIES, lost_race, note_retry};

use super::{
    CustomerDetails, Order, OrderError, OrderLine, OrderStatus, PaymentResult, PaymentStatus,
    ShippingAddress, generate_order_id, generate_tracking_number,
};

/// Order details supplied by the customer at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: CustomerDetails,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment: PaymentResult,
}

/// Creates orders and governs their status changes.
///
/// Every change is a compare-and-swap against the version that was checked,
/// so a cancellation racing a shipment can never leave an order both
/// cancelled and shipped: the loser reloads and is re-judged against the
/// winner's status.
#[derive(Clone)]
pub struct OrderLifecycle<S> {
    orders: Collection<S, Order>,
    notifier: Arc<dyn OrderNotifier>,
}

impl<S: DocumentStore> OrderLifecycle<S> {
    /// Creates a lifecycle that logs notifications.
    pub fn new(store: S) -> Self {
        Self::with_notifier(store, Arc::new(LoggingNotifier))
    }

    pub fn with_notifier(store: S, notifier: Arc<dyn OrderNotifier>) -> Self {
        Self {
            orders: Collection::new(store),
            notifier,
        }
    }

    /// Rejects an order `create` would refuse, without touching the store.
    pub(crate) fn check_new_order(
        owner: &OwnerId,
        cart: &CartSnapshot,
        coupon: Option<&CouponResult>,
        new_order: &NewOrder,
    ) -> Result<(), DomainError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }
        if cart.owner_id() != owner {
            return Err(OrderError::InvalidOrderDetails(
                "cart belongs to a different owner".to_string(),
            )
            .into());
        }
        if new_order.payment.status == PaymentStatus::Failed {
            return Err(OrderError::PaymentFailed.into());
        }
        new_order.customer.validate()?;
        new_order.shipping_address.validate()?;
        if new_order.payment_method.trim().is_empty() {
            return Err(
                OrderError::InvalidOrderDetails("payment method is required".to_string()).into(),
            );
        }
        if let Some(result) = coupon
            && result.subtotal != cart.subtotal()
        {
            return Err(OrderError::InvalidOrderDetails(format!(
                "coupon {} was validated for a subtotal of {}, cart subtotal is {}",
                result.coupon.code,
                result.subtotal,
                cart.subtotal()
            ))
            .into());
        }
        Ok(())
    }

    /// Places an order from a cart snapshot.
    ///
    /// Line items and totals are frozen from `cart` and `coupon`; nothing is
    /// re-priced.
    #[tracing::instrument(skip(self, cart, coupon, new_order), fields(owner = %owner))]
    pub async fn create(
        &self,
        owner: &OwnerId,
        cart: &CartSnapshot,
        coupon: Option<&CouponResult>,
        new_order: NewOrder,
    ) -> Result<Record<Order>, DomainError> {
        Self::check_new_order(owner, cart, coupon, &new_order)?;

        let line_items: Vec<OrderLine> = cart.items().iter().map(OrderLine::from).collect();
        let subtotal = pricing::subtotal(line_items.iter().map(|l| l.line_total));
        let applied_discount = coupon.map(|result| {
            let mut applied = result.applied();
            applied.amount = applied.amount.min(subtotal);
            applied
        });
        let discount = applied_discount
            .as_ref()
            .map_or(Money::zero(), |applied| applied.amount);

        let mut order = Order {
            order_id: generate_order_id(Utc::now()),
            owner_id: owner.clone(),
            customer: new_order.customer,
            shipping_address: new_order.shipping_address,
            line_items,
            subtotal,
            applied_discount,
            discount,
            total: pricing::order_total(subtotal, discount),
            payment_method: new_order.payment_method.trim().to_string(),
            payment_status: new_order.payment.status,
            payment_id: new_order.payment.payment_id,
            status: OrderStatus::Pending,
            tracking_number: generate_tracking_number(),
        };

        for attempt in 1..=MAX_WRITE_RETRIES {
            match self.orders.insert(order.clone()).await {
                Ok(record) => {
                    metrics::counter!("orders_created_total").increment(1);
                    tracing::info!(
                        order_id = %record.data.order_id,
                        total = %record.data.total,
                        "order placed"
                    );
                    self.send(OrderNotification::Placed {
                        order_id: record.data.order_id.clone(),
                        owner_id: record.data.owner_id.clone(),
                        email: record.data.customer.email.clone(),
                        total: record.data.total,
                    })
                    .await;
                    return Ok(record);
                }
                Err(StoreError::DuplicateKey { .. }) => {
                    note_retry("order.create", attempt);
                    order.order_id = generate_order_id(Utc::now());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::ContentionExhausted {
            operation: "order.create",
            attempts: MAX_WRITE_RETRIES,
        })
    }

    /// Moves an order to `to` if the transition table allows it.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
    ) -> Result<Record<Order>, DomainError> {
        let (from, record) = self
            .modify(order_id, "order.transition", |order| {
                let from = order.status;
                if to == OrderStatus::Cancelled && !from.can_cancel() {
                    return Err(OrderError::IllegalCancellation {
                        order_id: order.order_id.clone(),
                        status: from,
                    });
                }
                if !from.can_transition_to(to) {
                    return Err(OrderError::InvalidStatusTransition {
                        order_id: order.order_id.clone(),
                        from,
                        to,
                    });
                }
                let mut next = order.clone();
                next.status = to;
                Ok(next)
            })
            .await?;

        metrics::counter!("order_transitions_total", "to" => to.as_str()).increment(1);
        tracing::info!(order_id, from = %from, to = %to, "order status changed");
        self.send(OrderNotification::StatusChanged {
            order_id: order_id.to_string(),
            from,
            to,
        })
        .await;

        Ok(record)
    }

    /// Cancels an order that has not started processing.
    pub async fn cancel(&self, order_id: &str) -> Result<Record<Order>, DomainError> {
        self.transition(order_id, OrderStatus::Cancelled).await
    }

    /// Cancels one of `owner`'s orders. Other owners' orders look absent.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn cancel_for_owner(
        &self,
        owner: &OwnerId,
        order_id: &str,
    ) -> Result<Record<Order>, DomainError> {
        let order = self.get(order_id).await?;
        if order.data.owner_id != *owner {
            return Err(OrderError::OrderNotFound(order_id.to_string()).into());
        }
        self.cancel(order_id).await
    }

    /// Records a new payment status reported by the payment collaborator.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<Record<Order>, DomainError> {
        let (_, record) = self
            .modify(order_id, "order.update_payment_status", |order| {
                if !order.payment_status.can_transition_to(status) {
                    return Err(OrderError::InvalidPaymentTransition {
                        order_id: order.order_id.clone(),
                        from: order.payment_status,
                        to: status,
                    });
                }
                let mut next = order.clone();
                next.payment_status = status;
                Ok(next)
            })
            .await?;
        Ok(record)
    }

    /// Replaces the carrier tracking number.
    #[tracing::instrument(skip(self))]
    pub async fn assign_tracking(
        &self,
        order_id: &str,
        tracking_number: &str,
    ) -> Result<Record<Order>, DomainError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(
                OrderError::InvalidOrderDetails("tracking number is required".to_string()).into(),
            );
        }

        let (_, record) = self
            .modify(order_id, "order.assign_tracking", |order| {
                let mut next = order.clone();
                next.tracking_number = tracking_number.to_string();
                Ok(next)
            })
            .await?;
        Ok(record)
    }

    /// Loads an order by its external id.
    pub async fn get(&self, order_id: &str) -> Result<Record<Order>, DomainError> {
        self.orders
            .find_by_key(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()).into())
    }

    /// The owner's orders, oldest first.
    pub async fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Record<Order>>, DomainError> {
        Ok(self.orders.list_partition(owner.as_str()).await?)
    }

    /// Every order, oldest first.
    pub async fn list_all(&self) -> Result<Vec<Record<Order>>, DomainError> {
        Ok(self.orders.list_all().await?)
    }

    /// Load, check and compare-and-swap. A lost race reloads and re-checks
    /// against the winner's write. Returns the status before the change.
    async fn modify<F>(
        &self,
        order_id: &str,
        operation: &'static str,
        change: F,
    ) -> Result<(OrderStatus, Record<Order>), DomainError>
    where
        F: Fn(&Order) -> Result<Order, OrderError>,
    {
        for attempt in 1..=MAX_WRITE_RETRIES {
            let current = self.get(order_id).await?;
            let next = change(&current.data)?;

            match self.orders.replace(&current, next).await {
                Ok(record) => return Ok((current.data.status, record)),
                Err(e) if lost_race(&e) => note_retry(operation, attempt),
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::ContentionExhausted {
            operation,
            attempts: MAX_WRITE_RETRIES,
        })
    }

    async fn send(&self, notification: OrderNotification) {
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, "order notification not delivered");
        }
    }
}
