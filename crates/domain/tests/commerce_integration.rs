//! Integration tests for the commerce ledger.
//!
//! These tests drive carts, coupons, orders and invoices together over a
//! shared in-memory store, including the concurrent paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{OwnerId, RecordId};
use doc_store::{
    DocumentQuery, DocumentStore, InMemoryDocumentStore, NewDocument, Record, StoreError,
    StoredDocument, TimeoutStore, WriteOptions,
};
use domain::{
    CartLedger, Checkout, CheckoutRequest, CouponEngine, CustomerDetails, Discount, DomainError,
    ErrorKind, ExpectedTotals, FinancialYear, InMemoryNotifier, InvoiceSequencer, Money,
    NewCoupon, NewInvoice, NewOrder, Order, OrderError, OrderLifecycle, OrderNotification,
    OrderStatus, PaymentResult, Percentage, ProductId, ProductSnapshot, ShippingAddress, pricing,
};

struct Ledger {
    cart: CartLedger<InMemoryDocumentStore>,
    coupons: CouponEngine<InMemoryDocumentStore>,
    orders: OrderLifecycle<InMemoryDocumentStore>,
    checkout: Checkout<InMemoryDocumentStore>,
    notifier: InMemoryNotifier,
}

/// Helper to wire every service over one store
fn ledger() -> Ledger {
    let store = InMemoryDocumentStore::new();
    let notifier = InMemoryNotifier::new();
    let cart = CartLedger::new(store.clone());
    let coupons = CouponEngine::new(store.clone());
    let orders = OrderLifecycle::with_notifier(store, Arc::new(notifier.clone()));
    Ledger {
        checkout: Checkout::new(cart.clone(), coupons.clone(), orders.clone()),
        cart,
        coupons,
        orders,
        notifier,
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        line1: "221B Baker Street".into(),
        line2: None,
        city: "Pune".into(),
        state: "MH".into(),
        postal_code: "411001".into(),
        country: "IN".into(),
    }
}

fn checkout_request(promo_code: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        customer: CustomerDetails::new("Ravi", "ravi@example.com"),
        shipping_address: address(),
        payment_method: "card".into(),
        payment: PaymentResult::paid("pay_001"),
        promo_code: promo_code.map(str::to_string),
        expected: ExpectedTotals::default(),
    }
}

fn phone() -> ProductSnapshot {
    ProductSnapshot::new("Phone", Money::from_major(4299), 10)
}

async fn place_simple_order(l: &Ledger, owner: &OwnerId) -> Record<Order> {
    l.cart
        .add_item(owner, &ProductId::new("SKU-PHONE"), 1, &phone())
        .await
        .unwrap();
    let snapshot = l.cart.snapshot(owner).await.unwrap();
    l.orders
        .create(
            owner,
            &snapshot,
            None,
            NewOrder {
                customer: CustomerDetails::new("Ravi", "ravi@example.com"),
                shipping_address: address(),
                payment_method: "cod".into(),
                payment: PaymentResult::new(domain::PaymentStatus::Pending),
            },
        )
        .await
        .unwrap()
}

mod pricing_properties {
    use super::*;

    #[test]
    fn percentage_discount_respects_cap() {
        let discount = Discount::Percentage {
            value: Percentage::from_percent(20),
            max_discount_cap: Some(Money::from_major(500)),
        };
        assert_eq!(
            pricing::apply_discount(Money::from_major(10_000), &discount),
            Money::from_major(500)
        );
    }

    #[test]
    fn flat_discount_never_exceeds_subtotal() {
        let discount = Discount::Flat {
            value: Money::from_major(1_000),
        };
        assert_eq!(
            pricing::apply_discount(Money::from_major(400), &discount),
            Money::from_major(400)
        );
    }

    #[test]
    fn invoice_total_adds_gst_and_costs() {
        assert_eq!(
            pricing::invoice_total(
                Money::from_major(10_000),
                Percentage::from_percent(18),
                Money::from_major(200),
                Money::from_major(300),
            ),
            Money::from_major(11_700)
        );
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn adding_same_item_twice_consolidates() {
        let l = ledger();
        let owner = OwnerId::new("sess_cart");
        let sku = ProductId::new("SKU-1");
        let product = phone().with_variation("128GB", Money::from_major(500), 10);

        l.cart.add_item(&owner, &sku, 2, &product).await.unwrap();
        l.cart.add_item(&owner, &sku, 3, &product).await.unwrap();

        let items = l.cart.items(&owner).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].data.quantity, 5);
        assert_eq!(items[0].data.variation_key.as_deref(), Some("128GB"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_keep_one_row() {
        let l = Arc::new(ledger());
        let owner = OwnerId::new("sess_race");
        let product = ProductSnapshot::new("Cable", Money::from_major(5), 100);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let l = Arc::clone(&l);
            let owner = owner.clone();
            let product = product.clone();
            handles.push(tokio::spawn(async move {
                l.cart
                    .add_item(&owner, &ProductId::new("CABLE"), 2, &product)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let items = l.cart.items(&owner).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].data.quantity, 6);
    }
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn end_to_end_checkout_with_coupon() {
        let l = ledger();
        let owner = OwnerId::new("user_42");

        l.coupons
            .create(NewCoupon::new(
                "SAVE10",
                Discount::Percentage {
                    value: Percentage::from_percent(10),
                    max_discount_cap: None,
                },
            ))
            .await
            .unwrap();
        l.cart
            .add_item(&owner, &ProductId::new("SKU-PHONE"), 2, &phone())
            .await
            .unwrap();

        let snapshot = l.cart.snapshot(&owner).await.unwrap();
        assert_eq!(snapshot.subtotal(), Money::from_major(8598));

        let coupon = l.coupons.validate("SAVE10", snapshot.subtotal()).await.unwrap();
        assert_eq!(coupon.discount_amount, Money::from_cents(85_980));

        let order = l
            .checkout
            .place_order(&owner, checkout_request(Some("SAVE10")))
            .await
            .unwrap();
        let order_id = order.data.order_id().to_string();

        assert_eq!(order.data.status(), OrderStatus::Pending);
        assert_eq!(order.data.subtotal(), Money::from_major(8598));
        assert_eq!(order.data.discount(), Money::from_cents(85_980));
        assert_eq!(order.data.total(), Money::from_cents(773_820));
        assert!(l.cart.snapshot(&owner).await.unwrap().is_empty());

        let cancelled = l.orders.cancel(&order_id).await.unwrap();
        assert_eq!(cancelled.data.status(), OrderStatus::Cancelled);

        let again = l.orders.cancel(&order_id).await;
        assert!(matches!(
            again,
            Err(DomainError::Order(OrderError::IllegalCancellation {
                status: OrderStatus::Cancelled,
                ..
            }))
        ));

        let sent = l.notifier.sent();
        assert!(matches!(sent[0], OrderNotification::Placed { .. }));
        assert!(matches!(
            sent[1],
            OrderNotification::StatusChanged {
                to: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn shipped_order_cannot_go_back_to_processing() {
        let l = ledger();
        let owner = OwnerId::new("user_1");
        let order = place_simple_order(&l, &owner).await;
        let id = order.data.order_id();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            l.orders.transition(id, status).await.unwrap();
        }

        let err = l
            .orders
            .transition(id, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidStatusTransition { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            l.orders.get(id).await.unwrap().data.status(),
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn cancellation_boundary_for_every_status() {
        let paths: [(OrderStatus, &[OrderStatus]); 6] = [
            (OrderStatus::Pending, &[]),
            (OrderStatus::Confirmed, &[OrderStatus::Confirmed]),
            (
                OrderStatus::Processing,
                &[OrderStatus::Confirmed, OrderStatus::Processing],
            ),
            (
                OrderStatus::Shipped,
                &[
                    OrderStatus::Confirmed,
                    OrderStatus::Processing,
                    OrderStatus::Shipped,
                ],
            ),
            (
                OrderStatus::Delivered,
                &[
                    OrderStatus::Confirmed,
                    OrderStatus::Processing,
                    OrderStatus::Shipped,
                    OrderStatus::Delivered,
                ],
            ),
            (OrderStatus::Cancelled, &[OrderStatus::Cancelled]),
        ];

        for (status, path) in paths {
            let l = ledger();
            let owner = OwnerId::new("user_1");
            let order = place_simple_order(&l, &owner).await;
            let id = order.data.order_id();
            for step in path {
                l.orders.transition(id, *step).await.unwrap();
            }

            let result = l.orders.cancel(id).await;
            if matches!(status, OrderStatus::Pending | OrderStatus::Confirmed) {
                assert_eq!(
                    result.unwrap().data.status(),
                    OrderStatus::Cancelled,
                    "cancel from {status} should succeed"
                );
            } else {
                assert!(
                    matches!(
                        result,
                        Err(DomainError::Order(OrderError::IllegalCancellation { .. }))
                    ),
                    "cancel from {status} should fail"
                );
                assert_eq!(l.orders.get(id).await.unwrap().data.status(), status);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_racing_processing_has_one_winner() {
        for _ in 0..20 {
            let l = Arc::new(ledger());
            let owner = OwnerId::new("user_1");
            let order = place_simple_order(&l, &owner).await;
            let id = order.data.order_id().to_string();
            l.orders.transition(&id, OrderStatus::Confirmed).await.unwrap();

            let cancel = {
                let l = Arc::clone(&l);
                let id = id.clone();
                tokio::spawn(async move { l.orders.cancel(&id).await })
            };
            let process = {
                let l = Arc::clone(&l);
                let id = id.clone();
                tokio::spawn(async move { l.orders.transition(&id, OrderStatus::Processing).await })
            };

            let cancelled = cancel.await.unwrap();
            let processed = process.await.unwrap();
            assert!(
                cancelled.is_ok() != processed.is_ok(),
                "exactly one transition must win"
            );

            let final_status = l.orders.get(&id).await.unwrap().data.status();
            if cancelled.is_ok() {
                assert_eq!(final_status, OrderStatus::Cancelled);
            } else {
                assert_eq!(final_status, OrderStatus::Processing);
            }
        }
    }

    #[tokio::test]
    async fn coupon_locks_after_checkout() {
        let l = ledger();
        let owner = OwnerId::new("user_9");
        l.coupons
            .create(NewCoupon::new(
                "FLAT100",
                Discount::Flat {
                    value: Money::from_major(100),
                },
            ))
            .await
            .unwrap();
        l.cart
            .add_item(&owner, &ProductId::new("SKU-PHONE"), 1, &phone())
            .await
            .unwrap();

        l.checkout
            .place_order(&owner, checkout_request(Some("flat100")))
            .await
            .unwrap();

        let result = l
            .coupons
            .update(
                "FLAT100",
                domain::CouponPatch {
                    discount: Some(Discount::Flat {
                        value: Money::from_major(200),
                    }),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Coupon(domain::CouponError::CouponLocked(_)))
        ));
    }
}

mod invoices {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_numbers_are_gap_free() {
        let sequencer = InvoiceSequencer::new(InMemoryDocumentStore::new());
        let year: FinancialYear = "2024-2025".parse().unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let sequencer = sequencer.clone();
            handles.push(tokio::spawn(async move {
                sequencer.next_number(&year).await.unwrap()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();

        let expected: Vec<String> = (1..=50).map(|n| format!("Y24{n:03}")).collect();
        assert_eq!(numbers, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_auto_invoices_get_distinct_numbers() {
        let sequencer = InvoiceSequencer::new(InMemoryDocumentStore::new());

        let mut handles = Vec::new();
        for i in 0..10 {
            let sequencer = sequencer.clone();
            handles.push(tokio::spawn(async move {
                sequencer
                    .record_invoice(NewInvoice {
                        invoice_number: None,
                        wholesaler_ref: format!("WHL-{i}"),
                        purchase_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                        gross_amount: Money::from_major(1_000),
                        gst_percentage: Percentage::from_percent(5),
                        other_cost: Money::zero(),
                        discount: Money::zero(),
                        financial_year: None,
                        auto_generate: true,
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().data.invoice_number);
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 10);
        assert!(numbers.iter().all(|n| n.starts_with("Y24")));

        let year = FinancialYear::starting(2024);
        assert_eq!(sequencer.list(Some(&year)).await.unwrap().len(), 10);
    }
}

mod storage {
    use super::*;

    /// Store whose calls never complete.
    #[derive(Clone)]
    struct HungStore;

    #[async_trait]
    impl DocumentStore for HungStore {
        async fn insert(&self, _d: NewDocument) -> doc_store::Result<StoredDocument> {
            std::future::pending().await
        }
        async fn get(&self, _c: &str, _id: RecordId) -> doc_store::Result<Option<StoredDocument>> {
            std::future::pending().await
        }
        async fn find_by_key(
            &self,
            _c: &str,
            _k: &str,
        ) -> doc_store::Result<Option<StoredDocument>> {
            std::future::pending().await
        }
        async fn list(&self, _q: DocumentQuery) -> doc_store::Result<Vec<StoredDocument>> {
            std::future::pending().await
        }
        async fn replace(
            &self,
            _c: &str,
            _id: RecordId,
            _b: serde_json::Value,
            _o: WriteOptions,
        ) -> doc_store::Result<StoredDocument> {
            std::future::pending().await
        }
        async fn delete(
            &self,
            _c: &str,
            _id: RecordId,
            _o: WriteOptions,
        ) -> doc_store::Result<bool> {
            std::future::pending().await
        }
        async fn delete_partition(&self, _c: &str, _p: &str) -> doc_store::Result<u64> {
            std::future::pending().await
        }
        async fn next_in_sequence(&self, _c: &str) -> doc_store::Result<i64> {
            std::future::pending().await
        }
        async fn peek_sequence(&self, _c: &str) -> doc_store::Result<i64> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_surfaces_as_storage_unavailable() {
        let store = TimeoutStore::new(HungStore, Duration::from_millis(100));
        let orders = OrderLifecycle::new(store.clone());
        let invoices = InvoiceSequencer::new(store);

        let err = orders.get("ORD1_ABCDEF").await.unwrap_err();
        assert!(matches!(err, DomainError::Store(StoreError::Timeout { .. })));
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let err = invoices
            .next_number(&FinancialYear::starting(2024))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }
}
