//! Shared application state.

use std::sync::Arc;

use doc_store::DocumentStore;
use domain::{CartLedger, Checkout, CouponEngine, InvoiceSequencer, OrderLifecycle, OrderNotifier};

/// Services accessible from all handlers. All of them share one store.
pub struct AppState<S: DocumentStore> {
    pub cart: CartLedger<S>,
    pub coupons: CouponEngine<S>,
    pub orders: OrderLifecycle<S>,
    pub invoices: InvoiceSequencer<S>,
    pub checkout: Checkout<S>,
    /// Name of the anonymous session cookie.
    pub session_cookie: String,
}

impl<S: DocumentStore + Clone + 'static> AppState<S> {
    /// Wires every service over `store`, sending order notifications to
    /// `notifier`.
    pub fn new(store: S, notifier: Arc<dyn OrderNotifier>, session_cookie: impl Into<String>) -> Self {
        let cart = CartLedger::new(store.clone());
        let coupons = CouponEngine::new(store.clone());
        let orders = OrderLifecycle::with_notifier(store.clone(), notifier);
        let checkout = Checkout::new(cart.clone(), coupons.clone(), orders.clone());

        Self {
            cart,
            coupons,
            orders,
            invoices: InvoiceSequencer::new(store),
            checkout,
            session_cookie: session_cookie.into(),
        }
    }
}
