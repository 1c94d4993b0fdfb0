//! HTTP API for the commerce ledger.
//!
//! Exposes carts, coupons, orders and purchase invoices over REST, with
//! structured logging (tracing) and Prometheus metrics. Carts and orders
//! belong to the owner resolved by [`session::Session`].

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use doc_store::DocumentStore;
use domain::LoggingNotifier;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::get::<S>)
                .post(routes::cart::add::<S>)
                .patch(routes::cart::update::<S>)
                .delete(routes::cart::remove::<S>),
        )
        .route("/cart/all", axum::routing::delete(routes::cart::clear::<S>))
        .route(
            "/coupons",
            get(routes::coupons::list::<S>).post(routes::coupons::create::<S>),
        )
        .route("/coupons/validate", post(routes::coupons::validate::<S>))
        .route(
            "/coupons/{code}",
            get(routes::coupons::get::<S>)
                .patch(routes::coupons::update::<S>)
                .delete(routes::coupons::deactivate::<S>),
        )
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/create", post(routes::orders::create::<S>))
        .route("/orders/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{order_id}",
            get(routes::orders::get::<S>).patch(routes::orders::update::<S>),
        )
        .route(
            "/invoices",
            get(routes::invoices::list::<S>).post(routes::invoices::create::<S>),
        )
        .route(
            "/invoices/next-number",
            get(routes::invoices::next_number::<S>),
        )
        .route(
            "/invoices/{number}",
            get(routes::invoices::get::<S>).delete(routes::invoices::delete::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: every service over `store`,
/// order notifications logged, the default session cookie name.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    let defaults = config::Config::default();
    Arc::new(AppState::new(
        store,
        Arc::new(LoggingNotifier),
        defaults.session_cookie,
    ))
}
