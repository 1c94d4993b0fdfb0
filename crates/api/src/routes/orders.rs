//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use doc_store::{DocumentStore, Record};
use domain::{
    CheckoutRequest, CustomerDetails, DomainError, ExpectedTotals, Money, Order, OrderError,
    OrderStatus, PaymentResult, PaymentStatus, ShippingAddress,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

// -- Request types --

/// Body of `POST /orders/create`.
///
/// Line items sent by the client are ignored: the order is built from the
/// caller's server-side cart. Client totals, when present, must agree with
/// the server's.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer: CustomerDetails,
    pub shipping_address: ShippingAddress,
    pub subtotal: Option<Money>,
    pub discount: Option<Money>,
    pub total: Option<Money>,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    #[serde(alias = "trackingNumber")]
    pub tracking_id: Option<String>,
}

// -- Handlers --

/// POST /orders/create
#[tracing::instrument(skip(state, session, req), fields(owner = %session.owner))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Session, Json<Record<Order>>), ApiError> {
    let request = CheckoutRequest {
        customer: req.customer,
        shipping_address: req.shipping_address,
        payment_method: req.payment_method,
        payment: PaymentResult {
            status: req.payment_status,
            payment_id: req.payment_id,
        },
        promo_code: req.promo_code,
        expected: ExpectedTotals {
            subtotal: req.subtotal,
            discount: req.discount,
            total: req.total,
        },
    };

    let order = state.checkout.place_order(&session.owner, request).await?;
    Ok((StatusCode::CREATED, session, Json(order)))
}

/// GET /orders: the caller's orders, oldest first.
#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<(Session, Json<Vec<Record<Order>>>), ApiError> {
    let orders = state.orders.list_for_owner(&session.owner).await?;
    Ok((session, Json(orders)))
}

/// GET /orders/{orderId}: other owners' orders are reported as missing.
#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Path(order_id): Path<String>,
) -> Result<(Session, Json<Record<Order>>), ApiError> {
    let order = state.orders.get(&order_id).await?;
    if *order.data.owner_id() != session.owner {
        return Err(DomainError::from(OrderError::OrderNotFound(order_id)).into());
    }
    Ok((session, Json(order)))
}

/// POST /orders/cancel
#[tracing::instrument(skip(state, session, req), fields(owner = %session.owner, order_id = %req.order_id))]
pub async fn cancel<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Json(req): Json<CancelOrderRequest>,
) -> Result<(Session, Json<Record<Order>>), ApiError> {
    let order = state
        .orders
        .cancel_for_owner(&session.owner, req.order_id.trim())
        .await?;
    Ok((session, Json(order)))
}

/// PATCH /orders/{orderId}: back-office status, payment and tracking updates.
///
/// Changes are applied in the order status, payment status, tracking; the
/// first rejected change stops the rest.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<Record<Order>>, ApiError> {
    let status = req
        .status
        .as_deref()
        .map(|s| s.parse::<OrderStatus>().map_err(OrderError::UnknownStatus))
        .transpose()
        .map_err(DomainError::from)?;

    let mut updated = None;
    if let Some(status) = status {
        updated = Some(state.orders.transition(&order_id, status).await?);
    }
    if let Some(payment_status) = req.payment_status {
        updated = Some(
            state
                .orders
                .update_payment_status(&order_id, payment_status)
                .await?,
        );
    }
    if let Some(tracking) = req.tracking_id.as_deref() {
        updated = Some(state.orders.assign_tracking(&order_id, tracking).await?);
    }

    updated.map(Json).ok_or_else(|| {
        ApiError::BadRequest("Nothing to update: send status, paymentStatus or trackingId".into())
    })
}
