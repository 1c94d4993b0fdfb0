//! Coupon administration and validation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use doc_store::{DocumentStore, Record};
use domain::{Coupon, CouponPatch, CouponResult, Discount, DiscountKind, DomainError, Money, NewCoupon};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub min_purchase: Option<Money>,
    pub max_discount: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    pub discount_type: Option<String>,
    pub discount_value: Option<f64>,
    pub max_discount: Option<Money>,
    pub min_purchase: Option<Money>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl UpdateCouponRequest {
    fn touches_discount(&self) -> bool {
        self.discount_type.is_some() || self.discount_value.is_some() || self.max_discount.is_some()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_total: Money,
}

fn parse_kind(kind: &str) -> Result<DiscountKind, DomainError> {
    Ok(kind.parse::<DiscountKind>()?)
}

/// POST /coupons
#[tracing::instrument(skip(state, req), fields(code = %req.code))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Record<Coupon>>), ApiError> {
    let kind = parse_kind(&req.discount_type)?;
    let discount =
        Discount::new(kind, req.discount_value, req.max_discount).map_err(DomainError::from)?;

    let mut new_coupon = NewCoupon::new(req.code, discount);
    if let Some(min_purchase) = req.min_purchase {
        new_coupon = new_coupon.min_purchase(min_purchase);
    }
    if let Some(expires_at) = req.expires_at {
        new_coupon = new_coupon.expires_at(expires_at);
    }
    if req.is_active == Some(false) {
        new_coupon = new_coupon.inactive();
    }

    let coupon = state.coupons.create(new_coupon).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// GET /coupons
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Record<Coupon>>>, ApiError> {
    Ok(Json(state.coupons.list().await?))
}

/// GET /coupons/{code}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
) -> Result<Json<Record<Coupon>>, ApiError> {
    Ok(Json(state.coupons.get(&code).await?))
}

/// PATCH /coupons/{code}
///
/// Discount fields left out keep their current values, so changing only the
/// value of a percentage coupon keeps its cap. Switching to a flat discount
/// drops the cap.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
    Json(req): Json<UpdateCouponRequest>,
) -> Result<Json<Record<Coupon>>, ApiError> {
    let discount = if req.touches_discount() {
        let current = state.coupons.get(&code).await?.data.discount;
        let kind = match &req.discount_type {
            Some(kind) => parse_kind(kind)?,
            None => current.kind(),
        };
        let value = req.discount_value.unwrap_or_else(|| current.value());
        let cap = match (req.max_discount, kind, current) {
            (Some(cap), _, _) => Some(cap),
            (
                None,
                DiscountKind::Percentage,
                Discount::Percentage {
                    max_discount_cap, ..
                },
            ) => max_discount_cap,
            (None, _, _) => None,
        };
        Some(Discount::new(kind, value, cap).map_err(DomainError::from)?)
    } else {
        None
    };

    let patch = CouponPatch {
        discount,
        min_purchase: req.min_purchase,
        expires_at: req.expires_at,
        is_active: req.is_active,
    };
    Ok(Json(state.coupons.update(&code, patch).await?))
}

/// DELETE /coupons/{code}: deactivates; redeemed coupons are never removed.
#[tracing::instrument(skip(state))]
pub async fn deactivate<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
) -> Result<Json<Record<Coupon>>, ApiError> {
    Ok(Json(state.coupons.deactivate(&code).await?))
}

/// POST /coupons/validate
#[tracing::instrument(skip(state, req), fields(code = %req.code))]
pub async fn validate<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<CouponResult>, ApiError> {
    Ok(Json(state.coupons.validate(&req.code, req.order_total).await?))
}
