//! Cart endpoints. Every call acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::RecordId;
use doc_store::{DocumentStore, Record};
use domain::{CartItem, CartLine, Money, ProductId, ProductSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    pub quantity: i64,
    pub product: ProductSnapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub item_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub item_id: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub total_items: u32,
    pub total_amount: Money,
}

fn parse_quantity(quantity: i64) -> Result<u32, ApiError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid quantity: {quantity}")))
}

fn parse_item_id(id: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(id.trim()).map_err(|e| ApiError::BadRequest(format!("Invalid itemId: {e}")))
}

// -- Handlers --

/// GET /cart
#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<(Session, Json<CartResponse>), ApiError> {
    let snapshot = state.cart.snapshot(&session.owner).await?;

    let response = CartResponse {
        total_items: snapshot.item_count(),
        total_amount: snapshot.subtotal(),
        items: snapshot.items().to_vec(),
    };
    Ok((session, Json(response)))
}

/// POST /cart: adds units, merging with the same product and variation.
#[tracing::instrument(skip(state, session, req), fields(owner = %session.owner))]
pub async fn add<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Json(req): Json<AddToCartRequest>,
) -> Result<(Session, Json<Record<CartItem>>), ApiError> {
    let quantity = parse_quantity(req.quantity)?;
    let product_id = req.product_id.trim();
    if product_id.is_empty() {
        return Err(ApiError::BadRequest("productId is required".to_string()));
    }

    let item = state
        .cart
        .add_item(
            &session.owner,
            &ProductId::new(product_id),
            quantity,
            &req.product,
        )
        .await?;
    Ok((session, Json(item)))
}

/// PATCH /cart
#[tracing::instrument(skip(state, session, req), fields(owner = %session.owner))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<(Session, Json<Record<CartItem>>), ApiError> {
    let quantity = parse_quantity(req.quantity)?;
    let item_id = parse_item_id(&req.item_id)?;

    let item = state
        .cart
        .set_quantity(&session.owner, item_id, quantity)
        .await?;
    Ok((session, Json(item)))
}

/// DELETE /cart
#[tracing::instrument(skip(state, session, req), fields(owner = %session.owner))]
pub async fn remove<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    Json(req): Json<RemoveItemRequest>,
) -> Result<(Session, StatusCode), ApiError> {
    let item_id = parse_item_id(&req.item_id)?;

    if state.cart.remove_item(&session.owner, item_id).await? {
        Ok((session, StatusCode::NO_CONTENT))
    } else {
        Err(ApiError::NotFound(format!("Cart item not found: {item_id}")))
    }
}

/// DELETE /cart/all
#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn clear<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<(Session, StatusCode), ApiError> {
    let removed = state.cart.clear(&session.owner).await?;
    tracing::debug!(removed, "cart cleared");
    Ok((session, StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(parse_quantity(3).unwrap(), 3);
        assert!(matches!(parse_quantity(0), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_quantity(-2), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            parse_quantity(i64::from(u32::MAX) + 1),
            Err(ApiError::BadRequest(_))
        ));
    }
}
