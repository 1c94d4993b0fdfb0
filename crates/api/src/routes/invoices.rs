//! Purchase invoice endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use doc_store::{DocumentStore, Record};
use domain::{DomainError, FinancialYear, Invoice, Money, NewInvoice, Percentage};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub invoice_number: Option<String>,
    #[serde(alias = "wholesalerRef")]
    pub wholesaler_id: String,
    pub purchase_date: NaiveDate,
    pub gross_amount: Money,
    pub gst_percentage: Percentage,
    #[serde(default)]
    pub other_cost: Money,
    #[serde(default)]
    pub discount: Money,
    pub financial_year: Option<String>,
    #[serde(default)]
    pub auto_generate: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialYearQuery {
    pub financial_year: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextNumberResponse {
    pub invoice_number: String,
    pub financial_year: FinancialYear,
}

fn parse_year(year: Option<&str>) -> Result<Option<FinancialYear>, DomainError> {
    match year.map(str::trim).filter(|y| !y.is_empty()) {
        Some(year) => Ok(Some(year.parse()?)),
        None => Ok(None),
    }
}

/// POST /invoices
#[tracing::instrument(skip(state, req), fields(wholesaler = %req.wholesaler_id))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Record<Invoice>>), ApiError> {
    let input = NewInvoice {
        invoice_number: req.invoice_number,
        wholesaler_ref: req.wholesaler_id,
        purchase_date: req.purchase_date,
        gross_amount: req.gross_amount,
        gst_percentage: req.gst_percentage,
        other_cost: req.other_cost,
        discount: req.discount,
        financial_year: parse_year(req.financial_year.as_deref())?,
        auto_generate: req.auto_generate,
    };

    let invoice = state.invoices.record_invoice(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /invoices?financialYear=2024-2025
#[tracing::instrument(skip(state, query))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<FinancialYearQuery>,
) -> Result<Json<Vec<Record<Invoice>>>, ApiError> {
    let year = parse_year(query.financial_year.as_deref())?;
    Ok(Json(state.invoices.list(year.as_ref()).await?))
}

/// GET /invoices/next-number: previews without claiming. Defaults to the
/// current financial year.
#[tracing::instrument(skip(state, query))]
pub async fn next_number<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<FinancialYearQuery>,
) -> Result<Json<NextNumberResponse>, ApiError> {
    let year = parse_year(query.financial_year.as_deref())?
        .unwrap_or_else(|| FinancialYear::containing(Utc::now().date_naive()));

    let invoice_number = state.invoices.preview_number(&year).await?;
    Ok(Json(NextNumberResponse {
        invoice_number,
        financial_year: year,
    }))
}

/// GET /invoices/{number}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(number): Path<String>,
) -> Result<Json<Record<Invoice>>, ApiError> {
    Ok(Json(state.invoices.get(&number).await?))
}

/// DELETE /invoices/{number}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(number): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.invoices.delete(&number).await?;
    Ok(StatusCode::NO_CONTENT)
}
