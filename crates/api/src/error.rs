//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind, InvoiceError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    // Rejected lifecycle moves and taken invoice numbers are client mistakes.
    if matches!(
        &err,
        DomainError::Order(
            OrderError::InvalidStatusTransition { .. }
                | OrderError::IllegalCancellation { .. }
                | OrderError::InvalidPaymentTransition { .. }
        ) | DomainError::Invoice(InvoiceError::DuplicateInvoiceNumber(_))
    ) {
        return (StatusCode::BAD_REQUEST, err.to_string());
    }

    match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Conflict => (StatusCode::CONFLICT, err.to_string()),
        ErrorKind::StorageUnavailable => {
            tracing::error!(error = %err, "storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage temporarily unavailable, please retry".to_string(),
            )
        }
        ErrorKind::Internal => {
            tracing::error!(error = %err, "internal domain error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
