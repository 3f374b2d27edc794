use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stylehub_core::DomainError;
use stylehub_infra::{CheckoutError, StoreError};

use crate::app::dto;

/// `{success: false, error: <code>, message}`.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn internal_error(message: &'static str) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_payload", rejection.body_text())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_transition", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

/// Store failures never echo their cause; it is logged instead.
pub fn store_error_to_response(
    err: StoreError,
    not_found: &'static str,
    failure: &'static str,
) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", not_found),
        StoreError::Rejected(e) => domain_error_to_response(e),
        other => {
            tracing::error!(error = %other, "store operation failed");
            internal_error(failure)
        }
    }
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::Validation(e) => domain_error_to_response(e),
        CheckoutError::InsufficientStock(shortfalls) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "success": false,
                "error": "insufficient_stock",
                "message": "Insufficient stock for some products",
                "errors": shortfalls.iter().map(dto::shortfall_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        // Cause already logged by the processor.
        CheckoutError::TimedOut(_) | CheckoutError::Store(_) => {
            internal_error("Error processing the sale")
        }
    }
}
