//! # error
//!
//! Centralised application error type.
//!
//! Ledger operations, the matching engine and every handler return
//! `Result<_, AppError>`.  Axum's `IntoResponse` impl converts these into
//! structured JSON error bodies so the dashboard always gets a
//! machine-readable response even on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The referenced position or order is not in the ledger.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The feed returned a non-numeric price (e.g. `"n/a"`).
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// The closed-trade write could not be confirmed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Market data / fee schedule upstream failed.
    #[error("Market data error: {0}")]
    MarketData(String),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn position_not_found(position_id: &str) -> Self {
        AppError::NotFound(format!("position {position_id}"))
    }

    pub fn order_not_found(order_id: &str) -> Self {
        AppError::NotFound(format!("order {order_id}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidPrice(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Persistence(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MarketData(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
