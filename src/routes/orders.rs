//! # routes::orders
//!
//! | Method | Path                  | Description                          |
//! |--------|-----------------------|--------------------------------------|
//! | GET    | `/api/orders`         | Pending limit orders                 |
//! | POST   | `/api/orders/market`  | Fill now at price / mark (taker)     |
//! | POST   | `/api/orders/limit`   | Queue an entry order (maker on fill) |
//! | DELETE | `/api/orders/:id`     | Cancel; unknown ids are a no-op      |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::trading::{self, QtyMode};
use crate::error::AppError;
use crate::models::Side;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct MarketOrderBody {
    pub symbol: String,
    pub side:   String,
    pub qty:    f64,
    #[serde(default)]
    pub mode:   QtyMode,
    /// Explicit fill price; the current mark when absent.
    pub price:  Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitOrderBody {
    pub symbol: String,
    pub side:   String,
    pub qty:    f64,
    #[serde(default)]
    pub mode:   QtyMode,
    pub price:  f64,
}

fn parse_side(raw: &str) -> Result<Side, AppError> {
    raw.parse().map_err(AppError::BadRequest)
}

/// GET /api/orders
pub async fn list_orders(State(state): State<SharedState>) -> impl IntoResponse {
    let orders = state.ledger.lock().await.pending_orders();
    Json(json!({
        "ok":     true,
        "count":  orders.len(),
        "orders": orders,
    }))
}

/// POST /api/orders/market
pub async fn market_order(
    State(state): State<SharedState>,
    Json(body): Json<MarketOrderBody>,
) -> Result<impl IntoResponse, AppError> {
    let side = parse_side(&body.side)?;
    let position =
        trading::submit_market_order(&state, &body.symbol, side, body.qty, body.mode, body.price).await?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "position": position }))))
}

/// POST /api/orders/limit
pub async fn limit_order(
    State(state): State<SharedState>,
    Json(body): Json<LimitOrderBody>,
) -> Result<impl IntoResponse, AppError> {
    let side = parse_side(&body.side)?;
    let order = trading::submit_limit_order(&state, &body.symbol, side, body.qty, body.mode, body.price).await?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "order": order }))))
}

/// DELETE /api/orders/:id
pub async fn cancel_order(State(state): State<SharedState>, Path(order_id): Path<String>) -> impl IntoResponse {
    let cancelled = trading::cancel_order(&state, &order_id).await;
    Json(json!({
        "ok":        true,
        "cancelled": cancelled.is_some(),
        "order":     cancelled,
    }))
}
