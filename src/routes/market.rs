//! # routes::market
//!
//! | Method | Path            | Description                                  |
//! |--------|-----------------|----------------------------------------------|
//! | GET    | `/api/health`   | Liveness, exempt from API-key auth           |
//! | GET    | `/api/symbols`  | Tradable symbols, current symbol, last ticks |
//! | PUT    | `/api/symbol`   | Switch the current symbol                    |

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::engine::trading;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SymbolBody {
    pub symbol: String,
}

/// GET /api/health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "ok":      true,
        "service": "paperdesk",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/symbols
pub async fn list_symbols(State(state): State<SharedState>) -> impl IntoResponse {
    let symbols = state.symbols.read().await.clone();
    let current = state.current_symbol().await;
    let ticks = state.last_ticks.read().await.clone();

    Json(json!({
        "ok":      true,
        "current": current,
        "symbols": symbols,
        "ticks":   ticks,
    }))
}

/// PUT /api/symbol
pub async fn set_symbol(
    State(state): State<SharedState>,
    Json(body): Json<SymbolBody>,
) -> Result<impl IntoResponse, AppError> {
    let current = trading::set_current_symbol(&state, &body.symbol).await?;
    Ok(Json(json!({ "ok": true, "current": current })))
}
