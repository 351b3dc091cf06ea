//! # routes::positions
//!
//! | Method | Path                        | Description                                 |
//! |--------|-----------------------------|---------------------------------------------|
//! | GET    | `/api/positions`            | Open positions                              |
//! | POST   | `/api/positions/:id/close`  | Close now (given price, or mark at taker)   |
//! | POST   | `/api/positions/:id/exit`   | Attach / replace the exit limit order       |

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::trading;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseBody {
    pub price:    Option<f64>,
    /// Overrides the position's taker rate; requires `price`.
    pub fee_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ExitBody {
    pub price: f64,
}

/// GET /api/positions
pub async fn list_positions(State(state): State<SharedState>) -> impl IntoResponse {
    let positions = state.ledger.lock().await.open_positions();
    Json(json!({
        "ok":        true,
        "count":     positions.len(),
        "positions": positions,
    }))
}

/// POST /api/positions/:id/close
///
/// Empty body → close at the current mark.  A body that is present must
/// parse; a malformed one is rejected before anything is touched.
pub async fn close_position(
    State(state): State<SharedState>,
    Path(position_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // ── Parse: only a truly empty body means "at mark" ────────────────────────
    let body: CloseBody = if body.iter().all(u8::is_ascii_whitespace) {
        CloseBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid close body: {e}")))?
    };

    // ── Close ─────────────────────────────────────────────────────────────────
    let record = match body.price {
        Some(price) => trading::close_position(&state, &position_id, price, body.fee_rate).await?,
        None if body.fee_rate.is_some() => {
            return Err(AppError::BadRequest("fee_rate needs an explicit price".into()));
        }
        None => trading::close_position_market(&state, &position_id).await?,
    };

    Ok(Json(json!({ "ok": true, "record": record })))
}

/// POST /api/positions/:id/exit
pub async fn place_exit(
    State(state): State<SharedState>,
    Path(position_id): Path<String>,
    Json(body): Json<ExitBody>,
) -> Result<impl IntoResponse, AppError> {
    let order = trading::place_exit_order(&state, &position_id, body.price).await?;
    Ok(Json(json!({ "ok": true, "order": order })))
}
