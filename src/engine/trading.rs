//! # engine::trading
//!
//! Caller-facing desk operations: submit market / limit orders, attach an exit
//! order, cancel, close.  Each one funnels through the [`Ledger`] API under
//! the state's ledger lock, surfaces its error to the caller, and publishes a
//! snapshot afterwards.
//!
//! [`Ledger`]: crate::ledger::Ledger

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::events::DeskEvent;
use crate::models::{CloseReason, HistoryRecord, Order, Position, Side};
use crate::state::SharedState;

// ─── Quantity ─────────────────────────────────────────────────────────────────

/// Unit of an order quantity: base-asset coins, or USDT notional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QtyMode {
    #[default]
    Coin,
    Usdt,
}

/// Contract size for `qty` in `mode` at `price`.
pub fn resolve_size(qty: f64, mode: QtyMode, price: f64) -> Result<f64, AppError> {
    if !(qty.is_finite() && qty > 0.0) {
        return Err(AppError::BadRequest(format!("quantity must be a positive number, got {qty}")));
    }
    match mode {
        QtyMode::Coin => Ok(qty),
        QtyMode::Usdt if price.is_finite() && price > 0.0 => Ok(qty / price),
        QtyMode::Usdt => Err(AppError::InvalidPrice(format!(
            "cannot size a USDT quantity at price {price}"
        ))),
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, AppError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::BadRequest("symbol must not be empty".into()));
    }
    Ok(symbol)
}

/// Current mark price of `symbol` from the feed.
async fn fetch_mark(state: &SharedState, symbol: &str) -> Result<f64, AppError> {
    state.market.price_tick(symbol).await?.mark_price()
}

// ─── Orders ───────────────────────────────────────────────────────────────────

/// Open a position immediately (taker fill).  Without an explicit `price` the
/// current mark price is the entry.
pub async fn submit_market_order(
    state: &SharedState,
    symbol: &str,
    side: Side,
    qty: f64,
    mode: QtyMode,
    price: Option<f64>,
) -> Result<Position, AppError> {
    let symbol = normalize_symbol(symbol)?;

    // ── Entry price: explicit, else the mark (fetched outside the lock) ──────
    let entry = match price {
        Some(p) => p,
        None => fetch_mark(state, &symbol).await?,
    };
    let size = resolve_size(qty, mode, entry)?;
    let rates = state.fees.rates(&symbol).await;

    let position = {
        let mut ledger = state.ledger.lock().await;
        ledger.open_position_from_fill(&symbol, side, size, entry, rates.maker, rates.taker, rates.taker)?
    };

    info!(
        position_id = %position.id,
        qty,
        mode        = ?mode,
        "🟢 market order filled"
    );
    state.broadcast(&DeskEvent::PositionOpened { position: Box::new(position.clone()) });
    state.publish_snapshot().await;
    Ok(position)
}

/// Queue a resting entry order.  A USDT quantity is sized at the limit price.
pub async fn submit_limit_order(
    state: &SharedState,
    symbol: &str,
    side: Side,
    qty: f64,
    mode: QtyMode,
    limit_price: f64,
) -> Result<Order, AppError> {
    let symbol = normalize_symbol(symbol)?;
    let size = resolve_size(qty, mode, limit_price)?;

    let order = state
        .ledger
        .lock()
        .await
        .submit_entry_order(&symbol, side, size, limit_price)?;

    state.broadcast(&DeskEvent::OrderPlaced { order: Box::new(order.clone()) });
    state.publish_snapshot().await;
    Ok(order)
}

/// Attach a take-profit style exit order closing the whole position at
/// `limit_price`.  Replaces an exit order the position already had.
pub async fn place_exit_order(
    state: &SharedState,
    position_id: &str,
    limit_price: f64,
) -> Result<Order, AppError> {
    let order = {
        let mut ledger = state.ledger.lock().await;
        let (side, size) = ledger
            .position(position_id)
            .map(|p| (p.side.opposite(), p.size))
            .ok_or_else(|| AppError::position_not_found(position_id))?;
        ledger.submit_exit_order(position_id, side, size, limit_price)?
    };

    state.broadcast(&DeskEvent::OrderPlaced { order: Box::new(order.clone()) });
    state.publish_snapshot().await;
    Ok(order)
}

/// Remove a pending order.  An unknown id is not an error.
pub async fn cancel_order(state: &SharedState, order_id: &str) -> Option<Order> {
    let cancelled = state.ledger.lock().await.cancel_order(order_id);

    if cancelled.is_some() {
        state.broadcast(&DeskEvent::OrderCancelled { order_id: order_id.to_string() });
        state.publish_snapshot().await;
    }
    cancelled
}

// ─── Closes ───────────────────────────────────────────────────────────────────

/// Close `position_id` at `close_price`, paying `fee_rate_used` (the
/// position's own taker rate when `None`).  The history write happens under
/// the ledger lock; if it fails the position stays open.
pub async fn close_position(
    state: &SharedState,
    position_id: &str,
    close_price: f64,
    fee_rate_used: Option<f64>,
) -> Result<HistoryRecord, AppError> {
    let record = {
        let mut ledger = state.ledger.lock().await;
        let taker_rate = ledger
            .position(position_id)
            .map(|p| p.taker_rate)
            .ok_or_else(|| AppError::position_not_found(position_id))?;

        // ── Quote → persist → commit, all under the same guard ──────────────
        let record = ledger.quote_close(
            position_id,
            close_price,
            fee_rate_used.unwrap_or(taker_rate),
            CloseReason::Market,
        )?;

        if let Err(e) = state.store.append_trade(&record).await {
            warn!(position_id, error = %e, "close not persisted, position kept open");
            return Err(e);
        }
        ledger.commit_close(record)?
    };

    info!(position_id, close = record.close_price, net_pnl = record.net_pnl, "🔴 position closed");
    state.broadcast(&DeskEvent::PositionClosed { record: Box::new(record.clone()) });
    state.publish_snapshot().await;
    Ok(record)
}

/// Close at the current mark price with the position's taker rate.
///
/// The mark is fetched without holding the ledger; [`close_position`]
/// re-checks that the position is still open afterwards.
pub async fn close_position_market(state: &SharedState, position_id: &str) -> Result<HistoryRecord, AppError> {
    let symbol = state
        .ledger
        .lock()
        .await
        .position(position_id)
        .map(|p| p.symbol.clone())
        .ok_or_else(|| AppError::position_not_found(position_id))?;

    // Lock released here; the position may close meanwhile.
    let mark = fetch_mark(state, &symbol).await?;
    close_position(state, position_id, mark, None).await
}

// ─── Symbol selection ─────────────────────────────────────────────────────────

/// Switch the symbol the update cycle follows.  Must be in the last fetched
/// symbol list when one is available.
pub async fn set_current_symbol(state: &SharedState, symbol: &str) -> Result<String, AppError> {
    let symbol = normalize_symbol(symbol)?;
    let symbols = state.symbols.read().await.clone();
    if !symbols.is_empty() && !symbols.contains(&symbol) {
        return Err(AppError::BadRequest(format!("{symbol} is not a tradable symbol")));
    }

    *state.current_symbol.write().await = symbol.clone();
    info!(symbol = %symbol, "current symbol changed");
    state.broadcast(&DeskEvent::SymbolsUpdated { symbols, current: symbol.clone() });
    Ok(symbol)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
