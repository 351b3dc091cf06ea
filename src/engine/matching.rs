//! # engine::matching
//!
//! **Matching Engine** — decides which resting orders a last-traded price
//! reaches and applies the fills to the ledger.
//!
//! ```text
//! for order in ledger.triggered_orders(symbol, last)     (submission order)
//!   exit order  → quote close @ limit, position's maker rate
//!                 → history store write → commit (position + exit order gone)
//!   entry order → fee resolver → fill @ limit, maker rate → new position
//! ```
//!
//! A failed history write commits nothing: the position stays open and its
//! exit order stays pending, so the next tick retries.

use tracing::{error, info, warn};

use crate::events::DeskEvent;
use crate::fees::FeeResolver;
use crate::ledger::Ledger;
use crate::models::{CloseReason, HistoryRecord, Order, Position};
use crate::store::HistoryStore;

#[derive(Debug, Clone, PartialEq)]
pub enum FillEvent {
    /// Entry order reached → new position (same id as the order).
    OrderFilled { order_id: String, position: Position },
    /// Exit order reached → its position closed via limit order.
    PositionClosed { order_id: String, record: HistoryRecord },
}

impl From<&FillEvent> for DeskEvent {
    fn from(fill: &FillEvent) -> Self {
        match fill {
            FillEvent::OrderFilled { order_id, position } => DeskEvent::OrderFilled {
                order_id: order_id.clone(),
                position: Box::new(position.clone()),
            },
            FillEvent::PositionClosed { record, .. } => DeskEvent::PositionClosed {
                record: Box::new(record.clone()),
            },
        }
    }
}

/// Run one matching pass for `symbol` at `last_price`.  Each order fires at
/// most once per pass; failures are logged and leave that order pending.
pub async fn evaluate(
    ledger: &mut Ledger,
    symbol: &str,
    last_price: f64,
    fees: &FeeResolver,
    store: &dyn HistoryStore,
) -> Vec<FillEvent> {
    let mut fills = Vec::new();

    for order in ledger.triggered_orders(symbol, last_price) {
        if ledger.order(&order.id).is_none() {
            continue;
        }

        let fill = match &order.position_id {
            Some(position_id) => close_via_exit_order(ledger, &order, position_id, store).await,
            None => fill_entry_order(ledger, &order, fees).await,
        };

        if let Some(fill) = fill {
            fills.push(fill);
        }
    }

    fills
}

async fn close_via_exit_order(
    ledger: &mut Ledger,
    order: &Order,
    position_id: &str,
    store: &dyn HistoryStore,
) -> Option<FillEvent> {
    let Some(maker_rate) = ledger.position(position_id).map(|p| p.maker_rate) else {
        warn!(order_id = %order.id, position_id, "exit order without open position, discarding");
        ledger.discard_order(&order.id);
        return None;
    };

    let record = match ledger.quote_close(position_id, order.limit_price, maker_rate, CloseReason::Limit) {
        Ok(record) => record,
        Err(e) => {
            error!(order_id = %order.id, error = %e, "exit fill could not be priced");
            return None;
        }
    };

    if let Err(e) = store.append_trade(&record).await {
        error!(order_id = %order.id, position_id, error = %e, "history write failed, exit fill deferred");
        return None;
    }

    match ledger.commit_close(record) {
        Ok(record) => {
            info!(order_id = %order.id, position_id, net_pnl = record.net_pnl, "📕 position closed via limit order");
            Some(FillEvent::PositionClosed { order_id: order.id.clone(), record })
        }
        Err(e) => {
            error!(order_id = %order.id, error = %e, "exit fill commit failed");
            None
        }
    }
}

async fn fill_entry_order(ledger: &mut Ledger, order: &Order, fees: &FeeResolver) -> Option<FillEvent> {
    let rates = fees.rates(&order.symbol).await;

    match ledger.fill_entry_order(&order.id, rates) {
        Ok(position) => {
            info!(order_id = %order.id, entry = position.entry_price, open_fee = position.open_fee, "📗 order filled into new position");
            Some(FillEvent::OrderFilled { order_id: order.id.clone(), position })
        }
        Err(e) => {
            error!(order_id = %order.id, error = %e, "entry fill failed");
            None
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
