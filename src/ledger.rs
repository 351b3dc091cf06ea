//! # ledger
//!
//! The **Ledger** owns the desk's three collections — open positions, pending
//! limit orders and closed-trade history — and is the only place they are
//! mutated.  Every operation is synchronous and free of I/O; the async layer
//! (`engine::trading`, `engine::matching`) holds the ledger behind a single
//! mutex and persists closes between [`Ledger::quote_close`] and
//! [`Ledger::commit_close`].
//!
//! ## Invariants
//! * every position has `size > 0`
//! * ids are pairwise distinct across positions, orders and history
//! * a position has at most one live exit order (a new one replaces the old)
//! * history is append-only

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::fees::FeeRates;
use crate::ids;
use crate::models::order::exit_order_id;
use crate::models::{CloseReason, HistoryRecord, LedgerSnapshot, Order, Position, Side};
use crate::pnl;

#[derive(Debug, Default)]
pub struct Ledger {
    positions: Vec<Position>,
    /// Submission order — the matching engine relies on it.
    orders: Vec<Order>,
    history: Vec<HistoryRecord>,
    history_ids: HashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the closed trades loaded from the history store.
    pub fn with_history(history: Vec<HistoryRecord>) -> Self {
        let history_ids = history.iter().map(|h| h.id.clone()).collect();
        Self {
            history,
            history_ids,
            ..Self::default()
        }
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.clone()
    }

    pub fn pending_orders(&self) -> Vec<Order> {
        self.orders.clone()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.clone()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            positions: self.open_positions(),
            orders: self.pending_orders(),
            history: self.history(),
        }
    }

    pub fn position(&self, position_id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == position_id)
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    /// Symbols with an open position or a pending order.
    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        let all = self
            .positions
            .iter()
            .map(|p| &p.symbol)
            .chain(self.orders.iter().map(|o| &o.symbol));
        for symbol in all {
            if !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }
        symbols
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.history_ids.contains(id)
            || self.positions.iter().any(|p| p.id == id)
            || self.orders.iter().any(|o| o.id == id)
    }

    fn next_id(&self, symbol: &str) -> String {
        ids::next_id(symbol, |candidate| self.contains_id(candidate))
    }

    // ─── Orders ───────────────────────────────────────────────────────────────

    /// Queue a resting entry order; it fills into a new position.
    pub fn submit_entry_order(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
        limit_price: f64,
    ) -> Result<Order, AppError> {
        validate_symbol(symbol)?;
        validate_positive("size", size)?;
        validate_positive("limit price", limit_price)?;

        let order = Order {
            id: self.next_id(symbol),
            symbol: symbol.to_string(),
            side,
            size,
            limit_price,
            position_id: None,
            created_at: Utc::now(),
        };

        info!(order_id = %order.id, symbol, %side, size, limit_price, "entry order queued");
        self.orders.push(order.clone());
        Ok(order)
    }

    /// Attach a resting exit order to an open position, replacing any exit
    /// order it already had.
    pub fn submit_exit_order(
        &mut self,
        position_id: &str,
        side: Side,
        size: f64,
        limit_price: f64,
    ) -> Result<Order, AppError> {
        validate_positive("size", size)?;
        validate_positive("limit price", limit_price)?;

        let symbol = self
            .position(position_id)
            .map(|p| p.symbol.clone())
            .ok_or_else(|| AppError::position_not_found(position_id))?;

        let replaced = self.remove_orders_linked_to(position_id);
        if replaced > 0 {
            debug!(position_id, replaced, "previous exit order replaced");
        }

        let order = Order {
            id: exit_order_id(position_id),
            symbol,
            side,
            size,
            limit_price,
            position_id: Some(position_id.to_string()),
            created_at: Utc::now(),
        };

        if let Some(position) = self.positions.iter_mut().find(|p| p.id == position_id) {
            position.attach_exit(&order);
        }

        info!(order_id = %order.id, position_id, %side, size, limit_price, "exit order queued");
        self.orders.push(order.clone());
        Ok(order)
    }

    /// Remove a pending order.  Unknown ids are a no-op.
    pub fn cancel_order(&mut self, order_id: &str) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(idx);

        if let Some(position_id) = &order.position_id {
            if let Some(position) = self.positions.iter_mut().find(|p| &p.id == position_id) {
                position.detach_exit();
            }
        }

        info!(order_id, "order cancelled");
        Some(order)
    }

    /// Pending orders on `symbol` that `last_price` triggers, in submission order.
    pub fn triggered_orders(&self, symbol: &str, last_price: f64) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|o| o.symbol == symbol && o.is_triggered_by(last_price))
            .cloned()
            .collect()
    }

    /// Drop a pending order without touching its position (orphaned exit orders).
    pub(crate) fn discard_order(&mut self, order_id: &str) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        Some(self.orders.remove(idx))
    }

    fn remove_orders_linked_to(&mut self, position_id: &str) -> usize {
        let before = self.orders.len();
        self.orders
            .retain(|o| o.position_id.as_deref() != Some(position_id));
        before - self.orders.len()
    }

    // ─── Positions ────────────────────────────────────────────────────────────

    /// Open a position from a fill with a freshly drawn id.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position_from_fill(
        &mut self,
        symbol: &str,
        side: Side,
        size: f64,
        fill_price: f64,
        maker_rate: f64,
        taker_rate: f64,
        fee_rate_used: f64,
    ) -> Result<Position, AppError> {
        validate_symbol(symbol)?;
        validate_positive("size", size)?;
        validate_positive("fill price", fill_price)?;
        for rate in [maker_rate, taker_rate, fee_rate_used] {
            validate_fee_rate(rate)?;
        }

        let id = self.next_id(symbol);
        let position = Position::from_fill(
            id, symbol, side, size, fill_price, maker_rate, taker_rate, fee_rate_used,
        );
        Ok(self.push_position(position))
    }

    /// Turn a triggered entry order into a position at its limit price.  The
    /// order's id carries over to the position; the maker rate applies.
    pub fn fill_entry_order(&mut self, order_id: &str, rates: FeeRates) -> Result<Position, AppError> {
        let idx = self
            .orders
            .iter()
            .position(|o| o.id == order_id && !o.is_exit())
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        let order = self.orders.remove(idx);

        let position = Position::from_fill(
            order.id,
            &order.symbol,
            order.side,
            order.size,
            order.limit_price,
            rates.maker,
            rates.taker,
            rates.maker,
        );
        Ok(self.push_position(position))
    }

    fn push_position(&mut self, position: Position) -> Position {
        info!(
            position_id = %position.id,
            symbol      = %position.symbol,
            side        = %position.side,
            size        = position.size,
            entry       = position.entry_price,
            open_fee    = position.open_fee,
            "position opened"
        );
        self.positions.push(position.clone());
        position
    }

    /// Compute the closed-trade record without mutating anything.
    pub fn quote_close(
        &self,
        position_id: &str,
        close_price: f64,
        fee_rate_used: f64,
        reason: CloseReason,
    ) -> Result<HistoryRecord, AppError> {
        validate_positive("close price", close_price)?;
        validate_fee_rate(fee_rate_used)?;
        let position = self
            .position(position_id)
            .ok_or_else(|| AppError::position_not_found(position_id))?;

        let (_, net_pnl) = pnl::settle(position, close_price, fee_rate_used);

        Ok(HistoryRecord {
            id: position.id.clone(),
            symbol: position.symbol.clone(),
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
            close_price,
            net_pnl,
            reason,
            closed_at: Utc::now(),
        })
    }

    /// Apply a quoted close: drop the position and every order linked to it,
    /// append the record.
    pub fn commit_close(&mut self, record: HistoryRecord) -> Result<HistoryRecord, AppError> {
        let idx = self
            .positions
            .iter()
            .position(|p| p.id == record.id)
            .ok_or_else(|| AppError::position_not_found(&record.id))?;
        self.positions.remove(idx);
        self.remove_orders_linked_to(&record.id);

        info!(
            position_id = %record.id,
            close       = record.close_price,
            net_pnl     = record.net_pnl,
            reason      = record.reason.as_str(),
            "position closed"
        );
        self.history_ids.insert(record.id.clone());
        self.history.push(record.clone());
        Ok(record)
    }

    /// In-memory close: [`Ledger::quote_close`] followed by [`Ledger::commit_close`].
    pub fn close_position(
        &mut self,
        position_id: &str,
        close_price: f64,
        fee_rate_used: f64,
        reason: CloseReason,
    ) -> Result<HistoryRecord, AppError> {
        let record = self.quote_close(position_id, close_price, fee_rate_used, reason)?;
        self.commit_close(record)
    }

    /// Re-mark every open position on `symbol`.  No removals.
    pub fn refresh_unrealized(&mut self, symbol: &str, mark_price: f64) -> usize {
        let mut refreshed = 0;
        for position in self.positions.iter_mut().filter(|p| p.symbol == symbol) {
            position.mark_to(mark_price);
            refreshed += 1;
        }
        refreshed
    }
}

fn validate_positive(what: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("{what} must be a positive number, got {value}")))
    }
}

/// Decimal fraction in `[0, 1)`; basis-point values are normalised before
/// they reach the ledger.
fn validate_fee_rate(rate: f64) -> Result<(), AppError> {
    if rate.is_finite() && (0.0..1.0).contains(&rate) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("fee rate must be in [0, 1), got {rate}")))
    }
}

fn validate_symbol(symbol: &str) -> Result<(), AppError> {
    if symbol.trim().is_empty() {
        Err(AppError::BadRequest("symbol must not be empty".into()))
    } else {
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
