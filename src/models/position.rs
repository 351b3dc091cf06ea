//! # models::position
//!
//! Defines structs for tracking **open positions** and **closed-trade history**.
//!
//! `Position`      = a simulated holding that is still open
//! `HistoryRecord` = the immutable record written once when a position closes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Order, Side};
use crate::pnl;

// ─── Position ─────────────────────────────────────────────────────────────────

/// A simulated futures holding.
///
/// `maker_rate` / `taker_rate` are a snapshot of the fee schedule taken when
/// the position opened; they are never re-fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub open_fee: f64,
    pub maker_rate: f64,
    pub taker_rate: f64,
    /// Unrealised price-only PnL at the last mark.
    pub pnl: f64,
    /// Unrealised PnL net of the open fee and a taker close fee at the last mark.
    pub net_pnl: f64,
    pub breakeven: f64,
    /// Placeholder, liquidation is not simulated.
    pub liquidation: Option<f64>,
    /// Limit price of the attached exit order, if any.
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub exit_order_id: Option<String>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Build a freshly filled position. `fee_rate_used` is the rate of the
    /// opening leg: taker for market fills, maker for resting limit fills.
    #[allow(clippy::too_many_arguments)]
    pub fn from_fill(
        id: String,
        symbol: &str,
        side: Side,
        size: f64,
        fill_price: f64,
        maker_rate: f64,
        taker_rate: f64,
        fee_rate_used: f64,
    ) -> Self {
        let open_fee = pnl::fee(fill_price, size, fee_rate_used);
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            size,
            entry_price: fill_price,
            open_fee,
            maker_rate,
            taker_rate,
            pnl: 0.0,
            net_pnl: -open_fee,
            breakeven: pnl::breakeven(side, fill_price, maker_rate),
            liquidation: None,
            target_price: None,
            exit_order_id: None,
            opened_at: Utc::now(),
        }
    }

    /// Re-mark against `mark_price` using the position's own taker rate.
    pub fn mark_to(&mut self, mark_price: f64) {
        self.pnl = pnl::price_pnl(self.side, self.entry_price, mark_price, self.size);
        self.net_pnl = pnl::net_pnl(self.pnl, self.open_fee, mark_price, self.size, self.taker_rate);
    }

    pub(crate) fn attach_exit(&mut self, order: &Order) {
        self.target_price = Some(order.limit_price);
        self.exit_order_id = Some(order.id.clone());
    }

    pub(crate) fn detach_exit(&mut self) {
        self.target_price = None;
        self.exit_order_id = None;
    }
}

// ─── HistoryRecord ────────────────────────────────────────────────────────────

/// How a position left the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Closed at the mark price on request (taker fee).
    Market,
    /// Closed by its linked exit order filling (maker fee).
    Limit,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Market => "MARKET",
            CloseReason::Limit => "LIMIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(CloseReason::Market),
            "LIMIT" => Some(CloseReason::Limit),
            _ => None,
        }
    }
}

/// Closed trade — written once, never mutated.  `id` is the closed position's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub close_price: f64,
    /// Realised PnL after both the open and the close fee.
    pub net_pnl: f64,
    pub reason: CloseReason,
    pub closed_at: DateTime<Utc>,
}

// ─── Snapshot ─────────────────────────────────────────────────────────────────

/// Read-only copy of the ledger handed to the presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSnapshot {
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub history: Vec<HistoryRecord>,
}
