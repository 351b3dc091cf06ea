//! # pnl — PnL & fee arithmetic
//!
//! Pure functions, no state.  The same formulas serve the unrealised refresh
//! (mark price + taker rate) and the realised close (fill price + maker rate
//! for a limit exit, mark price + taker rate for a market close).
//!
//! ```text
//! pnl      = (price − entry) × size × side_sign
//! fee      = price × size × rate
//! net_pnl  = pnl − open_fee − fee(price, size, rate)
//! breakeven = entry × (1 ± 2 × maker_rate)     (+ long, − short)
//! ```

use crate::models::{Position, Side};

/// Price-only PnL of `size` units opened at `entry` and valued at `price`.
#[inline]
pub fn price_pnl(side: Side, entry: f64, price: f64, size: f64) -> f64 {
    (price - entry) * size * side.sign()
}

/// Exchange fee of one leg.
#[inline]
pub fn fee(price: f64, size: f64, rate: f64) -> f64 {
    price * size * rate
}

/// `pnl` after the already-paid open fee and the fee of closing at `price`.
#[inline]
pub fn net_pnl(pnl: f64, open_fee: f64, price: f64, size: f64, close_rate: f64) -> f64 {
    pnl - open_fee - fee(price, size, close_rate)
}

#[inline]
pub fn breakeven(side: Side, entry: f64, maker_rate: f64) -> f64 {
    entry * (1.0 + side.sign() * 2.0 * maker_rate)
}

/// `(pnl, net_pnl)` of `position` if it were closed at `price` paying `close_rate`.
pub fn settle(position: &Position, price: f64, close_rate: f64) -> (f64, f64) {
    let pnl = price_pnl(position.side, position.entry_price, price, position.size);
    let net = net_pnl(pnl, position.open_fee, price, position.size, close_rate);
    (pnl, net)
}
