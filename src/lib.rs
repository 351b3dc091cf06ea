//! # paperdesk
//!
//! Paper-trading desk for USDⓈ-M perpetual futures.  Orders fill against a
//! live Binance price feed into a simulated ledger; nothing is ever sent to
//! the exchange.
//!
//! ```text
//!  Binance fapi ──▶ engine::cycle ──▶ engine::matching ──▶ Ledger ──▶ HistoryStore
//!                        │                                   ▲
//!                        ▼                                   │
//!                  broadcast ──▶ /ws/monitor     routes ──▶ engine::trading
//! ```

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod ids;
pub mod ledger;
pub mod market;
pub mod models;
pub mod pnl;
pub mod routes;
pub mod state;
pub mod store;
