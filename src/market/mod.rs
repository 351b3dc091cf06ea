//! # market
//!
//! Collaborator seams for the two external services the desk reads from:
//! the futures **price feed** and the **fee schedule**.  The concrete adapter
//! lives in [`binance`]; tests plug in in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::PriceTick;

pub mod binance;

/// Price feed + tradable-symbol listing.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Tradable symbols in the feed's own order, at most `limit` of them.
    async fn current_symbol_list(&self, limit: usize) -> Result<Vec<String>, AppError>;

    /// Last-traded and mark price of `symbol`.  A missing field comes back as
    /// [`crate::models::tick::UNAVAILABLE`], a failed request as `Err`.
    async fn price_tick(&self, symbol: &str) -> Result<PriceTick, AppError>;
}

/// Raw commission rates as the exchange reports them.  Either field may be
/// absent, and either may be basis-point encoded (see [`crate::fees`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommission {
    pub maker: Option<f64>,
    pub taker: Option<f64>,
}

/// Per-symbol maker/taker commission lookup.
#[async_trait]
pub trait FeeSchedule: Send + Sync {
    async fn commission_rates(&self, symbol: &str) -> Result<RawCommission, AppError>;
}
