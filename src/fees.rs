//! # fees — Fee Resolver
//!
//! Resolves `(maker, taker)` commission rates for a symbol as decimal
//! fractions (`0.0002` = 0.02 %).
//!
//! * A raw rate `>= 1` is basis-point encoded and is divided by 10 000.
//! * A missing field falls back to its default; a failed lookup falls back to
//!   both defaults.
//! * Successful lookups are cached per symbol for the life of the process and
//!   never invalidated.  Open positions keep their own captured copy anyway.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::market::{FeeSchedule, RawCommission};

pub const DEFAULT_MAKER_RATE: f64 = 0.0002;
pub const DEFAULT_TAKER_RATE: f64 = 0.0004;

const BASIS_POINTS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeeRates {
    pub maker: f64,
    pub taker: f64,
}

impl Default for FeeRates {
    fn default() -> Self {
        Self {
            maker: DEFAULT_MAKER_RATE,
            taker: DEFAULT_TAKER_RATE,
        }
    }
}

impl FeeRates {
    pub fn from_raw(raw: RawCommission) -> Self {
        Self {
            maker: raw.maker.and_then(normalize_rate).unwrap_or(DEFAULT_MAKER_RATE),
            taker: raw.taker.and_then(normalize_rate).unwrap_or(DEFAULT_TAKER_RATE),
        }
    }
}

/// Decimal fraction from a raw exchange value; `None` if unusable.
pub fn normalize_rate(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    Some(if raw >= 1.0 { raw / BASIS_POINTS } else { raw })
}

pub struct FeeResolver {
    schedule: Arc<dyn FeeSchedule>,
    cache: RwLock<HashMap<String, FeeRates>>,
}

impl FeeResolver {
    pub fn new(schedule: Arc<dyn FeeSchedule>) -> Self {
        Self {
            schedule,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Never fails: falls back to [`FeeRates::default`].
    pub async fn rates(&self, symbol: &str) -> FeeRates {
        if let Some(rates) = self.cache.read().await.get(symbol) {
            return *rates;
        }

        match self.schedule.commission_rates(symbol).await {
            Ok(raw) => {
                let rates = FeeRates::from_raw(raw);
                debug!(symbol, maker = rates.maker, taker = rates.taker, "commission rates resolved");
                self.cache.write().await.insert(symbol.to_string(), rates);
                rates
            }
            Err(e) => {
                warn!(symbol, error = %e, "commission lookup failed, using default rates");
                FeeRates::default()
            }
        }
    }

    pub async fn cached(&self) -> HashMap<String, FeeRates> {
        self.cache.read().await.clone()
    }
}
