//! # models::tick
//!
//! Defines [`PriceTick`], one poll of the futures feed for a single symbol.
//!
//! Prices are kept as the raw strings the feed returned.  Anything that does
//! not parse as a finite positive number (the feed uses `"n/a"` for a missing
//! field) means "unavailable": the update cycle skips the mutation that needed
//! it instead of failing.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Marker the feed adapters use for a missing price field.
pub const UNAVAILABLE: &str = "n/a";

/// A last-traded / mark price pair for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// The futures symbol, e.g. `"BTCUSDT"`.
    pub symbol: String,

    /// Last traded price — drives limit-order triggering.
    pub last: String,

    /// Mark price — drives unrealised PnL and market closes.
    pub mark: String,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, last: impl Into<String>, mark: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            last: last.into(),
            mark: mark.into(),
        }
    }

    #[inline]
    pub fn last_price(&self) -> Result<f64, AppError> {
        parse_price(&self.symbol, "last", &self.last)
    }

    #[inline]
    pub fn mark_price(&self) -> Result<f64, AppError> {
        parse_price(&self.symbol, "mark", &self.mark)
    }
}

fn parse_price(symbol: &str, field: &str, raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(AppError::InvalidPrice(format!(
            "{symbol} {field} price unavailable ({raw:?})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_strings_parse() {
        let tick = PriceTick::new("BTCUSDT", "50123.40", " 50120.1 ");
        assert_eq!(tick.last_price().unwrap(), 50123.40);
        assert_eq!(tick.mark_price().unwrap(), 50120.1);
    }

    #[test]
    fn test_unavailable_is_invalid_price() {
        let tick = PriceTick::new("BTCUSDT", UNAVAILABLE, "0");
        assert!(matches!(tick.last_price(), Err(AppError::InvalidPrice(_))));
        assert!(matches!(tick.mark_price(), Err(AppError::InvalidPrice(_))));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let tick = PriceTick::new("ETHUSDT", "NaN", "inf");
        assert!(tick.last_price().is_err());
        assert!(tick.mark_price().is_err());
    }
}
