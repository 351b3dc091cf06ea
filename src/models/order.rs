//! # models::order
//!
//! Defines [`Side`] and the pending limit [`Order`].
//!
//! An order either has no linked position (an **entry** order, which fills into
//! a new position) or is linked to exactly one open position (an **exit**
//! order, which fills into closing it).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Side ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for a long, −1 for a short.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

// ─── Order ────────────────────────────────────────────────────────────────────

/// A resting limit instruction waiting for the price to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub limit_price: f64,
    /// Present only for an exit order tied to an open position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn is_exit(&self) -> bool {
        self.position_id.is_some()
    }

    /// Resting-order trigger: a BUY fills once price trades at or below the
    /// limit, a SELL once it trades at or above it.
    #[inline]
    pub fn is_triggered_by(&self, last_price: f64) -> bool {
        match self.side {
            Side::Buy => last_price <= self.limit_price,
            Side::Sell => last_price >= self.limit_price,
        }
    }
}

/// Deterministic id of the exit order attached to `position_id`.
pub fn exit_order_id(position_id: &str) -> String {
    format!("{position_id}-exit")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, limit_price: f64) -> Order {
        Order {
            id: "BTCUSDT-abc123".into(),
            symbol: "BTCUSDT".into(),
            side,
            size: 1.0,
            limit_price,
            position_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_buy_triggers_at_or_below_limit() {
        let o = order(Side::Buy, 100.0);
        assert!(o.is_triggered_by(99.5));
        assert!(o.is_triggered_by(100.0));
        assert!(!o.is_triggered_by(100.01));
    }

    #[test]
    fn test_sell_triggers_at_or_above_limit() {
        let o = order(Side::Sell, 100.0);
        assert!(o.is_triggered_by(100.5));
        assert!(o.is_triggered_by(100.0));
        assert!(!o.is_triggered_by(99.99));
    }

    #[test]
    fn test_side_parsing_and_serde() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" SELL ".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_exit_order_id_is_derived() {
        assert_eq!(exit_order_id("ETHUSDT-0f9a1c"), "ETHUSDT-0f9a1c-exit");
    }
}
